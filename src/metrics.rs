//! Solver metrics collection.
//!
//! Aggregate counters for the resolution loop, surfaced by the REPL's
//! verbose mode. All counters use relaxed ordering for minimal overhead;
//! the engine is single-threaded per session, so a snapshot taken between
//! queries is exact.

use std::sync::atomic::{AtomicU64, Ordering};

/// Aggregate counters collected during solving.
#[derive(Debug, Default)]
pub struct SolveMetrics {
    /// Unification attempts against clause heads.
    pub unifications: AtomicU64,
    /// Unification attempts that failed.
    pub unification_failures: AtomicU64,
    /// Candidate clauses tried.
    pub clauses_tried: AtomicU64,
    /// Solutions delivered to the handler.
    pub solutions: AtomicU64,
    /// Cuts that pruned a predicate activation.
    pub cuts_committed: AtomicU64,
    /// Deepest activation depth observed.
    pub max_depth: AtomicU64,
}

impl SolveMetrics {
    /// Create a collector with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_unification(&self, ok: bool) {
        self.unifications.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.unification_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_clause_try(&self) {
        self.clauses_tried.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_solution(&self) {
        self.solutions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cut(&self) {
        self.cuts_committed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_depth(&self, depth: u64) {
        self.max_depth.fetch_max(depth, Ordering::Relaxed);
    }

    /// Reset every counter to zero (the REPL does this per query).
    pub fn reset(&self) {
        self.unifications.store(0, Ordering::Relaxed);
        self.unification_failures.store(0, Ordering::Relaxed);
        self.clauses_tried.store(0, Ordering::Relaxed);
        self.solutions.store(0, Ordering::Relaxed);
        self.cuts_committed.store(0, Ordering::Relaxed);
        self.max_depth.store(0, Ordering::Relaxed);
    }

    /// Copy out the current counter values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            unifications: self.unifications.load(Ordering::Relaxed),
            unification_failures: self.unification_failures.load(Ordering::Relaxed),
            clauses_tried: self.clauses_tried.load(Ordering::Relaxed),
            solutions: self.solutions.load(Ordering::Relaxed),
            cuts_committed: self.cuts_committed.load(Ordering::Relaxed),
            max_depth: self.max_depth.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub unifications: u64,
    pub unification_failures: u64,
    pub clauses_tried: u64,
    pub solutions: u64,
    pub cuts_committed: u64,
    pub max_depth: u64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unifications={} (failed {}), clauses={}, solutions={}, cuts={}, max_depth={}",
            self.unifications,
            self.unification_failures,
            self.clauses_tried,
            self.solutions,
            self.cuts_committed,
            self.max_depth
        )
    }
}
