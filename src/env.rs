//! Environment - variable bindings built up during resolution.
//!
//! An `Env` maps `VarId`s to terms. Binding is destructive; callers that
//! need atomic failure clone first (the solver does this for every
//! non-deterministic frame, so a failed branch can simply be dropped).

use crate::symbol::Names;
use crate::term::{Term, TermId, TermStore, VarId};
use hashbrown::HashMap;
use rustc_hash::FxHasher;
use smallvec::SmallVec;
use std::hash::{Hash, Hasher};

/// Node budget for deep traversals (copy, hash). Without an occurs-check,
/// unification can tie cycles; the budget turns an accidental traversal of
/// one into a truncated result instead of a hang.
const TRAVERSE_BUDGET: usize = 1 << 20;

/// A set of variable bindings.
#[derive(Debug, Clone, Default)]
pub struct Env {
    bindings: HashMap<VarId, TermId>,
}

impl Env {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    /// Bind a variable to a term. Overwrites any previous binding.
    pub fn bind(&mut self, var: VarId, term: TermId) {
        self.bindings.insert(var, term);
    }

    /// The direct binding of a variable, if any. Does not follow chains.
    pub fn lookup(&self, var: VarId) -> Option<TermId> {
        self.bindings.get(&var).copied()
    }

    /// Number of bound variables.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check if no variable is bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Follow the binding chain from `t` to the first non-variable term or
    /// unbound variable. Path-following only; never mutates.
    ///
    /// Alias loops (`X -> Y -> X`) terminate at the repeated variable.
    pub fn resolve(&self, t: TermId, terms: &TermStore) -> TermId {
        let mut current = t;
        let mut visited: SmallVec<[VarId; 8]> = SmallVec::new();
        loop {
            match terms.as_var(current) {
                Some(v) => {
                    if visited.contains(&v) {
                        return current;
                    }
                    match self.lookup(v) {
                        Some(bound) => {
                            visited.push(v);
                            current = bound;
                        }
                        None => return current,
                    }
                }
                None => return current,
            }
        }
    }
}

/// Deep-copy `t` with every bound variable replaced by its resolved value.
/// Unbound variables survive as themselves. Used by solution handlers to
/// extract values without holding onto the environment.
///
/// Uses an explicit work/result stack pair rather than recursion.
pub fn copy_resolved(t: TermId, env: &Env, terms: &TermStore) -> TermId {
    let mut budget = TRAVERSE_BUDGET;
    let mut work: Vec<(TermId, bool)> = vec![(t, false)];
    let mut results: Vec<TermId> = Vec::new();
    let mut child_counts: Vec<usize> = Vec::new();

    while let Some((tid, children_done)) = work.pop() {
        if children_done {
            match terms.get(tid) {
                Some(Term::Compound(functor, args)) => {
                    let n = args.len();
                    let count = child_counts.pop().unwrap();
                    debug_assert_eq!(n, count);
                    let new_args: SmallVec<[TermId; 4]> =
                        results.drain(results.len() - n..).collect();
                    results.push(terms.compound(functor, new_args));
                }
                _ => unreachable!("only compounds are revisited"),
            }
            continue;
        }

        let resolved = env.resolve(tid, terms);
        if budget == 0 {
            // Cyclic or pathological structure: stop expanding here.
            results.push(resolved);
            continue;
        }
        budget -= 1;

        match terms.get(resolved) {
            Some(Term::Compound(_, args)) => {
                work.push((resolved, true));
                child_counts.push(args.len());
                for &arg in args.iter().rev() {
                    work.push((arg, false));
                }
            }
            _ => results.push(resolved),
        }
    }

    debug_assert_eq!(results.len(), 1);
    results.pop().unwrap()
}

/// Structural hash of `t` as resolved in `env`.
///
/// Returns `(hash, saw_nan)`. Policy choices (shared with `distinct/2` and
/// the first-argument index): `-0.0` hashes as `0.0`, NaN sets the flag so
/// callers can treat NaN-bearing terms as never-equal, and unbound
/// variables hash by first-occurrence order so variants collide and
/// renamings do not matter.
pub fn value_hash(t: TermId, env: &Env, terms: &TermStore) -> (u64, bool) {
    let mut hasher = FxHasher::default();
    let mut saw_nan = false;
    let mut var_order: HashMap<VarId, u32> = HashMap::new();
    let mut budget = TRAVERSE_BUDGET;
    let mut stack: Vec<TermId> = vec![t];

    while let Some(tid) = stack.pop() {
        if budget == 0 {
            0xffu8.hash(&mut hasher); // truncation marker
            break;
        }
        budget -= 1;

        let resolved = env.resolve(tid, terms);
        match terms.get(resolved) {
            Some(Term::Var(v)) => {
                let next = var_order.len() as u32;
                let ord = *var_order.entry(v).or_insert(next);
                0u8.hash(&mut hasher);
                ord.hash(&mut hasher);
            }
            Some(Term::Atom(name)) => {
                1u8.hash(&mut hasher);
                name.hash(&mut hasher);
            }
            Some(Term::Int(i)) => {
                2u8.hash(&mut hasher);
                i.hash(&mut hasher);
            }
            Some(Term::Float(bits)) => {
                let f = f64::from_bits(bits);
                if f.is_nan() {
                    saw_nan = true;
                }
                let canonical = if f == 0.0 { 0.0f64.to_bits() } else { bits };
                3u8.hash(&mut hasher);
                canonical.hash(&mut hasher);
            }
            Some(Term::Str(bytes)) => {
                4u8.hash(&mut hasher);
                bytes.hash(&mut hasher);
            }
            Some(Term::Compound(functor, args)) => {
                5u8.hash(&mut hasher);
                functor.hash(&mut hasher);
                args.len().hash(&mut hasher);
                for &arg in args.iter().rev() {
                    stack.push(arg);
                }
            }
            None => {}
        }
    }

    (hasher.finish(), saw_nan)
}

/// Collect a proper list into its items, resolving through `env` as it goes.
/// Returns None for partial lists and non-lists.
pub fn collect_proper_list(
    t: TermId,
    env: &Env,
    terms: &TermStore,
    ns: &Names,
) -> Option<Vec<TermId>> {
    let mut items = Vec::new();
    let mut current = env.resolve(t, terms);
    let mut budget = TRAVERSE_BUDGET;
    loop {
        if budget == 0 {
            return None;
        }
        budget -= 1;
        match terms.get(current)? {
            Term::Atom(name) if name == ns.nil => return Some(items),
            Term::Compound(functor, args) if functor == ns.dot && args.len() == 2 => {
                items.push(args[0]);
                current = env.resolve(args[1], terms);
            }
            _ => return None,
        }
    }
}
