//! Clause database: insertion-ordered rules plus the first-argument index.
//!
//! The database is append-only during a session; candidate enumeration order
//! is insertion order, which is observable through solution order.

use crate::env::Env;
use crate::index::ClauseIndex;
use crate::term::{Term, TermId, TermStore, VarId};
use hashbrown::HashMap;
use smallvec::SmallVec;

/// A rule: head plus an ordered, possibly empty body (a fact).
#[derive(Debug, Clone)]
pub struct Clause {
    pub head: TermId,
    pub body: Vec<TermId>,
}

impl Clause {
    /// A clause with no body.
    pub fn fact(head: TermId) -> Self {
        Self {
            head,
            body: Vec::new(),
        }
    }
}

/// The session's clause store.
#[derive(Debug, Default)]
pub struct Database {
    clauses: Vec<Clause>,
    index: ClauseIndex,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a clause, keeping the index consistent.
    pub fn add(&mut self, clause: Clause, terms: &TermStore) {
        let idx = self.clauses.len();
        self.index.add(idx, clause.head, terms);
        self.clauses.push(clause);
    }

    pub fn get(&self, idx: usize) -> &Clause {
        &self.clauses[idx]
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Ordered candidate clause indices for `goal` (see the index module).
    pub fn candidates(&self, goal: TermId, env: &Env, terms: &TermStore) -> Vec<usize> {
        self.index.candidates(goal, env, terms, self.clauses.len())
    }
}

/// Copy a clause with every variable replaced by a fresh one, head and body
/// sharing one renaming. Constants come back as-is (the store hashconses).
pub fn rename_clause(clause: &Clause, terms: &TermStore) -> (TermId, Vec<TermId>) {
    let mut renaming: HashMap<VarId, VarId> = HashMap::new();
    let head = rename_term(clause.head, &mut renaming, terms);
    let body = clause
        .body
        .iter()
        .map(|&goal| rename_term(goal, &mut renaming, terms))
        .collect();
    (head, body)
}

/// Structure-preserving copy of `t` with variables freshened through
/// `renaming`. Explicit work/result stacks, same shape as the deep resolve
/// in the env module.
fn rename_term(t: TermId, renaming: &mut HashMap<VarId, VarId>, terms: &TermStore) -> TermId {
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

        match terms.get(tid) {
            Some(Term::Var(v)) => {
                let fresh = *renaming.entry(v).or_insert_with(|| terms.fresh_var());
                results.push(terms.var(fresh));
            }
            Some(Term::Compound(_, args)) => {
                work.push((tid, true));
                child_counts.push(args.len());
                for &arg in args.iter().rev() {
                    work.push((arg, false));
                }
            }
            _ => results.push(tid),
        }
    }

    debug_assert_eq!(results.len(), 1);
    results.pop().unwrap()
}
