//! First-argument clause indexing.
//!
//! Clauses are bucketed by `functor/arity`. Within a bucket, clauses whose
//! first argument is a ground leaf (atom, integer, float, string) are also
//! keyed by a value hash; clauses whose first argument is a variable must be
//! tried for every goal under the key. Hash collisions are tolerated:
//! unification filters the survivors.

use crate::env::Env;
use crate::symbol::NameId;
use crate::term::{Term, TermId, TermStore};
use hashbrown::HashMap;
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct PredKey {
    name: NameId,
    arity: u32,
}

#[derive(Debug, Default)]
struct Buckets {
    /// Every clause under this key, insertion order.
    all: Vec<usize>,
    /// Clauses whose first argument is a ground leaf, by value hash.
    by_value: HashMap<u64, Vec<usize>>,
    /// Clauses whose first argument is a variable.
    var_first: Vec<usize>,
}

/// The clause index. Kept consistent on every database append.
#[derive(Debug, Default)]
pub struct ClauseIndex {
    preds: HashMap<PredKey, Buckets>,
    /// Clauses whose head is itself a variable; tried for every goal.
    unindexed: Vec<usize>,
}

impl ClauseIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `head` and record clause `idx` in the matching buckets.
    pub fn add(&mut self, idx: usize, head: TermId, terms: &TermStore) {
        match terms.get(head) {
            Some(Term::Atom(name)) => {
                self.preds
                    .entry(PredKey { name, arity: 0 })
                    .or_default()
                    .all
                    .push(idx);
            }
            Some(Term::Compound(name, args)) => {
                let key = PredKey {
                    name,
                    arity: args.len() as u32,
                };
                let buckets = self.preds.entry(key).or_default();
                buckets.all.push(idx);
                match terms.get(args[0]) {
                    Some(Term::Var(_)) => buckets.var_first.push(idx),
                    Some(ref leaf) => {
                        if let Some(h) = leaf_hash(leaf) {
                            buckets.by_value.entry(h).or_default().push(idx);
                        }
                        // Compound first arguments live only in `all`; a
                        // leaf-valued goal argument can never unify with
                        // them anyway.
                    }
                    None => {}
                }
            }
            // A rule whose head is a variable matches anything.
            _ => self.unindexed.push(idx),
        }
    }

    /// The ordered candidate set for `goal`. `total` is the database size,
    /// used when the goal itself is a variable.
    pub fn candidates(
        &self,
        goal: TermId,
        env: &Env,
        terms: &TermStore,
        total: usize,
    ) -> Vec<usize> {
        let goal = env.resolve(goal, terms);
        match terms.get(goal) {
            Some(Term::Var(_)) => (0..total).collect(),
            Some(Term::Atom(name)) => {
                let mut out = self
                    .preds
                    .get(&PredKey { name, arity: 0 })
                    .map(|b| b.all.clone())
                    .unwrap_or_default();
                out.extend_from_slice(&self.unindexed);
                out
            }
            Some(Term::Compound(name, args)) => {
                let key = PredKey {
                    name,
                    arity: args.len() as u32,
                };
                let mut out = match self.preds.get(&key) {
                    None => Vec::new(),
                    Some(buckets) => {
                        let first = env.resolve(args[0], terms);
                        match terms.get(first).as_ref().and_then(leaf_hash) {
                            Some(h) => {
                                let mut v =
                                    buckets.by_value.get(&h).cloned().unwrap_or_default();
                                v.extend_from_slice(&buckets.var_first);
                                v
                            }
                            None => buckets.all.clone(),
                        }
                    }
                };
                out.extend_from_slice(&self.unindexed);
                out
            }
            _ => self.unindexed.clone(),
        }
    }
}

/// Value hash of a ground leaf term; None for variables and compounds.
/// `-0.0` hashes as `0.0` so the bucket choice agrees with unification.
fn leaf_hash(term: &Term) -> Option<u64> {
    let mut hasher = FxHasher::default();
    match term {
        Term::Atom(name) => {
            1u8.hash(&mut hasher);
            name.hash(&mut hasher);
        }
        Term::Int(i) => {
            2u8.hash(&mut hasher);
            i.hash(&mut hasher);
        }
        Term::Float(bits) => {
            let f = f64::from_bits(*bits);
            let canonical = if f == 0.0 { 0.0f64.to_bits() } else { *bits };
            3u8.hash(&mut hasher);
            canonical.hash(&mut hasher);
        }
        Term::Str(bytes) => {
            4u8.hash(&mut hasher);
            bytes.hash(&mut hasher);
        }
        Term::Var(_) | Term::Compound(_, _) => return None,
    }
    Some(hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolStore;

    fn setup() -> (SymbolStore, TermStore, ClauseIndex) {
        (SymbolStore::new(), TermStore::new(), ClauseIndex::new())
    }

    // ========== CLASSIFICATION ==========

    #[test]
    fn zero_arity_heads_bucket_by_name() {
        let (symbols, terms, mut index) = setup();
        let hello = terms.atom(symbols.intern("hello"));
        index.add(0, hello, &terms);
        let env = Env::new();
        assert_eq!(index.candidates(hello, &env, &terms, 1), vec![0]);
        let other = terms.atom(symbols.intern("other"));
        assert!(index.candidates(other, &env, &terms, 1).is_empty());
    }

    #[test]
    fn arity_distinguishes_buckets() {
        let (symbols, terms, mut index) = setup();
        let p = symbols.intern("p");
        let one = terms.compound1(p, terms.int(1));
        let two = terms.compound2(p, terms.int(1), terms.int(2));
        index.add(0, one, &terms);
        index.add(1, two, &terms);
        let env = Env::new();
        assert_eq!(index.candidates(one, &env, &terms, 2), vec![0]);
        assert_eq!(index.candidates(two, &env, &terms, 2), vec![1]);
    }

    #[test]
    fn ground_first_arg_narrows_candidates() {
        let (symbols, terms, mut index) = setup();
        let p = symbols.intern("p");
        let a = terms.atom(symbols.intern("a"));
        let b = terms.atom(symbols.intern("b"));
        index.add(0, terms.compound1(p, a), &terms);
        index.add(1, terms.compound1(p, b), &terms);
        index.add(2, terms.compound1(p, a), &terms);
        let env = Env::new();
        let goal = terms.compound1(p, a);
        assert_eq!(
            index.candidates(goal, &env, &terms, 3),
            vec![0, 2],
            "only clauses with matching first argument, in insertion order"
        );
    }

    #[test]
    fn var_first_arg_clauses_always_tried() {
        let (symbols, terms, mut index) = setup();
        let p = symbols.intern("p");
        let a = terms.atom(symbols.intern("a"));
        index.add(0, terms.compound1(p, a), &terms);
        index.add(1, terms.compound1(p, terms.var(terms.fresh_var())), &terms);
        let env = Env::new();
        // Hash matches first, then variable-first-arg clauses.
        let goal = terms.compound1(p, a);
        assert_eq!(index.candidates(goal, &env, &terms, 2), vec![0, 1]);
        // A mismatching ground argument still reaches the var clause.
        let b = terms.atom(symbols.intern("b"));
        let goal_b = terms.compound1(p, b);
        assert_eq!(index.candidates(goal_b, &env, &terms, 2), vec![1]);
    }

    #[test]
    fn unbound_goal_arg_gets_all_clauses() {
        let (symbols, terms, mut index) = setup();
        let p = symbols.intern("p");
        let a = terms.atom(symbols.intern("a"));
        index.add(0, terms.compound1(p, a), &terms);
        index.add(1, terms.compound1(p, terms.var(terms.fresh_var())), &terms);
        index.add(2, terms.compound1(p, terms.int(3)), &terms);
        let env = Env::new();
        let goal = terms.compound1(p, terms.var(terms.fresh_var()));
        assert_eq!(index.candidates(goal, &env, &terms, 3), vec![0, 1, 2]);
    }

    #[test]
    fn goal_arg_resolves_through_env() {
        let (symbols, terms, mut index) = setup();
        let p = symbols.intern("p");
        let a = terms.atom(symbols.intern("a"));
        let b = terms.atom(symbols.intern("b"));
        index.add(0, terms.compound1(p, a), &terms);
        index.add(1, terms.compound1(p, b), &terms);
        let v = terms.fresh_var();
        let mut env = Env::new();
        env.bind(v, b);
        let goal = terms.compound1(p, terms.var(v));
        assert_eq!(index.candidates(goal, &env, &terms, 2), vec![1]);
    }

    #[test]
    fn compound_first_arg_stays_in_fallback_order() {
        let (symbols, terms, mut index) = setup();
        let p = symbols.intern("p");
        let f = symbols.intern("f");
        let fx = terms.compound1(f, terms.int(1));
        index.add(0, terms.compound1(p, fx), &terms);
        index.add(1, terms.compound1(p, terms.atom(symbols.intern("a"))), &terms);
        let env = Env::new();
        // Unbound first argument: fallback order includes the compound clause.
        let goal = terms.compound1(p, terms.var(terms.fresh_var()));
        assert_eq!(index.candidates(goal, &env, &terms, 2), vec![0, 1]);
        // Leaf first argument cannot unify with a compound: it is skipped.
        let goal_a = terms.compound1(p, terms.atom(symbols.intern("a")));
        assert_eq!(index.candidates(goal_a, &env, &terms, 2), vec![1]);
    }

    #[test]
    fn var_head_clause_reaches_every_goal() {
        let (symbols, terms, mut index) = setup();
        let p = symbols.intern("p");
        index.add(0, terms.var(terms.fresh_var()), &terms);
        index.add(1, terms.compound1(p, terms.int(1)), &terms);
        let env = Env::new();
        let goal = terms.compound1(p, terms.int(1));
        assert_eq!(index.candidates(goal, &env, &terms, 2), vec![1, 0]);
        let unrelated = terms.atom(symbols.intern("q"));
        assert_eq!(index.candidates(unrelated, &env, &terms, 2), vec![0]);
    }

    #[test]
    fn variable_goal_enumerates_whole_database() {
        let (symbols, terms, mut index) = setup();
        let p = symbols.intern("p");
        index.add(0, terms.compound1(p, terms.int(1)), &terms);
        index.add(1, terms.atom(symbols.intern("q")), &terms);
        let env = Env::new();
        let goal = terms.var(terms.fresh_var());
        assert_eq!(index.candidates(goal, &env, &terms, 2), vec![0, 1]);
    }

    // ========== VALUE HASH POLICY ==========

    #[test]
    fn int_and_float_first_args_do_not_share_buckets() {
        let (symbols, terms, mut index) = setup();
        let p = symbols.intern("p");
        index.add(0, terms.compound1(p, terms.int(1)), &terms);
        index.add(1, terms.compound1(p, terms.float(1.0)), &terms);
        let env = Env::new();
        let int_goal = terms.compound1(p, terms.int(1));
        assert_eq!(index.candidates(int_goal, &env, &terms, 2), vec![0]);
    }

    #[test]
    fn negative_zero_first_arg_matches_zero_goal() {
        let (symbols, terms, mut index) = setup();
        let p = symbols.intern("p");
        index.add(0, terms.compound1(p, terms.float(-0.0)), &terms);
        let env = Env::new();
        let goal = terms.compound1(p, terms.float(0.0));
        assert_eq!(index.candidates(goal, &env, &terms, 1), vec![0]);
    }
}
