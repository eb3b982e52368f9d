use crate::env::Env;
use crate::term::{Term, TermId, TermStore};
use smallvec::SmallVec;

#[cfg(feature = "tracing")]
use crate::trace::trace;

/// Unify two terms against `env`, binding variables on success.
///
/// Uses an explicit worklist to avoid recursion. There is no occurs-check:
/// `X = f(X)` succeeds and ties a cycle, matching standard Prolog practice.
///
/// On failure, bindings made before the mismatch remain in `env`; callers
/// needing atomic failure clone the environment first.
pub fn unify(t1: TermId, t2: TermId, env: &mut Env, terms: &TermStore) -> bool {
    let mut worklist: SmallVec<[(TermId, TermId); 32]> = SmallVec::new();
    worklist.push((t1, t2));

    while let Some((a, b)) = worklist.pop() {
        let a = env.resolve(a, terms);
        let b = env.resolve(b, terms);

        if a == b {
            // Hashconsing makes this the ground fast path: structurally
            // equal terms share an id.
            continue;
        }

        match (terms.get(a), terms.get(b)) {
            (Some(Term::Var(v)), _) => {
                env.bind(v, b);
            }
            (_, Some(Term::Var(v))) => {
                env.bind(v, a);
            }
            (Some(Term::Atom(n1)), Some(Term::Atom(n2))) => {
                if n1 != n2 {
                    return false;
                }
            }
            (Some(Term::Int(i1)), Some(Term::Int(i2))) => {
                if i1 != i2 {
                    return false;
                }
            }
            (Some(Term::Float(b1)), Some(Term::Float(b2))) => {
                // IEEE equality: NaN never unifies, -0.0 unifies with 0.0.
                if f64::from_bits(b1) != f64::from_bits(b2) {
                    return false;
                }
            }
            (Some(Term::Str(s1)), Some(Term::Str(s2))) => {
                if s1 != s2 {
                    return false;
                }
            }
            (Some(Term::Compound(f1, args1)), Some(Term::Compound(f2, args2))) => {
                if f1 != f2 || args1.len() != args2.len() {
                    #[cfg(feature = "tracing")]
                    trace!("unify_functor_mismatch");
                    return false;
                }
                for (c1, c2) in args1.iter().zip(args2.iter()) {
                    worklist.push((*c1, *c2));
                }
            }
            _ => {
                // Mixed leaf kinds (Int vs Float, Atom vs Str, ...) or an
                // invalid id.
                return false;
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{Names, SymbolStore};

    fn setup() -> (SymbolStore, TermStore) {
        (SymbolStore::new(), TermStore::new())
    }

    // ========== LEAVES ==========

    #[test]
    fn same_atom_unifies() {
        let (symbols, terms) = setup();
        let a = terms.atom(symbols.intern("john"));
        let mut env = Env::new();
        assert!(unify(a, a, &mut env, &terms));
        assert!(env.is_empty());
    }

    #[test]
    fn different_atoms_fail() {
        let (symbols, terms) = setup();
        let a = terms.atom(symbols.intern("john"));
        let b = terms.atom(symbols.intern("jane"));
        let mut env = Env::new();
        assert!(!unify(a, b, &mut env, &terms));
    }

    #[test]
    fn equal_ints_unify() {
        let (_, terms) = setup();
        let mut env = Env::new();
        assert!(unify(terms.int(42), terms.int(42), &mut env, &terms));
        assert!(!unify(terms.int(42), terms.int(43), &mut env, &terms));
    }

    #[test]
    fn int_does_not_unify_with_float() {
        let (_, terms) = setup();
        let mut env = Env::new();
        assert!(
            !unify(terms.int(1), terms.float(1.0), &mut env, &terms),
            "numeric tower kinds are distinct under unification"
        );
    }

    #[test]
    fn identical_nan_reference_unifies_distinct_payloads_fail() {
        let (_, terms) = setup();
        let mut env = Env::new();
        // Hashconsing makes equal-bits NaN the same reference, and the
        // same-reference rule precedes the float comparison.
        let nan = terms.float(f64::NAN);
        assert!(unify(nan, nan, &mut env, &terms));
        // A NaN with a different payload is a different reference and the
        // IEEE comparison rejects it.
        let other = terms.float(f64::from_bits(f64::NAN.to_bits() ^ 1));
        assert_ne!(nan, other);
        assert!(!unify(nan, other, &mut env, &terms));
    }

    #[test]
    fn negative_zero_unifies_with_zero() {
        let (_, terms) = setup();
        let mut env = Env::new();
        assert!(unify(terms.float(0.0), terms.float(-0.0), &mut env, &terms));
    }

    #[test]
    fn strings_unify_on_equal_bytes() {
        let (_, terms) = setup();
        let mut env = Env::new();
        assert!(unify(terms.string(b"ab"), terms.string(b"ab"), &mut env, &terms));
        assert!(!unify(terms.string(b"ab"), terms.string(b"ac"), &mut env, &terms));
    }

    #[test]
    fn atom_does_not_unify_with_string() {
        let (symbols, terms) = setup();
        let mut env = Env::new();
        let a = terms.atom(symbols.intern("ab"));
        assert!(!unify(a, terms.string(b"ab"), &mut env, &terms));
    }

    // ========== VARIABLES ==========

    #[test]
    fn var_binds_to_ground() {
        let (symbols, terms) = setup();
        let v = terms.fresh_var();
        let a = terms.atom(symbols.intern("zero"));
        let mut env = Env::new();
        assert!(unify(terms.var(v), a, &mut env, &terms));
        assert_eq!(env.lookup(v), Some(a));
    }

    #[test]
    fn ground_binds_var_symmetrically() {
        let (symbols, terms) = setup();
        let v = terms.fresh_var();
        let a = terms.atom(symbols.intern("zero"));
        let mut env = Env::new();
        assert!(unify(a, terms.var(v), &mut env, &terms));
        assert_eq!(env.lookup(v), Some(a));
    }

    #[test]
    fn var_var_records_alias() {
        let (_, terms) = setup();
        let v1 = terms.fresh_var();
        let v2 = terms.fresh_var();
        let mut env = Env::new();
        assert!(unify(terms.var(v1), terms.var(v2), &mut env, &terms));
        assert_eq!(env.len(), 1);
        // Later binding of one must be visible through the other.
        let five = terms.int(5);
        assert!(unify(terms.var(v1), five, &mut env, &terms));
        assert_eq!(env.resolve(terms.var(v2), &terms), five);
    }

    #[test]
    fn bound_var_resolves_before_compare() {
        let (symbols, terms) = setup();
        let v = terms.fresh_var();
        let a = terms.atom(symbols.intern("a"));
        let mut env = Env::new();
        env.bind(v, a);
        assert!(unify(terms.var(v), a, &mut env, &terms));
        let b = terms.atom(symbols.intern("b"));
        assert!(!unify(terms.var(v), b, &mut env, &terms));
    }

    #[test]
    fn no_occurs_check_ties_cycle() {
        let (symbols, terms) = setup();
        let f = symbols.intern("f");
        let v = terms.fresh_var();
        let f_v = terms.compound1(f, terms.var(v));
        let mut env = Env::new();
        // X = f(X) succeeds; the bound structure is cyclic through env.
        assert!(unify(terms.var(v), f_v, &mut env, &terms));
        assert_eq!(env.lookup(v), Some(f_v));
    }

    // ========== COMPOUNDS ==========

    #[test]
    fn compound_args_unify_pairwise() {
        let (symbols, terms) = setup();
        let f = symbols.intern("f");
        let v1 = terms.fresh_var();
        let v2 = terms.fresh_var();
        let lhs = terms.compound2(f, terms.var(v1), terms.int(2));
        let rhs = terms.compound2(f, terms.int(1), terms.var(v2));
        let mut env = Env::new();
        assert!(unify(lhs, rhs, &mut env, &terms));
        assert_eq!(env.lookup(v1), Some(terms.int(1)));
        assert_eq!(env.lookup(v2), Some(terms.int(2)));
    }

    #[test]
    fn functor_mismatch_fails() {
        let (symbols, terms) = setup();
        let f = symbols.intern("f");
        let g = symbols.intern("g");
        let a = terms.int(1);
        let mut env = Env::new();
        assert!(!unify(terms.compound1(f, a), terms.compound1(g, a), &mut env, &terms));
    }

    #[test]
    fn arity_mismatch_fails() {
        let (symbols, terms) = setup();
        let f = symbols.intern("f");
        let a = terms.int(1);
        let one = terms.compound1(f, a);
        let two = terms.compound2(f, a, a);
        let mut env = Env::new();
        assert!(!unify(one, two, &mut env, &terms));
    }

    #[test]
    fn shared_var_conflict_fails() {
        let (symbols, terms) = setup();
        let f = symbols.intern("f");
        let v = terms.fresh_var();
        let lhs = terms.compound2(f, terms.var(v), terms.var(v));
        let rhs = terms.compound2(f, terms.int(1), terms.int(2));
        let mut env = Env::new();
        assert!(
            !unify(lhs, rhs, &mut env, &terms),
            "X cannot be both 1 and 2"
        );
    }

    #[test]
    fn atom_does_not_unify_with_compound() {
        let (symbols, terms) = setup();
        let f = symbols.intern("f");
        let atom = terms.atom(f);
        let comp = terms.compound1(f, terms.int(1));
        let mut env = Env::new();
        assert!(!unify(atom, comp, &mut env, &terms));
    }

    #[test]
    fn failure_may_leave_partial_bindings() {
        let (symbols, terms) = setup();
        let f = symbols.intern("f");
        let v = terms.fresh_var();
        let lhs = terms.compound2(f, terms.var(v), terms.int(1));
        let rhs = terms.compound2(f, terms.int(9), terms.int(2));
        let mut env = Env::new();
        assert!(!unify(lhs, rhs, &mut env, &terms));
        // The v binding may survive the failed attempt; callers that need
        // rollback clone the environment first.
    }

    #[test]
    fn deep_list_unification() {
        let (symbols, terms) = setup();
        let ns = Names::intern_in(&symbols);
        let v = terms.fresh_var();
        let open = crate::term::make_list(&terms, &ns, &[terms.int(1), terms.int(2)], terms.var(v));
        let closed = crate::term::make_list(
            &terms,
            &ns,
            &[terms.int(1), terms.int(2), terms.int(3)],
            crate::term::nil(&terms, &ns),
        );
        let mut env = Env::new();
        assert!(unify(open, closed, &mut env, &terms));
        let tail = env.resolve(terms.var(v), &terms);
        let expected =
            crate::term::make_list(&terms, &ns, &[terms.int(3)], crate::term::nil(&terms, &ns));
        assert_eq!(tail, expected);
    }
}
