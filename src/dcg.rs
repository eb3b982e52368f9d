//! Grammar-rule expansion.
//!
//! A rule `Head --> Body.` is rewritten at ingestion into an ordinary clause
//! threading a pair of difference-list variables through every element, so
//! the result reaches the index as plain Prolog. `phrase/2,3` mirrors the
//! same rewrite for calls at run time.

use crate::db::Clause;
use crate::env::{collect_proper_list, Env};
use crate::error::Error;
use crate::symbol::Names;
use crate::term::{make_list, Term, TermId, TermStore};

/// Adjoin the two difference-list arguments to a non-terminal.
/// `p` becomes `p(S0, S1)`, `p(A)` becomes `p(A, S0, S1)`.
pub fn adjoin_args(
    goal: TermId,
    s0: TermId,
    s1: TermId,
    terms: &TermStore,
) -> Result<TermId, Error> {
    match terms.get(goal) {
        Some(Term::Atom(name)) => Ok(terms.compound2(name, s0, s1)),
        Some(Term::Compound(name, args)) => {
            let mut new_args = args.clone();
            new_args.push(s0);
            new_args.push(s1);
            Ok(terms.compound(name, new_args))
        }
        Some(Term::Var(_)) => Err(Error::Uninstantiated),
        _ => Err(Error::Type("callable expected in grammar rule".into())),
    }
}

/// Expand `head --> body` into a clause.
pub fn expand_rule(
    head: TermId,
    body: TermId,
    terms: &TermStore,
    ns: &Names,
) -> Result<Clause, Error> {
    let elements = crate::term::flatten_conjunction(body, terms, ns);
    let s0 = terms.var(terms.fresh_var());
    let mut current = s0;
    let mut goals = Vec::with_capacity(elements.len());
    let empty = Env::new();

    for element in elements {
        match terms.get(element) {
            // Terminal []: the element consumes nothing.
            Some(Term::Atom(name)) if name == ns.nil => {
                let next = terms.var(terms.fresh_var());
                goals.push(terms.compound2(ns.unify, current, next));
                current = next;
            }
            // Cut passes through untouched and consumes nothing.
            Some(Term::Atom(name)) if name == ns.cut => {
                goals.push(element);
            }
            // Terminal list [t1, ..., tk]: attach the rest as its tail.
            Some(Term::Compound(functor, args))
                if functor == ns.dot && args.len() == 2 =>
            {
                let items = collect_proper_list(element, &empty, terms, ns)
                    .ok_or_else(|| Error::Type("proper list expected in grammar body".into()))?;
                let next = terms.var(terms.fresh_var());
                let open = make_list(terms, ns, &items, next);
                goals.push(terms.compound2(ns.unify, current, open));
                current = next;
            }
            // Brace goal {G}: run G, consume nothing.
            Some(Term::Compound(functor, args))
                if functor == ns.braces && args.len() == 1 =>
            {
                goals.push(args[0]);
                let next = terms.var(terms.fresh_var());
                goals.push(terms.compound2(ns.unify, current, next));
                current = next;
            }
            // Non-terminal.
            Some(Term::Atom(_)) | Some(Term::Compound(_, _)) => {
                let next = terms.var(terms.fresh_var());
                goals.push(adjoin_args(element, current, next, terms)?);
                current = next;
            }
            Some(Term::Var(_)) => {
                return Err(Error::Type("unbound grammar-body element".into()))
            }
            _ => return Err(Error::Type("malformed grammar-body element".into())),
        }
    }

    let expanded_head = adjoin_args(head, s0, current, terms)?;
    Ok(Clause {
        head: expanded_head,
        body: goals,
    })
}
