//! Public engine API: a session owning the stores, the clause database,
//! and the output sink.
//!
//! The Engine manages:
//! - Symbol interning and the dispatch vocabulary
//! - The hashconsing term arena
//! - The clause database and first-argument index
//! - Query execution through the solver

use std::fmt;
use std::io;

use smallvec::SmallVec;

use crate::db::{Clause, Database};
use crate::env::{copy_resolved, Env};
use crate::error::Error;
use crate::metrics::SolveMetrics;
use crate::parser::{ReadError, Reader};
use crate::solve::{solve, Handled, Handler, SolveCtx, TOP_SCOPE};
use crate::symbol::{Names, SymbolStore};
use crate::term::{Term, TermId, TermStore};
use crate::write;
use crate::{dcg, term};

/// Default ceiling on activation depth, a crude guard against
/// non-terminating programs.
pub const DEFAULT_MAX_DEPTH: u32 = 600;

/// Failure while loading program text: either the reader rejected the
/// syntax or the engine rejected the term.
#[derive(Debug)]
pub enum LoadError {
    Read(ReadError),
    Engine(Error),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Read(e) => write!(f, "syntax error: {}", e),
            LoadError::Engine(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<ReadError> for LoadError {
    fn from(e: ReadError) -> Self {
        LoadError::Read(e)
    }
}

impl From<Error> for LoadError {
    fn from(e: Error) -> Self {
        LoadError::Engine(e)
    }
}

/// A logic session: arena, database, and output sink, live until dropped.
pub struct Engine {
    symbols: SymbolStore,
    ns: Names,
    terms: TermStore,
    db: Database,
    metrics: SolveMetrics,
    max_depth: u32,
    out: Box<dyn io::Write>,
}

impl Engine {
    /// Create a session writing to stdout.
    pub fn new() -> Self {
        let symbols = SymbolStore::new();
        let ns = Names::intern_in(&symbols);
        Self {
            symbols,
            ns,
            terms: TermStore::new(),
            db: Database::new(),
            metrics: SolveMetrics::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            out: Box::new(io::stdout()),
        }
    }

    /// Replace the output sink (tests pass a buffer).
    pub fn with_output(mut self, out: Box<dyn io::Write>) -> Self {
        self.out = out;
        self
    }

    /// Set the solver depth ceiling.
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn symbols(&self) -> &SymbolStore {
        &self.symbols
    }

    pub fn names(&self) -> &Names {
        &self.ns
    }

    pub fn terms(&self) -> &TermStore {
        &self.terms
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn metrics(&self) -> &SolveMetrics {
        &self.metrics
    }

    // ----- term builders -----

    pub fn atom(&self, name: &str) -> TermId {
        self.terms.atom(self.symbols.intern(name))
    }

    pub fn int(&self, value: i64) -> TermId {
        self.terms.int(value)
    }

    pub fn float(&self, value: f64) -> TermId {
        self.terms.float(value)
    }

    pub fn string(&self, bytes: &[u8]) -> TermId {
        self.terms.string(bytes)
    }

    /// A fresh variable carrying `name` for display.
    pub fn var(&self, name: &str) -> TermId {
        self.terms.var(self.terms.named_var(self.symbols.intern(name)))
    }

    pub fn compound(&self, functor: &str, args: &[TermId]) -> TermId {
        let args: SmallVec<[TermId; 4]> = args.iter().copied().collect();
        self.terms.compound(self.symbols.intern(functor), args)
    }

    /// A proper list of `items`.
    pub fn list(&self, items: &[TermId]) -> TermId {
        term::make_list(&self.terms, &self.ns, items, term::nil(&self.terms, &self.ns))
    }

    // ----- database -----

    /// Append a pre-built clause to the database and index.
    pub fn add_clause(&mut self, clause: Clause) {
        self.db.add(clause, &self.terms);
    }

    /// Ingest one program term: `Head :- Body`, `Head --> Body`, or a fact.
    pub fn assert_term(&mut self, t: TermId) -> Result<(), Error> {
        match self.terms.get(t) {
            Some(Term::Compound(functor, args))
                if functor == self.ns.neck && args.len() == 2 =>
            {
                let body = term::flatten_conjunction(args[1], &self.terms, &self.ns);
                self.check_head(args[0])?;
                self.add_clause(Clause {
                    head: args[0],
                    body,
                });
                Ok(())
            }
            Some(Term::Compound(functor, args))
                if functor == self.ns.dcg && args.len() == 2 =>
            {
                let clause = dcg::expand_rule(args[0], args[1], &self.terms, &self.ns)?;
                self.add_clause(clause);
                Ok(())
            }
            Some(Term::Atom(_)) | Some(Term::Compound(_, _)) | Some(Term::Var(_)) => {
                self.add_clause(Clause::fact(t));
                Ok(())
            }
            _ => Err(Error::Type("callable expected as clause".into())),
        }
    }

    fn check_head(&self, head: TermId) -> Result<(), Error> {
        match self.terms.get(head) {
            Some(Term::Atom(_)) | Some(Term::Compound(_, _)) | Some(Term::Var(_)) => Ok(()),
            _ => Err(Error::Type("callable expected as clause head".into())),
        }
    }

    /// Load a program text: every term is asserted. Returns the number of
    /// clauses added.
    pub fn consult_str(&mut self, src: &str) -> Result<usize, LoadError> {
        let mut count = 0;
        let mut reader = Reader::new(src, &self.terms, &self.symbols, &self.ns);
        loop {
            let term = match reader.next_term() {
                Ok(Some(t)) => t,
                Ok(None) => break,
                Err(e) => return Err(e.into()),
            };
            match self.terms.get(term) {
                Some(Term::Compound(functor, args))
                    if functor == self.ns.neck && args.len() == 2 =>
                {
                    let body = term::flatten_conjunction(args[1], &self.terms, &self.ns);
                    self.check_head(args[0])?;
                    self.db.add(
                        Clause {
                            head: args[0],
                            body,
                        },
                        &self.terms,
                    );
                }
                Some(Term::Compound(functor, args))
                    if functor == self.ns.dcg && args.len() == 2 =>
                {
                    let clause = dcg::expand_rule(args[0], args[1], &self.terms, &self.ns)?;
                    self.db.add(clause, &self.terms);
                }
                Some(Term::Atom(_)) | Some(Term::Compound(_, _)) | Some(Term::Var(_)) => {
                    self.db.add(Clause::fact(term), &self.terms);
                }
                _ => return Err(Error::Type("callable expected as clause".into()).into()),
            }
            count += 1;
        }
        Ok(count)
    }

    // ----- solving -----

    /// Prove `goals` against `env`, calling `handler` per refutation.
    /// Logic failure is not an error; only structural faults return `Err`.
    pub fn solve(
        &mut self,
        goals: &[TermId],
        env: &mut Env,
        handler: &mut dyn Handler,
    ) -> Result<(), Error> {
        let mut ctx = SolveCtx::new(
            &self.terms,
            &self.symbols,
            &self.ns,
            &self.db,
            &mut *self.out,
            &self.metrics,
            self.max_depth,
        );
        // A cut reaching the top commits the query; a halt means the
        // handler stopped enumeration. Neither is an error.
        solve(&mut ctx, goals, env, 0, TOP_SCOPE, handler).map(|_| ())
    }

    /// Resolve a term through `env` (handlers use this to read bindings).
    pub fn resolve(&self, t: TermId, env: &Env) -> TermId {
        env.resolve(t, &self.terms)
    }

    /// Deep copy of `t` with bindings substituted, so the value survives
    /// environment reuse.
    pub fn copy_resolved(&self, t: TermId, env: &Env) -> TermId {
        copy_resolved(t, env, &self.terms)
    }

    /// Render a term for display.
    pub fn render(&self, t: TermId, env: &Env) -> String {
        write::term_to_string(t, env, &self.terms, &self.symbols, &self.ns)
    }

    /// Parse one query text and collect every solution as rendered
    /// `(variable, value)` rows. Variables whose name contains `_` are
    /// filtered, per the host convention.
    pub fn run_query(&mut self, src: &str) -> Result<Vec<Vec<(String, String)>>, LoadError> {
        let (goals, vars) = self.read_query(src)?;

        struct Collect {
            vars: Vec<(String, TermId)>,
            rows: Vec<Vec<(String, String)>>,
        }
        impl Handler for Collect {
            fn solution(&mut self, env: &Env, ctx: &mut SolveCtx<'_>) -> Result<Handled, Error> {
                let row = self
                    .vars
                    .iter()
                    .map(|(name, var)| (name.clone(), ctx.render(*var, env)))
                    .collect();
                self.rows.push(row);
                Ok(Handled::Continue)
            }
        }

        let mut collect = Collect {
            vars,
            rows: Vec::new(),
        };
        let mut env = Env::new();
        self.solve(&goals, &mut env, &mut collect)?;
        Ok(collect.rows)
    }

    /// Parse one query, returning its goal list and the named variables to
    /// report (first-occurrence order, host filter applied).
    pub fn read_query(
        &mut self,
        src: &str,
    ) -> Result<(Vec<TermId>, Vec<(String, TermId)>), LoadError> {
        let mut reader = Reader::new(src, &self.terms, &self.symbols, &self.ns);
        let term = reader
            .next_term()?
            .ok_or(LoadError::Read(ReadError::UnexpectedEof))?;
        let goals = term::flatten_conjunction(term, &self.terms, &self.ns);
        let vars = reader
            .take_var_bindings()
            .into_iter()
            .filter(|(name, _)| !name.contains('_'))
            .collect();
        Ok((goals, vars))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_engine() -> Engine {
        Engine::new().with_output(Box::new(Vec::new()))
    }

    // ========== BUILDERS ==========

    #[test]
    fn builders_construct_expected_shapes() {
        let e = quiet_engine();
        let a = e.atom("foo");
        assert!(matches!(e.terms().get(a), Some(Term::Atom(_))));
        let c = e.compound("f", &[e.int(1), e.float(2.0)]);
        assert_eq!(e.terms().functor_arity(c).unwrap().1, 2);
        let l = e.list(&[e.int(1)]);
        assert_eq!(e.render(l, &Env::new()), "[1]");
    }

    #[test]
    fn var_builder_names_the_variable() {
        let e = quiet_engine();
        let x = e.var("X");
        assert_eq!(e.render(x, &Env::new()), "X");
    }

    // ========== ASSERT ==========

    #[test]
    fn assert_fact_and_rule() {
        let mut e = quiet_engine();
        let fact = e.compound("p", &[e.int(1)]);
        e.assert_term(fact).unwrap();
        let x = e.var("Qx");
        let head = e.compound("q", &[x]);
        let body = e.compound("p", &[x]);
        let neck = e.compound(":-", &[head, body]);
        e.assert_term(neck).unwrap();
        assert_eq!(e.db().len(), 2);
    }

    #[test]
    fn assert_dcg_expands_before_indexing() {
        let mut e = quiet_engine();
        let rule = e.compound("-->", &[e.atom("greeting"), e.list(&[e.atom("hi")])]);
        e.assert_term(rule).unwrap();
        assert_eq!(e.db().len(), 1);
        // The stored head is greeting/2, not greeting/0.
        let stored = e.db().get(0).head;
        assert_eq!(e.terms().functor_arity(stored).unwrap().1, 2);
    }

    #[test]
    fn assert_rejects_non_callable() {
        let mut e = quiet_engine();
        let n = e.int(3);
        assert!(matches!(e.assert_term(n), Err(Error::Type(_))));
    }

    // ========== CONSULT / QUERY ==========

    #[test]
    fn consult_counts_clauses() {
        let mut e = quiet_engine();
        let n = e
            .consult_str("p(1). p(2).\nq(X) :- p(X).\n")
            .expect("program should load");
        assert_eq!(n, 3);
        assert_eq!(e.db().len(), 3);
    }

    #[test]
    fn consult_reports_syntax_errors() {
        let mut e = quiet_engine();
        assert!(matches!(e.consult_str("p(1"), Err(LoadError::Read(_))));
    }

    #[test]
    fn run_query_collects_bindings() {
        let mut e = quiet_engine();
        e.consult_str("p(1). p(2).").unwrap();
        let rows = e.run_query("p(X).").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![("X".to_string(), "1".to_string())]);
        assert_eq!(rows[1], vec![("X".to_string(), "2".to_string())]);
    }

    #[test]
    fn run_query_filters_underscored_names() {
        let mut e = quiet_engine();
        e.consult_str("pair(1, 2).").unwrap();
        let rows = e.run_query("pair(X, _Y).").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 1, "_Y is host-filtered");
        assert_eq!(rows[0][0].0, "X");
    }

    #[test]
    fn run_query_ground_success_has_empty_row() {
        let mut e = quiet_engine();
        e.consult_str("fact.").unwrap();
        let rows = e.run_query("fact.").unwrap();
        assert_eq!(rows, vec![Vec::new()]);
        let none = e.run_query("missing.").unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn structural_errors_surface_from_queries() {
        let mut e = quiet_engine();
        assert!(matches!(
            e.run_query("X is Y + 1."),
            Err(LoadError::Engine(Error::Uninstantiated))
        ));
    }

    #[test]
    fn copy_resolved_survives_env_reuse() {
        let mut e = quiet_engine();
        e.consult_str("val(7).").unwrap();
        let x = e.var("V");
        let goal = e.compound("val", &[x]);

        struct Grab {
            var: TermId,
            copied: Option<TermId>,
        }
        impl Handler for Grab {
            fn solution(&mut self, env: &Env, ctx: &mut SolveCtx<'_>) -> Result<Handled, Error> {
                self.copied = Some(crate::env::copy_resolved(self.var, env, ctx.terms));
                Ok(Handled::Stop)
            }
        }
        let mut grab = Grab {
            var: x,
            copied: None,
        };
        let mut env = Env::new();
        e.solve(&[goal], &mut env, &mut grab).unwrap();
        let copied = grab.copied.expect("one solution");
        assert_eq!(e.render(copied, &Env::new()), "7");
    }
}
