//! SLD resolution with backtracking and cut.
//!
//! The solver proves a goal list left to right against the clause database.
//! Control constructs (`!`, `;`, `->`, `\+`, `repeat`) and the built-in
//! relations are dispatched structurally; everything else goes through
//! clause resolution: ask the index for candidates, freshen each clause,
//! unify, and descend into its body with a `$end_scope/2` marker so the
//! cut knows which activation to prune.
//!
//! Cut travels as a tagged return (`Flow::Cut`) carrying the scope it aims
//! at; the activation frame owning that scope consumes it. `Flow::Halt` is
//! the internal stop sentinel raised by handlers (probes, `distinct`, host
//! cancellation) and never escapes the engine boundary.

use crate::arith::{self, CmpOp};
use crate::db::{rename_clause, Database};
use crate::env::{value_hash, Env};
use crate::error::Error;
use crate::metrics::SolveMetrics;
use crate::symbol::{NameId, Names, SymbolStore};
use crate::term::{Term, TermId, TermStore};
use crate::unify::unify;
use crate::write;
use hashbrown::HashSet;
use std::io;

#[cfg(feature = "tracing")]
use crate::trace::{debug_span, trace};

/// Identifier of a predicate activation, the target of a cut.
pub type ScopeId = u64;

/// The scope of the query itself; a cut reaching it commits the whole query.
pub const TOP_SCOPE: ScopeId = 0;

/// How a solve frame finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// The frame exhausted its alternatives (this is not failure as an
    /// error; solutions were delivered through the handler).
    Normal,
    /// A cut aimed at `ScopeId` is unwinding.
    Cut(ScopeId),
    /// A handler asked to stop the whole search.
    Halt,
}

/// Handler verdict after receiving a solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Continue,
    Stop,
}

/// Receives one callback per refutation with a read-only environment view.
pub trait Handler {
    fn solution(&mut self, env: &Env, ctx: &mut SolveCtx<'_>) -> Result<Handled, Error>;
}

/// Everything a solve frame needs: the session stores, the output sink,
/// metrics, limits, and the scope counter.
pub struct SolveCtx<'a> {
    pub terms: &'a TermStore,
    pub symbols: &'a SymbolStore,
    pub ns: &'a Names,
    pub db: &'a Database,
    pub out: &'a mut dyn io::Write,
    pub metrics: &'a SolveMetrics,
    pub max_depth: u32,
    next_scope: ScopeId,
}

impl<'a> SolveCtx<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        terms: &'a TermStore,
        symbols: &'a SymbolStore,
        ns: &'a Names,
        db: &'a Database,
        out: &'a mut dyn io::Write,
        metrics: &'a SolveMetrics,
        max_depth: u32,
    ) -> Self {
        Self {
            terms,
            symbols,
            ns,
            db,
            out,
            metrics,
            max_depth,
            next_scope: TOP_SCOPE,
        }
    }

    fn fresh_scope(&mut self) -> ScopeId {
        self.next_scope += 1;
        self.next_scope
    }

    /// Render a term for a handler (resolved in `env`).
    pub fn render(&self, t: TermId, env: &Env) -> String {
        write::term_to_string(t, env, self.terms, self.symbols, self.ns)
    }
}

/// Prove `goals` left to right, invoking `handler` at each refutation.
///
/// The frame owns a goal vector and steps a cursor over it; pure rewrites
/// (`true`, `nl`, `,`-splicing, `$end_scope`, `phrase`, `is`, comparisons,
/// `=`) advance in place, while branching constructs recurse.
pub fn solve(
    ctx: &mut SolveCtx<'_>,
    goals: &[TermId],
    env: &mut Env,
    depth: u32,
    scope: ScopeId,
    handler: &mut dyn Handler,
) -> Result<Flow, Error> {
    #[cfg(feature = "tracing")]
    let _span = debug_span!("solve", depth, scope, goals = goals.len()).entered();

    if depth > ctx.max_depth {
        return Err(Error::DepthExceeded);
    }
    ctx.metrics.record_depth(depth as u64);

    let mut goals: Vec<TermId> = goals.to_vec();
    let mut pos = 0usize;
    let mut scope = scope;

    loop {
        if pos >= goals.len() {
            ctx.metrics.record_solution();
            return Ok(match handler.solution(env, ctx)? {
                Handled::Continue => Flow::Normal,
                Handled::Stop => Flow::Halt,
            });
        }

        let goal = env.resolve(goals[pos], ctx.terms);
        let rest_at = pos + 1;

        match ctx.terms.get(goal) {
            Some(Term::Atom(name)) => {
                if name == ctx.ns.truth {
                    pos += 1;
                    continue;
                }
                if name == ctx.ns.fail || name == ctx.ns.falsity {
                    return Ok(Flow::Normal);
                }
                if name == ctx.ns.nl {
                    ctx.out.write_all(b"\n")?;
                    pos += 1;
                    continue;
                }
                if name == ctx.ns.cut {
                    // Prove the rest first; a Normal completion turns into
                    // a cut aimed at this frame's scope.
                    let flow = solve(ctx, &goals[rest_at..], env, depth, scope, handler)?;
                    return Ok(match flow {
                        Flow::Normal => {
                            ctx.metrics.record_cut();
                            Flow::Cut(scope)
                        }
                        other => other,
                    });
                }
                if name == ctx.ns.repeat {
                    // Infinite choice point: only a cut (or a handler stop,
                    // or a structural error) gets out.
                    loop {
                        let mut branch = env.clone();
                        match solve(ctx, &goals[rest_at..], &mut branch, depth, scope, handler)? {
                            Flow::Normal => continue,
                            other => return Ok(other),
                        }
                    }
                }
                return resolve_clauses(ctx, goal, &goals[rest_at..], env, depth, scope, handler);
            }

            // A variable goal enumerates the whole database.
            Some(Term::Var(_)) => {
                return resolve_clauses(ctx, goal, &goals[rest_at..], env, depth, scope, handler);
            }

            Some(Term::Compound(functor, args)) => {
                let arity = args.len();

                if functor == ctx.ns.comma && arity == 2 {
                    goals.splice(pos..rest_at, [args[0], args[1]]);
                    continue;
                }

                if functor == ctx.ns.end_scope && arity == 2 {
                    scope = scope_of(ctx, args[1])?;
                    pos += 1;
                    continue;
                }

                if functor == ctx.ns.is && arity == 2 {
                    let value =
                        arith::eval(args[1], env, ctx.terms, ctx.symbols, ctx.ns)?.to_term(ctx.terms);
                    if unify(args[0], value, env, ctx.terms) {
                        pos += 1;
                        continue;
                    }
                    return Ok(Flow::Normal);
                }

                if arity == 2 {
                    if let Some(op) = cmp_op(functor, ctx.ns) {
                        let a = arith::eval(args[0], env, ctx.terms, ctx.symbols, ctx.ns)?;
                        let b = arith::eval(args[1], env, ctx.terms, ctx.symbols, ctx.ns)?;
                        if arith::compare(op, a, b) {
                            pos += 1;
                            continue;
                        }
                        return Ok(Flow::Normal);
                    }
                }

                if functor == ctx.ns.unify && arity == 2 {
                    if unify(args[0], args[1], env, ctx.terms) {
                        pos += 1;
                        continue;
                    }
                    return Ok(Flow::Normal);
                }

                if functor == ctx.ns.not_unify && arity == 2 {
                    // Try on a clone; the caller's bindings must not move.
                    let mut scratch = env.clone();
                    if unify(args[0], args[1], &mut scratch, ctx.terms) {
                        return Ok(Flow::Normal);
                    }
                    pos += 1;
                    continue;
                }

                if functor == ctx.ns.if_then && arity == 2 {
                    // Bare if-then: commit to the condition's first solution.
                    match probe(ctx, args[0], env, depth)? {
                        Some(committed) => {
                            *env = committed;
                            goals[pos] = args[1];
                            continue;
                        }
                        None => return Ok(Flow::Normal),
                    }
                }

                if functor == ctx.ns.semicolon && arity == 2 {
                    if let Some((cond, then)) = as_if_then(ctx, env, args[0]) {
                        // If-then-else special form.
                        match probe(ctx, cond, env, depth)? {
                            Some(committed) => {
                                *env = committed;
                                goals[pos] = then;
                            }
                            None => goals[pos] = args[1],
                        }
                        continue;
                    }
                    let rest = goals[rest_at..].to_vec();
                    return solve_disjunction(
                        ctx, args[0], args[1], &rest, env, depth, scope, handler,
                    );
                }

                if (functor == ctx.ns.naf || functor == ctx.ns.not) && arity == 1 {
                    if probe(ctx, args[0], env, depth)?.is_some() {
                        return Ok(Flow::Normal);
                    }
                    pos += 1;
                    continue;
                }

                if functor == ctx.ns.phrase && (arity == 2 || arity == 3) {
                    let rest_list = if arity == 3 {
                        args[2]
                    } else {
                        crate::term::nil(ctx.terms, ctx.ns)
                    };
                    let body = env.resolve(args[0], ctx.terms);
                    goals[pos] = crate::dcg::adjoin_args(body, args[1], rest_list, ctx.terms)?;
                    continue;
                }

                if functor == ctx.ns.distinct && arity == 2 {
                    let rest = goals[rest_at..].to_vec();
                    return solve_distinct(
                        ctx, args[0], args[1], &rest, env, depth, scope, handler,
                    );
                }

                if functor == ctx.ns.format && (arity == 1 || arity == 2) {
                    let control = write::control_bytes(args[0], env, ctx.terms, ctx.symbols)?;
                    let format_args = if arity == 2 {
                        write::format_args(args[1], env, ctx.terms, ctx.ns)?
                    } else {
                        Vec::new()
                    };
                    write::format_directives(
                        ctx.out,
                        &control,
                        &format_args,
                        env,
                        ctx.terms,
                        ctx.symbols,
                        ctx.ns,
                    )?;
                    pos += 1;
                    continue;
                }

                if functor == ctx.ns.write && arity == 1 {
                    write::write_term(ctx.out, args[0], env, ctx.terms, ctx.symbols, ctx.ns)?;
                    pos += 1;
                    continue;
                }

                return resolve_clauses(ctx, goal, &goals[rest_at..], env, depth, scope, handler);
            }

            _ => return Err(Error::Type("callable expected".into())),
        }
    }
}

fn scope_of(ctx: &SolveCtx<'_>, t: TermId) -> Result<ScopeId, Error> {
    match ctx.terms.get(t) {
        Some(Term::Int(i)) => Ok(i as ScopeId),
        _ => Err(Error::Type("corrupt scope marker".into())),
    }
}

fn cmp_op(functor: NameId, ns: &Names) -> Option<CmpOp> {
    if functor == ns.lt {
        Some(CmpOp::Lt)
    } else if functor == ns.gt {
        Some(CmpOp::Gt)
    } else if functor == ns.le {
        Some(CmpOp::Le)
    } else if functor == ns.ge {
        Some(CmpOp::Ge)
    } else if functor == ns.arith_eq {
        Some(CmpOp::Eq)
    } else if functor == ns.arith_ne {
        Some(CmpOp::Ne)
    } else {
        None
    }
}

/// `->(Cond, Then)` under a resolved disjunction head, if that is its shape.
fn as_if_then(ctx: &SolveCtx<'_>, env: &Env, t: TermId) -> Option<(TermId, TermId)> {
    let t = env.resolve(t, ctx.terms);
    match ctx.terms.get(t) {
        Some(Term::Compound(functor, args))
            if functor == ctx.ns.if_then && args.len() == 2 =>
        {
            Some((args[0], args[1]))
        }
        _ => None,
    }
}

/// One-shot sub-search. Returns the probe environment (caller bindings plus
/// whatever the first solution bound) on success, None when the goal has no
/// solution. Never yields more than one solution.
fn probe(
    ctx: &mut SolveCtx<'_>,
    goal: TermId,
    env: &Env,
    depth: u32,
) -> Result<Option<Env>, Error> {
    struct StopOnFirst;
    impl Handler for StopOnFirst {
        fn solution(&mut self, _env: &Env, _ctx: &mut SolveCtx<'_>) -> Result<Handled, Error> {
            Ok(Handled::Stop)
        }
    }

    let mut probe_env = env.clone();
    let probe_scope = ctx.fresh_scope();
    let flow = solve(
        ctx,
        &[goal],
        &mut probe_env,
        depth,
        probe_scope,
        &mut StopOnFirst,
    )?;
    Ok(match flow {
        // The stop sentinel fired: the probe found a solution.
        Flow::Halt => Some(probe_env),
        Flow::Normal | Flow::Cut(_) => None,
    })
}

/// General disjunction: clone per alternative, left then right.
#[allow(clippy::too_many_arguments)]
fn solve_disjunction(
    ctx: &mut SolveCtx<'_>,
    left: TermId,
    right: TermId,
    rest: &[TermId],
    env: &Env,
    depth: u32,
    scope: ScopeId,
    handler: &mut dyn Handler,
) -> Result<Flow, Error> {
    let mut branch_goals = Vec::with_capacity(rest.len() + 1);
    branch_goals.push(left);
    branch_goals.extend_from_slice(rest);
    let mut left_env = env.clone();
    match solve(ctx, &branch_goals, &mut left_env, depth, scope, handler)? {
        Flow::Normal => {}
        other => return Ok(other),
    }

    branch_goals[0] = right;
    let mut right_env = env.clone();
    solve(ctx, &branch_goals, &mut right_env, depth, scope, handler)
}

/// `distinct(Template, Goal)`: run Goal, forwarding only solutions whose
/// resolved template value is first-seen. NaN-bearing templates are always
/// first-seen (NaN is never equal to itself).
struct DistinctFilter<'h> {
    template: TermId,
    rest: Vec<TermId>,
    seen: HashSet<u64>,
    inner: &'h mut dyn Handler,
    depth: u32,
    scope: ScopeId,
    pending_cut: Option<ScopeId>,
}

impl Handler for DistinctFilter<'_> {
    fn solution(&mut self, env: &Env, ctx: &mut SolveCtx<'_>) -> Result<Handled, Error> {
        let (hash, saw_nan) = value_hash(self.template, env, ctx.terms);
        if !saw_nan && !self.seen.insert(hash) {
            return Ok(Handled::Continue);
        }
        // A surviving solution continues with the goals after distinct/2.
        let mut cont_env = env.clone();
        match solve(ctx, &self.rest, &mut cont_env, self.depth, self.scope, self.inner)? {
            Flow::Normal => Ok(Handled::Continue),
            Flow::Halt => Ok(Handled::Stop),
            Flow::Cut(cs) => {
                self.pending_cut = Some(cs);
                Ok(Handled::Stop)
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn solve_distinct(
    ctx: &mut SolveCtx<'_>,
    template: TermId,
    goal: TermId,
    rest: &[TermId],
    env: &Env,
    depth: u32,
    scope: ScopeId,
    handler: &mut dyn Handler,
) -> Result<Flow, Error> {
    let goal_scope = ctx.fresh_scope();
    let mut filter = DistinctFilter {
        template,
        rest: rest.to_vec(),
        seen: HashSet::new(),
        inner: handler,
        depth,
        scope,
        pending_cut: None,
    };
    let mut goal_env = env.clone();
    let flow = solve(ctx, &[goal], &mut goal_env, depth, goal_scope, &mut filter)?;
    if let Some(cs) = filter.pending_cut {
        return Ok(Flow::Cut(cs));
    }
    Ok(match flow {
        Flow::Halt => Flow::Halt,
        // A cut consumed here belonged to the distinct goal itself.
        Flow::Normal | Flow::Cut(_) => Flow::Normal,
    })
}

/// Ordinary predicate call: enumerate index candidates in order.
#[allow(clippy::too_many_arguments)]
fn resolve_clauses(
    ctx: &mut SolveCtx<'_>,
    goal: TermId,
    rest: &[TermId],
    env: &mut Env,
    depth: u32,
    scope: ScopeId,
    handler: &mut dyn Handler,
) -> Result<Flow, Error> {
    let candidates = ctx.db.candidates(goal, env, ctx.terms);

    #[cfg(feature = "tracing")]
    trace!(candidates = candidates.len(), "clause_resolution");

    // With exactly one candidate the frame is deterministic: bind in place
    // and skip the environment clone. Observable behavior is identical.
    let deterministic = candidates.len() == 1;

    for idx in candidates {
        ctx.metrics.record_clause_try();
        let clause = ctx.db.get(idx).clone();
        let (fresh_head, fresh_body) = rename_clause(&clause, ctx.terms);

        if deterministic {
            let ok = unify(goal, fresh_head, env, ctx.terms);
            ctx.metrics.record_unification(ok);
            if !ok {
                return Ok(Flow::Normal);
            }
            let new_scope = ctx.fresh_scope();
            let subgoals = build_subgoals(ctx, fresh_body, new_scope, scope, rest);
            let flow = solve(ctx, &subgoals, env, depth + 1, new_scope, handler)?;
            return Ok(match flow {
                Flow::Cut(cs) if cs == new_scope => Flow::Normal,
                other => other,
            });
        }

        let mut branch_env = env.clone();
        let ok = unify(goal, fresh_head, &mut branch_env, ctx.terms);
        ctx.metrics.record_unification(ok);
        if !ok {
            continue;
        }
        let new_scope = ctx.fresh_scope();
        let subgoals = build_subgoals(ctx, fresh_body, new_scope, scope, rest);
        match solve(ctx, &subgoals, &mut branch_env, depth + 1, new_scope, handler)? {
            Flow::Normal => continue,
            // The cut's scope is consumed: stop trying candidates.
            Flow::Cut(cs) if cs == new_scope => return Ok(Flow::Normal),
            other => return Ok(other),
        }
    }

    Ok(Flow::Normal)
}

/// `fresh_body ++ [$end_scope(new, parent)] ++ rest`.
fn build_subgoals(
    ctx: &SolveCtx<'_>,
    mut body: Vec<TermId>,
    new_scope: ScopeId,
    parent: ScopeId,
    rest: &[TermId],
) -> Vec<TermId> {
    let marker = ctx.terms.compound2(
        ctx.ns.end_scope,
        ctx.terms.int(new_scope as i64),
        ctx.terms.int(parent as i64),
    );
    body.push(marker);
    body.extend_from_slice(rest);
    body
}
