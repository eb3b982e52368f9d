use crate::symbol::{NameId, Names};
use hashbrown::HashMap;
use parking_lot::RwLock;
use rustc_hash::FxHasher;
use smallvec::SmallVec;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};

/// Unique identifier for a term in the term store.
/// TermIds are stable for the life of the session and compare by identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermId(u32);

impl TermId {
    /// Get the raw u32 value (for debugging/display).
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Unique identifier for a logic variable.
///
/// Fresh VarIds are minted by the store; clause activation freshening mints
/// new ids rather than suffixing names, so two activations of the same
/// clause can never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u32);

impl VarId {
    /// Get the raw u32 value.
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// A term: the sole value of the object language.
///
/// Floats are stored by IEEE-754 bit pattern so terms stay `Eq + Hash` for
/// the hashconsing maps; unification and arithmetic reinterpret the bits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    /// A logic variable, looked up in the environment by id.
    Var(VarId),
    /// An atomic constant, including `[]`, `!`, `true`, `fail`.
    Atom(NameId),
    /// Signed 64-bit integer.
    Int(i64),
    /// IEEE-754 double, by bit pattern.
    Float(u64),
    /// Opaque byte string, distinct from atoms.
    Str(Box<[u8]>),
    /// Functor applied to one or more arguments. Lists use `.`/2.
    Compound(NameId, SmallVec<[TermId; 4]>),
}

impl Term {
    /// The float value of a `Float` term.
    pub fn float_value(&self) -> Option<f64> {
        match self {
            Term::Float(bits) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }
}

/// Number of shards for the hashcons maps (power of 2 for fast modulo).
const NUM_SHARDS: usize = 16;

/// Term arena with hashconsing.
///
/// Structurally equal terms receive the same TermId, so subterm sharing is
/// the default and equality of ground terms is an id comparison. The store
/// only grows; everything is released together when the session drops it.
pub struct TermStore {
    /// Central storage of all terms, indexed by TermId.
    nodes: RwLock<Vec<Term>>,
    /// Sharded hashcons maps for reducing contention.
    shards: [RwLock<HashMap<Term, TermId>>; NUM_SHARDS],
    /// Counter for generating unique TermIds.
    next_id: AtomicU32,
    /// Counter for minting fresh VarIds.
    next_var: AtomicU32,
    /// Display names for variables that came from surface syntax.
    var_names: RwLock<HashMap<VarId, NameId>>,
}

impl TermStore {
    /// Create a new empty term store.
    pub fn new() -> Self {
        let shards = std::array::from_fn(|_| RwLock::new(HashMap::new()));
        Self {
            nodes: RwLock::new(Vec::new()),
            shards,
            next_id: AtomicU32::new(0),
            next_var: AtomicU32::new(0),
            var_names: RwLock::new(HashMap::new()),
        }
    }

    /// Intern a term, returning its TermId.
    fn intern(&self, term: Term) -> TermId {
        let shard_idx = Self::shard_index(&term);
        let shard = &self.shards[shard_idx];

        // Fast path: already interned (read lock).
        {
            let map = shard.read();
            if let Some(&id) = map.get(&term) {
                return id;
            }
        }

        let mut map = shard.write();

        // Double-check after acquiring the write lock.
        if let Some(&id) = map.get(&term) {
            return id;
        }

        let raw = self.next_id.fetch_add(1, Ordering::Relaxed);
        assert!(raw != u32::MAX, "term arena exhausted");
        let id = TermId(raw);
        {
            let mut nodes = self.nodes.write();
            let idx = id.0 as usize;
            if nodes.len() <= idx {
                nodes.resize(idx + 1, Term::Int(0)); // placeholder
            }
            nodes[idx] = term.clone();
        }
        map.insert(term, id);
        id
    }

    /// Mint a fresh, never-before-seen variable.
    pub fn fresh_var(&self) -> VarId {
        VarId(self.next_var.fetch_add(1, Ordering::Relaxed))
    }

    /// Mint a fresh variable carrying a surface name for display.
    pub fn named_var(&self, name: NameId) -> VarId {
        let v = self.fresh_var();
        self.var_names.write().insert(v, name);
        v
    }

    /// The surface name of a variable, if it has one.
    pub fn var_name(&self, v: VarId) -> Option<NameId> {
        self.var_names.read().get(&v).copied()
    }

    /// Create a variable term.
    pub fn var(&self, v: VarId) -> TermId {
        self.intern(Term::Var(v))
    }

    /// Create an atom term.
    pub fn atom(&self, name: NameId) -> TermId {
        self.intern(Term::Atom(name))
    }

    /// Create an integer term.
    pub fn int(&self, value: i64) -> TermId {
        self.intern(Term::Int(value))
    }

    /// Create a float term.
    pub fn float(&self, value: f64) -> TermId {
        self.intern(Term::Float(value.to_bits()))
    }

    /// Create a byte-string term.
    pub fn string(&self, bytes: &[u8]) -> TermId {
        self.intern(Term::Str(bytes.into()))
    }

    /// Create a compound term. `args` must be non-empty.
    pub fn compound(&self, functor: NameId, args: SmallVec<[TermId; 4]>) -> TermId {
        debug_assert!(!args.is_empty(), "compounds have at least one argument");
        self.intern(Term::Compound(functor, args))
    }

    /// Create a unary compound.
    pub fn compound1(&self, functor: NameId, a: TermId) -> TermId {
        self.compound(functor, smallvec::smallvec![a])
    }

    /// Create a binary compound.
    pub fn compound2(&self, functor: NameId, a: TermId, b: TermId) -> TermId {
        self.compound(functor, smallvec::smallvec![a, b])
    }

    /// Resolve a TermId to its term.
    /// Returns None if the TermId is invalid.
    pub fn get(&self, id: TermId) -> Option<Term> {
        let nodes = self.nodes.read();
        nodes.get(id.0 as usize).cloned()
    }

    /// The variable id if the term is a variable.
    pub fn as_var(&self, id: TermId) -> Option<VarId> {
        match self.get(id)? {
            Term::Var(v) => Some(v),
            _ => None,
        }
    }

    /// The `(functor, arity)` key of a callable term.
    /// Atoms are `name/0`; non-callable terms return None.
    pub fn functor_arity(&self, id: TermId) -> Option<(NameId, usize)> {
        match self.get(id)? {
            Term::Atom(name) => Some((name, 0)),
            Term::Compound(name, args) => Some((name, args.len())),
            _ => None,
        }
    }

    fn shard_index(term: &Term) -> usize {
        let mut hasher = FxHasher::default();
        term.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }
}

impl Default for TermStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a `./2` list from `items`, ending in `tail`.
pub fn make_list(terms: &TermStore, ns: &Names, items: &[TermId], tail: TermId) -> TermId {
    let mut acc = tail;
    for &item in items.iter().rev() {
        acc = terms.compound2(ns.dot, item, acc);
    }
    acc
}

/// The empty list.
pub fn nil(terms: &TermStore, ns: &Names) -> TermId {
    terms.atom(ns.nil)
}

/// Flatten a right-nested `,/2` spine into its conjuncts, left to right.
/// Non-conjunction terms come back as a single element.
pub fn flatten_conjunction(t: TermId, terms: &TermStore, ns: &Names) -> Vec<TermId> {
    let mut out = Vec::new();
    let mut stack = vec![t];
    while let Some(current) = stack.pop() {
        match terms.get(current) {
            Some(Term::Compound(functor, args)) if functor == ns.comma && args.len() == 2 => {
                stack.push(args[1]);
                stack.push(args[0]);
            }
            _ => out.push(current),
        }
    }
    out
}
