use lasso::{Spur, ThreadedRodeo};

/// Interned identifier for an atom or functor name.
/// Equality on `NameId` is equality on the spelled name.
pub type NameId = Spur;

/// Symbol store for interning atom, functor, and variable names.
///
/// Guarantees:
/// - Same string always produces the same NameId
/// - Different strings always produce different NameIds
/// - NameId resolves back to the original string
pub struct SymbolStore {
    rodeo: ThreadedRodeo,
}

impl SymbolStore {
    /// Create a new empty symbol store.
    pub fn new() -> Self {
        Self {
            rodeo: ThreadedRodeo::new(),
        }
    }

    /// Intern a name, returning its NameId.
    pub fn intern(&self, name: &str) -> NameId {
        self.rodeo.get_or_intern(name)
    }

    /// Resolve a NameId back to its string.
    /// Returns None if the NameId was not created by this store.
    pub fn resolve(&self, id: NameId) -> Option<&str> {
        self.rodeo.try_resolve(&id)
    }

    /// Get the NameId for a name if it exists, without interning.
    pub fn get(&self, name: &str) -> Option<NameId> {
        self.rodeo.get(name)
    }
}

impl Default for SymbolStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Pre-interned names the engine dispatches on.
///
/// Built once per session so the solver and evaluator compare `NameId`s
/// instead of strings on the hot path.
#[derive(Clone, Copy)]
pub struct Names {
    pub dot: NameId,
    pub nil: NameId,
    pub comma: NameId,
    pub semicolon: NameId,
    pub neck: NameId,
    pub dcg: NameId,
    pub if_then: NameId,
    pub cut: NameId,
    pub truth: NameId,
    pub fail: NameId,
    pub falsity: NameId,
    pub repeat: NameId,
    pub nl: NameId,
    pub is: NameId,
    pub unify: NameId,
    pub not_unify: NameId,
    pub lt: NameId,
    pub gt: NameId,
    pub le: NameId,
    pub ge: NameId,
    pub arith_eq: NameId,
    pub arith_ne: NameId,
    pub plus: NameId,
    pub minus: NameId,
    pub star: NameId,
    pub slash: NameId,
    pub int_div: NameId,
    pub floor_div: NameId,
    pub modulo: NameId,
    pub remainder: NameId,
    pub min: NameId,
    pub max: NameId,
    pub abs: NameId,
    pub sign: NameId,
    pub nan: NameId,
    pub inf: NameId,
    pub naf: NameId,
    pub not: NameId,
    pub phrase: NameId,
    pub distinct: NameId,
    pub write: NameId,
    pub format: NameId,
    pub braces: NameId,
    pub consult: NameId,
    pub halt: NameId,
    pub end_scope: NameId,
}

impl Names {
    /// Intern the full dispatch vocabulary into `symbols`.
    pub fn intern_in(symbols: &SymbolStore) -> Self {
        Self {
            dot: symbols.intern("."),
            nil: symbols.intern("[]"),
            comma: symbols.intern(","),
            semicolon: symbols.intern(";"),
            neck: symbols.intern(":-"),
            dcg: symbols.intern("-->"),
            if_then: symbols.intern("->"),
            cut: symbols.intern("!"),
            truth: symbols.intern("true"),
            fail: symbols.intern("fail"),
            falsity: symbols.intern("false"),
            repeat: symbols.intern("repeat"),
            nl: symbols.intern("nl"),
            is: symbols.intern("is"),
            unify: symbols.intern("="),
            not_unify: symbols.intern("\\="),
            lt: symbols.intern("<"),
            gt: symbols.intern(">"),
            le: symbols.intern("=<"),
            ge: symbols.intern(">="),
            arith_eq: symbols.intern("=:="),
            arith_ne: symbols.intern("=\\="),
            plus: symbols.intern("+"),
            minus: symbols.intern("-"),
            star: symbols.intern("*"),
            slash: symbols.intern("/"),
            int_div: symbols.intern("//"),
            floor_div: symbols.intern("div"),
            modulo: symbols.intern("mod"),
            remainder: symbols.intern("rem"),
            min: symbols.intern("min"),
            max: symbols.intern("max"),
            abs: symbols.intern("abs"),
            sign: symbols.intern("sign"),
            nan: symbols.intern("nan"),
            inf: symbols.intern("inf"),
            naf: symbols.intern("\\+"),
            not: symbols.intern("not"),
            phrase: symbols.intern("phrase"),
            distinct: symbols.intern("distinct"),
            write: symbols.intern("write"),
            format: symbols.intern("format"),
            braces: symbols.intern("{}"),
            consult: symbols.intern("consult"),
            halt: symbols.intern("halt"),
            end_scope: symbols.intern("$end_scope"),
        }
    }
}
