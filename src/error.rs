//! Structural errors raised by the engine.
//!
//! Logic failure is never an error: a branch with no solutions simply emits
//! nothing and the solver returns normally. The variants here abort the
//! current query but leave the clause database intact.

use std::fmt;
use std::io;

/// A structural fault inside the engine.
#[derive(Debug)]
pub enum Error {
    /// An arithmetic operand was an unbound variable.
    Uninstantiated,
    /// Wrong term type for an arithmetic or format operation.
    Type(String),
    /// An arithmetic functor the evaluator does not recognize.
    UnknownOperator(String),
    /// The solver's activation-depth guard tripped.
    DepthExceeded,
    /// The write/format sink failed.
    Io(io::Error),
    /// Term arena exhaustion.
    OutOfMemory,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Uninstantiated => write!(f, "arguments are not sufficiently instantiated"),
            Error::Type(what) => write!(f, "type error: {}", what),
            Error::UnknownOperator(op) => write!(f, "unknown arithmetic operator: {}", op),
            Error::DepthExceeded => write!(f, "resolution depth limit exceeded"),
            Error::Io(e) => write!(f, "i/o error: {}", e),
            Error::OutOfMemory => write!(f, "term arena exhausted"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
