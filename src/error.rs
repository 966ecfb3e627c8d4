use thiserror::Error;

use crate::parse::ParseError;
use crate::{EvalError, RuleBookError};

/// Unified error type covering parsing, evaluation, rule books and I/O.
///
/// Returned by convenience methods like
/// [`RuleBook::from_file()`](crate::RuleBook::from_file).
#[derive(Debug, Error)]
pub enum RuleTreeError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    RuleBook(#[from] RuleBookError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "binary-cache")]
    #[error(transparent)]
    Serialize(#[from] crate::serial::SerializeError),

    #[cfg(feature = "binary-cache")]
    #[error(transparent)]
    Deserialize(#[from] crate::serial::DeserializeError),
}
