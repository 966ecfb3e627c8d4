use thiserror::Error;

use super::{Comparator, Value};
use crate::parse::ParseError;

/// Errors raised by strict evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("attribute '{attribute}' is missing from the record")]
    MissingAttribute { attribute: String },

    #[error("attribute '{attribute}' holds a {found} value, '{comparator}' needs a number")]
    InvalidAttribute {
        attribute: String,
        comparator: Comparator,
        found: &'static str,
    },

    #[error("condition on '{attribute}' compares with {literal}, '{comparator}' needs a finite number")]
    InvalidLiteral {
        attribute: String,
        comparator: Comparator,
        literal: Value,
    },
}

/// Errors raised by [`RuleBook`](super::RuleBook) lookups and loading.
#[derive(Debug, Error)]
pub enum RuleBookError {
    #[error("duplicate rule id '{id}'")]
    DuplicateRule { id: String },

    #[error("unknown rule id '{id}'")]
    UnknownRule { id: String },

    #[error("line {line}: expected '<id>: <rule>'")]
    InvalidLine { line: usize },

    #[error("rule '{id}': {source}")]
    Parse {
        id: String,
        #[source]
        source: ParseError,
    },
}
