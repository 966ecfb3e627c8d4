use thiserror::Error;

/// Errors produced when parsing rule text. Any of them aborts the parse; no
/// partial tree is ever returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("parse error: malformed condition '{condition}': {reason}")]
    MalformedCondition { condition: String, reason: String },

    #[error("parse error: unbalanced grouping at offset {offset}: {reason}")]
    UnbalancedGrouping { offset: usize, reason: &'static str },

    #[error("parse error: unsupported operator '{operator}' at offset {offset}")]
    UnsupportedOperator { operator: String, offset: usize },

    #[error("parse error: unterminated string literal starting at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("parse error: empty rule")]
    Empty,

    #[error("parse error: grouping nested deeper than {limit} levels")]
    NestingTooDeep { limit: usize },
}
