//! Boolean eligibility rules as trees.
//!
//! Rule text such as `age > 30 AND department = 'Sales'` is [`parse`]d into a
//! [`Node`] tree, several trees can be merged with [`combine`], and a tree is
//! [`evaluate`]d against a [`Record`] to get a verdict.
//!
//! ```
//! use ruletree::{combine, evaluate, parse, BoolOp, Record};
//!
//! let senior = parse("age > 30").unwrap();
//! let sales = parse("department = 'Sales'").unwrap();
//! let rule = combine([senior, sales], BoolOp::And);
//!
//! let record = Record::new().set("age", 35_i64).set("department", "Sales");
//! assert!(evaluate(rule.as_ref(), &record));
//! ```

mod combine;
mod error;
mod evaluate;
pub mod parse;
#[cfg(feature = "binary-cache")]
pub mod serial;
mod types;

pub use combine::{combine, combine_all, combine_rules};
pub use error::RuleTreeError;
pub use evaluate::{
    evaluate, explain, try_evaluate, ConditionOutcome, Evaluator, MissingAttributePolicy,
};
pub use parse::{parse, parse_with, ParseError, ParseOptions};
#[cfg(feature = "binary-cache")]
pub use serial::{DeserializeError, SerializeError};
pub use types::{
    attr, AttrExpr, BoolOp, Comparator, Condition, EvalError, EvaluationReport, Node, Nodes,
    Record, RuleBook, RuleBookError, Value,
};
#[cfg(feature = "serde")]
pub use types::MAX_INTERCHANGE_DEPTH;
