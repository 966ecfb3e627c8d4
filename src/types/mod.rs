mod error;
mod evaluation_report;
mod node;
mod record;
mod rulebook;
mod value;

pub use error::{EvalError, RuleBookError};
pub use evaluation_report::EvaluationReport;
pub use node::{attr, AttrExpr, BoolOp, Comparator, Condition, Node, Nodes};
#[cfg(feature = "serde")]
pub use node::MAX_INTERCHANGE_DEPTH;
pub use record::Record;
pub use rulebook::RuleBook;
pub use value::Value;
