use std::time::Instant;

use crate::{BoolOp, Comparator, Condition, EvalError, EvaluationReport, Node, Record, Value};

/// What to do when a condition cannot be decided: the attribute is missing,
/// `>`/`<` meets a non-numeric value, or a hand-built `>`/`<` condition has
/// no finite numeric literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingAttributePolicy {
    /// The condition is `false`.
    #[default]
    False,
    /// Evaluation stops with an [`EvalError`].
    Error,
}

/// Evaluates trees under a fixed [`MissingAttributePolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator {
    policy: MissingAttributePolicy,
}

impl Evaluator {
    #[must_use]
    pub fn new(policy: MissingAttributePolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> MissingAttributePolicy {
        self.policy
    }

    /// Evaluate `tree` against `record`. An absent tree is `false`.
    ///
    /// # Errors
    ///
    /// Only under [`MissingAttributePolicy::Error`], when a condition reads a
    /// missing attribute, orders a non-numeric value, or orders against a
    /// literal that is not a finite number.
    pub fn evaluate(&self, tree: Option<&Node>, record: &Record) -> Result<bool, EvalError> {
        match tree {
            None => Ok(false),
            Some(node) => eval_node(node, record, self.policy, &mut ignore),
        }
    }

    /// Evaluate and record every condition visited. Errors are captured in
    /// the report instead of returned.
    pub fn explain(&self, tree: Option<&Node>, record: &Record) -> EvaluationReport {
        let start = Instant::now();
        let mut trace = Vec::new();
        let outcome = match tree {
            None => Ok(false),
            Some(node) => eval_node(
                node,
                record,
                self.policy,
                &mut |cond: &Condition, observed: Option<&Value>, result: bool| {
                    trace.push(ConditionOutcome {
                        condition: cond.clone(),
                        observed: observed.cloned(),
                        result,
                    });
                },
            ),
        };
        EvaluationReport::new(outcome, trace, start.elapsed())
    }
}

/// Evaluate with [`MissingAttributePolicy::False`]: conditions that cannot be
/// decided are simply `false`, so this never fails.
#[must_use]
pub fn evaluate(tree: Option<&Node>, record: &Record) -> bool {
    match tree {
        None => false,
        Some(node) => {
            eval_node(node, record, MissingAttributePolicy::False, &mut ignore).unwrap_or(false)
        }
    }
}

/// Evaluate with [`MissingAttributePolicy::Error`].
///
/// # Errors
///
/// Returns [`EvalError`] when a condition reads a missing attribute, orders
/// a non-numeric value, or orders against a non-numeric literal.
pub fn try_evaluate(tree: Option<&Node>, record: &Record) -> Result<bool, EvalError> {
    Evaluator::new(MissingAttributePolicy::Error).evaluate(tree, record)
}

/// Traced evaluation under the lenient policy.
pub fn explain(tree: Option<&Node>, record: &Record) -> EvaluationReport {
    Evaluator::default().explain(tree, record)
}

/// One condition visited during [`explain`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionOutcome {
    pub condition: Condition,
    /// The record's value for the attribute, if present.
    pub observed: Option<Value>,
    pub result: bool,
}

fn ignore(_: &Condition, _: Option<&Value>, _: bool) {}

/// Short-circuit walk. Operators whose left side is pending wait on a stack
/// together with their right subtree; a right subtree that must run takes
/// over its operator's slot, so its value is the operator's value.
fn eval_node(
    node: &Node,
    record: &Record,
    policy: MissingAttributePolicy,
    visit: &mut dyn FnMut(&Condition, Option<&Value>, bool),
) -> Result<bool, EvalError> {
    let mut pending: Vec<(BoolOp, &Node)> = Vec::new();
    let mut current = node;
    loop {
        let value = loop {
            match current {
                Node::Operator { op, left, right } => {
                    pending.push((*op, right.as_ref()));
                    current = left.as_ref();
                }
                Node::Operand(cond) => {
                    let observed = record.get(&cond.attribute);
                    let result = eval_condition(cond, observed, policy)?;
                    visit(cond, observed, result);
                    break result;
                }
            }
        };
        loop {
            let Some((op, right)) = pending.pop() else {
                return Ok(value);
            };
            match (op, value) {
                (BoolOp::And, false) | (BoolOp::Or, true) => {}
                _ => {
                    current = right;
                    break;
                }
            }
        }
    }
}

fn eval_condition(
    cond: &Condition,
    observed: Option<&Value>,
    policy: MissingAttributePolicy,
) -> Result<bool, EvalError> {
    let undecided = |err: EvalError| match policy {
        MissingAttributePolicy::False => Ok(false),
        MissingAttributePolicy::Error => Err(err),
    };

    let Some(actual) = observed else {
        return undecided(EvalError::MissingAttribute {
            attribute: cond.attribute.clone(),
        });
    };

    match cond.comparator {
        Comparator::Eq => Ok(actual.strict_eq(&cond.value)),
        Comparator::Gt | Comparator::Lt => {
            let Some(lhs) = actual.as_number() else {
                return undecided(EvalError::InvalidAttribute {
                    attribute: cond.attribute.clone(),
                    comparator: cond.comparator,
                    found: actual.type_name(),
                });
            };
            // Parsed trees always carry finite numbers here; hand-built or
            // deserialized ones may not.
            let Some(rhs) = cond.value.ordering_bound() else {
                tracing::warn!(attribute = %cond.attribute, literal = %cond.value, "ordering condition without a numeric literal");
                return undecided(EvalError::InvalidLiteral {
                    attribute: cond.attribute.clone(),
                    comparator: cond.comparator,
                    literal: cond.value.clone(),
                });
            };
            Ok(match (cond.comparator, actual, &cond.value) {
                (Comparator::Gt, Value::Int(a), Value::Int(b)) => a > b,
                (Comparator::Lt, Value::Int(a), Value::Int(b)) => a < b,
                (Comparator::Gt, _, _) => lhs > rhs,
                _ => lhs < rhs,
            })
        }
    }
}
