use std::fmt;
use std::time::Duration;

use super::error::EvalError;
use crate::evaluate::ConditionOutcome;

/// Detailed evaluation report returned by [`explain()`](crate::explain) and
/// [`Evaluator::explain()`](crate::Evaluator::explain).
///
/// Holds the outcome, the conditions actually evaluated (short-circuited
/// ones are absent) in evaluation order, and the wall-clock duration.
#[derive(Debug, Clone)]
#[must_use]
pub struct EvaluationReport {
    outcome: Result<bool, EvalError>,
    conditions: Vec<ConditionOutcome>,
    duration: Duration,
}

impl EvaluationReport {
    pub(crate) fn new(
        outcome: Result<bool, EvalError>,
        conditions: Vec<ConditionOutcome>,
        duration: Duration,
    ) -> Self {
        Self {
            outcome,
            conditions,
            duration,
        }
    }

    /// The boolean verdict; `false` when evaluation stopped on an error.
    #[must_use]
    pub fn verdict(&self) -> bool {
        matches!(self.outcome, Ok(true))
    }

    /// The error that stopped a strict evaluation, if any.
    #[must_use]
    pub fn error(&self) -> Option<&EvalError> {
        self.outcome.as_ref().err()
    }

    #[must_use]
    pub fn conditions(&self) -> &[ConditionOutcome] {
        &self.conditions
    }

    /// Wall-clock duration of the evaluation.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Ok(v) => write!(f, "verdict: {v}")?,
            Err(e) => write!(f, "error: {e}")?,
        }
        let visited: Vec<String> = self
            .conditions
            .iter()
            .map(|c| format!("{} => {}", c.condition, c.result))
            .collect();
        write!(f, ", conditions: [{}]", visited.join(", "))?;
        write!(f, ", duration: {:?}", self.duration)?;
        Ok(())
    }
}
