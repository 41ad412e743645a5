//! Expression hook for transform rules.
//!
//! The expression language belongs to whichever backend is plugged in; the
//! engine only hands over the rule's text, its current dependency values and
//! the current time.

use std::collections::BTreeMap;
use std::time::Instant;

use hf_core::{SignalPath, Value};

use crate::error::EvaluationError;

pub struct ExpressionContext<'a> {
    pub output: &'a SignalPath,
    pub expression: &'a str,
    /// Dependency values keyed by the path the rule declared.
    ///
    /// Served actuators appear here with their commanded value.
    pub deps: &'a BTreeMap<SignalPath, Value>,
    pub now: Instant,
}

/// Result of a successful expression evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// Final value for the current inputs.
    Ready(Value),
    /// Publish this value and evaluate again on the next pass.
    Settling(Value),
    /// Nothing to publish yet; evaluate again on the next pass.
    Pending,
}

pub trait ExpressionEvaluator: Send {
    fn evaluate(&mut self, ctx: &ExpressionContext<'_>) -> Result<Evaluation, EvaluationError>;
}

impl<F> ExpressionEvaluator for F
where
    F: FnMut(&ExpressionContext<'_>) -> Result<Evaluation, EvaluationError> + Send,
{
    fn evaluate(&mut self, ctx: &ExpressionContext<'_>) -> Result<Evaluation, EvaluationError> {
        self(ctx)
    }
}

/// Evaluator used when no expression backend is linked in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoExpressions;

impl ExpressionEvaluator for NoExpressions {
    fn evaluate(&mut self, ctx: &ExpressionContext<'_>) -> Result<Evaluation, EvaluationError> {
        Err(EvaluationError::Unsupported {
            signal: ctx.output.to_string(),
        })
    }
}
