//! Transform engine capability.

use std::time::Instant;

use hf_core::{SignalKey, SignalPath, Value};

use crate::error::EvaluationError;

/// A changed input value.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalUpdate {
    pub key: SignalKey,
    pub value: Value,
    /// When the change happened; rule delays are measured from here.
    pub at: Instant,
}

impl SignalUpdate {
    pub fn new(key: SignalKey, value: Value, at: Instant) -> Self {
        Self { key, value, at }
    }
}

/// Outcome of one rule in one evaluation pass.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    /// Publish this value as the output's actual value.
    Ready(Value),
    /// The rule is waiting on its delay or its expression has nothing yet.
    NotReady,
    /// The rule failed this cycle; other rules are unaffected.
    Failed(EvaluationError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutput {
    pub signal: SignalPath,
    pub outcome: RuleOutcome,
}

impl RuleOutput {
    pub fn ready_value(&self) -> Option<&Value> {
        match &self.outcome {
            RuleOutcome::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// Dependency-graph evaluator.
///
/// Called with new inputs when a command arrives and with no inputs on a
/// fixed period, so that delayed and continuous rules can emit.
pub trait TransformEngine: Send {
    fn evaluate(&mut self, updates: &[SignalUpdate], now: Instant) -> Vec<RuleOutput>;

    /// Keys the engine expects to be fed from outside.
    fn required_inputs(&self) -> Vec<SignalKey>;

    /// Outputs armed but not yet emitted.
    fn pending(&self) -> usize {
        0
    }
}
