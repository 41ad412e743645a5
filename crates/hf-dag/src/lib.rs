//! Transform engine for fixture rules.
//!
//! The runner only depends on the [`TransformEngine`] capability: feed it
//! signal updates and the current time, get back per-rule outcomes. Engines
//! keep hidden per-signal state and are not required to be reentrant, so a
//! caller must serialize calls to [`TransformEngine::evaluate`].
//!
//! [`DagEngine`] is the reference implementation:
//! - rules are ordered topologically over their Actual-space dependencies
//! - each rule owns a delay line armed whenever one of its inputs changes
//! - mirror rules republish the triggering input
//! - expression rules are handed to a pluggable [`ExpressionEvaluator`]

pub mod dag;
pub mod delay;
pub mod engine;
pub mod error;
pub mod expression;
pub mod order;

pub use dag::DagEngine;
pub use delay::{Armed, DelayLine};
pub use engine::{RuleOutcome, RuleOutput, SignalUpdate, TransformEngine};
pub use error::{EngineError, EngineResult, EvaluationError};
pub use expression::{Evaluation, ExpressionContext, ExpressionEvaluator, NoExpressions};
pub use order::evaluation_order;
