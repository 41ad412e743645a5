//! Error types for transform engine operations.

use thiserror::Error;

/// Result type for engine construction.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that prevent an engine from being built.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// Rules feed each other in a loop.
    #[error("Rule graph contains a cycle through: {signals}")]
    Cycle { signals: String },
}

/// Errors raised while evaluating one rule.
///
/// These never stop the engine; the affected rule is skipped for the cycle.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvaluationError {
    /// The expression could not be evaluated.
    #[error("Expression for {signal} failed: {message}")]
    Expression { signal: String, message: String },

    /// No expression backend is configured.
    #[error("No expression evaluator available for {signal}")]
    Unsupported { signal: String },

    /// The computed value does not fit the rule's declared type.
    #[error("Output for {signal} rejected: {source}")]
    Coercion {
        signal: String,
        source: hf_core::CoreError,
    },
}
