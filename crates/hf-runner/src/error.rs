//! Error types for the runner, split by lifecycle phase.
//!
//! [`StartupError`] is fatal: the runner never reaches RUNNING.
//! [`RuntimeFault`] is recovered: logged, counted, and the affected item or
//! rule is skipped while everything else keeps running.

use hf_broker::BrokerError;
use hf_core::CoreError;
use hf_dag::{EngineError, EvaluationError};
use hf_project::ConfigError;
use thiserror::Error;

use crate::lifecycle::LifecycleState;

pub type StartupResult<T> = Result<T, StartupError>;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cannot resolve signal {signal}: {source}")]
    Resolution { signal: String, source: BrokerError },

    #[error("Cannot register actuator {signal}: {source}")]
    Registration { signal: String, source: BrokerError },

    #[error("Cannot build transform engine for fixture '{fixture}': {source}")]
    Engine {
        fixture: String,
        source: EngineError,
    },

    #[error("Broker connection failed: {0}")]
    Connection(BrokerError),

    #[error("Failed to spawn worker {name}: {source}")]
    Spawn {
        name: String,
        source: std::io::Error,
    },

    #[error("Runner cannot start from state {0}")]
    InvalidState(LifecycleState),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeFault {
    #[error("Publishing {signal} failed: {source}")]
    Publish { signal: String, source: BrokerError },

    #[error("Evaluation failed in fixture '{fixture}': {source}")]
    Evaluation {
        fixture: String,
        source: EvaluationError,
    },

    #[error("Value for {signal} does not fit its type: {source}")]
    Coercion { signal: String, source: CoreError },

    #[error("Could not queue actuation for {signal}: {reason}")]
    Enqueue { signal: String, reason: &'static str },
}
