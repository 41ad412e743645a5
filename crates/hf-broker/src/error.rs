//! Error types for broker operations.

use std::time::Duration;

use thiserror::Error;

pub type BrokerResult<T> = Result<T, BrokerError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BrokerError {
    #[error("Signal not found: {path}")]
    NotFound { path: String },

    #[error("Actuator {path} is already served by another provider")]
    AlreadyServed { path: String },

    #[error("Signal {path} is not an actuator")]
    NotAnActuator { path: String },

    #[error("No provider serves actuator {path}")]
    NoProvider { path: String },

    #[error("Client not ready after {timeout:?}")]
    NotReady { timeout: Duration },

    #[error("Client is not connected")]
    Disconnected,

    #[error("Write to {path} rejected: {reason}")]
    Rejected { path: String, reason: String },

    #[error("Write to {path} timed out after {timeout:?}")]
    Timeout { path: String, timeout: Duration },

    #[error("Publishing from the callback delivery thread is not allowed ({path})")]
    ReentrantWrite { path: String },

    #[error("Value for {path} does not match its type: {source}")]
    TypeMismatch {
        path: String,
        source: hf_core::CoreError,
    },

    #[error("Failed to spawn delivery thread: {what}")]
    Spawn { what: String },

    #[error("Invalid signal catalog: {what}")]
    Catalog { what: String },
}
