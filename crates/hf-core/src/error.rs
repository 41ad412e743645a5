use thiserror::Error;

use crate::value::DataType;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Unknown data type: {name}")]
    UnknownDataType { name: String },

    #[error("Cannot convert {from} value to {to}")]
    TypeMismatch { from: DataType, to: DataType },

    #[error("Value {value} is out of range for {to}")]
    OutOfRange { value: String, to: DataType },

    #[error("Value {value} has no exact {to} representation")]
    Inexact { value: String, to: DataType },

    #[error("Non-finite value cannot be converted to {to}")]
    NonFinite { to: DataType },

    #[error("Cannot parse '{text}' as {to}")]
    Parse { text: String, to: DataType },

    #[error("Invalid signal path: {what}")]
    InvalidPath { what: &'static str },
}
