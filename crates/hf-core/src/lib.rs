//! hf-core: stable foundation for the hardware fixture simulator.
//!
//! Contains:
//! - path (signal paths + the target/actual key spaces)
//! - value (declared data types, typed values, checked coercion)
//! - error (shared error types)

pub mod error;
pub mod path;
pub mod value;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use path::{SignalKey, SignalPath};
pub use value::{DataType, Value};
