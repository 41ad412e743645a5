//! hf-broker: the signal-broker seam.
//!
//! [`SignalResolver`] and [`BrokerClient`] describe what the runner needs from
//! a vehicle-signal broker. [`InMemoryBroker`] implements both in-process,
//! backed by a [`SignalCatalog`].

pub mod catalog;
pub mod client;
pub mod error;
pub mod memory;

pub use catalog::{SignalCatalog, SignalKind, SignalMeta};
pub use client::{BrokerClient, SignalHandle, SignalResolver, ValueCallback};
pub use error::{BrokerError, BrokerResult};
pub use memory::{DELIVERY_QUEUE_CAPACITY, InMemoryBroker, LocalClient};
