//! Broker collaborator seams: path resolution and the actuator-provider client.

use std::sync::Arc;
use std::time::Duration;

use hf_core::{DataType, SignalPath, Value};

use crate::catalog::SignalKind;
use crate::error::BrokerResult;

/// Resolved reference to a broker signal. Cheap to clone and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignalHandle {
    id: u32,
    path: SignalPath,
    data_type: DataType,
    kind: SignalKind,
}

impl SignalHandle {
    pub fn new(id: u32, path: SignalPath, data_type: DataType, kind: SignalKind) -> Self {
        Self {
            id,
            path,
            data_type,
            kind,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn path(&self) -> &SignalPath {
        &self.path
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }
}

/// Invoked on a broker-owned delivery thread. Must return promptly.
pub type ValueCallback = Arc<dyn Fn(&SignalHandle, Value) + Send + Sync>;

pub trait SignalResolver: Send + Sync {
    fn resolve(&self, path: &SignalPath) -> BrokerResult<SignalHandle>;
}

/// Connection through which a process serves actuators and publishes values.
///
/// `publish` must not be called from inside a callback delivered by the same
/// client; implementations reject such calls instead of deadlocking.
pub trait BrokerClient: Send + Sync {
    /// Claim exclusive ownership of an actuator; commands for it reach `callback`.
    fn serve(&self, handle: &SignalHandle, callback: ValueCallback) -> BrokerResult<()>;

    /// Observe published values of any signal.
    fn subscribe(&self, handle: &SignalHandle, callback: ValueCallback) -> BrokerResult<()>;

    fn start(&self) -> BrokerResult<()>;

    fn wait_until_ready(&self, timeout: Duration) -> BrokerResult<()>;

    /// Write the current value of a signal, giving up after `timeout`.
    fn publish(&self, handle: &SignalHandle, value: Value, timeout: Duration) -> BrokerResult<()>;

    /// Release served actuators and stop callback delivery.
    fn stop(&self);
}
