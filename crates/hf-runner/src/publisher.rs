//! Publisher: bounded broker writes from worker threads.

use std::sync::Arc;
use std::time::Duration;

use hf_broker::BrokerClient;
use hf_core::{SignalPath, Value};
use tracing::{debug, error};

use crate::error::RuntimeFault;
use crate::handles::HandleTable;
use crate::stats::RunnerStats;

/// Writes actual values. Never retries; a failed item is dropped.
#[derive(Clone)]
pub struct Publisher {
    client: Arc<dyn BrokerClient>,
    handles: Arc<HandleTable>,
    timeout: Duration,
    stats: Arc<RunnerStats>,
}

impl Publisher {
    pub fn new(
        client: Arc<dyn BrokerClient>,
        handles: Arc<HandleTable>,
        timeout: Duration,
        stats: Arc<RunnerStats>,
    ) -> Self {
        Self {
            client,
            handles,
            timeout,
            stats,
        }
    }

    pub fn publish(&self, signal: &SignalPath, value: Value) -> Result<(), RuntimeFault> {
        let Some(handle) = self.handles.get(signal) else {
            // Handles cover every configured signal; reaching this is a bug.
            error!(signal = %signal, "publish for a signal with no resolved handle");
            return Err(RuntimeFault::Publish {
                signal: signal.to_string(),
                source: hf_broker::BrokerError::NotFound {
                    path: signal.to_string(),
                },
            });
        };

        self.client
            .publish(handle, value.clone(), self.timeout)
            .map_err(|source| RuntimeFault::Publish {
                signal: signal.to_string(),
                source,
            })?;
        self.stats.published();
        debug!(signal = %signal, value = %value, "published actual value");
        Ok(())
    }

    /// Publish, recovering any failure.
    pub fn publish_or_drop(&self, signal: &SignalPath, value: Value) {
        if let Err(fault) = self.publish(signal, value) {
            self.stats.recover(fault);
        }
    }

    pub fn stats(&self) -> &RunnerStats {
        &self.stats
    }
}
