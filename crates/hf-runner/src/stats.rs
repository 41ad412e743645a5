//! Runtime counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{error, warn};

use crate::error::RuntimeFault;

/// Counters shared by intake, workers and publisher.
#[derive(Debug, Default)]
pub struct RunnerStats {
    actuations: AtomicU64,
    observations: AtomicU64,
    enqueue_failures: AtomicU64,
    published: AtomicU64,
    publish_failures: AtomicU64,
    evaluation_failures: AtomicU64,
    dropped_at_shutdown: AtomicU64,
    ticks: AtomicU64,
}

/// Point-in-time copy of [`RunnerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub actuations: u64,
    pub observations: u64,
    pub enqueue_failures: u64,
    pub published: u64,
    pub publish_failures: u64,
    pub evaluation_failures: u64,
    pub dropped_at_shutdown: u64,
    pub ticks: u64,
}

impl RunnerStats {
    pub const fn new() -> Self {
        Self {
            actuations: AtomicU64::new(0),
            observations: AtomicU64::new(0),
            enqueue_failures: AtomicU64::new(0),
            published: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            evaluation_failures: AtomicU64::new(0),
            dropped_at_shutdown: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
        }
    }

    pub(crate) fn actuation(&self) {
        self.actuations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn observation(&self) {
        self.observations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dropped(&self, count: u64) {
        self.dropped_at_shutdown.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Log a recovered fault and count it. Processing continues.
    pub(crate) fn recover(&self, fault: RuntimeFault) {
        match &fault {
            RuntimeFault::Enqueue { .. } => {
                self.enqueue_failures.fetch_add(1, Ordering::Relaxed);
                error!(error = %fault, "value not queued");
            }
            RuntimeFault::Publish { .. } => {
                self.publish_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %fault, "publish failed, item dropped");
            }
            RuntimeFault::Evaluation { .. } | RuntimeFault::Coercion { .. } => {
                self.evaluation_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %fault, "rule skipped for this cycle");
            }
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            actuations: self.actuations.load(Ordering::Relaxed),
            observations: self.observations.load(Ordering::Relaxed),
            enqueue_failures: self.enqueue_failures.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            evaluation_failures: self.evaluation_failures.load(Ordering::Relaxed),
            dropped_at_shutdown: self.dropped_at_shutdown.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "actuations={} observations={} published={} publish_failures={} \
             evaluation_failures={} enqueue_failures={} dropped_at_shutdown={} ticks={}",
            self.actuations,
            self.observations,
            self.published,
            self.publish_failures,
            self.evaluation_failures,
            self.enqueue_failures,
            self.dropped_at_shutdown,
            self.ticks
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hf_broker::BrokerError;

    #[test]
    fn faults_land_in_their_counter() {
        let stats = RunnerStats::new();
        stats.recover(RuntimeFault::Publish {
            signal: "A".to_string(),
            source: BrokerError::Disconnected,
        });
        stats.recover(RuntimeFault::Enqueue {
            signal: "A".to_string(),
            reason: "queue full",
        });
        stats.recover(RuntimeFault::Coercion {
            signal: "A".to_string(),
            source: hf_core::CoreError::NonFinite {
                to: hf_core::DataType::Int8,
            },
        });
        stats.published();

        let snap = stats.snapshot();
        assert_eq!(snap.publish_failures, 1);
        assert_eq!(snap.enqueue_failures, 1);
        assert_eq!(snap.evaluation_failures, 1);
        assert_eq!(snap.published, 1);
        assert_eq!(snap.actuations, 0);
    }
}
