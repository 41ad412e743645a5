use std::time::Duration;

/// Runner tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerOptions {
    /// Period of the empty re-evaluation pass for graph fixtures.
    pub tick_interval: Duration,
    /// How long `start` waits for the broker client to become ready.
    pub ready_timeout: Duration,
    /// Upper bound on a single broker write.
    pub publish_timeout: Duration,
    /// How long `stop` waits for each worker to exit.
    pub join_timeout: Duration,
    /// Capacity of each work queue between intake and workers.
    pub queue_capacity: usize,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            ready_timeout: Duration::from_secs(10),
            publish_timeout: Duration::from_secs(2),
            join_timeout: Duration::from_secs(2),
            queue_capacity: 4096,
        }
    }
}
