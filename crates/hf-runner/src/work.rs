//! Items crossing from broker callback threads to runner workers.

use std::time::Instant;

use hf_core::{SignalPath, Value};

/// A received value awaiting processing. Consumed exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWork {
    pub signal: SignalPath,
    pub value: Value,
    pub received_at: Instant,
}

impl PendingWork {
    pub fn new(signal: SignalPath, value: Value) -> Self {
        Self {
            signal,
            value,
            received_at: Instant::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkItem {
    /// Commanded value for a served actuator.
    Actuation(PendingWork),
    /// Published value of a signal the fixture reads but does not own.
    Observation(PendingWork),
    /// Periodic re-evaluation with no new input.
    Tick(Instant),
}

impl WorkItem {
    /// The carried value, if any.
    pub fn work(&self) -> Option<&PendingWork> {
        match self {
            WorkItem::Actuation(work) | WorkItem::Observation(work) => Some(work),
            WorkItem::Tick(_) => None,
        }
    }
}
