//! Actuation intake: the broker callback side of the work queues.
//!
//! Callbacks run on a broker-owned thread. They only stamp the value and
//! hand it to a queue with `try_send`; they never block and never write to
//! the broker.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::{Sender, TrySendError};
use hf_broker::{SignalHandle, ValueCallback};
use hf_core::{SignalPath, Value};
use tracing::trace;

use crate::error::RuntimeFault;
use crate::stats::RunnerStats;
use crate::work::{PendingWork, WorkItem};

/// Routes received values to the queue of the worker that owns them.
///
/// Each served actuator has exactly one owning queue. An observed signal may
/// feed several graph fixtures and is copied to each of their queues.
pub struct Intake {
    actuators: HashMap<SignalPath, Sender<WorkItem>>,
    observers: HashMap<SignalPath, Vec<Sender<WorkItem>>>,
    stats: Arc<RunnerStats>,
}

impl Intake {
    pub fn new(
        actuators: HashMap<SignalPath, Sender<WorkItem>>,
        observers: HashMap<SignalPath, Vec<Sender<WorkItem>>>,
        stats: Arc<RunnerStats>,
    ) -> Self {
        Self {
            actuators,
            observers,
            stats,
        }
    }

    /// Queue a commanded value for a served actuator.
    pub fn on_actuation(&self, signal: &SignalPath, value: Value) {
        self.stats.actuation();
        let work = PendingWork::new(signal.clone(), value);
        trace!(signal = %signal, value = %work.value, "actuation received");

        let result = match self.actuators.get(signal) {
            Some(queue) => enqueue(queue, WorkItem::Actuation(work)),
            None => Err(RuntimeFault::Enqueue {
                signal: signal.to_string(),
                reason: "no worker owns this actuator",
            }),
        };
        if let Err(fault) = result {
            self.stats.recover(fault);
        }
    }

    /// Queue a published value of an observed dependency.
    pub fn on_observation(&self, signal: &SignalPath, value: Value) {
        self.stats.observation();
        let Some(queues) = self.observers.get(signal) else {
            return;
        };
        let work = PendingWork::new(signal.clone(), value);
        for queue in queues {
            if let Err(fault) = enqueue(queue, WorkItem::Observation(work.clone())) {
                self.stats.recover(fault);
            }
        }
    }

    pub fn actuation_callback(self: &Arc<Self>) -> ValueCallback {
        let intake = Arc::clone(self);
        Arc::new(move |handle: &SignalHandle, value: Value| {
            intake.on_actuation(handle.path(), value)
        })
    }

    pub fn observation_callback(self: &Arc<Self>) -> ValueCallback {
        let intake = Arc::clone(self);
        Arc::new(move |handle: &SignalHandle, value: Value| {
            intake.on_observation(handle.path(), value)
        })
    }
}

fn enqueue(queue: &Sender<WorkItem>, item: WorkItem) -> Result<(), RuntimeFault> {
    let signal = item
        .work()
        .map(|work| work.signal.to_string())
        .unwrap_or_default();
    queue.try_send(item).map_err(|e| RuntimeFault::Enqueue {
        signal,
        reason: match e {
            TrySendError::Full(_) => "queue full",
            TrySendError::Disconnected(_) => "worker stopped",
        },
    })
}
