//! Delay/transform scheduling.
//!
//! Two interchangeable strategies, both draining work queues on their own
//! threads:
//! - [`MirrorLane`]: one lane per served actuator, republishing the
//!   commanded value once each rule's delay has elapsed
//! - [`GraphWorker`]: one worker per fixture that exclusively owns a
//!   [`hf_dag::TransformEngine`] and serializes commands and ticks through it
//!
//! Both exit when the shutdown channel disconnects and log whatever they
//! drop on the way out.

mod graph;
mod mirror;

use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use tracing::{error, warn};

use crate::error::{StartupError, StartupResult};

pub use graph::GraphWorker;
pub use mirror::MirrorLane;

/// A named worker thread with an exit notification.
pub struct Worker {
    name: String,
    handle: JoinHandle<()>,
    exited: Receiver<()>,
}

impl Worker {
    pub fn spawn<F>(name: String, body: F) -> StartupResult<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        // Never sent on; disconnects when the thread ends, panics included.
        let (exit_tx, exited) = bounded::<()>(0);
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _exit = exit_tx;
                body();
            })
            .map_err(|source| StartupError::Spawn {
                name: name.clone(),
                source,
            })?;
        Ok(Self {
            name,
            handle,
            exited,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Join if the thread exits before `deadline`; detach it otherwise.
    pub fn join_until(self, deadline: Instant) -> bool {
        match self.exited.recv_deadline(deadline) {
            Err(RecvTimeoutError::Timeout) => {
                warn!(worker = %self.name, "worker did not exit in time, detaching");
                false
            }
            _ => {
                if self.handle.join().is_err() {
                    error!(worker = %self.name, "worker panicked");
                }
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn finished_worker_joins() {
        let worker = Worker::spawn("quick".to_string(), || {}).unwrap();
        assert!(worker.join_until(Instant::now() + Duration::from_secs(1)));
    }

    #[test]
    fn stuck_worker_is_detached_at_deadline() {
        let (release_tx, release_rx) = bounded::<()>(0);
        let worker = Worker::spawn("stuck".to_string(), move || {
            let _ = release_rx.recv();
        })
        .unwrap();

        let started = Instant::now();
        assert!(!worker.join_until(started + Duration::from_millis(50)));
        assert!(started.elapsed() < Duration::from_secs(1));
        drop(release_tx);
    }
}
