use std::time::Instant;

use crossbeam_channel::{Receiver, RecvError, select};
use hf_dag::{EvaluationError, RuleOutcome, SignalUpdate, TransformEngine};
use hf_project::FixtureSpec;
use tracing::{info, trace, warn};

use crate::error::RuntimeFault;
use crate::publisher::Publisher;
use crate::work::WorkItem;

/// Upper bound on items folded into a single evaluation pass.
const MAX_BATCH: usize = 64;

/// Sole owner of one fixture's transform engine.
///
/// Commands, observations and ticks all arrive on one queue, so exactly one
/// evaluation is in flight at a time.
pub struct GraphWorker {
    fixture: String,
    engine: Box<dyn TransformEngine>,
    queue: Receiver<WorkItem>,
    shutdown: Receiver<()>,
    publisher: Publisher,
}

impl GraphWorker {
    pub fn new(
        fixture: &FixtureSpec,
        engine: Box<dyn TransformEngine>,
        queue: Receiver<WorkItem>,
        shutdown: Receiver<()>,
        publisher: Publisher,
    ) -> Self {
        Self {
            fixture: fixture.name.clone(),
            engine,
            queue,
            shutdown,
            publisher,
        }
    }

    pub fn run(mut self) {
        info!(fixture = %self.fixture, "graph worker started");
        loop {
            let next = select! {
                recv(self.queue) -> msg => msg,
                recv(self.shutdown) -> _ => Err(RecvError),
            };
            let Ok(first) = next else {
                break;
            };
            let mut batch = vec![first];
            batch.extend(self.queue.try_iter().take(MAX_BATCH - 1));
            self.process(batch);
        }
        self.drain();
    }

    fn process(&mut self, batch: Vec<WorkItem>) {
        let mut updates = Vec::with_capacity(batch.len());
        for item in batch {
            match item {
                WorkItem::Actuation(work) => updates.push(SignalUpdate::new(
                    work.signal.target(),
                    work.value,
                    work.received_at,
                )),
                WorkItem::Observation(work) => updates.push(SignalUpdate::new(
                    work.signal.actual(),
                    work.value,
                    work.received_at,
                )),
                WorkItem::Tick(at) => {
                    self.publisher.stats().tick();
                    trace!(fixture = %self.fixture, lag = ?at.elapsed(), "tick");
                }
            }
        }

        let now = Instant::now();
        for output in self.engine.evaluate(&updates, now) {
            match output.outcome {
                RuleOutcome::Ready(value) => self.publisher.publish_or_drop(&output.signal, value),
                RuleOutcome::NotReady => {
                    trace!(fixture = %self.fixture, signal = %output.signal, "not ready")
                }
                RuleOutcome::Failed(EvaluationError::Coercion { signal, source }) => self
                    .publisher
                    .stats()
                    .recover(RuntimeFault::Coercion { signal, source }),
                RuleOutcome::Failed(source) => {
                    self.publisher.stats().recover(RuntimeFault::Evaluation {
                        fixture: self.fixture.clone(),
                        source,
                    })
                }
            }
        }
    }

    /// Log and count everything that will never be published.
    fn drain(&mut self) {
        let mut dropped = 0u64;
        for item in self.queue.try_iter() {
            if let Some(work) = item.work() {
                warn!(fixture = %self.fixture, signal = %work.signal, value = %work.value, "dropping queued value at shutdown");
                dropped += 1;
            }
        }
        let pending = self.engine.pending() as u64;
        if pending > 0 {
            warn!(fixture = %self.fixture, pending, "dropping delayed outputs at shutdown");
        }
        dropped += pending;
        self.publisher.stats().dropped(dropped);
        info!(fixture = %self.fixture, dropped, "graph worker stopped");
    }
}
