use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvError, after, never, select};
use hf_core::{DataType, SignalPath, Value};
use hf_dag::DelayLine;
use hf_project::FixtureSpec;
use tracing::{debug, info, trace, warn};

use crate::error::RuntimeFault;
use crate::publisher::Publisher;
use crate::work::WorkItem;

struct LaneRule {
    output: SignalPath,
    data_type: Option<DataType>,
    line: DelayLine,
}

/// Worker for one served actuator of a mirror fixture.
///
/// Each command is due at `received_at + delay` for every rule reading the
/// actuator. Deadlines only move forward, so outputs leave in command order.
/// Other actuators have their own lanes and never wait on this one.
pub struct MirrorLane {
    fixture: String,
    actuator: SignalPath,
    rules: Vec<LaneRule>,
    queue: Receiver<WorkItem>,
    shutdown: Receiver<()>,
    publisher: Publisher,
}

impl MirrorLane {
    pub fn new(
        fixture: &FixtureSpec,
        actuator: &SignalPath,
        queue: Receiver<WorkItem>,
        shutdown: Receiver<()>,
        publisher: Publisher,
    ) -> Self {
        let rules = fixture
            .rules_fed_by(actuator)
            .map(|rule| LaneRule {
                output: rule.output.clone(),
                data_type: rule.data_type,
                line: DelayLine::new(rule.delay),
            })
            .collect();
        Self {
            fixture: fixture.name.clone(),
            actuator: actuator.clone(),
            rules,
            queue,
            shutdown,
            publisher,
        }
    }

    pub fn run(mut self) {
        info!(fixture = %self.fixture, actuator = %self.actuator, rules = self.rules.len(), "mirror lane started");
        loop {
            let now = Instant::now();
            self.flush_due(now);

            let timer = match self.next_due(now) {
                Some(wait) => after(wait),
                None => never(),
            };
            let wake = select! {
                recv(self.queue) -> msg => msg.map(Some),
                recv(self.shutdown) -> _ => Err(RecvError),
                recv(timer) -> _ => Ok(None),
            };
            match wake {
                Ok(Some(item)) => self.accept(item),
                Ok(None) => {}
                Err(_) => break,
            }
        }
        self.drain();
    }

    fn accept(&mut self, item: WorkItem) {
        let WorkItem::Actuation(work) = item else {
            trace!(actuator = %self.actuator, "ignoring non-actuation item");
            return;
        };
        if self.rules.is_empty() {
            debug!(actuator = %self.actuator, value = %work.value, "no rule reads this actuator");
            return;
        }
        for rule in &mut self.rules {
            rule.line.arm(work.received_at, vec![Some(work.value.clone())], 0);
        }
    }

    fn next_due(&self, now: Instant) -> Option<Duration> {
        self.rules
            .iter()
            .filter_map(|rule| rule.line.time_until_due(now))
            .min()
    }

    fn flush_due(&mut self, now: Instant) {
        for rule in &mut self.rules {
            while let Some(armed) = rule.line.pop_due(now) {
                let Some(value) = armed.inputs.into_iter().next().flatten() else {
                    continue;
                };
                match coerce(&rule.output, rule.data_type, value) {
                    Ok(value) => self.publisher.publish_or_drop(&rule.output, value),
                    Err(fault) => self.publisher.stats().recover(fault),
                }
            }
        }
    }

    /// Log and count everything that will never be published.
    fn drain(&mut self) {
        let mut dropped = 0u64;
        for rule in &mut self.rules {
            if !rule.line.is_empty() {
                warn!(
                    actuator = %self.actuator,
                    signal = %rule.output,
                    pending = rule.line.len(),
                    "dropping delayed outputs at shutdown"
                );
                dropped += rule.line.len() as u64;
            }
        }
        for item in self.queue.try_iter() {
            if let Some(work) = item.work() {
                warn!(actuator = %self.actuator, value = %work.value, "dropping queued actuation at shutdown");
                dropped += 1;
            }
        }
        self.publisher.stats().dropped(dropped);
        info!(fixture = %self.fixture, actuator = %self.actuator, dropped, "mirror lane stopped");
    }
}

fn coerce(
    signal: &SignalPath,
    data_type: Option<DataType>,
    value: Value,
) -> Result<Value, RuntimeFault> {
    match data_type {
        None => Ok(value),
        Some(ty) => value.coerce_to(ty).map_err(|source| RuntimeFault::Coercion {
            signal: signal.to_string(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_value_widens() {
        let signal = SignalPath::new("Vehicle.Private.Test.Int32Actuator");
        let out = coerce(&signal, Some(DataType::Int32), Value::Int8(42)).unwrap();
        assert_eq!(out, Value::Int32(42));
    }

    #[test]
    fn overflow_is_a_coercion_fault() {
        let signal = SignalPath::new("Vehicle.Private.Test.Int8Actuator");
        let err = coerce(&signal, Some(DataType::Int8), Value::Int32(300)).unwrap_err();
        assert!(matches!(err, RuntimeFault::Coercion { .. }));
    }

    #[test]
    fn untyped_rule_passes_value_through() {
        let signal = SignalPath::new("Vehicle.Body.Horn.IsActive");
        assert_eq!(coerce(&signal, None, Value::Bool(true)).unwrap(), Value::Bool(true));
    }
}
