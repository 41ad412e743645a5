//! Per-rule delay lines.
//!
//! Every input change arms one entry holding a snapshot of the rule's inputs
//! and the time it becomes due. Entries leave in FIFO order, so N changes
//! produce N outputs in the order they arrived.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use hf_core::Value;

/// One scheduled evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Armed {
    pub due: Instant,
    /// Input values at arming time, aligned with the rule's dependency list.
    pub inputs: Vec<Option<Value>>,
    /// Index of the input whose change armed this entry.
    pub trigger: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DelayLine {
    delay: Duration,
    pending: VecDeque<Armed>,
}

impl DelayLine {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: VecDeque::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule an evaluation `delay` after `changed_at`.
    pub fn arm(&mut self, changed_at: Instant, inputs: Vec<Option<Value>>, trigger: usize) {
        let due = changed_at + self.delay;
        // Inputs can be fed out of timestamp order; never let a later
        // change overtake an earlier one.
        let due = match self.pending.back() {
            Some(last) if last.due > due => last.due,
            _ => due,
        };
        self.pending.push_back(Armed {
            due,
            inputs,
            trigger,
        });
    }

    /// Remove and return the next entry if it is due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<Armed> {
        if self.pending.front().is_some_and(|a| a.due <= now) {
            self.pending.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Time until the next entry is due.
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.pending
            .front()
            .map(|a| a.due.saturating_duration_since(now))
    }
}
