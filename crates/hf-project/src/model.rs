//! Validated, in-memory fixture configuration.

use std::collections::BTreeSet;
use std::time::Duration;

use hf_core::{DataType, SignalKey, SignalPath};

/// How a fixture turns commands into published values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Per-actuator delayed republish of the commanded value.
    Mirror,
    /// Commands feed a transform engine that is re-queried on a fixed period.
    Graph,
}

/// How one output signal's value is computed.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Output is the most recently changed dependency value.
    Mirror,
    /// Output is computed by the transform engine from this expression text.
    ///
    /// The text is opaque here; syntax errors surface at evaluation time.
    Expression(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationRule {
    pub output: SignalPath,
    pub depends_on: Vec<SignalPath>,
    /// `None` publishes the dependency's own type unchanged.
    pub data_type: Option<DataType>,
    pub delay: Duration,
    pub effect: Effect,
}

impl SimulationRule {
    pub fn is_mirror(&self) -> bool {
        matches!(self.effect, Effect::Mirror)
    }
}

/// One simulated hardware unit.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureSpec {
    pub name: String,
    /// Actuators this fixture owns, in declaration order.
    pub served: Vec<SignalPath>,
    /// Rules in declaration order; outputs are unique.
    pub rules: Vec<SimulationRule>,
    pub(crate) strategy: Strategy,
}

impl FixtureSpec {
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn serves(&self, path: &SignalPath) -> bool {
        self.served.contains(path)
    }

    pub fn rule(&self, output: &SignalPath) -> Option<&SimulationRule> {
        self.rules.iter().find(|r| &r.output == output)
    }

    /// Rules that list `path` as a dependency.
    pub fn rules_fed_by<'a>(
        &'a self,
        path: &'a SignalPath,
    ) -> impl Iterator<Item = &'a SimulationRule> + 'a {
        self.rules.iter().filter(move |r| r.depends_on.contains(path))
    }

    /// Key a dependency path is read from.
    ///
    /// A served actuator is read from its commanded value, never from its
    /// published one.
    pub fn dependency_key(&self, path: &SignalPath) -> SignalKey {
        if self.serves(path) {
            path.target()
        } else {
            path.actual()
        }
    }

    /// Dependencies that are neither served nor produced by a rule of this
    /// fixture. Their values come from other broker participants.
    pub fn external_dependencies(&self) -> BTreeSet<SignalPath> {
        self.rules
            .iter()
            .flat_map(|r| r.depends_on.iter())
            .filter(|dep| !self.serves(dep) && self.rule(dep).is_none())
            .cloned()
            .collect()
    }

    /// Every path the fixture touches: served actuators, outputs, dependencies.
    pub fn referenced_signals(&self) -> BTreeSet<SignalPath> {
        let mut all: BTreeSet<SignalPath> = self.served.iter().cloned().collect();
        for rule in &self.rules {
            all.insert(rule.output.clone());
            all.extend(rule.depends_on.iter().cloned());
        }
        all
    }

    /// True when every rule is a mirror of exactly one served actuator.
    pub fn mirror_eligible(&self) -> bool {
        self.rules.iter().all(|r| {
            r.is_mirror() && r.depends_on.len() == 1 && self.serves(&r.depends_on[0])
        })
    }
}

/// All fixtures loaded from one document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FixtureSet {
    pub fixtures: Vec<FixtureSpec>,
}

impl FixtureSet {
    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    /// Fixture that owns the given actuator.
    pub fn owner_of(&self, path: &SignalPath) -> Option<&FixtureSpec> {
        self.fixtures.iter().find(|f| f.serves(path))
    }

    pub fn served_count(&self) -> usize {
        self.fixtures.iter().map(|f| f.served.len()).sum()
    }

    pub fn referenced_signals(&self) -> BTreeSet<SignalPath> {
        self.fixtures
            .iter()
            .flat_map(|f| f.referenced_signals())
            .collect()
    }
}
