//! Reference dependency-graph engine.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use hf_core::{SignalKey, Value};
use hf_project::{Effect, FixtureSpec, SimulationRule};
use tracing::{debug, trace};

use crate::delay::{Armed, DelayLine};
use crate::engine::{RuleOutcome, RuleOutput, SignalUpdate, TransformEngine};
use crate::error::{EngineResult, EvaluationError};
use crate::expression::{Evaluation, ExpressionContext, ExpressionEvaluator, NoExpressions};
use crate::order::evaluation_order;

struct RuleNode {
    rule: SimulationRule,
    /// Keys the rule reads, aligned with `rule.depends_on`.
    inputs: Vec<SignalKey>,
    line: DelayLine,
    /// Expression asked to be evaluated again on the next pass.
    reevaluate: bool,
}

/// Engine that evaluates a fixture's rules in dependency order.
///
/// Values live in two key spaces: commanded values of served actuators under
/// [`SignalKey::Target`], everything published or observed under
/// [`SignalKey::Actual`]. Rule outputs are written to the Actual space only.
pub struct DagEngine {
    fixture: String,
    nodes: Vec<RuleNode>,
    values: HashMap<SignalKey, Value>,
    evaluator: Box<dyn ExpressionEvaluator>,
}

impl DagEngine {
    pub fn new(fixture: &FixtureSpec, evaluator: Box<dyn ExpressionEvaluator>) -> EngineResult<Self> {
        let order = evaluation_order(fixture)?;
        let nodes = order
            .into_iter()
            .map(|idx| {
                let rule = fixture.rules[idx].clone();
                let inputs = rule
                    .depends_on
                    .iter()
                    .map(|dep| fixture.dependency_key(dep))
                    .collect();
                RuleNode {
                    line: DelayLine::new(rule.delay),
                    rule,
                    inputs,
                    reevaluate: false,
                }
            })
            .collect();

        Ok(Self {
            fixture: fixture.name.clone(),
            nodes,
            values: HashMap::new(),
            evaluator,
        })
    }

    /// Engine without an expression backend; expression rules fail per cycle.
    pub fn without_expressions(fixture: &FixtureSpec) -> EngineResult<Self> {
        Self::new(fixture, Box::new(NoExpressions))
    }

    pub fn value(&self, key: &SignalKey) -> Option<&Value> {
        self.values.get(key)
    }

    /// Store a changed value and arm every rule that reads it.
    fn apply(&mut self, key: SignalKey, value: Value, at: Instant) {
        let Self { nodes, values, .. } = self;
        values.insert(key.clone(), value);

        for node in nodes.iter_mut() {
            if let Some(trigger) = node.inputs.iter().position(|k| *k == key) {
                let snapshot = node.inputs.iter().map(|k| values.get(k).cloned()).collect();
                trace!(rule = %node.rule.output, input = %key, "rule armed");
                node.line.arm(at, snapshot, trigger);
            }
        }
    }

    fn fire(&mut self, idx: usize, armed: &Armed, now: Instant) -> RuleOutcome {
        let node = &self.nodes[idx];
        let rule = &node.rule;

        let (outcome, reevaluate) = match &rule.effect {
            Effect::Mirror => match armed.inputs.get(armed.trigger).cloned().flatten() {
                Some(value) => (coerce(rule, value), false),
                None => (RuleOutcome::NotReady, false),
            },
            Effect::Expression(code) => {
                let deps: BTreeMap<_, _> = rule
                    .depends_on
                    .iter()
                    .zip(armed.inputs.iter())
                    .filter_map(|(path, value)| value.clone().map(|v| (path.clone(), v)))
                    .collect();
                let ctx = ExpressionContext {
                    output: &rule.output,
                    expression: code,
                    deps: &deps,
                    now,
                };
                match self.evaluator.evaluate(&ctx) {
                    Ok(Evaluation::Ready(value)) => (coerce(rule, value), false),
                    Ok(Evaluation::Settling(value)) => (coerce(rule, value), true),
                    Ok(Evaluation::Pending) => (RuleOutcome::NotReady, true),
                    Err(err) => (RuleOutcome::Failed(err), false),
                }
            }
        };

        self.nodes[idx].reevaluate = reevaluate;
        outcome
    }

    fn record(&mut self, idx: usize, outcome: RuleOutcome, now: Instant, out: &mut Vec<RuleOutput>) {
        let signal = self.nodes[idx].rule.output.clone();
        if let RuleOutcome::Ready(value) = &outcome {
            debug!(fixture = %self.fixture, signal = %signal, value = %value, "rule produced output");
            self.apply(signal.actual(), value.clone(), now);
        }
        out.push(RuleOutput { signal, outcome });
    }
}

fn coerce(rule: &SimulationRule, value: Value) -> RuleOutcome {
    match rule.data_type {
        None => RuleOutcome::Ready(value),
        Some(ty) => match value.coerce_to(ty) {
            Ok(value) => RuleOutcome::Ready(value),
            Err(source) => RuleOutcome::Failed(EvaluationError::Coercion {
                signal: rule.output.to_string(),
                source,
            }),
        },
    }
}

impl TransformEngine for DagEngine {
    fn evaluate(&mut self, updates: &[SignalUpdate], now: Instant) -> Vec<RuleOutput> {
        for update in updates {
            self.apply(update.key.clone(), update.value.clone(), update.at);
        }

        let mut outputs = Vec::new();
        for idx in 0..self.nodes.len() {
            let mut fired = false;
            while let Some(armed) = self.nodes[idx].line.pop_due(now) {
                let outcome = self.fire(idx, &armed, now);
                self.record(idx, outcome, now, &mut outputs);
                fired = true;
            }

            if !fired && self.nodes[idx].reevaluate && self.nodes[idx].line.is_empty() {
                let node = &self.nodes[idx];
                let armed = Armed {
                    due: now,
                    inputs: node.inputs.iter().map(|k| self.values.get(k).cloned()).collect(),
                    trigger: 0,
                };
                let outcome = self.fire(idx, &armed, now);
                self.record(idx, outcome, now, &mut outputs);
                fired = true;
            }

            if !fired && !self.nodes[idx].line.is_empty() {
                outputs.push(RuleOutput {
                    signal: self.nodes[idx].rule.output.clone(),
                    outcome: RuleOutcome::NotReady,
                });
            }
        }
        outputs
    }

    fn required_inputs(&self) -> Vec<SignalKey> {
        let mut keys: Vec<SignalKey> = Vec::new();
        for node in &self.nodes {
            for key in &node.inputs {
                let produced = self.nodes.iter().any(|n| n.rule.output.actual() == *key);
                if !produced && !keys.contains(key) {
                    keys.push(key.clone());
                }
            }
        }
        keys
    }

    fn pending(&self) -> usize {
        self.nodes.iter().map(|n| n.line.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use hf_core::SignalPath;

    fn fixture(yaml: &str) -> FixtureSpec {
        hf_project::parse_yaml(yaml).unwrap().fixtures.remove(0)
    }

    fn command(path: &str, value: Value, at: Instant) -> SignalUpdate {
        SignalUpdate::new(SignalPath::new(path).target(), value, at)
    }

    fn ready(outputs: &[RuleOutput]) -> Vec<(String, Value)> {
        outputs
            .iter()
            .filter_map(|o| o.ready_value().map(|v| (o.signal.to_string(), v.clone())))
            .collect()
    }

    const DOOR: &str = r#"
fixture:
  name: Door
  serves: [Vehicle.Cabin.Door.Row1.Left.IsLocked]
  strategy: graph
  mappings:
    - signal: Vehicle.Cabin.Door.Row1.Left.IsLocked
      datatype: boolean
      delay: 0.2
"#;

    #[test]
    fn delayed_mirror_waits_for_its_delay() {
        let spec = fixture(DOOR);
        let mut engine = DagEngine::without_expressions(&spec).unwrap();
        let t0 = Instant::now();

        let out = engine.evaluate(
            &[command("Vehicle.Cabin.Door.Row1.Left.IsLocked", Value::Bool(true), t0)],
            t0,
        );
        assert!(ready(&out).is_empty());
        assert_eq!(out[0].outcome, RuleOutcome::NotReady);

        let out = engine.evaluate(&[], t0 + Duration::from_millis(150));
        assert!(ready(&out).is_empty());
        assert_eq!(engine.pending(), 1);

        let out = engine.evaluate(&[], t0 + Duration::from_millis(200));
        assert_eq!(
            ready(&out),
            vec![(
                "Vehicle.Cabin.Door.Row1.Left.IsLocked".to_string(),
                Value::Bool(true)
            )]
        );

        // nothing left to emit
        assert_eq!(engine.pending(), 0);
        assert!(engine.evaluate(&[], t0 + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn echoed_actual_value_is_not_a_command() {
        let spec = fixture(DOOR);
        let mut engine = DagEngine::without_expressions(&spec).unwrap();
        let path = SignalPath::new("Vehicle.Cabin.Door.Row1.Left.IsLocked");
        let t0 = Instant::now();

        engine.evaluate(&[command(path.as_str(), Value::Bool(true), t0)], t0);
        engine.evaluate(&[], t0 + Duration::from_millis(200));
        assert_eq!(engine.value(&path.actual()), Some(&Value::Bool(true)));
        assert_eq!(engine.value(&path.target()), Some(&Value::Bool(true)));

        let echo = SignalUpdate::new(path.actual(), Value::Bool(false), t0);
        let out = engine.evaluate(&[echo], t0 + Duration::from_secs(1));
        assert!(out.is_empty());
        assert_eq!(engine.value(&path.target()), Some(&Value::Bool(true)));
    }

    #[test]
    fn rapid_commands_all_emit_in_order() {
        let spec = fixture(DOOR);
        let mut engine = DagEngine::without_expressions(&spec).unwrap();
        let t0 = Instant::now();
        let path = "Vehicle.Cabin.Door.Row1.Left.IsLocked";

        let updates: Vec<_> = (0..5)
            .map(|i| command(path, Value::Bool(i % 2 == 0), t0 + Duration::from_millis(i)))
            .collect();
        engine.evaluate(&updates, t0);

        let out = engine.evaluate(&[], t0 + Duration::from_millis(300));
        let values: Vec<_> = ready(&out).into_iter().map(|(_, v)| v).collect();
        assert_eq!(
            values,
            vec![
                Value::Bool(true),
                Value::Bool(false),
                Value::Bool(true),
                Value::Bool(false),
                Value::Bool(true)
            ]
        );
    }

    const CROSS: &str = r#"
fixture:
  name: Cross
  serves: [Vehicle.Test.Int8Actuator, Vehicle.Test.Other]
  mappings:
    - signal: Vehicle.Test.Int32Actuator
      depends_on: [Vehicle.Test.Int8Actuator]
      datatype: int32
      delay: 0.1
    - signal: Vehicle.Test.Narrow
      depends_on: [Vehicle.Test.Int8Actuator]
      datatype: uint8
    - signal: Vehicle.Test.Other
      datatype: int32
"#;

    #[test]
    fn narrow_input_widens_into_wider_output() {
        let spec = fixture(CROSS);
        let mut engine = DagEngine::without_expressions(&spec).unwrap();
        let t0 = Instant::now();

        engine.evaluate(&[command("Vehicle.Test.Int8Actuator", Value::Int8(42), t0)], t0);
        let out = engine.evaluate(&[], t0 + Duration::from_millis(100));
        assert_eq!(
            ready(&out),
            vec![("Vehicle.Test.Int32Actuator".to_string(), Value::Int32(42))]
        );
    }

    #[test]
    fn out_of_range_output_fails_without_wrapping() {
        let spec = fixture(CROSS);
        let mut engine = DagEngine::without_expressions(&spec).unwrap();
        let t0 = Instant::now();

        let out = engine.evaluate(&[command("Vehicle.Test.Int8Actuator", Value::Int8(-5), t0)], t0);
        let narrow = out
            .iter()
            .find(|o| o.signal.as_str() == "Vehicle.Test.Narrow")
            .unwrap();
        assert!(matches!(
            narrow.outcome,
            RuleOutcome::Failed(EvaluationError::Coercion { .. })
        ));
        assert!(engine.value(&SignalPath::new("Vehicle.Test.Narrow").actual()).is_none());
    }

    #[test]
    fn unrelated_actuator_produces_no_output() {
        let spec = fixture(CROSS);
        let mut engine = DagEngine::without_expressions(&spec).unwrap();
        let t0 = Instant::now();

        let out = engine.evaluate(&[command("Vehicle.Test.Other", Value::Int32(7), t0)], t0);
        assert_eq!(
            ready(&out),
            vec![("Vehicle.Test.Other".to_string(), Value::Int32(7))]
        );
        let later = engine.evaluate(&[], t0 + Duration::from_secs(1));
        assert!(ready(&later).is_empty());
    }

    #[test]
    fn each_rule_measures_its_own_delay() {
        let spec = fixture(
            r#"
fixture:
  serves: [A]
  mappings:
    - signal: Fast
      depends_on: [A]
      delay: 0.1
    - signal: Slow
      depends_on: [A]
      delay: 0.3
"#,
        );
        let mut engine = DagEngine::without_expressions(&spec).unwrap();
        let t0 = Instant::now();
        engine.evaluate(&[command("A", Value::Int32(1), t0)], t0);

        let out = engine.evaluate(&[], t0 + Duration::from_millis(100));
        assert_eq!(ready(&out), vec![("Fast".to_string(), Value::Int32(1))]);
        let out = engine.evaluate(&[], t0 + Duration::from_millis(300));
        assert_eq!(ready(&out), vec![("Slow".to_string(), Value::Int32(1))]);
    }

    #[test]
    fn chained_rules_propagate_in_one_pass() {
        let spec = fixture(
            r#"
fixture:
  serves: [A]
  mappings:
    - signal: C
      depends_on: [B]
      datatype: double
    - signal: B
      depends_on: [A]
      delay: 0.1
"#,
        );
        let mut engine = DagEngine::without_expressions(&spec).unwrap();
        let t0 = Instant::now();
        engine.evaluate(&[command("A", Value::Int16(3), t0)], t0);

        let out = engine.evaluate(&[], t0 + Duration::from_millis(100));
        assert_eq!(
            ready(&out),
            vec![
                ("B".to_string(), Value::Int16(3)),
                ("C".to_string(), Value::Double(3.0))
            ]
        );
    }

    #[test]
    fn failing_expression_does_not_block_other_rules() {
        let spec = fixture(
            r#"
fixture:
  serves: [A]
  mappings:
    - signal: A
    - signal: Derived
      depends_on: [A]
      transform:
        code: "deps['A'] *"
"#,
        );
        let mut engine = DagEngine::without_expressions(&spec).unwrap();
        let t0 = Instant::now();
        let out = engine.evaluate(&[command("A", Value::Int32(9), t0)], t0);

        assert_eq!(ready(&out), vec![("A".to_string(), Value::Int32(9))]);
        let derived = out.iter().find(|o| o.signal.as_str() == "Derived").unwrap();
        assert!(matches!(
            derived.outcome,
            RuleOutcome::Failed(EvaluationError::Unsupported { .. })
        ));
    }

    #[test]
    fn settling_expression_keeps_evaluating_on_empty_passes() {
        let spec = fixture(
            r#"
fixture:
  serves: [Setpoint]
  mappings:
    - signal: Temperature
      depends_on: [Setpoint]
      datatype: double
      transform:
        code: "approach"
"#,
        );
        // Moves halfway to the commanded value on every pass
        let mut current = 0.0_f64;
        let evaluator = move |ctx: &ExpressionContext<'_>| -> Result<Evaluation, EvaluationError> {
            let target = ctx
                .deps
                .get(&SignalPath::new("Setpoint"))
                .and_then(Value::as_f64)
                .ok_or_else(|| EvaluationError::Expression {
                    signal: ctx.output.to_string(),
                    message: "no setpoint".to_string(),
                })?;
            current += (target - current) / 2.0;
            if (target - current).abs() < 1.0 {
                Ok(Evaluation::Ready(Value::Double(target)))
            } else {
                Ok(Evaluation::Settling(Value::Double(current)))
            }
        };
        let mut engine = DagEngine::new(&spec, Box::new(evaluator)).unwrap();
        let t0 = Instant::now();

        let out = engine.evaluate(&[command("Setpoint", Value::Int32(8), t0)], t0);
        assert_eq!(ready(&out), vec![("Temperature".to_string(), Value::Double(4.0))]);

        let mut seen = Vec::new();
        for step in 1..10 {
            let out = engine.evaluate(&[], t0 + Duration::from_millis(100 * step));
            seen.extend(ready(&out).into_iter().map(|(_, v)| v));
        }
        assert_eq!(
            seen,
            vec![Value::Double(6.0), Value::Double(7.0), Value::Double(8.0)]
        );
    }

    #[test]
    fn required_inputs_are_targets_and_external_signals() {
        let spec = fixture(
            r#"
fixture:
  serves: [A]
  mappings:
    - signal: B
      depends_on: [A, Outside]
    - signal: C
      depends_on: [B]
"#,
        );
        let engine = DagEngine::without_expressions(&spec).unwrap();
        let inputs = engine.required_inputs();
        assert_eq!(
            inputs,
            vec![SignalPath::new("A").target(), SignalPath::new("Outside").actual()]
        );
    }
}
