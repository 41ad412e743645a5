//! Fail-fast startup: any resolution, registration or connection failure
//! leaves the runner STOPPED with nothing registered.

use std::sync::Arc;
use std::time::Duration;

use hf_broker::{
    BrokerClient, InMemoryBroker, SignalCatalog, SignalHandle, SignalKind, SignalResolver,
};
use hf_core::{DataType, SignalPath, Value};
use hf_project::ConfigError;
use hf_runner::{FixtureRunner, LifecycleState, RunnerOptions, StartupError};

const DOOR: &str = "Vehicle.Cabin.Door.Row1.Left.IsLocked";
const HORN: &str = "Vehicle.Body.Horn.IsActive";

const DOOR_AND_HORN: &str = r#"
fixture:
  name: Body Fixture
  serves:
    - Vehicle.Cabin.Door.Row1.Left.IsLocked
    - Vehicle.Body.Horn.IsActive
  mappings:
    - signal: Vehicle.Cabin.Door.Row1.Left.IsLocked
      datatype: boolean
      delay: 0.2
    - signal: Vehicle.Body.Horn.IsActive
      datatype: boolean
"#;

fn broker_with(paths: &[&str]) -> InMemoryBroker {
    let mut catalog = SignalCatalog::new();
    for path in paths {
        catalog.insert(SignalPath::new(*path), SignalKind::Actuator, DataType::Boolean);
    }
    InMemoryBroker::new(catalog)
}

fn try_start(
    broker: &InMemoryBroker,
    yaml: &str,
    options: RunnerOptions,
) -> (FixtureRunner, Result<(), StartupError>) {
    let fixtures = hf_project::parse_yaml(yaml).unwrap();
    let client: Arc<dyn BrokerClient> = Arc::new(broker.connect());
    let mut runner = FixtureRunner::new(options);
    let result = runner.start(&fixtures, broker, client);
    (runner, result)
}

#[test]
fn config_without_serves_never_reaches_the_broker() {
    let yaml = r#"
fixture:
  name: Broken
  mappings:
    - signal: Vehicle.Cabin.Door.Row1.Left.IsLocked
      datatype: boolean
"#;
    let broker = broker_with(&[DOOR]);
    let err: StartupError = hf_project::parse_yaml(yaml).unwrap_err().into();
    assert!(matches!(
        err,
        StartupError::Config(ConfigError::MissingServes { .. })
    ));
    assert!(broker.served_signals().is_empty());
}

#[test]
fn unknown_signal_is_fatal_and_nothing_is_served() {
    let broker = broker_with(&[DOOR]);
    let (runner, result) = try_start(&broker, DOOR_AND_HORN, RunnerOptions::default());

    let err = result.unwrap_err();
    assert!(
        matches!(&err, StartupError::Resolution { signal, .. } if signal == HORN),
        "{err}"
    );
    assert_eq!(runner.state(), LifecycleState::Stopped);
    assert!(broker.served_signals().is_empty());
}

#[test]
fn ownership_conflict_is_fatal_and_partial_registration_is_undone() {
    let broker = broker_with(&[DOOR, HORN]);
    let other = broker.connect();
    let horn = broker.resolve(&SignalPath::new(HORN)).unwrap();
    other
        .serve(&horn, Arc::new(|_: &SignalHandle, _: Value| {}))
        .unwrap();

    let (runner, result) = try_start(&broker, DOOR_AND_HORN, RunnerOptions::default());

    assert!(matches!(result, Err(StartupError::Registration { .. })));
    assert_eq!(runner.state(), LifecycleState::Stopped);
    // only the other provider's claim is left
    assert_eq!(broker.served_signals(), vec![SignalPath::new(HORN)]);
}

#[test]
fn unreachable_broker_times_out() {
    let broker = broker_with(&[DOOR, HORN]);
    broker.set_online(false);
    let options = RunnerOptions {
        ready_timeout: Duration::from_millis(50),
        ..RunnerOptions::default()
    };

    let (runner, result) = try_start(&broker, DOOR_AND_HORN, options);

    assert!(matches!(result, Err(StartupError::Connection(_))));
    assert_eq!(runner.state(), LifecycleState::Stopped);
    assert!(broker.served_signals().is_empty());
}

#[test]
fn runner_cannot_be_started_twice() {
    let broker = broker_with(&[DOOR, HORN]);
    let (mut runner, result) = try_start(&broker, DOOR_AND_HORN, RunnerOptions::default());
    result.unwrap();

    let fixtures = hf_project::parse_yaml(DOOR_AND_HORN).unwrap();
    let client: Arc<dyn BrokerClient> = Arc::new(broker.connect());
    let err = runner.start(&fixtures, &broker, client).unwrap_err();
    assert!(matches!(err, StartupError::InvalidState(LifecycleState::Running)));

    runner.stop();
    assert_eq!(runner.state(), LifecycleState::Stopped);
    assert!(broker.served_signals().is_empty());
}
