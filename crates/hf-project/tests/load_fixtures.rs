use std::io::Write;
use std::time::Duration;

use hf_core::{DataType, SignalPath};
use hf_project::{ConfigError, Effect, Strategy, load, parse_json, parse_yaml};

const HVAC_FIXTURE: &str = r#"
fixture:
  name: HVAC Fixture
  serves:
    - Vehicle.Cabin.HVAC.Station.Row1.Left.Temperature
    - Vehicle.Private.Test.Int8Actuator
  mappings:
    - signal: Vehicle.Cabin.HVAC.Station.Row1.Left.Temperature
      depends_on:
        - Vehicle.Cabin.HVAC.Station.Row1.Left.Temperature
      datatype: int32
      delay: 0.5
    - signal: Vehicle.Private.Test.Int32Actuator
      depends_on:
        - Vehicle.Private.Test.Int8Actuator
      datatype: int32
      delay: 0.1
    - signal: Vehicle.Cabin.HVAC.AmbientAirTemperature
      depends_on:
        - Vehicle.Cabin.HVAC.Station.Row1.Left.Temperature
        - Vehicle.Exterior.AirTemperature
      datatype: float
      transform:
        code: "lowpass(deps['Vehicle.Cabin.HVAC.Station.Row1.Left.Temperature'], 0.1)"
"#;

#[test]
fn yaml_fixture_loads_into_graph_model() {
    let set = parse_yaml(HVAC_FIXTURE).expect("fixture should load");
    assert_eq!(set.len(), 1);

    let fixture = &set.fixtures[0];
    assert_eq!(fixture.name, "HVAC Fixture");
    assert_eq!(fixture.served.len(), 2);
    assert_eq!(fixture.rules.len(), 3);
    assert_eq!(fixture.strategy(), Strategy::Graph);

    let temp = fixture
        .rule(&SignalPath::new("Vehicle.Cabin.HVAC.Station.Row1.Left.Temperature"))
        .unwrap();
    assert_eq!(temp.delay, Duration::from_millis(500));
    assert_eq!(temp.data_type, Some(DataType::Int32));
    assert_eq!(temp.effect, Effect::Mirror);

    let ambient = fixture
        .rule(&SignalPath::new("Vehicle.Cabin.HVAC.AmbientAirTemperature"))
        .unwrap();
    assert!(matches!(ambient.effect, Effect::Expression(_)));

    let external = fixture.external_dependencies();
    assert_eq!(external.len(), 1);
    assert!(external.contains(&SignalPath::new("Vehicle.Exterior.AirTemperature")));
}

#[test]
fn served_dependencies_read_the_target_key() {
    let set = parse_yaml(HVAC_FIXTURE).unwrap();
    let fixture = &set.fixtures[0];
    let served = SignalPath::new("Vehicle.Private.Test.Int8Actuator");
    let external = SignalPath::new("Vehicle.Exterior.AirTemperature");
    assert_eq!(fixture.dependency_key(&served), served.target());
    assert_eq!(fixture.dependency_key(&external), external.actual());
}

#[test]
fn missing_serves_fails_to_load() {
    let yaml = r#"
fixture:
  name: Broken
  mappings:
    - signal: Vehicle.Cabin.Door.Row1.Left.IsLocked
      datatype: boolean
"#;
    let err = parse_yaml(yaml).unwrap_err();
    assert!(matches!(err, ConfigError::MissingServes { .. }), "{err}");
}

#[test]
fn missing_fixture_section_fails_to_load() {
    let err = parse_yaml("something_else: {}\n").unwrap_err();
    assert!(matches!(err, ConfigError::MissingField { field: "fixture", .. }), "{err}");
}

#[test]
fn unnamed_fixture_gets_default_name() {
    let yaml = r#"
fixture:
  serves: [Vehicle.Body.Horn.IsActive]
  mappings:
    - signal: Vehicle.Body.Horn.IsActive
"#;
    let set = parse_yaml(yaml).unwrap();
    assert_eq!(set.fixtures[0].name, hf_project::DEFAULT_FIXTURE_NAME);
    assert_eq!(set.fixtures[0].strategy(), Strategy::Mirror);
}

#[test]
fn legacy_json_fixture_list_is_migrated() {
    let json = r#"{
      "fixtures": [
        {
          "type": "actuator_mirror",
          "name": "Door Lock Fixture",
          "target_signal": "Vehicle.Cabin.Door.Row1.Left.IsLocked",
          "actual_signal": "Vehicle.Cabin.Door.Row1.Left.IsLocked",
          "delay": 0.1
        },
        {
          "type": "actuator_mirror",
          "name": "HVAC Fixture",
          "target_signal": "Vehicle.Cabin.HVAC.Station.Row1.Left.Temperature",
          "actual_signal": "Vehicle.Cabin.HVAC.Station.Row1.Left.Temperature",
          "delay": 0.15
        }
      ]
    }"#;
    let set = parse_json(json).unwrap();
    assert_eq!(set.len(), 2);
    assert_eq!(set.served_count(), 2);
    assert!(set.fixtures.iter().all(|f| f.strategy() == Strategy::Mirror));
    assert_eq!(set.fixtures[1].rules[0].delay, Duration::from_millis(150));

    let owner = set
        .owner_of(&SignalPath::new("Vehicle.Cabin.HVAC.Station.Row1.Left.Temperature"))
        .unwrap();
    assert_eq!(owner.name, "HVAC Fixture");
}

#[test]
fn misspelled_field_in_fixture_list_is_named() {
    let yaml = r#"
fixtures:
  - name: Window Fixture
    serves: [Vehicle.Cabin.Door.Row1.Left.Window.Position]
    mapings:
      - signal: Vehicle.Cabin.Door.Row1.Left.Window.Position
"#;
    let err = parse_yaml(yaml).unwrap_err().to_string();
    assert!(err.contains("Window Fixture"), "{err}");
    assert!(err.contains("mapings"), "{err}");

    let yaml = r#"
fixtures:
  - type: actuator_mirror
    name: Horn
    target_signal: Vehicle.Body.Horn.IsActive
    actual_signl: Vehicle.Body.Horn.IsActive
"#;
    let err = parse_yaml(yaml).unwrap_err().to_string();
    assert!(err.contains("actual_signl"), "{err}");
}

#[test]
fn load_dispatches_on_extension() {
    let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    yaml.write_all(HVAC_FIXTURE.as_bytes()).unwrap();
    assert_eq!(load(yaml.path()).unwrap().len(), 1);

    let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    json.write_all(
        br#"{"fixture": {"name": "Horn", "serves": ["Vehicle.Body.Horn.IsActive"], "mappings": []}}"#,
    )
    .unwrap();
    let set = load(json.path()).unwrap();
    assert_eq!(set.fixtures[0].name, "Horn");
    assert!(set.fixtures[0].rules.is_empty());
}

#[test]
fn missing_file_reports_path() {
    let err = load(std::path::Path::new("/nonexistent/fixture.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
