//! Signal catalog for the built-in broker.

use std::path::Path;

use hf_broker::{SignalCatalog, SignalKind};
use hf_core::DataType;
use hf_project::FixtureSet;

use crate::error::{CliError, CliResult};

pub fn load_vss(path: &Path) -> CliResult<SignalCatalog> {
    let content = std::fs::read_to_string(path).map_err(|source| CliError::CatalogRead {
        path: path.to_path_buf(),
        source,
    })?;
    SignalCatalog::from_vss_json(&content).map_err(|source| CliError::Catalog {
        path: path.to_path_buf(),
        source,
    })
}

/// Catalog covering exactly the signals the fixtures reference.
///
/// Served signals and rule outputs take the rule's datatype; anything
/// untyped is a double. Served signals are actuators, the rest sensors.
pub fn from_fixtures(fixtures: &FixtureSet) -> SignalCatalog {
    let mut catalog = SignalCatalog::new();

    for fixture in &fixtures.fixtures {
        for served in &fixture.served {
            let data_type = fixture
                .rule(served)
                .and_then(|rule| rule.data_type)
                .unwrap_or(DataType::Double);
            catalog.insert(served.clone(), SignalKind::Actuator, data_type);
        }
    }

    for fixture in &fixtures.fixtures {
        for rule in &fixture.rules {
            if !catalog.contains(&rule.output) {
                let data_type = rule.data_type.unwrap_or(DataType::Double);
                catalog.insert(rule.output.clone(), SignalKind::Sensor, data_type);
            }
        }
    }

    for path in fixtures.referenced_signals() {
        if !catalog.contains(&path) {
            catalog.insert(path, SignalKind::Sensor, DataType::Double);
        }
    }
    catalog
}
