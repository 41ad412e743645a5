//! hf-project: fixture configuration file format, migration and validation.

pub mod migrate;
pub mod model;
pub mod schema;
pub mod validate;

use std::path::{Path, PathBuf};

pub use migrate::fixture_defs;
pub use model::{Effect, FixtureSet, FixtureSpec, SimulationRule, Strategy};
pub use schema::*;
pub use validate::{DEFAULT_FIXTURE_NAME, validate_fixture, validate_fixtures};

pub type ProjectResult<T> = Result<T, ConfigError>;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Fixture '{fixture}' has no 'serves' list or it is empty")]
    MissingServes { fixture: String },

    #[error("Fixture '{fixture}' is missing required field '{field}'")]
    MissingField {
        fixture: String,
        field: &'static str,
    },

    #[error("Invalid signal path '{path}' in fixture '{fixture}': {source}")]
    InvalidPath {
        fixture: String,
        path: String,
        source: hf_core::CoreError,
    },

    #[error("Unknown datatype '{name}' for signal {signal}")]
    UnknownDataType { signal: String, name: String },

    #[error("Invalid delay {seconds}s for signal {signal}: must be finite and non-negative")]
    InvalidDelay { signal: String, seconds: f64 },

    #[error("Signal {signal} declares both a delay and a transform; pick one")]
    ConflictingEffect { signal: String },

    #[error("Mirror rule for {signal} has no dependencies")]
    EmptyDependencies { signal: String },

    #[error("Rule for {signal} depends on its own output")]
    SelfDependency { signal: String },

    #[error("Signal {signal} is served twice (fixture '{fixture}')")]
    DuplicateServe { fixture: String, signal: String },

    #[error("Signal {signal} has more than one rule in fixture '{fixture}'")]
    DuplicateRule { fixture: String, signal: String },

    #[error("Fixture '{fixture}' requests the mirror strategy but has cross-signal rules")]
    StrategyIneligible { fixture: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported: {what}")]
    Unsupported { what: String },

    #[error("Failed to read config file: {path}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Load a fixture file; `.json` is read as JSON, anything else as YAML.
pub fn load(path: &Path) -> ProjectResult<FixtureSet> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        parse_json(&content)
    } else {
        parse_yaml(&content)
    }
}

pub fn parse_yaml(content: &str) -> ProjectResult<FixtureSet> {
    let document: FixtureDocument = serde_yaml::from_str(content)?;
    from_document(document)
}

pub fn parse_json(content: &str) -> ProjectResult<FixtureSet> {
    let document: FixtureDocument = serde_json::from_str(content)?;
    from_document(document)
}

pub fn from_document(document: FixtureDocument) -> ProjectResult<FixtureSet> {
    let defs = fixture_defs(document)?;
    validate_fixtures(&defs)
}
