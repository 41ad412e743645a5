//! Fixture validation: schema definitions → validated model.

use std::collections::HashSet;
use std::time::Duration;

use hf_core::{DataType, SignalPath};

use crate::ConfigError;
use crate::model::{Effect, FixtureSet, FixtureSpec, SimulationRule, Strategy};
use crate::schema::{FixtureDef, MappingDef};

pub const DEFAULT_FIXTURE_NAME: &str = "Unnamed Fixture";

pub fn validate_fixtures(defs: &[FixtureDef]) -> Result<FixtureSet, ConfigError> {
    let mut owners: HashSet<SignalPath> = HashSet::new();
    let mut fixtures = Vec::with_capacity(defs.len());

    for def in defs {
        let spec = validate_fixture(def)?;
        for path in &spec.served {
            if !owners.insert(path.clone()) {
                return Err(ConfigError::DuplicateServe {
                    fixture: spec.name.clone(),
                    signal: path.to_string(),
                });
            }
        }
        fixtures.push(spec);
    }

    Ok(FixtureSet { fixtures })
}

pub fn validate_fixture(def: &FixtureDef) -> Result<FixtureSpec, ConfigError> {
    let name = def
        .name
        .clone()
        .unwrap_or_else(|| DEFAULT_FIXTURE_NAME.to_string());

    let serves = match &def.serves {
        Some(serves) if !serves.is_empty() => serves,
        _ => return Err(ConfigError::MissingServes { fixture: name }),
    };

    let mut served = Vec::with_capacity(serves.len());
    for raw in serves {
        let path = parse_path(&name, raw)?;
        if served.contains(&path) {
            return Err(ConfigError::DuplicateServe {
                fixture: name,
                signal: path.to_string(),
            });
        }
        served.push(path);
    }

    let mappings = def.mappings.as_ref().ok_or_else(|| ConfigError::MissingField {
        fixture: name.clone(),
        field: "mappings",
    })?;

    let mut rules: Vec<SimulationRule> = Vec::with_capacity(mappings.len());
    for mapping in mappings {
        let rule = validate_rule(&name, &served, mapping)?;
        if rules.iter().any(|r| r.output == rule.output) {
            return Err(ConfigError::DuplicateRule {
                fixture: name,
                signal: rule.output.to_string(),
            });
        }
        rules.push(rule);
    }

    let mut spec = FixtureSpec {
        name,
        served,
        rules,
        strategy: Strategy::Graph,
    };
    spec.strategy = select_strategy(&spec, def.strategy.as_deref())?;
    Ok(spec)
}

fn validate_rule(
    fixture: &str,
    served: &[SignalPath],
    mapping: &MappingDef,
) -> Result<SimulationRule, ConfigError> {
    let raw_output = mapping
        .signal
        .as_deref()
        .ok_or_else(|| ConfigError::MissingField {
            fixture: fixture.to_string(),
            field: "signal",
        })?;
    let output = parse_path(fixture, raw_output)?;

    let data_type = match &mapping.datatype {
        Some(text) => Some(text.parse::<DataType>().map_err(|_| {
            ConfigError::UnknownDataType {
                signal: output.to_string(),
                name: text.clone(),
            }
        })?),
        None => None,
    };

    let delay = match mapping.delay {
        None => Duration::ZERO,
        Some(seconds) if seconds.is_finite() && seconds >= 0.0 => {
            Duration::from_millis((seconds * 1000.0).round() as u64)
        }
        Some(seconds) => {
            return Err(ConfigError::InvalidDelay {
                signal: output.to_string(),
                seconds,
            });
        }
    };

    let effect = match &mapping.transform {
        Some(_) if !delay.is_zero() => {
            return Err(ConfigError::ConflictingEffect {
                signal: output.to_string(),
            });
        }
        Some(transform) => Effect::Expression(transform.code.clone()),
        None => Effect::Mirror,
    };

    let mut depends_on = Vec::with_capacity(mapping.depends_on.len());
    for raw in &mapping.depends_on {
        let dep = parse_path(fixture, raw)?;
        if !depends_on.contains(&dep) {
            depends_on.push(dep);
        }
    }

    let output_served = served.contains(&output);
    if depends_on.contains(&output) && !output_served {
        return Err(ConfigError::SelfDependency {
            signal: output.to_string(),
        });
    }
    if depends_on.is_empty() && matches!(effect, Effect::Mirror) {
        if output_served {
            depends_on.push(output.clone());
        } else {
            return Err(ConfigError::EmptyDependencies {
                signal: output.to_string(),
            });
        }
    }

    Ok(SimulationRule {
        output,
        depends_on,
        data_type,
        delay,
        effect,
    })
}

fn select_strategy(spec: &FixtureSpec, requested: Option<&str>) -> Result<Strategy, ConfigError> {
    let eligible = spec.mirror_eligible();
    match requested.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("auto") => Ok(if eligible {
            Strategy::Mirror
        } else {
            Strategy::Graph
        }),
        Some("graph") => Ok(Strategy::Graph),
        Some("mirror") if eligible => Ok(Strategy::Mirror),
        Some("mirror") => Err(ConfigError::StrategyIneligible {
            fixture: spec.name.clone(),
        }),
        Some(other) => Err(ConfigError::InvalidValue {
            field: "strategy".to_string(),
            value: other.to_string(),
            reason: "expected auto, mirror or graph".to_string(),
        }),
    }
}

fn parse_path(fixture: &str, raw: &str) -> Result<SignalPath, ConfigError> {
    SignalPath::parse(raw).map_err(|source| ConfigError::InvalidPath {
        fixture: fixture.to_string(),
        path: raw.to_string(),
        source,
    })
}
