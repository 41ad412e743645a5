//! Migration of older document shapes to the current fixture schema.

use crate::ConfigError;
use crate::schema::{FixtureDef, FixtureDocument, FixtureEntryDef, LegacyMirrorDef, MappingDef};

pub const LEGACY_MIRROR_KIND: &str = "actuator_mirror";

/// Flatten a document into current-format fixture definitions.
pub fn fixture_defs(document: FixtureDocument) -> Result<Vec<FixtureDef>, ConfigError> {
    let mut defs = Vec::new();
    if let Some(fixture) = document.fixture {
        defs.push(fixture);
    }
    for entry in document.fixtures {
        match entry {
            FixtureEntryDef::Fixture(def) => defs.push(def),
            FixtureEntryDef::LegacyMirror(legacy) => defs.push(migrate_legacy_mirror(legacy)?),
        }
    }

    if defs.is_empty() {
        return Err(ConfigError::MissingField {
            fixture: "<document>".to_string(),
            field: "fixture",
        });
    }
    Ok(defs)
}

fn migrate_legacy_mirror(legacy: LegacyMirrorDef) -> Result<FixtureDef, ConfigError> {
    if legacy.kind != LEGACY_MIRROR_KIND {
        return Err(ConfigError::Unsupported {
            what: format!("fixture type '{}'", legacy.kind),
        });
    }

    Ok(FixtureDef {
        name: legacy.name,
        serves: Some(vec![legacy.target_signal.clone()]),
        mappings: Some(vec![MappingDef {
            signal: Some(legacy.actual_signal),
            depends_on: vec![legacy.target_signal],
            datatype: legacy.datatype,
            delay: legacy.delay,
            transform: None,
        }]),
        strategy: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy(kind: &str) -> LegacyMirrorDef {
        LegacyMirrorDef {
            kind: kind.to_string(),
            name: Some("Door Lock Fixture".to_string()),
            target_signal: "Vehicle.Cabin.Door.Row1.Left.IsLocked".to_string(),
            actual_signal: "Vehicle.Cabin.Door.Row1.Left.IsLocked".to_string(),
            delay: Some(0.1),
            datatype: None,
        }
    }

    #[test]
    fn legacy_mirror_becomes_served_mirror_rule() {
        let def = migrate_legacy_mirror(legacy(LEGACY_MIRROR_KIND)).unwrap();
        assert_eq!(
            def.serves.as_deref(),
            Some(&["Vehicle.Cabin.Door.Row1.Left.IsLocked".to_string()][..])
        );
        let mappings = def.mappings.unwrap();
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].delay, Some(0.1));
        assert_eq!(mappings[0].depends_on, vec![
            "Vehicle.Cabin.Door.Row1.Left.IsLocked".to_string()
        ]);
        assert!(mappings[0].transform.is_none());
    }

    #[test]
    fn unknown_legacy_kind_is_rejected() {
        let err = migrate_legacy_mirror(legacy("sensor_replay")).unwrap_err();
        assert!(matches!(err, ConfigError::Unsupported { .. }));
    }

    #[test]
    fn empty_document_is_rejected() {
        let err = fixture_defs(FixtureDocument::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "fixture", .. }));
    }
}
