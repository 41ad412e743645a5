//! Fixture document schema definitions.
//!
//! These types mirror the file format one-to-one. Nothing here is validated;
//! [`crate::validate`] turns a document into a [`crate::model::FixtureSet`].

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Root of a fixture configuration file.
///
/// A document carries either one `fixture` object or a `fixtures` list.
///
/// ```yaml
/// fixture:
///   name: Door Lock Fixture
///   serves:
///     - Vehicle.Cabin.Door.Row1.Left.IsLocked
///   mappings:
///     - signal: Vehicle.Cabin.Door.Row1.Left.IsLocked
///       depends_on: [Vehicle.Cabin.Door.Row1.Left.IsLocked]
///       datatype: boolean
///       delay: 0.2
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FixtureDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixture: Option<FixtureDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fixtures: Vec<FixtureEntryDef>,
}

/// Entry of the `fixtures` list.
///
/// An entry with a `type` key is a legacy entry; anything else is a full
/// fixture. Errors name the offending field of whichever shape was chosen.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum FixtureEntryDef {
    LegacyMirror(LegacyMirrorDef),
    Fixture(FixtureDef),
}

impl<'de> Deserialize<'de> for FixtureEntryDef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entry = serde_json::Value::deserialize(deserializer)?;
        let name = entry
            .get("name")
            .and_then(|n| n.as_str())
            .unwrap_or("<unnamed>")
            .to_string();
        let parsed = if entry.get("type").is_some() {
            LegacyMirrorDef::deserialize(entry).map(FixtureEntryDef::LegacyMirror)
        } else {
            FixtureDef::deserialize(entry).map(FixtureEntryDef::Fixture)
        };
        parsed.map_err(|e| D::Error::custom(format!("fixtures entry '{name}': {e}")))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FixtureDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serves: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mappings: Option<Vec<MappingDef>>,
    /// `auto` (default), `mirror` or `graph`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MappingDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    /// Seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransformDef {
    pub code: String,
}

/// Older one-actuator-per-entry format.
///
/// ```yaml
/// fixtures:
///   - type: actuator_mirror
///     name: Door Lock Fixture
///     target_signal: Vehicle.Cabin.Door.Row1.Left.IsLocked
///     actual_signal: Vehicle.Cabin.Door.Row1.Left.IsLocked
///     delay: 0.2
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LegacyMirrorDef {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub target_signal: String,
    pub actual_signal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
}
