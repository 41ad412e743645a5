//! Signal catalog: which paths exist, what kind of signal each is, and its type.

use std::collections::BTreeMap;
use std::str::FromStr;

use hf_core::{DataType, SignalPath};
use serde::Deserialize;

use crate::error::{BrokerError, BrokerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Actuator,
    Sensor,
    Attribute,
}

impl SignalKind {
    pub fn name(self) -> &'static str {
        match self {
            SignalKind::Actuator => "actuator",
            SignalKind::Sensor => "sensor",
            SignalKind::Attribute => "attribute",
        }
    }
}

impl FromStr for SignalKind {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "actuator" => Ok(SignalKind::Actuator),
            "sensor" => Ok(SignalKind::Sensor),
            "attribute" => Ok(SignalKind::Attribute),
            other => Err(BrokerError::Catalog {
                what: format!("unknown signal type '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalMeta {
    pub id: u32,
    pub kind: SignalKind,
    pub data_type: DataType,
}

/// Known signals keyed by path. Ids are assigned in insertion order.
#[derive(Debug, Clone, Default)]
pub struct SignalCatalog {
    entries: BTreeMap<SignalPath, SignalMeta>,
}

/// One node of a VSS JSON tree. Branches carry `children`, leaves carry `datatype`.
#[derive(Debug, Deserialize)]
struct VssNode {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    datatype: Option<String>,
    #[serde(default)]
    children: BTreeMap<String, VssNode>,
}

impl SignalCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a signal. Replacing keeps the existing id.
    pub fn insert(&mut self, path: SignalPath, kind: SignalKind, data_type: DataType) {
        let id = match self.entries.get(&path) {
            Some(existing) => existing.id,
            None => self.entries.len() as u32,
        };
        self.entries.insert(
            path,
            SignalMeta {
                id,
                kind,
                data_type,
            },
        );
    }

    pub fn get(&self, path: &SignalPath) -> Option<&SignalMeta> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &SignalPath) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SignalPath, &SignalMeta)> {
        self.entries.iter()
    }

    /// Build a catalog from a VSS JSON tree.
    pub fn from_vss_json(content: &str) -> BrokerResult<Self> {
        let roots: BTreeMap<String, VssNode> =
            serde_json::from_str(content).map_err(|e| BrokerError::Catalog {
                what: e.to_string(),
            })?;

        let mut catalog = Self::new();
        for (name, node) in &roots {
            catalog.walk(name, node)?;
        }
        Ok(catalog)
    }

    fn walk(&mut self, prefix: &str, node: &VssNode) -> BrokerResult<()> {
        if node.kind.eq_ignore_ascii_case("branch") {
            for (name, child) in &node.children {
                self.walk(&format!("{prefix}.{name}"), child)?;
            }
            return Ok(());
        }

        let kind: SignalKind = node.kind.parse()?;
        let text = node.datatype.as_deref().ok_or_else(|| BrokerError::Catalog {
            what: format!("leaf {prefix} has no datatype"),
        })?;
        // Array and struct types have no scalar value here.
        let Ok(data_type) = text.parse::<DataType>() else {
            tracing::debug!(signal = %prefix, datatype = %text, "skipping non-scalar VSS leaf");
            return Ok(());
        };
        self.insert(SignalPath::new(prefix), kind, data_type);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VSS: &str = r#"{
      "Vehicle": {
        "type": "branch",
        "children": {
          "Cabin": {
            "type": "branch",
            "children": {
              "Door": {
                "type": "branch",
                "children": {
                  "IsLocked": {"type": "actuator", "datatype": "boolean"},
                  "Names": {"type": "attribute", "datatype": "string[]"}
                }
              }
            }
          },
          "Speed": {"type": "sensor", "datatype": "float"}
        }
      }
    }"#;

    #[test]
    fn vss_tree_is_flattened_into_paths() {
        let catalog = SignalCatalog::from_vss_json(VSS).unwrap();
        assert_eq!(catalog.len(), 2);

        let door = catalog
            .get(&SignalPath::new("Vehicle.Cabin.Door.IsLocked"))
            .unwrap();
        assert_eq!(door.kind, SignalKind::Actuator);
        assert_eq!(door.data_type, DataType::Boolean);

        let speed = catalog.get(&SignalPath::new("Vehicle.Speed")).unwrap();
        assert_eq!(speed.kind, SignalKind::Sensor);
        assert_eq!(speed.data_type, DataType::Float);
    }

    #[test]
    fn leaf_without_datatype_is_rejected() {
        let err = SignalCatalog::from_vss_json(r#"{"Vehicle": {"type": "sensor"}}"#).unwrap_err();
        assert!(matches!(err, BrokerError::Catalog { .. }));
    }

    #[test]
    fn reinsert_keeps_id() {
        let mut catalog = SignalCatalog::new();
        catalog.insert(SignalPath::new("A"), SignalKind::Sensor, DataType::Int8);
        catalog.insert(SignalPath::new("B"), SignalKind::Sensor, DataType::Int8);
        catalog.insert(SignalPath::new("A"), SignalKind::Actuator, DataType::Int32);

        let a = catalog.get(&SignalPath::new("A")).unwrap();
        assert_eq!(a.id, 0);
        assert_eq!(a.kind, SignalKind::Actuator);
        assert_eq!(catalog.get(&SignalPath::new("B")).unwrap().id, 1);
    }
}
