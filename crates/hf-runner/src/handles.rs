//! Resolved broker handles for every signal the configuration references.

use std::collections::HashMap;

use hf_broker::{SignalHandle, SignalResolver};
use hf_core::SignalPath;
use hf_project::FixtureSet;
use tracing::{debug, error};

use crate::error::{StartupError, StartupResult};

/// Handles resolved once at startup and shared read-only afterwards.
#[derive(Debug, Default)]
pub struct HandleTable {
    handles: HashMap<SignalPath, SignalHandle>,
}

impl HandleTable {
    /// Resolve served actuators, rule outputs and dependencies.
    ///
    /// Any unresolvable path fails the whole table.
    pub fn resolve_all(
        resolver: &dyn SignalResolver,
        fixtures: &FixtureSet,
    ) -> StartupResult<Self> {
        let mut handles = HashMap::new();
        for path in fixtures.referenced_signals() {
            let handle = resolver.resolve(&path).map_err(|source| {
                error!(signal = %path, error = %source, "signal resolution failed");
                StartupError::Resolution {
                    signal: path.to_string(),
                    source,
                }
            })?;
            debug!(signal = %path, id = handle.id(), datatype = %handle.data_type(), "resolved");
            handles.insert(path, handle);
        }
        Ok(Self { handles })
    }

    pub fn get(&self, path: &SignalPath) -> Option<&SignalHandle> {
        self.handles.get(path)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
