//! Well attribute source
//!
//! A JSON object mapping well id to an attribute object, read once per
//! process. The screening core never writes it back.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};

use crate::types::WellAttributes;

#[derive(Debug, thiserror::Error)]
pub enum WellDataError {
    #[error("Well data file not readable ({}): {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),
    #[error("Well data file is not valid JSON ({}): {1}", .0.display())]
    Parse(PathBuf, #[source] serde_json::Error),
    #[error("Well data must be a JSON object keyed by well id")]
    NotAnObject,
}

/// Immutable set of wells and their attributes.
#[derive(Debug, Clone, Default)]
pub struct WellRegistry {
    wells: BTreeMap<String, WellAttributes>,
}

impl WellRegistry {
    /// Load from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, WellDataError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| WellDataError::Io(path.to_path_buf(), e))?;
        let root: Value = serde_json::from_slice(&bytes)
            .map_err(|e| WellDataError::Parse(path.to_path_buf(), e))?;
        let registry = Self::from_value(root)?;
        info!(path = %path.display(), wells = registry.len(), "Loaded well data");
        Ok(registry)
    }

    /// Build from an already parsed JSON document.
    ///
    /// Entries whose value is not an object are skipped with a warning.
    pub fn from_value(root: Value) -> Result<Self, WellDataError> {
        let Value::Object(root) = root else {
            return Err(WellDataError::NotAnObject);
        };

        let mut wells = BTreeMap::new();
        for (well_id, attrs) in root {
            match attrs {
                Value::Object(map) => {
                    wells.insert(well_id, WellAttributes::new(map));
                }
                _ => warn!(well_id = %well_id, "Skipping well with non-object attributes"),
            }
        }
        Ok(Self { wells })
    }

    pub fn get(&self, well_id: &str) -> Option<&WellAttributes> {
        self.wells.get(well_id)
    }

    /// Well ids in sorted order.
    pub fn well_ids(&self) -> impl Iterator<Item = &str> {
        self.wells.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.wells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mock_db.json");
        let body = json!({
            "B2": {"current_rate": 80, "mechanical_issues": "Casing Collapse"},
            "A1": {"current_rate": 100, "potential_rate": 130},
            "X9": 42
        });
        std::fs::write(&path, body.to_string()).unwrap();

        let registry = WellRegistry::load(&path).unwrap();
        assert_eq!(registry.well_ids().collect::<Vec<_>>(), vec!["A1", "B2"]);
        assert_eq!(registry.get("A1").unwrap().current_rate(), Some(100.0));
        assert!(registry.get("X9").is_none());
    }

    #[test]
    fn test_rejects_non_object_root() {
        assert!(matches!(
            WellRegistry::from_value(json!([1, 2])),
            Err(WellDataError::NotAnObject)
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = WellRegistry::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, WellDataError::Io(_, _)));
    }
}
