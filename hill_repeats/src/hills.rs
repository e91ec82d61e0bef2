//! Hill course configuration.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::RepeatError;

/// Start and stop coordinates of one named repeat course. Values are
/// surveyed by hand and fixed for the run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HillDefinition {
    pub start_lat: f64,
    pub start_long: f64,
    pub stop_lat: f64,
    pub stop_long: f64,
}

/// Named hill courses, looked up case-insensitively.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HillTable {
    hills: HashMap<String, HillDefinition>,
}

impl HillTable {
    /// The courses the tool has always known about.
    pub fn builtin() -> Self {
        let mut hills = HashMap::new();
        hills.insert(
            "ubc".to_string(),
            HillDefinition {
                start_lat: 49.2793093,
                start_long: -123.2404815,
                stop_lat: 49.2713713,
                stop_long: -123.2540545,
            },
        );
        Self { hills }
    }

    /// Load a hill table from a JSON file mapping course names to their four
    /// coordinates.
    pub fn from_json_path(path: &Path) -> Result<Self, RepeatError> {
        let text = fs::read_to_string(path)
            .map_err(|_| RepeatError::InputNotFound(path.display().to_string()))?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, RepeatError> {
        let raw: HashMap<String, HillDefinition> =
            serde_json::from_str(text).map_err(|e| RepeatError::InvalidConfig(e.to_string()))?;
        if raw.is_empty() {
            return Err(RepeatError::InvalidConfig("no hills defined".to_string()));
        }
        let hills = raw
            .into_iter()
            .map(|(name, hill)| (name.to_ascii_lowercase(), hill))
            .collect();
        Ok(Self { hills })
    }

    pub fn get(&self, name: &str) -> Result<&HillDefinition, RepeatError> {
        self.hills
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| RepeatError::UnknownHillName(name.to_string()))
    }

    /// Known course names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.hills.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
