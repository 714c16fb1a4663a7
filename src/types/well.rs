//! Well attribute snapshot
//!
//! Attributes are an open key/value map as read from the well data file.
//! The accessors here understand the handful of field names and value
//! shapes the data files actually use.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys that carry the current oil rate (bopd).
pub const CURRENT_RATE_KEYS: &[&str] = &["current_rate", "last_test_oil", "current_oil"];

/// Keys that carry the potential oil rate (bopd).
pub const POTENTIAL_RATE_KEYS: &[&str] = &["potential_rate", "potential_oil"];

/// Keys that carry water cut.
pub const WATER_CUT_KEYS: &[&str] = &["water_cut", "wc", "bsw"];

/// Attribute mapping for one well.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WellAttributes(Map<String, Value>);

impl WellAttributes {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First key from `keys` that holds a number (or numeric string).
    pub fn number(&self, keys: &[&str]) -> Option<f64> {
        keys.iter().find_map(|k| self.0.get(*k).and_then(value_as_number))
    }

    /// Text of a field, with non-string scalars rendered and arrays joined.
    pub fn text(&self, key: &str) -> Option<String> {
        self.0.get(key).and_then(value_as_text)
    }

    pub fn current_rate(&self) -> Option<f64> {
        self.number(CURRENT_RATE_KEYS)
    }

    pub fn potential_rate(&self) -> Option<f64> {
        self.number(POTENTIAL_RATE_KEYS)
    }

    /// Water cut as a fraction 0..=1.
    ///
    /// Accepts 0.5, 50 and "50%" for the same well.
    pub fn water_cut(&self) -> Option<f64> {
        let key = WATER_CUT_KEYS.iter().find(|k| self.0.contains_key(**k))?;
        let value = self.0.get(*key)?;
        let explicit_percent = value.as_str().is_some_and(|s| s.trim().ends_with('%'));
        let raw = value_as_number(value)?;
        if explicit_percent || raw > 1.0 {
            Some((raw / 100.0).clamp(0.0, 1.0))
        } else {
            Some(raw.clamp(0.0, 1.0))
        }
    }

    /// Compact JSON rendering used in backend prompts.
    pub fn to_context_string(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }
}

impl From<Map<String, Value>> for WellAttributes {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn value_as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(value_as_text).collect();
            Some(parts.join("; "))
        }
        other => Some(other.to_string()),
    }
}
