//! Persisted module state.
//!
//! Modules persist a flat map from stable string keys to floats. Loading is
//! lenient: unknown keys are ignored and missing or malformed values fall back
//! to the caller's default, so restoring a session never fails.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Key of the panel style shared by every module.
pub const STYLE_KEY: &str = "style";

#[derive(Clone, Debug, Default, PartialEq, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct PersistedState(BTreeMap<String, f32>);

impl PersistedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: f32) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<f32> {
        self.0.get(key).copied().filter(|v| v.is_finite())
    }

    pub fn get_or(&self, key: &str, default: f32) -> f32 {
        self.get(key).unwrap_or(default)
    }

    /// Booleans are stored as 1.0 / 0.0; anything non-zero reads as true.
    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get(key).map(|v| v != 0.0).unwrap_or(default)
    }

    pub fn set_bool(&mut self, key: impl Into<String>, value: bool) {
        self.set(key, if value { 1.0 } else { 0.0 });
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Build from an arbitrary JSON value, keeping numeric entries only.
    pub fn from_json(value: &Value) -> Self {
        let mut state = Self::new();
        let Some(entries) = value.as_object() else {
            tracing::debug!("persisted state is not an object, using defaults");
            return state;
        };
        for (key, value) in entries {
            match value.as_f64() {
                Some(v) if v.is_finite() => state.set(key.clone(), v as f32),
                _ => tracing::trace!(key = %key, "ignoring non-numeric persisted value"),
            }
        }
        state
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl<'de> Deserialize<'de> for PersistedState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(PersistedState::from_json(&value))
    }
}

/// Panel style. Presentation-only; persisted alongside the module state.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub enum Style {
    #[default]
    Standard,
    Bright,
    Dark,
}

impl Style {
    pub fn from_state(value: f32) -> Self {
        match value.round() as i32 {
            1 => Style::Bright,
            2 => Style::Dark,
            _ => Style::Standard,
        }
    }

    pub fn to_state(self) -> f32 {
        match self {
            Style::Standard => 0.0,
            Style::Bright => 1.0,
            Style::Dark => 2.0,
        }
    }

    pub fn load(state: &PersistedState) -> Self {
        Style::from_state(state.get_or(STYLE_KEY, Style::Standard.to_state()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_keeps_numbers_and_drops_the_rest() {
        let state = PersistedState::from_json(&json!({
            "latency01": 2.5,
            "style": 1,
            "name": "ignored",
            "nested": { "a": 1 },
        }));
        assert_eq!(state.len(), 2);
        assert_eq!(state.get("latency01"), Some(2.5));
        assert_eq!(state.get_or("missing", 7.0), 7.0);
    }

    #[test]
    fn non_object_json_yields_empty_state() {
        assert!(PersistedState::from_json(&json!([1, 2, 3])).is_empty());
    }

    #[test]
    fn serializes_as_flat_map() {
        let mut state = PersistedState::new();
        state.set("style", 2.0);
        state.set_bool("resetOnStop", false);
        assert_eq!(state.to_json(), json!({ "resetOnStop": 0.0, "style": 2.0 }));

        let back: PersistedState = serde_json::from_value(state.to_json()).unwrap();
        assert_eq!(back, state);
        assert!(!back.get_bool_or("resetOnStop", true));
    }

    #[test]
    fn style_round_trips_through_state() {
        for style in [Style::Standard, Style::Bright, Style::Dark] {
            assert_eq!(Style::from_state(style.to_state()), style);
        }
        assert_eq!(Style::from_state(17.0), Style::Standard);
    }
}
