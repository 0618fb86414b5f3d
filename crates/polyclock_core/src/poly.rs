//! Polyphonic port buffers.
//!
//! A polyphonic cable carries up to 16 independent lanes. The number of
//! active lanes is always explicit and never inferred from zero values.
//!
//! - `PolyInput`: lanes read by a module for one frame
//! - `PolyOutput`: a fixed-capacity output buffer with channel count metadata

use arrayvec::ArrayVec;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;

/// Maximum channels per cable (matches VCV Rack / MIDI convention)
pub const PORT_MAX_CHANNELS: usize = 16;

/// A polyphonic output buffer with channel count metadata.
///
/// The `channels` field indicates how many lanes are semantically valid:
/// - 0 = no lanes this frame
/// - 1 = monophonic
/// - 2-16 = polyphonic
#[derive(Clone, Copy, Debug)]
pub struct PolyOutput {
    voltages: [f32; PORT_MAX_CHANNELS],
    channels: usize,
}

impl Default for PolyOutput {
    fn default() -> Self {
        Self {
            voltages: [0.0; PORT_MAX_CHANNELS],
            channels: 0,
        }
    }
}

impl PartialEq for PolyOutput {
    fn eq(&self, other: &Self) -> bool {
        self.channels == other.channels
            && self.voltages[..self.channels] == other.voltages[..other.channels]
    }
}

impl PolyOutput {
    /// Create a monophonic signal with a single value
    pub fn mono(value: f32) -> Self {
        let mut sig = Self::default();
        sig.voltages[0] = value;
        sig.channels = 1;
        sig
    }

    /// Get voltage for a specific channel (returns 0.0 if out of range)
    pub fn get(&self, channel: usize) -> f32 {
        if channel < self.channels {
            self.voltages[channel]
        } else {
            0.0
        }
    }

    /// Set voltage for a specific channel. Does not change the channel count.
    pub fn set(&mut self, channel: usize, value: f32) {
        if channel < PORT_MAX_CHANNELS {
            self.voltages[channel] = value;
        }
    }

    /// Set the number of active channels (clears channels above the new count)
    pub fn set_channels(&mut self, channels: usize) {
        let channels = channels.min(PORT_MAX_CHANNELS);
        for c in channels..self.channels {
            self.voltages[c] = 0.0;
        }
        self.channels = channels;
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Active lanes only
    pub fn voltages(&self) -> &[f32] {
        &self.voltages[..self.channels]
    }
}

impl Serialize for PolyOutput {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("PolyOutput", 2)?;
        state.serialize_field("channels", &self.channels)?;
        state.serialize_field("voltages", self.voltages())?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for PolyOutput {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct PolyOutputDe {
            channels: usize,
            voltages: Vec<f32>,
        }

        let de = PolyOutputDe::deserialize(deserializer)?;
        let mut sig = PolyOutput::default();
        sig.channels = de.channels.min(PORT_MAX_CHANNELS);
        for (i, &v) in de.voltages.iter().enumerate().take(sig.channels) {
            sig.voltages[i] = v;
        }
        Ok(sig)
    }
}

impl JsonSchema for PolyOutput {
    fn schema_name() -> Cow<'static, str> {
        Cow::Borrowed("PolyOutput")
    }

    fn json_schema(r#gen: &mut schemars::SchemaGenerator) -> schemars::Schema {
        #[derive(JsonSchema)]
        #[allow(dead_code)]
        struct PolyOutputSchema {
            channels: usize,
            voltages: Vec<f32>,
        }
        PolyOutputSchema::json_schema(r#gen)
    }
}

// =============================================================================
// PolyInput - lanes delivered to a polyphonic input port for one frame
// =============================================================================

/// The lanes present on a polyphonic input for one frame.
///
/// An unpatched input has zero lanes. Lanes past the 16-channel ceiling are
/// dropped when constructing or deserializing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PolyInput {
    lanes: ArrayVec<f32, PORT_MAX_CHANNELS>,
}

impl PolyInput {
    /// Create a monophonic input from a single value
    pub fn mono(value: f32) -> Self {
        Self::poly(&[value])
    }

    /// Create a polyphonic input from a slice of lane values
    pub fn poly(values: &[f32]) -> Self {
        let mut lanes = ArrayVec::new();
        for &v in values.iter().take(PORT_MAX_CHANNELS) {
            lanes.push(v);
        }
        Self { lanes }
    }

    /// Number of active lanes
    pub fn channels(&self) -> usize {
        self.lanes.len()
    }

    /// Lane value, or 0.0 past the active count
    pub fn get(&self, channel: usize) -> f32 {
        self.lanes.get(channel).copied().unwrap_or(0.0)
    }

    pub fn lanes(&self) -> &[f32] {
        &self.lanes
    }
}

impl Serialize for PolyInput {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.lanes.as_slice().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PolyInput {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Accept either a bare number (mono) or an array of lanes
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum PolyInputDe {
            Single(f32),
            Array(Vec<f32>),
        }

        Ok(match PolyInputDe::deserialize(deserializer)? {
            PolyInputDe::Single(v) => PolyInput::mono(v),
            PolyInputDe::Array(values) => PolyInput::poly(&values),
        })
    }
}

impl JsonSchema for PolyInput {
    fn schema_name() -> Cow<'static, str> {
        Cow::Borrowed("PolyInput")
    }

    fn json_schema(r#gen: &mut schemars::SchemaGenerator) -> schemars::Schema {
        #[derive(JsonSchema)]
        #[serde(untagged)]
        #[allow(dead_code)]
        enum PolyInputSchema {
            Single(f32),
            Array(Vec<f32>),
        }
        PolyInputSchema::json_schema(r#gen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poly_output() {
        let mut sig = PolyOutput::default();
        sig.set_channels(3);
        sig.set(0, 1.0);
        sig.set(1, 2.0);
        sig.set(2, 3.0);
        assert_eq!(sig.channels(), 3);
        assert_eq!(sig.get(0), 1.0);
        assert_eq!(sig.get(2), 3.0);
        assert_eq!(sig.get(3), 0.0);
        assert_eq!(sig.voltages(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_poly_output_shrinking_clears_stale_lanes() {
        let mut sig = PolyOutput::default();
        sig.set(0, 4.0);
        sig.set(1, 5.0);
        sig.set_channels(2);
        sig.set_channels(0);
        assert_eq!(sig.channels(), 0);
        sig.set_channels(2);
        assert_eq!(sig.get(0), 0.0);
        assert_eq!(sig.get(1), 0.0);
    }

    #[test]
    fn test_poly_output_equality_ignores_inactive_lanes() {
        let mut a = PolyOutput::mono(1.0);
        let b = PolyOutput::mono(1.0);
        a.set(5, 9.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_poly_input_deserialize_number() {
        let input: PolyInput = serde_json::from_str("4.0").expect("Failed to deserialize");
        assert_eq!(input.channels(), 1);
        assert_eq!(input.get(0), 4.0);
    }

    #[test]
    fn test_poly_input_deserialize_array_truncates() {
        let json = serde_json::to_string(&vec![1.0f32; 20]).unwrap();
        let input: PolyInput = serde_json::from_str(&json).expect("Failed to deserialize");
        assert_eq!(input.channels(), PORT_MAX_CHANNELS);
    }

    #[test]
    fn test_poly_input_default_has_no_lanes() {
        let input = PolyInput::default();
        assert_eq!(input.channels(), 0);
        assert_eq!(input.get(0), 0.0);
    }
}
