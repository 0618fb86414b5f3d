//! Per-channel latency offsets.
//!
//! One signed offset per polyphonic lane, edited through a single "selected
//! channel" cursor. On every clock edge the offsets, scaled by the current
//! clock period, bias a shared comparator input independently per lane.

use crate::poly::{PORT_MAX_CHANNELS, PolyOutput};
use crate::state::PersistedState;

pub const LATENCY_CHANNELS: usize = PORT_MAX_CHANNELS;
pub const LATENCY_MIN: f32 = -100.0;
pub const LATENCY_MAX: f32 = 100.0;

lazy_static! {
    /// Persisted keys `latency01`..`latency16`
    pub static ref LATENCY_KEYS: Vec<String> = (1..=LATENCY_CHANNELS)
        .map(|channel| format!("latency{:02}", channel))
        .collect();
}

/// Selected channel for a host control value: rounded and clamped to 1..=16.
pub fn channel_from_control(value: f32) -> usize {
    if value.is_nan() {
        return 1;
    }
    value.round().clamp(1.0, LATENCY_CHANNELS as f32) as usize
}

/// Scale applied to offsets for a given mean half-phase duration.
pub fn latency_factor(half_phase: f32) -> f32 {
    10.0 / (half_phase * 1000.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct LatencyTable {
    offsets: [f32; LATENCY_CHANNELS],
    /// 1-based
    selected: usize,
    displayed: f32,
}

impl Default for LatencyTable {
    fn default() -> Self {
        Self {
            offsets: [0.0; LATENCY_CHANNELS],
            selected: 1,
            displayed: 0.0,
        }
    }
}

impl LatencyTable {
    /// Move the cursor (clamped to 1..=16) and reload the displayed offset.
    pub fn select_channel(&mut self, channel: usize) -> f32 {
        self.selected = channel.clamp(1, LATENCY_CHANNELS);
        self.displayed = self.offsets[self.selected - 1];
        self.displayed
    }

    /// Write through to the selected channel.
    pub fn set_offset(&mut self, value: f32) {
        if !value.is_finite() {
            return;
        }
        let value = value.clamp(LATENCY_MIN, LATENCY_MAX);
        self.offsets[self.selected - 1] = value;
        self.displayed = value;
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn displayed_offset(&self) -> f32 {
        self.displayed
    }

    /// Offset of a 1-based channel; 0.0 outside 1..=16.
    pub fn offset(&self, channel: usize) -> f32 {
        channel
            .checked_sub(1)
            .and_then(|i| self.offsets.get(i))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn offsets(&self) -> &[f32; LATENCY_CHANNELS] {
        &self.offsets
    }

    /// Zero every offset and reload the display.
    pub fn clear(&mut self) {
        self.offsets = [0.0; LATENCY_CHANNELS];
        self.displayed = 0.0;
    }

    /// Write `offset[c] * factor + input` to every lane of `out`, regardless
    /// of which channel is selected.
    pub fn bias(&self, factor: f32, input: f32, out: &mut PolyOutput) {
        for (channel, offset) in self.offsets.iter().enumerate() {
            out.set(channel, offset * factor + input);
        }
        out.set_channels(LATENCY_CHANNELS);
    }

    pub fn save(&self, state: &mut PersistedState) {
        for (key, offset) in LATENCY_KEYS.iter().zip(self.offsets.iter()) {
            state.set(key.clone(), *offset);
        }
    }

    pub fn load(&mut self, state: &PersistedState) {
        for (key, offset) in LATENCY_KEYS.iter().zip(self.offsets.iter_mut()) {
            *offset = state.get_or(key, 0.0).clamp(LATENCY_MIN, LATENCY_MAX);
        }
        self.displayed = self.offsets[self.selected - 1];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_two_digit() {
        assert_eq!(LATENCY_KEYS[0], "latency01");
        assert_eq!(LATENCY_KEYS[15], "latency16");
        assert_eq!(LATENCY_KEYS.len(), LATENCY_CHANNELS);
    }

    #[test]
    fn offsets_survive_selection_changes() {
        let mut table = LatencyTable::default();
        table.select_channel(3);
        table.set_offset(7.5);
        assert_eq!(table.select_channel(1), 0.0);
        assert_eq!(table.select_channel(3), 7.5);
        assert_eq!(table.displayed_offset(), 7.5);
        assert_eq!(table.offset(3), 7.5);
    }

    #[test]
    fn selection_is_clamped() {
        let mut table = LatencyTable::default();
        table.select_channel(0);
        assert_eq!(table.selected(), 1);
        table.select_channel(40);
        assert_eq!(table.selected(), LATENCY_CHANNELS);
        assert_eq!(channel_from_control(-3.0), 1);
        assert_eq!(channel_from_control(2.6), 3);
        assert_eq!(channel_from_control(99.0), 16);
        assert_eq!(channel_from_control(f32::NAN), 1);
    }

    #[test]
    fn offsets_are_clamped_and_non_finite_ignored() {
        let mut table = LatencyTable::default();
        table.set_offset(500.0);
        assert_eq!(table.offset(1), LATENCY_MAX);
        table.set_offset(f32::INFINITY);
        assert_eq!(table.offset(1), LATENCY_MAX);
    }

    #[test]
    fn bias_writes_all_lanes() {
        let mut table = LatencyTable::default();
        table.select_channel(2);
        table.set_offset(10.0);
        let mut out = PolyOutput::default();
        table.bias(0.5, 1.0, &mut out);
        assert_eq!(out.channels(), LATENCY_CHANNELS);
        assert_eq!(out.get(0), 1.0);
        assert_eq!(out.get(1), 6.0);
        assert_eq!(out.get(15), 1.0);
    }

    #[test]
    fn save_and_load() {
        let mut table = LatencyTable::default();
        table.select_channel(16);
        table.set_offset(-4.0);
        let mut state = PersistedState::new();
        table.save(&mut state);
        assert_eq!(state.get("latency16"), Some(-4.0));

        let mut restored = LatencyTable::default();
        restored.select_channel(16);
        restored.load(&state);
        assert_eq!(restored.offsets(), table.offsets());
        assert_eq!(restored.displayed_offset(), -4.0);
    }

    #[test]
    fn latency_factor_at_120_bpm() {
        // 0.0625s half phase
        assert!((latency_factor(0.0625) - 0.16).abs() < 1e-6);
    }
}
