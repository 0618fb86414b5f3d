//! Clock interval history and tempo estimation.
//!
//! Every rising clock edge turns the frames elapsed since the previous edge
//! into a half-phase duration and pushes it into a ring buffer. The tempo is
//! the mean of all valid entries, which smooths out host jitter.

/// Number of half-phase durations averaged for the tempo estimate
pub const HALF_PHASE_HISTORY_LEN: usize = 24;

/// Input clocks per beat (MIDI clock resolution)
pub const CLOCKS_PER_BEAT: f32 = 24.0;

/// Half phases per beat
pub const HALF_PHASES_PER_BEAT: f32 = 8.0;

/// Convert a mean half-phase duration in seconds to tempo in V/Oct
/// (0V = 120 BPM).
pub fn tempo_voct(half_phase: f32) -> f32 {
    (0.5 / (half_phase * HALF_PHASES_PER_BEAT)).log2()
}

/// Convert a clock interval in seconds to a half-phase duration in seconds.
pub fn half_phase_from_interval(seconds: f32) -> f32 {
    seconds * CLOCKS_PER_BEAT / HALF_PHASES_PER_BEAT
}

/// Ring buffer of the most recent half-phase durations.
#[derive(Debug, Clone, PartialEq)]
pub struct HalfPhaseHistory {
    entries: [f32; HALF_PHASE_HISTORY_LEN],
    /// Valid entries, saturating at capacity
    count: usize,
    /// Next write position
    pos: usize,
}

impl Default for HalfPhaseHistory {
    fn default() -> Self {
        Self {
            entries: [0.0; HALF_PHASE_HISTORY_LEN],
            count: 0,
            pos: 0,
        }
    }
}

impl HalfPhaseHistory {
    /// Insert a duration, evicting the oldest once full. Returns the new mean.
    pub fn push(&mut self, half_phase: f32) -> f32 {
        self.entries[self.pos] = half_phase;
        self.pos = (self.pos + 1) % HALF_PHASE_HISTORY_LEN;
        if self.count < HALF_PHASE_HISTORY_LEN {
            self.count += 1;
        }
        // count >= 1 here
        self.sum() / self.count as f32
    }

    /// Mean of all valid entries, `None` while empty.
    pub fn mean(&self) -> Option<f32> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum() / self.count as f32)
        }
    }

    fn sum(&self) -> f32 {
        // Entries are written from index 0 after a clear, so the first
        // `count` slots are exactly the valid ones until the ring wraps.
        self.entries[..self.count].iter().sum()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Frame counter plus interval history: the tempo-estimation half of the
/// clock engine.
#[derive(Debug, Clone, Default)]
pub struct SampleClock {
    /// Frames since the previous edge (or since the last reset)
    elapsed_frames: u32,
    history: HalfPhaseHistory,
}

impl SampleClock {
    /// Count frames that passed, skipped ones included. Saturates instead of
    /// wrapping so a stalled clock can never produce a bogus short interval.
    pub fn advance(&mut self, frames: u32) {
        self.elapsed_frames = self.elapsed_frames.saturating_add(frames);
    }

    /// Record a clock edge and return the mean half-phase duration.
    ///
    /// The first edge after a reset measures from the reset, so it always
    /// seeds exactly one entry.
    pub fn on_edge(&mut self, sample_time: f32) -> f32 {
        let seconds = self.elapsed_frames as f32 * sample_time;
        self.elapsed_frames = 0;
        self.history.push(half_phase_from_interval(seconds))
    }

    pub fn elapsed_frames(&self) -> u32 {
        self.elapsed_frames
    }

    pub fn history(&self) -> &HalfPhaseHistory {
        &self.history
    }

    /// Current tempo in V/Oct, `None` before the first edge.
    pub fn tempo(&self) -> Option<f32> {
        self.history.mean().map(tempo_voct)
    }

    pub fn reset(&mut self) {
        self.elapsed_frames = 0;
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-5, "{} != {}", a, b);
    }

    #[test]
    fn empty_history_has_no_mean() {
        let history = HalfPhaseHistory::default();
        assert!(history.is_empty());
        assert_eq!(history.mean(), None);
    }

    #[test]
    fn mean_tracks_valid_entries_until_full() {
        let mut history = HalfPhaseHistory::default();
        assert_close(history.push(1.0), 1.0);
        assert_close(history.push(3.0), 2.0);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn oldest_entry_is_evicted_once_full() {
        let mut history = HalfPhaseHistory::default();
        let durations: Vec<f32> = (1..=HALF_PHASE_HISTORY_LEN + 1)
            .map(|i| i as f32 * 0.01)
            .collect();
        let mut mean = 0.0;
        for d in &durations {
            mean = history.push(*d);
        }
        let tail = &durations[1..];
        let expected = tail.iter().sum::<f32>() / tail.len() as f32;
        assert_eq!(history.len(), HALF_PHASE_HISTORY_LEN);
        assert_close(mean, expected);
        assert_close(history.mean().unwrap(), expected);
    }

    #[test]
    fn tempo_of_120_bpm_midi_clock_is_zero_volts() {
        // 24 clocks per beat at 120 BPM: 0.5s / 24 per clock
        let half_phase = half_phase_from_interval(0.5 / 24.0);
        assert_close(half_phase, 0.0625);
        assert_close(tempo_voct(half_phase), 0.0);
        // Twice as fast is one volt up
        assert_close(tempo_voct(half_phase / 2.0), 1.0);
    }

    #[test]
    fn first_edge_measures_from_reset() {
        let mut clock = SampleClock::default();
        clock.advance(1000);
        let mean = clock.on_edge(1.0 / 48_000.0);
        assert_eq!(clock.history().len(), 1);
        assert_close(mean, half_phase_from_interval(1000.0 / 48_000.0));
        assert_eq!(clock.elapsed_frames(), 0);
    }

    #[test]
    fn frame_counter_saturates() {
        let mut clock = SampleClock::default();
        clock.advance(u32::MAX - 1);
        clock.advance(10);
        assert_eq!(clock.elapsed_frames(), u32::MAX);
    }

    #[test]
    fn reset_clears_history() {
        let mut clock = SampleClock::default();
        clock.advance(10);
        clock.on_edge(0.001);
        clock.advance(3);
        clock.reset();
        assert_eq!(clock.tempo(), None);
        assert_eq!(clock.elapsed_frames(), 0);
    }
}
