/// Rising-edge detection for a fixed set of ports.
///
/// Each port remembers the last value it was fed, so an edge is detected by
/// comparing against the last processed sample rather than the previous host
/// frame. Frames the host skips therefore neither lose nor repeat an edge.
#[derive(Debug, Clone, Copy)]
pub struct EdgeDetector<const N: usize> {
    last: [f32; N],
    threshold: f32,
}

impl<const N: usize> EdgeDetector<N> {
    /// A port is high while its value is strictly above `threshold`.
    pub fn new(threshold: f32) -> Self {
        Self {
            last: [0.0; N],
            threshold,
        }
    }

    /// Feed the current value of `port`; true on a low-to-high transition.
    /// Call once per port per processed frame.
    pub fn rising(&mut self, port: impl Into<usize>, value: f32) -> bool {
        let Some(last) = self.last.get_mut(port.into()) else {
            return false;
        };
        let was_high = *last > self.threshold;
        *last = value;
        !was_high && value > self.threshold
    }

    /// Whether `value` differs from the last value fed to `port`.
    pub fn changed(&self, port: impl Into<usize>, value: f32) -> bool {
        self.last
            .get(port.into())
            .map(|last| *last != value)
            .unwrap_or(false)
    }
}

/// Edge-triggered watch on a host control: reports a change only on the
/// frame the value moves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamWatch {
    last: f32,
}

impl ParamWatch {
    pub fn new(initial: f32) -> Self {
        Self { last: initial }
    }

    pub fn changed(&mut self, value: f32) -> bool {
        if value.is_nan() || value == self.last {
            return false;
        }
        self.last = value;
        true
    }

    /// Record a value written by the module itself so it is not seen as a change.
    pub fn set(&mut self, value: f32) {
        self.last = value;
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum TempGateState {
    #[default]
    Low,
    High,
}

/// Gate that holds `state` for one `process` call, then falls to `target`.
/// Used for one-frame trigger outputs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TempGate {
    target: TempGateState,
    state: TempGateState,
    low_val: f32,
    high_val: f32,
}

impl TempGate {
    pub fn new(state: TempGateState, low_val: f32, high_val: f32) -> Self {
        Self {
            target: state,
            state,
            low_val,
            high_val,
        }
    }

    pub fn set_state(&mut self, state: TempGateState, target: TempGateState) {
        self.state = state;
        self.target = target;
    }

    /// High for exactly the next `process`.
    pub fn fire(&mut self) {
        self.set_state(TempGateState::High, TempGateState::Low);
    }

    pub fn process(&mut self) -> f32 {
        let state = self.state;
        self.state = self.target;
        match state {
            TempGateState::Low => self.low_val,
            TempGateState::High => self.high_val,
        }
    }
}

// ============ Tempo Conversion Functions ============

/// Tempo in V/Oct where 0V is 120 BPM and each volt doubles the tempo.
pub fn voct_to_bpm(voct: f32) -> f32 {
    120.0 * 2.0f32.powf(voct)
}
