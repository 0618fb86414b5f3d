//! Run/stop/reset transport with a sub-clock divider.

use serde::Serialize;

/// Input clocks per output clock pulse
pub const CLOCK_DIVISION: u32 = 24;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RunState {
    #[default]
    Running,
    Stopped,
}

/// Rising edges seen on the transport inputs during one frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransportEdges {
    pub start: bool,
    pub cont: bool,
    pub stop: bool,
    pub clock_reset: bool,
    pub clock: bool,
}

/// Triggers the transport asks for this frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransportEvents {
    pub reset: bool,
    pub clock: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transport {
    state: RunState,
    divider: u32,
    reset_on_stop: bool,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Transport {
    pub fn new(reset_on_stop: bool) -> Self {
        Self {
            state: RunState::Running,
            divider: 0,
            reset_on_stop,
        }
    }

    /// Apply one frame of edges in order: start, continue, stop, clock reset,
    /// clock.
    pub fn apply(&mut self, edges: TransportEdges) -> TransportEvents {
        let mut events = TransportEvents::default();
        if edges.start {
            events.reset |= self.start();
        }
        if edges.cont {
            self.cont();
        }
        if edges.stop {
            events.reset |= self.stop();
        }
        if edges.clock_reset {
            self.reset_divider();
        }
        if edges.clock {
            events.clock = self.on_clock();
        }
        events
    }

    /// Start from the top. Always requests a reset pulse.
    pub fn start(&mut self) -> bool {
        if self.state == RunState::Stopped {
            tracing::debug!("transport started");
        }
        self.state = RunState::Running;
        self.divider = 0;
        true
    }

    /// Resume without resetting.
    pub fn cont(&mut self) {
        if self.state == RunState::Stopped {
            tracing::debug!("transport continued");
        }
        self.state = RunState::Running;
    }

    /// Stop. Requests a reset pulse when reset-on-stop is enabled.
    pub fn stop(&mut self) -> bool {
        if self.state == RunState::Running {
            tracing::debug!(reset = self.reset_on_stop, "transport stopped");
        }
        self.state = RunState::Stopped;
        self.reset_on_stop
    }

    pub fn reset_divider(&mut self) {
        self.divider = 0;
    }

    /// Count one input clock. Returns true when an output clock pulse is due.
    pub fn on_clock(&mut self) -> bool {
        if self.state != RunState::Running {
            return false;
        }
        let pulse = self.divider == 0;
        self.divider = (self.divider + 1) % CLOCK_DIVISION;
        pulse
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn divider(&self) -> u32 {
        self.divider
    }

    pub fn reset_on_stop(&self) -> bool {
        self.reset_on_stop
    }

    pub fn set_reset_on_stop(&mut self, reset_on_stop: bool) {
        self.reset_on_stop = reset_on_stop;
    }

    /// Running with the divider at zero; keeps the reset-on-stop setting.
    pub fn reset(&mut self) {
        self.state = RunState::Running;
        self.divider = 0;
    }
}
