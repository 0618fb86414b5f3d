use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::dsp::clock::history::{SampleClock, tempo_voct};
use crate::dsp::clock::latency::{LatencyTable, channel_from_control, latency_factor};
use crate::dsp::clock::transport::{RunState, Transport, TransportEdges, TransportEvents};
use crate::dsp::utils::{EdgeDetector, ParamWatch, TempGate, TempGateState, voct_to_bpm};
use crate::poly::PolyOutput;
use crate::state::{PersistedState, STYLE_KEY, Style};
use crate::types::{Module, ProcessArgs};

pub const RESET_ON_STOP_KEY: &str = "resetOnStop";

/// Output level of triggers and the run gate
const HIGH: f32 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CronParams {
    /// Latency channel being edited (1-16)
    pub channel: f32,
    /// Offset of the selected channel (-100..100)
    pub latency: f32,
    /// Fire a reset trigger when the transport stops
    pub reset_on_stop: bool,
    pub style: Style,
}

impl Default for CronParams {
    fn default() -> Self {
        Self {
            channel: 1.0,
            latency: 0.0,
            reset_on_stop: true,
            style: Style::default(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CronInputs {
    /// Resets the clock divider
    pub clock_reset: f32,
    /// 24 PPQN clock
    pub clock: f32,
    pub start: f32,
    pub stop: f32,
    #[serde(rename = "continue")]
    pub cont: f32,
    /// Comparator value biased by the latency table
    pub compare: f32,
}

#[derive(Outputs)]
pub struct CronOutputs {
    #[output("clock", "clock trigger, one per 24 input clocks")]
    pub clock: f32,
    #[output("bpm", "tempo in V/Oct, 0V = 120 BPM", default)]
    pub bpm: f32,
    #[output("reset", "reset trigger")]
    pub reset: f32,
    #[output("run", "10V while the transport runs")]
    pub run: f32,
    #[output("compare", "comparator input biased per channel by the latency table")]
    pub compare: PolyOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CronGate {
    ClockReset,
    Clock,
    Start,
    Stop,
    Continue,
}

impl From<CronGate> for usize {
    fn from(gate: CronGate) -> usize {
        gate as usize
    }
}

/// Tempo detector and transport for a MIDI-style 24 PPQN clock.
///
/// Measures the incoming clock into a V/Oct tempo, turns start / stop /
/// continue pulses into run and reset signals, divides the clock down to one
/// trigger per beat and biases a comparator input per polyphonic channel by a
/// latency proportional to the clock period.
pub struct Cron {
    params: CronParams,
    outputs: CronOutputs,
    edges: EdgeDetector<5>,
    channel_watch: ParamWatch,
    latency_watch: ParamWatch,
    clock: SampleClock,
    transport: Transport,
    latency: LatencyTable,
    reset_trigger: TempGate,
    clock_trigger: TempGate,
}

impl Default for Cron {
    fn default() -> Self {
        let params = CronParams::default();
        Self {
            channel_watch: ParamWatch::new(params.channel),
            latency_watch: ParamWatch::new(params.latency),
            transport: Transport::new(params.reset_on_stop),
            params,
            outputs: CronOutputs::default(),
            edges: EdgeDetector::new(0.0),
            clock: SampleClock::default(),
            latency: LatencyTable::default(),
            reset_trigger: TempGate::new(TempGateState::Low, 0.0, HIGH),
            clock_trigger: TempGate::new(TempGateState::Low, 0.0, HIGH),
        }
    }
}

impl Cron {
    /// Current tempo in V/Oct, `None` before the first clock edge.
    pub fn tempo(&self) -> Option<f32> {
        self.clock.tempo()
    }

    /// Current tempo in beats per minute.
    pub fn bpm(&self) -> Option<f32> {
        self.tempo().map(voct_to_bpm)
    }

    pub fn run_state(&self) -> RunState {
        self.transport.state()
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn latency_table(&self) -> &LatencyTable {
        &self.latency
    }

    pub fn clock(&self) -> &SampleClock {
        &self.clock
    }

    fn read_inputs(&mut self, inputs: &CronInputs) -> TransportEdges {
        if self.channel_watch.changed(self.params.channel) {
            let displayed = self
                .latency
                .select_channel(channel_from_control(self.params.channel));
            self.params.latency = displayed;
            self.latency_watch.set(displayed);
        }
        if self.latency_watch.changed(self.params.latency) {
            self.latency.set_offset(self.params.latency);
            let stored = self.latency.displayed_offset();
            self.params.latency = stored;
            self.latency_watch.set(stored);
        }

        TransportEdges {
            clock_reset: self.edges.rising(CronGate::ClockReset, inputs.clock_reset),
            clock: self.edges.rising(CronGate::Clock, inputs.clock),
            start: self.edges.rising(CronGate::Start, inputs.start),
            stop: self.edges.rising(CronGate::Stop, inputs.stop),
            cont: self.edges.rising(CronGate::Continue, inputs.cont),
        }
    }

    /// Returns the mean half-phase duration when a clock edge was measured.
    fn advance_state(
        &mut self,
        edges: TransportEdges,
        args: &ProcessArgs,
    ) -> (TransportEvents, Option<f32>) {
        self.clock.advance(args.frames_elapsed());
        let events = self.transport.apply(edges);
        let half_phase = edges.clock.then(|| self.clock.on_edge(args.sample_time));
        (events, half_phase)
    }

    fn compute_outputs(
        &mut self,
        inputs: &CronInputs,
        events: TransportEvents,
        half_phase: Option<f32>,
    ) {
        if let Some(half_phase) = half_phase.filter(|h| h.is_finite() && *h > 0.0) {
            self.outputs.bpm = tempo_voct(half_phase);
            self.latency.bias(
                latency_factor(half_phase),
                inputs.compare,
                &mut self.outputs.compare,
            );
        }

        if events.reset {
            self.reset_trigger.fire();
        }
        if events.clock {
            self.clock_trigger.fire();
        }
        self.outputs.reset = self.reset_trigger.process();
        self.outputs.clock = self.clock_trigger.process();
        self.outputs.run = if self.transport.is_running() { HIGH } else { 0.0 };
    }
}

impl Module for Cron {
    const MODULE_TYPE: &'static str = "cron";
    const DESCRIPTION: &'static str =
        "Clock tempo detector with run/stop/reset transport and per-channel latency compensation";

    type Inputs = CronInputs;
    type Params = CronParams;
    type Outputs = CronOutputs;

    fn process(&mut self, inputs: &CronInputs, args: &ProcessArgs) {
        let edges = self.read_inputs(inputs);
        let (events, half_phase) = self.advance_state(edges, args);
        self.compute_outputs(inputs, events, half_phase);
    }

    fn outputs(&self) -> &CronOutputs {
        &self.outputs
    }

    fn params(&self) -> &CronParams {
        &self.params
    }

    fn set_params(&mut self, params: CronParams) {
        self.transport.set_reset_on_stop(params.reset_on_stop);
        self.params = params;
    }

    /// Factory reset. The edge detectors keep the last processed inputs so a
    /// held gate does not fire again.
    fn reset(&mut self) {
        tracing::debug!("cron reset");
        self.params = CronParams::default();
        self.channel_watch = ParamWatch::new(self.params.channel);
        self.latency_watch = ParamWatch::new(self.params.latency);
        self.clock.reset();
        self.transport.reset();
        self.transport.set_reset_on_stop(self.params.reset_on_stop);
        self.latency.clear();
        self.latency.select_channel(channel_from_control(self.params.channel));
        self.outputs = CronOutputs::default();
        self.reset_trigger = TempGate::new(TempGateState::Low, 0.0, HIGH);
        self.clock_trigger = TempGate::new(TempGateState::Low, 0.0, HIGH);
    }

    fn save_state(&self) -> PersistedState {
        let mut state = PersistedState::new();
        state.set(STYLE_KEY, self.params.style.to_state());
        self.latency.save(&mut state);
        state.set_bool(RESET_ON_STOP_KEY, self.params.reset_on_stop);
        state
    }

    fn load_state(&mut self, state: &PersistedState) {
        self.latency.load(state);
        self.params.reset_on_stop = state.get_bool_or(RESET_ON_STOP_KEY, true);
        self.transport.set_reset_on_stop(self.params.reset_on_stop);
        self.params.style = Style::load(state);
        self.params.latency = self.latency.displayed_offset();
        self.latency_watch.set(self.params.latency);
        self.clock.reset();
        tracing::debug!(entries = state.len(), "cron state restored");
    }

    /// Any gate input that moved must be seen on the frame it moves, so a
    /// one-frame trigger is never decimated away.
    fn must_process(&self, inputs: &CronInputs) -> bool {
        [
            (CronGate::ClockReset, inputs.clock_reset),
            (CronGate::Clock, inputs.clock),
            (CronGate::Start, inputs.start),
            (CronGate::Stop, inputs.stop),
            (CronGate::Continue, inputs.cont),
        ]
        .iter()
        .any(|(gate, value)| self.edges.changed(*gate, *value))
    }

    fn on_skipped_frame(&mut self) {
        self.outputs.clock = 0.0;
        self.outputs.reset = 0.0;
    }
}
