use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::dsp::routing::router::route_quantized;
use crate::dsp::utilities::{SEMITONE, note_label, quantize};
use crate::poly::{PolyInput, PolyOutput};
use crate::state::{PersistedState, STYLE_KEY, Style};
use crate::types::{Module, ProcessArgs};

pub const SPLIT_COUNT: usize = 12;
/// One bucket per split plus the overflow bucket
pub const BUCKET_COUNT: usize = SPLIT_COUNT + 1;
pub const SPLIT_MIN: f32 = -5.0;
pub const SPLIT_MAX: f32 = 5.0 - SEMITONE;
/// A lane is routed while its gate is strictly above this
pub const GATE_THRESHOLD: f32 = 5.0;
pub const GATE_HIGH: f32 = 10.0;

lazy_static! {
    /// Persisted keys `split01`..`split12`
    pub static ref SPLIT_KEYS: Vec<String> = (1..=SPLIT_COUNT)
        .map(|split| format!("split{:02}", split))
        .collect();
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct BucketsParams {
    /// Upper bound (inclusive, V/Oct) of each bucket, range -5..5-1/12
    pub splits: [f32; SPLIT_COUNT],
    pub style: Style,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct BucketsInputs {
    /// Pitch per lane
    pub voct: PolyInput,
    /// Gate per lane; only lanes above 5V are routed
    pub gate: PolyInput,
}

#[derive(Outputs)]
pub struct BucketsOutputs {
    #[output("voct", "quantized pitch of the lanes routed into the bucket", default)]
    pub voct: [PolyOutput; BUCKET_COUNT],
    #[output("gate", "10V gate per lane routed into the bucket")]
    pub gate: [PolyOutput; BUCKET_COUNT],
}

/// Polyphonic threshold router.
///
/// Each gated lane is quantized to a semitone and sent to the first bucket
/// whose split it does not exceed; lanes above every split land in the last
/// bucket. Lanes are packed densely into their bucket in input order.
#[derive(Default)]
pub struct Buckets {
    params: BucketsParams,
    outputs: BucketsOutputs,
    quantized_splits: [f32; SPLIT_COUNT],
    slots: [usize; BUCKET_COUNT],
}

/// Clamp a split to its range; NaN falls back to 0V.
fn clamp_split(split: f32) -> f32 {
    if split.is_nan() {
        0.0
    } else {
        split.clamp(SPLIT_MIN, SPLIT_MAX)
    }
}

impl Buckets {
    /// Display text of split `index` (0-based), e.g. `"C 4"`.
    pub fn split_label(&self, index: usize) -> Option<String> {
        self.params
            .splits
            .get(index)
            .map(|split| note_label(clamp_split(*split)))
    }

    /// Lanes routed into each bucket on the last processed frame.
    pub fn bucket_sizes(&self) -> &[usize; BUCKET_COUNT] {
        &self.slots
    }

    fn read_inputs(&mut self, inputs: &BucketsInputs) -> usize {
        for (q, split) in self.quantized_splits.iter_mut().zip(self.params.splits.iter()) {
            *q = quantize(clamp_split(*split));
        }
        inputs.voct.channels().min(inputs.gate.channels())
    }

    fn advance_state(&mut self, inputs: &BucketsInputs, count: usize) {
        self.slots = [0; BUCKET_COUNT];
        for lane in 0..count {
            if inputs.gate.get(lane) <= GATE_THRESHOLD {
                continue;
            }
            let (bucket, q) = route_quantized(inputs.voct.get(lane), &self.quantized_splits);
            let slot = self.slots[bucket];
            self.outputs.voct[bucket].set(slot, q);
            self.outputs.gate[bucket].set(slot, GATE_HIGH);
            self.slots[bucket] += 1;
        }
    }

    fn compute_outputs(&mut self) {
        for (bucket, slots) in self.slots.iter().enumerate() {
            self.outputs.voct[bucket].set_channels(*slots);
            self.outputs.gate[bucket].set_channels(*slots);
        }
    }
}

impl Module for Buckets {
    const MODULE_TYPE: &'static str = "buckets";
    const DESCRIPTION: &'static str =
        "Routes gated polyphonic pitches into 13 buckets by 12 quantized split points";

    type Inputs = BucketsInputs;
    type Params = BucketsParams;
    type Outputs = BucketsOutputs;

    fn process(&mut self, inputs: &BucketsInputs, _args: &ProcessArgs) {
        let count = self.read_inputs(inputs);
        self.advance_state(inputs, count);
        self.compute_outputs();
    }

    fn outputs(&self) -> &BucketsOutputs {
        &self.outputs
    }

    fn params(&self) -> &BucketsParams {
        &self.params
    }

    fn set_params(&mut self, mut params: BucketsParams) {
        for split in params.splits.iter_mut() {
            *split = clamp_split(*split);
        }
        self.params = params;
    }

    fn reset(&mut self) {
        tracing::debug!("buckets reset");
        *self = Self::default();
    }

    fn save_state(&self) -> PersistedState {
        let mut state = PersistedState::new();
        state.set(STYLE_KEY, self.params.style.to_state());
        for (key, split) in SPLIT_KEYS.iter().zip(self.params.splits.iter()) {
            state.set(key.clone(), *split);
        }
        state
    }

    fn load_state(&mut self, state: &PersistedState) {
        self.params.style = Style::load(state);
        for (key, split) in SPLIT_KEYS.iter().zip(self.params.splits.iter_mut()) {
            *split = clamp_split(state.get_or(key, 0.0));
        }
        tracing::debug!(entries = state.len(), "buckets state restored");
    }
}
