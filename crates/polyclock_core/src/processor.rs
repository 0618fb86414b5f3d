//! Frame driver with an idle-skip decimation policy.

use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::poly::PolyOutput;
use crate::state::PersistedState;
use crate::types::{Module, OutputSchema, OutputStruct, ProcessArgs, Sampleable, merge_object};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcessorConfig {
    /// Host frames per second
    pub sample_rate: f32,
    /// Run the module on one of every `idle_skip` frames; 0 and 1 run every frame
    pub idle_skip: u32,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            idle_skip: 1,
        }
    }
}

/// Drives one module frame by frame.
///
/// Decimated frames are counted and handed to the next processed frame as
/// `samples_skipped`. A module can veto decimation through
/// [`Module::must_process`].
pub struct Processor<M: Module> {
    module: M,
    config: ProcessorConfig,
    args: ProcessArgs,
    skip_counter: u32,
    skipped: u32,
}

impl<M: Module> Processor<M> {
    pub fn new(config: ProcessorConfig) -> Self {
        Self::with_module(M::default(), config)
    }

    pub fn with_module(module: M, config: ProcessorConfig) -> Self {
        Self {
            module,
            args: ProcessArgs::new(config.sample_rate),
            config,
            skip_counter: 0,
            skipped: 0,
        }
    }

    /// Advance one host frame. Returns false when the frame was decimated.
    pub fn step(&mut self, inputs: &M::Inputs) -> bool {
        profiling::scope!("process_frame");
        let due = self.skip_counter == 0 || self.module.must_process(inputs);
        self.skip_counter = (self.skip_counter + 1) % self.config.idle_skip.max(1);

        if !due {
            self.skipped = self.skipped.saturating_add(1);
            self.module.on_skipped_frame();
            return false;
        }

        self.args.samples_skipped = self.skipped;
        self.skipped = 0;
        self.module.process(inputs, &self.args);
        true
    }

    pub fn module(&self) -> &M {
        &self.module
    }

    pub fn module_mut(&mut self) -> &mut M {
        &mut self.module
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Frames decimated since the last processed frame
    pub fn pending_skipped(&self) -> u32 {
        self.skipped
    }

    /// Factory-reset the module and the decimation counters.
    pub fn reset(&mut self) {
        self.module.reset();
        self.skip_counter = 0;
        self.skipped = 0;
    }
}

/// A [`Processor`] together with the inputs it is fed, behind the dynamic
/// [`Sampleable`] interface.
pub struct ModuleSampleable<M: Module> {
    processor: Processor<M>,
    inputs: M::Inputs,
}

impl<M: Module> ModuleSampleable<M> {
    pub fn new(config: ProcessorConfig) -> Self {
        Self {
            processor: Processor::new(config),
            inputs: M::Inputs::default(),
        }
    }

    pub fn processor(&self) -> &Processor<M> {
        &self.processor
    }

    pub fn inputs(&self) -> &M::Inputs {
        &self.inputs
    }
}

impl<M: Module> Sampleable for ModuleSampleable<M> {
    fn get_module_type(&self) -> &'static str {
        M::MODULE_TYPE
    }

    fn step(&mut self) -> bool {
        self.processor.step(&self.inputs)
    }

    fn get_poly_sample(&self, port: &str) -> Option<PolyOutput> {
        self.processor.module().outputs().get_poly_sample(port)
    }

    fn try_update_inputs(&mut self, inputs: Value) -> Result<()> {
        let mut merged = serde_json::to_value(&self.inputs)?;
        merge_object(&mut merged, inputs)?;
        self.inputs = serde_json::from_value(merged)
            .with_context(|| format!("invalid inputs for module {}", M::MODULE_TYPE))?;
        Ok(())
    }

    fn try_update_params(&mut self, params: Value) -> Result<()> {
        self.processor.module_mut().try_update_params(params)
    }

    fn get_params(&self) -> Value {
        serde_json::to_value(self.processor.module().params()).unwrap_or(Value::Null)
    }

    fn save_state(&self) -> PersistedState {
        self.processor.module().save_state()
    }

    fn load_state(&mut self, state: &PersistedState) {
        self.processor.module_mut().load_state(state);
    }

    fn reset(&mut self) {
        self.processor.reset();
    }

    fn output_schemas(&self) -> Vec<OutputSchema> {
        <M::Outputs as OutputStruct>::schemas()
    }
}
