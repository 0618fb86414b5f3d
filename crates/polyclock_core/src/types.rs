use anyhow::{Context, Result, anyhow};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::poly::PolyOutput;
use crate::processor::{ModuleSampleable, ProcessorConfig};
use crate::state::PersistedState;

/// Timing information handed to a module for one processed frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessArgs {
    pub sample_rate: f32,
    /// Seconds per frame
    pub sample_time: f32,
    /// Frames the host skipped since the previous processed frame
    pub samples_skipped: u32,
}

impl ProcessArgs {
    pub fn new(sample_rate: f32) -> Self {
        let sample_rate = sample_rate.max(1.0);
        Self {
            sample_rate,
            sample_time: 1.0 / sample_rate,
            samples_skipped: 0,
        }
    }

    /// Frames that elapsed since the previous processed frame, this one included.
    pub fn frames_elapsed(&self) -> u32 {
        self.samples_skipped.saturating_add(1)
    }
}

#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSchema {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub default: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub polyphonic: bool,
}

/// Implemented by `#[derive(Outputs)]`.
pub trait OutputStruct: Default + Send + Sync + 'static {
    /// Get the current value of a port by name.
    fn get_poly_sample(&self, port: &str) -> Option<PolyOutput>;
    fn schemas() -> Vec<OutputSchema>
    where
        Self: Sized;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSchema {
    pub name: String,
    pub description: String,
    pub params_schema: schemars::Schema,
    pub inputs_schema: schemars::Schema,
    pub outputs: Vec<OutputSchema>,
}

/// A control-rate module driven once per processed host frame.
///
/// `process` runs the module's `read_inputs -> advance_state -> compute_outputs`
/// pipeline. It must not allocate, block or fail.
pub trait Module: Default + Send + 'static {
    const MODULE_TYPE: &'static str;
    const DESCRIPTION: &'static str;

    /// Port values delivered each frame
    type Inputs: Default + Clone + Send + DeserializeOwned + Serialize + JsonSchema;
    /// Host-side controls (knobs, switches)
    type Params: Default + Clone + Send + DeserializeOwned + Serialize + JsonSchema;
    type Outputs: OutputStruct;

    fn process(&mut self, inputs: &Self::Inputs, args: &ProcessArgs);

    fn outputs(&self) -> &Self::Outputs;

    fn params(&self) -> &Self::Params;

    fn set_params(&mut self, params: Self::Params);

    /// Return to factory state.
    fn reset(&mut self);

    fn save_state(&self) -> PersistedState;

    /// Restore from a persisted map. Never fails: missing keys take defaults.
    fn load_state(&mut self, state: &PersistedState);

    /// Veto a decimated frame. Returning true forces `process` this frame.
    fn must_process(&self, _inputs: &Self::Inputs) -> bool {
        false
    }

    /// Called instead of `process` for decimated frames.
    fn on_skipped_frame(&mut self) {}

    /// Merge a (possibly partial) JSON object into the current params.
    fn try_update_params(&mut self, params: Value) -> Result<()> {
        let mut merged = serde_json::to_value(self.params())?;
        merge_object(&mut merged, params)?;
        let params: Self::Params = serde_json::from_value(merged)
            .with_context(|| format!("invalid params for module {}", Self::MODULE_TYPE))?;
        self.set_params(params);
        Ok(())
    }

    fn get_schema() -> ModuleSchema
    where
        Self: Sized,
    {
        ModuleSchema {
            name: Self::MODULE_TYPE.to_string(),
            description: Self::DESCRIPTION.to_string(),
            params_schema: schemars::schema_for!(Self::Params),
            inputs_schema: schemars::schema_for!(Self::Inputs),
            outputs: <Self::Outputs as OutputStruct>::schemas(),
        }
    }

    fn install_constructor(map: &mut HashMap<String, SampleableConstructor>)
    where
        Self: Sized,
    {
        map.insert(
            Self::MODULE_TYPE.to_string(),
            Box::new(|config: &ProcessorConfig| -> Box<dyn Sampleable> {
                Box::new(ModuleSampleable::<Self>::new(config.clone()))
            }),
        );
    }
}

/// Object-safe view of a module, used where the module type is only known at
/// runtime (registry, CLI scenarios).
pub trait Sampleable: Send {
    fn get_module_type(&self) -> &'static str;
    /// Advance one host frame with the current inputs. Returns false if the
    /// frame was decimated.
    fn step(&mut self) -> bool;
    fn get_poly_sample(&self, port: &str) -> Option<PolyOutput>;
    /// Merge a (possibly partial) JSON object into the held inputs.
    fn try_update_inputs(&mut self, inputs: Value) -> Result<()>;
    fn try_update_params(&mut self, params: Value) -> Result<()>;
    fn get_params(&self) -> Value;
    fn save_state(&self) -> PersistedState;
    fn load_state(&mut self, state: &PersistedState);
    fn reset(&mut self);
    fn output_schemas(&self) -> Vec<OutputSchema>;
}

pub type SampleableConstructor = Box<dyn Fn(&ProcessorConfig) -> Box<dyn Sampleable>>;

/// Shallow merge of `patch` into `base`. Both must be JSON objects.
pub fn merge_object(base: &mut Value, patch: Value) -> Result<()> {
    let base = base
        .as_object_mut()
        .ok_or_else(|| anyhow!("expected a JSON object to merge into"))?;
    match patch {
        Value::Object(entries) => {
            for (key, value) in entries {
                base.insert(key, value);
            }
            Ok(())
        }
        Value::Null => Ok(()),
        other => Err(anyhow!("expected a JSON object, got {}", other)),
    }
}
