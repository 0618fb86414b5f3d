use std::collections::HashMap;

use crate::types::{Module, ModuleSchema, SampleableConstructor};

pub mod cron;
pub mod history;
pub mod latency;
pub mod transport;

pub use cron::{Cron, CronInputs, CronOutputs, CronParams};
pub use history::{HalfPhaseHistory, SampleClock};
pub use latency::LatencyTable;
pub use transport::{RunState, Transport};

pub fn install_constructors(map: &mut HashMap<String, SampleableConstructor>) {
    cron::Cron::install_constructor(map);
}

pub fn schemas() -> Vec<ModuleSchema> {
    vec![cron::Cron::get_schema()]
}
