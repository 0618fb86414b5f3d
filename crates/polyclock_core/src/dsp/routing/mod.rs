use std::collections::HashMap;

use crate::types::{Module, ModuleSchema, SampleableConstructor};

pub mod buckets;
pub mod router;

pub use buckets::{Buckets, BucketsInputs, BucketsOutputs, BucketsParams};
pub use router::route;

pub fn install_constructors(map: &mut HashMap<String, SampleableConstructor>) {
    buckets::Buckets::install_constructor(map);
}

pub fn schemas() -> Vec<ModuleSchema> {
    vec![buckets::Buckets::get_schema()]
}
