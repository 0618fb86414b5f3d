//! Control-rate modules for a modular synthesis host.
//!
//! The crate is pure signal logic: the host feeds each module one frame of
//! inputs at a time and reads its outputs back. Two modules are provided:
//! `cron` (clock tempo, transport and latency compensation) and `buckets`
//! (polyphonic threshold routing).

#[macro_use]
extern crate lazy_static;

#[macro_use]
extern crate polyclock_derive;

pub mod dsp;
pub mod poly;
pub mod processor;
pub mod state;
pub mod types;

pub use poly::{PORT_MAX_CHANNELS, PolyInput, PolyOutput};
pub use processor::{ModuleSampleable, Processor, ProcessorConfig};
pub use state::{PersistedState, Style};
pub use types::{Module, ModuleSchema, OutputSchema, ProcessArgs, Sampleable, SampleableConstructor};
