pub mod quantizer;

pub use quantizer::{SEMITONE, note_index, note_label, octave_index, quantize};
