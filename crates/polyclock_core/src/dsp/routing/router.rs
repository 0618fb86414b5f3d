//! First-match threshold routing.

use crate::dsp::utilities::quantize;

/// Index of the first split that `value <= split`, or `splits.len()` (the
/// overflow bucket) when none does.
///
/// Splits are scanned in index order and are not assumed to be sorted, so a
/// later, lower split never captures a value an earlier split already took.
pub fn route(value: f32, splits: &[f32]) -> usize {
    splits
        .iter()
        .position(|split| value <= *split)
        .unwrap_or(splits.len())
}

/// Quantize `value` and route it against already quantized splits.
pub fn route_quantized(value: f32, quantized_splits: &[f32]) -> (usize, f32) {
    let q = quantize(value);
    (route(q, quantized_splits), q)
}
