//! Semitone quantizer.
//!
//! Snaps a V/Oct value to the nearest multiple of one semitone (1/12 V).
//! Ties round away from zero (`f32::round`), so `quantize(1/24) == 1/12` and
//! `quantize(-1/24) == -1/12`.

/// One semitone in V/Oct
pub const SEMITONE: f32 = 1.0 / 12.0;

/// Note letters by pitch class; lowercase marks the sharp of the preceding note.
const NOTE_NAMES: &[u8; 12] = b"CdDeEFgGaAbB";

/// Octave shown for 0V
const REFERENCE_OCTAVE: i32 = 4;

/// Nearest whole semitone count for a V/Oct value.
pub fn semitones(voct: f32) -> i32 {
    (voct * 12.0).round() as i32
}

pub fn quantize(voct: f32) -> f32 {
    (voct * 12.0).round() / 12.0
}

/// Pitch class 0..12 of the quantized value (0 = C).
pub fn note_index(voct: f32) -> usize {
    semitones(voct).rem_euclid(12) as usize
}

/// Octave of the quantized value relative to 0V; negative below.
pub fn octave_index(voct: f32) -> i32 {
    semitones(voct).div_euclid(12)
}

/// Display label such as `"C 4"` or `"g 3"`.
///
/// Octaves outside 0..=9 render as `L` (low) or `H` (high).
pub fn note_label(voct: f32) -> String {
    let note = NOTE_NAMES[note_index(voct)] as char;
    let octave = octave_index(voct) + REFERENCE_OCTAVE;
    let octave = match octave {
        o if o < 0 => 'L',
        o if o > 9 => 'H',
        o => char::from(b'0' + o as u8),
    };
    format!("{} {}", note, octave)
}
