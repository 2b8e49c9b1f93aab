//! Equal-tempered note table, `A4 = 440 Hz`.

const NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// Semitone index of A4 counted from C0
const A4_INDEX: i32 = 57;

pub const LOWEST_OCTAVE: i32 = 0;
pub const HIGHEST_OCTAVE: i32 = 8;

/// Frequency of a note name such as `C4` or `F#2`
///
/// Only sharps are spelled; `Db4` and out-of-table octaves return `None`.
pub fn note_frequency(name: &str) -> Option<f64> {
    let split = name.find(|c: char| c.is_ascii_digit())?;
    let (pitch, octave) = name.split_at(split);
    let semitone = NAMES.iter().position(|n| *n == pitch)? as i32;
    let octave: i32 = octave.parse().ok()?;
    if !(LOWEST_OCTAVE..=HIGHEST_OCTAVE).contains(&octave) {
        return None;
    }
    let index = octave * 12 + semitone;
    Some(440.0 * 2f64.powf(f64::from(index - A4_INDEX) / 12.0))
}
