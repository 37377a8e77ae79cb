//! Pitch and tuning conversions (spec §4.9).
//!
//! All conversions are plain math against A440/12-TET; nothing here is
//! stateful.

/// MIDI note number to frequency in Hz, A4 (note 69) = 440 Hz.
pub fn note_to_freq(note: f64) -> f64 {
    440.0 * 2f64.powf((note - 69.0) / 12.0)
}

/// Frequency in Hz to a (possibly fractional) MIDI note number.
pub fn freq_to_note(freq_hz: f64) -> f64 {
    69.0 + 12.0 * (freq_hz / 440.0).log2()
}

/// A ratio expressed in cents (1200 cents per octave) to a frequency
/// multiplier.
pub fn cents_to_ratio(cents: f64) -> f64 {
    2f64.powf(cents / 1200.0)
}

/// A frequency multiplier to cents.
pub fn ratio_to_cents(ratio: f64) -> f64 {
    1200.0 * ratio.log2()
}

/// A semitone offset to a frequency multiplier.
pub fn semitones_to_ratio(semitones: f64) -> f64 {
    2f64.powf(semitones / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_is_440() {
        assert!((note_to_freq(69.0) - 440.0).abs() < 1e-9);
    }

    #[test]
    fn note_and_freq_roundtrip() {
        let n = freq_to_note(note_to_freq(57.3));
        assert!((n - 57.3).abs() < 1e-9);
    }

    #[test]
    fn octave_is_1200_cents() {
        assert!((cents_to_ratio(1200.0) - 2.0).abs() < 1e-9);
        assert!((ratio_to_cents(2.0) - 1200.0).abs() < 1e-9);
    }
}
