//! Unison voice expansion (spec §4.10).
//!
//! Turns a single oscillator "program" into `voice_count` detuned, panned,
//! optionally phase-randomized copies. The expansion itself is pure data —
//! `mixtape-runtime` is the one that actually pushes an env frame per
//! voice and re-evaluates the quoted oscillator body against it.

use crate::noise::Xorshift32;
use crate::pitch::cents_to_ratio;

/// Per-voice detune/pan/phase parameters produced by [`expand`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voice {
    pub detune_ratio: f64,
    pub pan: f64,
    pub phase_offset: f64,
}

/// Spreads `voice_count` voices symmetrically across `+/- detune_cents/2`
/// and `+/- spread_pan`, optionally randomizing each voice's start phase
/// with a seeded PRNG (deterministic for a given seed).
pub fn expand(voice_count: usize, detune_cents: f64, spread_pan: f64, phase_random: bool, seed: u32) -> Vec<Voice> {
    if voice_count == 0 {
        return Vec::new();
    }
    if voice_count == 1 {
        return vec![Voice { detune_ratio: 1.0, pan: 0.0, phase_offset: 0.0 }];
    }
    let mut rng = Xorshift32::new(seed);
    (0..voice_count)
        .map(|i| {
            let t = i as f64 / (voice_count - 1) as f64 * 2.0 - 1.0; // -1..1
            let cents = t * detune_cents / 2.0;
            let pan = t * spread_pan;
            let phase_offset = if phase_random { (rng.next_bipolar() + 1.0) / 2.0 } else { 0.0 };
            Voice { detune_ratio: cents_to_ratio(cents), pan, phase_offset }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_voice_is_centered() {
        let voices = expand(1, 20.0, 0.5, false, 1);
        assert_eq!(voices, vec![Voice { detune_ratio: 1.0, pan: 0.0, phase_offset: 0.0 }]);
    }

    #[test]
    fn voices_span_the_detune_and_pan_range() {
        let voices = expand(3, 20.0, 1.0, false, 1);
        assert_eq!(voices.len(), 3);
        assert!(voices[0].detune_ratio < 1.0);
        assert!((voices[1].detune_ratio - 1.0).abs() < 1e-9);
        assert!(voices[2].detune_ratio > 1.0);
        assert_eq!(voices[0].pan, -1.0);
        assert_eq!(voices[2].pan, 1.0);
    }

    #[test]
    fn phase_random_is_deterministic_for_a_seed() {
        let a = expand(4, 10.0, 0.5, true, 7);
        let b = expand(4, 10.0, 0.5, true, 7);
        assert_eq!(a, b);
    }
}
