//! Oscillator primitives (spec §4.8).
//!
//! Every oscillator here is phase-accumulating: it pulls a frequency value
//! every frame (so frequency can itself be audio-rate, which is what makes
//! FM free) and advances an internal phase by `freq / sample_rate`,
//! wrapping at `1.0`.

use std::rc::Rc;

use crate::stream::{Frame, Generator, Stream};
use crate::wavetable::Wavetable;

struct PhasorGen {
    freq: Stream,
    sample_rate: f64,
    phase: f64,
}
impl Generator for PhasorGen {
    fn pull(&mut self) -> Option<Frame> {
        let f = self.freq.pull()?[0];
        let out = self.phase;
        self.phase = (self.phase + f / self.sample_rate).rem_euclid(1.0);
        Some(vec![out])
    }
}

/// A bare ramp from `0.0` to `1.0`, wrapping, driven by `freq` (Hz).
pub fn phasor(freq: Stream, sample_rate: u32) -> Stream {
    phasor_from(freq, sample_rate, 0.0)
}

/// Like [`phasor`], but starting from `phase0` instead of `0.0`.
pub fn phasor_from(freq: Stream, sample_rate: u32, phase0: f64) -> Stream {
    Stream::from_generator(1, 0, PhasorGen { freq, sample_rate: sample_rate as f64, phase: phase0.rem_euclid(1.0) })
}

struct ImpulseGen {
    freq: Stream,
    sample_rate: f64,
    phase: f64,
}
impl Generator for ImpulseGen {
    fn pull(&mut self) -> Option<Frame> {
        let f = self.freq.pull()?[0];
        let prev = self.phase;
        self.phase = (self.phase + f / self.sample_rate).rem_euclid(1.0);
        let fired = self.phase < prev;
        Some(vec![if fired { 1.0 } else { 0.0 }])
    }
}

/// `1.0` on the frame the phase wraps, `0.0` otherwise.
pub fn impulse(freq: Stream, sample_rate: u32) -> Stream {
    impulse_from(freq, sample_rate, 0.0)
}

/// Like [`impulse`], but starting from `phase0` instead of `0.0`.
pub fn impulse_from(freq: Stream, sample_rate: u32, phase0: f64) -> Stream {
    Stream::from_generator(1, 0, ImpulseGen { freq, sample_rate: sample_rate as f64, phase: phase0.rem_euclid(1.0) })
}

struct WavetableGen {
    wt: Rc<Wavetable>,
    freq: Stream,
    sample_rate: f64,
    phase: f64,
}
impl Generator for WavetableGen {
    fn pull(&mut self) -> Option<Frame> {
        let f = self.freq.pull()?[0];
        let out = self.wt.sample(self.phase, f);
        self.phase = (self.phase + f / self.sample_rate).rem_euclid(1.0);
        Some(vec![out])
    }
}

/// Samples a band-limited wavetable at the phase driven by `freq`.
pub fn wavetable_osc(wt: Rc<Wavetable>, freq: Stream, sample_rate: u32) -> Stream {
    wavetable_osc_from(wt, freq, sample_rate, 0.0)
}

/// Like [`wavetable_osc`], but starting from `phase0` instead of `0.0`.
pub fn wavetable_osc_from(wt: Rc<Wavetable>, freq: Stream, sample_rate: u32, phase0: f64) -> Stream {
    Stream::from_generator(
        1,
        0,
        WavetableGen { wt, freq, sample_rate: sample_rate as f64, phase: phase0.rem_euclid(1.0) },
    )
}

struct FmGen {
    wt: Rc<Wavetable>,
    carrier: Stream,
    modulator: Stream,
    index: f64,
    sample_rate: f64,
    phase: f64,
}
impl Generator for FmGen {
    fn pull(&mut self) -> Option<Frame> {
        let fc = self.carrier.pull()?[0];
        let m = self.modulator.pull()?[0];
        let inst_freq = fc + self.index * m * fc;
        let out = self.wt.sample(self.phase, fc);
        self.phase = (self.phase + inst_freq / self.sample_rate).rem_euclid(1.0);
        Some(vec![out])
    }
}

/// Phase (through-zero) FM: the modulator displaces the carrier's
/// instantaneous frequency by `index * modulator * carrier_freq`, but the
/// wavetable's band-limit level is still chosen from the unmodulated
/// carrier frequency.
pub fn fm_osc(wt: Rc<Wavetable>, carrier: Stream, modulator: Stream, index: f64, sample_rate: u32) -> Stream {
    fm_osc_from(wt, carrier, modulator, index, sample_rate, 0.0)
}

/// Like [`fm_osc`], but starting from `phase0` instead of `0.0`.
pub fn fm_osc_from(
    wt: Rc<Wavetable>,
    carrier: Stream,
    modulator: Stream,
    index: f64,
    sample_rate: u32,
    phase0: f64,
) -> Stream {
    Stream::from_generator(
        1,
        0,
        FmGen { wt, carrier, modulator, index, sample_rate: sample_rate as f64, phase: phase0.rem_euclid(1.0) },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phasor_wraps_at_one() {
        let p = phasor(Stream::constant(48000.0), 48000);
        let first = p.pull().unwrap()[0];
        let second = p.pull().unwrap()[0];
        assert_eq!(first, 0.0);
        assert!(second < 1.0);
    }

    #[test]
    fn impulse_fires_once_per_cycle() {
        let imp = impulse(Stream::constant(4800.0), 48000);
        let mut fires = 0;
        for _ in 0..10 {
            if imp.pull().unwrap()[0] == 1.0 {
                fires += 1;
            }
        }
        assert_eq!(fires, 1);
    }
}
