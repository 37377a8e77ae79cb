//! Filters and per-sample utility blocks (spec §4.8).
//!
//! Every filter here reads its coefficients from a `Stream` rather than a
//! bare `f64`, so cutoff/feedback/etc. can themselves be modulated at
//! audio rate; a constant parameter is just `Stream::constant(x)`.

use std::collections::VecDeque;

use crate::stream::{Frame, Generator, Stream};

struct OnePoleGen {
    input: Stream,
    coeff: Stream,
    y: f64,
}
impl Generator for OnePoleGen {
    fn pull(&mut self) -> Option<Frame> {
        let x = self.input.pull()?[0];
        let g = self.coeff.pull()?[0];
        self.y += g * (x - self.y);
        Some(vec![self.y])
    }
}

/// `y[n] = y[n-1] + coeff * (x[n] - y[n-1])`, the teacher's onepole
/// smoother, used directly as a lowpass and as the building block for
/// `lp1`/`hp1`/`ap1` below.
pub fn onepole(input: Stream, coeff: Stream) -> Stream {
    Stream::from_generator(1, 0, OnePoleGen { input, coeff, y: 0.0 })
}

fn cutoff_to_coeff(cutoff_hz: f64, sample_rate: f64) -> f64 {
    let x = (-std::f64::consts::TAU * cutoff_hz / sample_rate).exp();
    1.0 - x
}

struct Lp1Gen {
    input: Stream,
    cutoff: Stream,
    sample_rate: f64,
    y: f64,
}
impl Generator for Lp1Gen {
    fn pull(&mut self) -> Option<Frame> {
        let x = self.input.pull()?[0];
        let c = self.cutoff.pull()?[0];
        let g = cutoff_to_coeff(c, self.sample_rate);
        self.y += g * (x - self.y);
        Some(vec![self.y])
    }
}

/// One-pole lowpass parameterized by cutoff in Hz.
pub fn lp1(input: Stream, cutoff_hz: Stream, sample_rate: u32) -> Stream {
    Stream::from_generator(1, 0, Lp1Gen { input, cutoff: cutoff_hz, sample_rate: sample_rate as f64, y: 0.0 })
}

struct Hp1Gen {
    input: Stream,
    cutoff: Stream,
    sample_rate: f64,
    y: f64,
}
impl Generator for Hp1Gen {
    fn pull(&mut self) -> Option<Frame> {
        let x = self.input.pull()?[0];
        let c = self.cutoff.pull()?[0];
        let g = cutoff_to_coeff(c, self.sample_rate);
        self.y += g * (x - self.y);
        Some(vec![x - self.y])
    }
}

/// One-pole highpass: input minus its own one-pole lowpass.
pub fn hp1(input: Stream, cutoff_hz: Stream, sample_rate: u32) -> Stream {
    Stream::from_generator(1, 0, Hp1Gen { input, cutoff: cutoff_hz, sample_rate: sample_rate as f64, y: 0.0 })
}

struct Ap1Gen {
    input: Stream,
    cutoff: Stream,
    sample_rate: f64,
    x1: f64,
    y1: f64,
}
impl Generator for Ap1Gen {
    fn pull(&mut self) -> Option<Frame> {
        let x = self.input.pull()?[0];
        let c = self.cutoff.pull()?[0];
        let tan_half = (std::f64::consts::PI * c / self.sample_rate).tan();
        let g = (tan_half - 1.0) / (tan_half + 1.0);
        let y = g * x + self.x1 - g * self.y1;
        self.x1 = x;
        self.y1 = y;
        Some(vec![y])
    }
}

/// One-pole allpass; a phase-only filter at a given break frequency.
pub fn ap1(input: Stream, cutoff_hz: Stream, sample_rate: u32) -> Stream {
    Stream::from_generator(1, 0, Ap1Gen { input, cutoff: cutoff_hz, sample_rate: sample_rate as f64, x1: 0.0, y1: 0.0 })
}

struct DcBlockerGen {
    input: Stream,
    x1: f64,
    y1: f64,
}
impl Generator for DcBlockerGen {
    fn pull(&mut self) -> Option<Frame> {
        const R: f64 = 0.995;
        let x = self.input.pull()?[0];
        let y = x - self.x1 + R * self.y1;
        self.x1 = x;
        self.y1 = y;
        Some(vec![y])
    }
}

/// Classic `y = x - x[n-1] + R*y[n-1]` DC blocker.
pub fn dc_blocker(input: Stream) -> Stream {
    Stream::from_generator(1, 0, DcBlockerGen { input, x1: 0.0, y1: 0.0 })
}

struct SvfGen {
    input: Stream,
    cutoff: Stream,
    resonance: Stream,
    sample_rate: f64,
    ic1eq: f64,
    ic2eq: f64,
    tanh_shaped: bool,
}
impl Generator for SvfGen {
    fn pull(&mut self) -> Option<Frame> {
        let x = self.input.pull()?[0];
        let cutoff = self.cutoff.pull()?[0];
        let res = self.resonance.pull()?[0];
        let g = (std::f64::consts::PI * cutoff / self.sample_rate).tan();
        let k = 2.0 - 2.0 * res.clamp(0.0, 0.999);
        let a1 = 1.0 / (1.0 + g * (g + k));
        let a2 = g * a1;
        let a3 = g * a2;
        let v3 = x - self.ic2eq;
        let v1 = a1 * self.ic1eq + a2 * v3;
        let v2 = self.ic2eq + a2 * self.ic1eq + a3 * v3;
        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;
        let (low, band, high) = (v2, v1, x - k * v1 - v2);
        if self.tanh_shaped {
            Some(vec![low.tanh(), band.tanh(), high.tanh()])
        } else {
            Some(vec![low, band, high])
        }
    }
}

/// Topology-preserving-transform state variable filter (Andrew Simper's
/// zero-delay-feedback design). Yields a 3-channel frame: `[lowpass,
/// bandpass, highpass]`; callers pick the channel(s) they want (spec §9,
/// open question (c): saturation is optional, controlled by
/// `MIXTAPE_SVF_TANH`).
pub fn svf(input: Stream, cutoff_hz: Stream, resonance: Stream, sample_rate: u32, tanh_shaped: bool) -> Stream {
    Stream::from_generator(
        3,
        0,
        SvfGen {
            input,
            cutoff: cutoff_hz,
            resonance,
            sample_rate: sample_rate as f64,
            ic1eq: 0.0,
            ic2eq: 0.0,
            tanh_shaped,
        },
    )
}

struct CombGen {
    input: Stream,
    buffer: VecDeque<f64>,
    feedback: f64,
}
impl Generator for CombGen {
    fn pull(&mut self) -> Option<Frame> {
        let x = self.input.pull()?[0];
        let delayed = *self.buffer.front().unwrap_or(&0.0);
        let y = x + self.feedback * delayed;
        self.buffer.pop_front();
        self.buffer.push_back(y);
        Some(vec![delayed])
    }
}

/// Feedback comb filter with an integer delay line of `delay_frames`.
pub fn comb(input: Stream, delay_frames: usize, feedback: f64) -> Stream {
    let mut buffer = VecDeque::with_capacity(delay_frames.max(1));
    buffer.resize(delay_frames.max(1), 0.0);
    Stream::from_generator(1, 0, CombGen { input, buffer, feedback })
}

struct SoftclipGen {
    input: Stream,
    drive: Stream,
}
impl Generator for SoftclipGen {
    fn pull(&mut self) -> Option<Frame> {
        let x = self.input.pull()?[0];
        let d = self.drive.pull()?[0].max(1e-6);
        Some(vec![(d * x).tanh() / d.tanh()])
    }
}

/// `tanh(drive*x) / tanh(drive)`, normalized so drive `-> 0` approaches
/// identity.
pub fn softclip(input: Stream, drive: Stream) -> Stream {
    Stream::from_generator(1, 0, SoftclipGen { input, drive })
}

struct SampleHoldGen {
    input: Stream,
    trigger: Stream,
    held: f64,
    prev_trigger: f64,
}
impl Generator for SampleHoldGen {
    fn pull(&mut self) -> Option<Frame> {
        let x = self.input.pull()?[0];
        let t = self.trigger.pull()?[0];
        if t > 0.0 && self.prev_trigger <= 0.0 {
            self.held = x;
        }
        self.prev_trigger = t;
        Some(vec![self.held])
    }
}

/// Latches `input` on each rising edge of `trigger`.
pub fn sample_and_hold(input: Stream, trigger: Stream) -> Stream {
    Stream::from_generator(1, 0, SampleHoldGen { input, trigger, held: 0.0, prev_trigger: 0.0 })
}

struct PanGen {
    input: Stream,
    pos: Stream,
}
impl Generator for PanGen {
    fn pull(&mut self) -> Option<Frame> {
        let x = self.input.pull()?[0];
        let p = self.pos.pull()?[0].clamp(-1.0, 1.0);
        let theta = (p + 1.0) * std::f64::consts::FRAC_PI_4;
        Some(vec![x * theta.cos(), x * theta.sin()])
    }
}

/// Equal-power pan of a mono stream to stereo; `pos` is `-1` (left) to `1`
/// (right).
pub fn pan(input: Stream, pos: Stream) -> Stream {
    Stream::from_generator(2, 0, PanGen { input, pos })
}

struct MixGen {
    a: Stream,
    b: Stream,
    amt: Stream,
}
impl Generator for MixGen {
    fn pull(&mut self) -> Option<Frame> {
        let a = self.a.pull()?;
        let b = self.b.pull()?;
        let t = self.amt.pull()?[0].clamp(0.0, 1.0);
        Some(a.iter().zip(b.iter()).map(|(x, y)| x * (1.0 - t) + y * t).collect())
    }
}

/// Linear crossfade between two streams of equal channel count.
pub fn mix(a: Stream, b: Stream, amt: Stream) -> Stream {
    let ch = a.nchannels();
    Stream::from_generator(ch, 0, MixGen { a, b, amt })
}

struct PeakGen {
    input: Stream,
    decay: f64,
    value: f64,
}
impl Generator for PeakGen {
    fn pull(&mut self) -> Option<Frame> {
        let x = self.input.pull()?[0].abs();
        self.value = x.max(self.value * self.decay);
        Some(vec![self.value])
    }
}

/// Leaky peak follower: `peak = max(|x|, peak * decay)`.
pub fn peak(input: Stream, decay: f64) -> Stream {
    Stream::from_generator(1, 0, PeakGen { input, decay, value: 0.0 })
}

struct DecimateGen {
    input: Stream,
    factor: usize,
    counter: usize,
    held: Frame,
}
impl Generator for DecimateGen {
    fn pull(&mut self) -> Option<Frame> {
        let x = self.input.pull()?;
        if self.counter == 0 {
            self.held = x;
        }
        self.counter = (self.counter + 1) % self.factor.max(1);
        Some(self.held.clone())
    }
}

/// Sample-rate reduction: holds every `factor`-th sample (bitcrusher-style).
pub fn decimate(input: Stream, factor: usize) -> Stream {
    let ch = input.nchannels();
    Stream::from_generator(ch, 0, DecimateGen { input, factor, counter: 0, held: vec![0.0; ch] })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn onepole_converges_to_a_constant_input() {
        let s = onepole(Stream::constant(1.0), Stream::constant(0.5));
        let mut last = 0.0;
        for _ in 0..50 {
            last = s.pull().unwrap()[0];
        }
        assert!((last - 1.0).abs() < 1e-6);
    }

    #[test]
    fn dc_blocker_removes_a_constant_offset() {
        let s = dc_blocker(Stream::constant(1.0));
        let mut last = 0.0;
        for _ in 0..2000 {
            last = s.pull().unwrap()[0];
        }
        assert!(last.abs() < 0.05);
    }

    #[test]
    fn comb_returns_silence_before_the_delay_fills() {
        let s = comb(Stream::constant(1.0), 4, 0.5);
        assert_eq!(s.pull().unwrap()[0], 0.0);
    }

    #[test]
    fn sample_and_hold_latches_on_rising_edge() {
        let input = Stream::constant(7.0);
        let trig_vals = [0.0, 1.0, 0.0, 0.0];
        let mut idx = 0;
        let trigger = Stream::from_generator(
            1,
            0,
            FnGen(move || {
                let v = trig_vals.get(idx).copied().unwrap_or(0.0);
                idx += 1;
                v
            }),
        );
        let s = sample_and_hold(input, trigger);
        let outs: Vec<f64> = (0..4).map(|_| s.pull().unwrap()[0]).collect();
        assert_eq!(outs, vec![0.0, 7.0, 7.0, 7.0]);
    }

    struct FnGen<F: FnMut() -> f64>(F);
    impl<F: FnMut() -> f64> Generator for FnGen<F> {
        fn pull(&mut self) -> Option<Frame> {
            Some(vec![(self.0)()])
        }
    }

    #[test]
    fn pan_center_is_equal_power() {
        let s = pan(Stream::constant(1.0), Stream::constant(0.0));
        let f = s.pull().unwrap();
        assert!((f[0] - f[1]).abs() < 1e-9);
    }
}
