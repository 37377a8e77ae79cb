//! Noise generators (spec §4.8).
//!
//! All three colors share one xorshift32 core so a fixed seed reproduces
//! the same sequence across runs — useful for deterministic test renders.
//! No crate pulls its weight here: xorshift32 is five lines and every
//! example repo that needs noise rolls its own.

use crate::stream::{Frame, Generator, Stream};

/// xorshift32, per Marsaglia. Never emits zero once seeded with a nonzero
/// state.
#[derive(Clone)]
pub struct Xorshift32 {
    state: u32,
}

impl Xorshift32 {
    pub fn new(seed: u32) -> Self {
        Xorshift32 { state: if seed == 0 { 0x9e3779b9 } else { seed } }
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// A uniform sample in `[-1, 1)`.
    pub fn next_bipolar(&mut self) -> f64 {
        (self.next_u32() as f64 / u32::MAX as f64) * 2.0 - 1.0
    }
}

struct WhiteGen(Xorshift32);
impl Generator for WhiteGen {
    fn pull(&mut self) -> Option<Frame> {
        Some(vec![self.0.next_bipolar()])
    }
}

/// Infinite mono white noise stream.
pub fn white(seed: u32) -> Stream {
    Stream::from_generator(1, 0, WhiteGen(Xorshift32::new(seed)))
}

struct PinkGen {
    rng: Xorshift32,
    // Paul Kellet's economy pink filter.
    b: [f64; 7],
}
impl Generator for PinkGen {
    fn pull(&mut self) -> Option<Frame> {
        let white = self.rng.next_bipolar();
        self.b[0] = 0.99886 * self.b[0] + white * 0.0555179;
        self.b[1] = 0.99332 * self.b[1] + white * 0.0750759;
        self.b[2] = 0.96900 * self.b[2] + white * 0.1538520;
        self.b[3] = 0.86650 * self.b[3] + white * 0.3104856;
        self.b[4] = 0.55000 * self.b[4] + white * 0.5329522;
        self.b[5] = -0.7616 * self.b[5] - white * 0.0168980;
        let pink = self.b[0] + self.b[1] + self.b[2] + self.b[3] + self.b[4] + self.b[5] + self.b[6] + white * 0.5362;
        self.b[6] = white * 0.115926;
        Some(vec![pink * 0.11])
    }
}

/// Infinite mono pink noise stream (Paul Kellet's economy filter).
pub fn pink(seed: u32) -> Stream {
    Stream::from_generator(1, 0, PinkGen { rng: Xorshift32::new(seed), b: [0.0; 7] })
}

struct BrownGen {
    rng: Xorshift32,
    last: f64,
    step: f64,
}
impl Generator for BrownGen {
    fn pull(&mut self) -> Option<Frame> {
        let step = self.rng.next_bipolar() * self.step;
        self.last = (self.last + step).clamp(-1.0, 1.0);
        Some(vec![self.last])
    }
}

/// Infinite mono brown (red) noise stream: an integrated, leaky random
/// walk clamped to `[-1, 1]`, with a fixed `0.02` step size.
pub fn brown(seed: u32) -> Stream {
    brown_with_step(seed, 0.02)
}

/// Like [`brown`], but with a configurable step size.
pub fn brown_with_step(seed: u32, step: f64) -> Stream {
    Stream::from_generator(1, 0, BrownGen { rng: Xorshift32::new(seed), last: 0.0, step })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xorshift_is_deterministic_for_a_seed() {
        let mut a = Xorshift32::new(42);
        let mut b = Xorshift32::new(42);
        for _ in 0..10 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn white_noise_stays_in_range() {
        let s = white(1);
        for _ in 0..1000 {
            let f = s.pull().unwrap();
            assert!(f[0] >= -1.0 && f[0] < 1.0);
        }
    }

    #[test]
    fn pink_noise_is_bounded() {
        let s = pink(1);
        for _ in 0..5000 {
            let f = s.pull().unwrap();
            assert!(f[0].abs() <= 1.2);
        }
    }
}
