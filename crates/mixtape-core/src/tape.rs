//! Finite interleaved sample buffer (spec §3, §4.3).
//!
//! A `Tape` is a flat array of `nframes * nchannels` interleaved samples
//! plus a sample rate. Cloning a `Tape` shares the backing array (cheap);
//! `slice` produces another view over the same backing array. `shift` and
//! `+@` are the two operations the spec calls out as explicitly mutating —
//! everything else returns a new value.

use crate::error::{Error, Result};
use crate::stream::{Frame, Generator, Stream};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug)]
struct Backing {
    samples: Vec<f64>,
}

/// A view over a (possibly shared) interleaved sample backing array.
#[derive(Clone, Debug)]
pub struct Tape {
    backing: Rc<RefCell<Backing>>,
    /// Frame offset into `backing` where this view begins.
    offset: usize,
    frames: usize,
    channels: u8,
    sample_rate: u32,
}

impl Tape {
    /// Creates a silent tape of `nframes` frames.
    pub fn silence(sample_rate: u32, nchannels: u8, nframes: usize) -> Tape {
        Tape {
            backing: Rc::new(RefCell::new(Backing {
                samples: vec![0.0; nframes * nchannels as usize],
            })),
            offset: 0,
            frames: nframes,
            channels: nchannels,
            sample_rate,
        }
    }

    /// Wraps pre-interleaved samples directly. `samples.len()` must equal
    /// `nframes * nchannels`.
    pub fn from_interleaved(sample_rate: u32, nchannels: u8, samples: Vec<f64>) -> Tape {
        let nframes = samples.len() / nchannels.max(1) as usize;
        Tape {
            backing: Rc::new(RefCell::new(Backing { samples })),
            offset: 0,
            frames: nframes,
            channels: nchannels,
            sample_rate,
        }
    }

    /// A mono tape from a flat sample vector (used for envelope segments
    /// and single-cycle waves).
    pub fn mono(sample_rate: u32, samples: Vec<f64>) -> Tape {
        Tape::from_interleaved(sample_rate, 1, samples)
    }

    pub fn nframes(&self) -> usize {
        self.frames
    }

    pub fn nchannels(&self) -> u8 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn identity_eq(&self, other: &Tape) -> bool {
        Rc::ptr_eq(&self.backing, &other.backing)
            && self.offset == other.offset
            && self.frames == other.frames
    }

    /// Channel samples at the start of every frame in this view.
    pub fn samples(&self) -> std::cell::Ref<'_, [f64]> {
        std::cell::Ref::map(self.backing.borrow(), |b| {
            let start = self.offset * self.channels as usize;
            let end = start + self.frames * self.channels as usize;
            &b.samples[start..end]
        })
    }

    /// `at(frame)`: the channel samples for one frame.
    pub fn at(&self, frame: usize) -> Result<Vec<f64>> {
        if frame >= self.frames {
            return Err(Error::domain(format!(
                "tape.at: frame {frame} out of range (0..{})",
                self.frames
            )));
        }
        let b = self.backing.borrow();
        let ch = self.channels as usize;
        let start = (self.offset + frame) * ch;
        Ok(b.samples[start..start + ch].to_vec())
    }

    /// `slice(start, end)`: a view sharing the same backing array.
    pub fn slice(&self, start: usize, end: usize) -> Result<Tape> {
        if start > end || end > self.frames {
            return Err(Error::domain(format!(
                "tape.slice: invalid range {start}..{end} for tape of {} frames",
                self.frames
            )));
        }
        Ok(Tape {
            backing: Rc::clone(&self.backing),
            offset: self.offset + start,
            frames: end - start,
            channels: self.channels,
            sample_rate: self.sample_rate,
        })
    }

    fn owns_whole_backing(&self) -> bool {
        self.offset == 0 && self.frames * self.channels as usize == self.backing.borrow().samples.len()
    }

    /// Detaches this view into its own private backing array, so mutating
    /// it cannot affect (or be affected by) any other view that shares the
    /// original backing array.
    fn detach(&mut self) {
        if self.owns_whole_backing() && Rc::strong_count(&self.backing) == 1 {
            return;
        }
        let view: Vec<f64> = self.samples().to_vec();
        self.backing = Rc::new(RefCell::new(Backing { samples: view }));
        self.offset = 0;
    }

    /// `shift(amount)`: rotates samples cyclically. If `0 < |amount| < 1`
    /// it is a fraction of `nframes`.
    pub fn shift(&mut self, amount: f64) {
        if self.frames == 0 {
            return;
        }
        let raw = if amount.abs() < 1.0 && amount != 0.0 {
            amount * self.frames as f64
        } else {
            amount
        };
        let shift_frames = ((raw.round() as i64).rem_euclid(self.frames as i64)) as usize;
        if shift_frames == 0 {
            return;
        }
        let ch = self.channels as usize;
        let mut b = self.backing.borrow_mut();
        let start = self.offset * ch;
        let region = &mut b.samples[start..start + self.frames * ch];
        region.rotate_right(shift_frames * ch);
    }

    /// `+@(other, offset)`: adds `other` into `self` starting at frame
    /// `offset`, growing `self` by reallocation if needed.
    pub fn add_at(&mut self, other: &Tape, offset: usize) -> Result<()> {
        if other.channels != self.channels {
            return Err(Error::type_mismatch(format!(
                "+@: channel mismatch ({} vs {})",
                self.channels, other.channels
            )));
        }
        let needed = offset + other.frames;
        if needed > self.frames {
            self.detach();
            let ch = self.channels as usize;
            let mut b = self.backing.borrow_mut();
            b.samples.resize(needed * ch, 0.0);
            self.frames = needed;
        }
        let ch = self.channels as usize;
        let other_samples = other.samples().to_vec();
        let mut b = self.backing.borrow_mut();
        let base = (self.offset + offset) * ch;
        for (i, s) in other_samples.iter().enumerate() {
            b.samples[base + i] += s;
        }
        Ok(())
    }

    /// `remove_dc_in_place`: subtracts the per-channel arithmetic mean.
    pub fn remove_dc_in_place(&mut self) {
        if self.frames == 0 {
            return;
        }
        let ch = self.channels as usize;
        let mut means = vec![0.0; ch];
        {
            let samples = self.samples();
            for frame in samples.chunks(ch) {
                for (c, s) in frame.iter().enumerate() {
                    means[c] += s;
                }
            }
        }
        for m in &mut means {
            *m /= self.frames as f64;
        }
        let mut b = self.backing.borrow_mut();
        let start = self.offset * ch;
        for frame in b.samples[start..start + self.frames * ch].chunks_mut(ch) {
            for (c, s) in frame.iter_mut().enumerate() {
                *s -= means[c];
            }
        }
    }

    /// Linear interpolation at a fractional frame index, per channel.
    /// Used by `at/phase` playback; wavetable mip sampling uses
    /// Catmull-Rom instead (spec §4.5, open question (b)).
    pub fn interp(&self, frac_frame: f64) -> Vec<f64> {
        let ch = self.channels as usize;
        if self.frames == 0 {
            return vec![0.0; ch];
        }
        let n = self.frames as f64;
        let pos = frac_frame.rem_euclid(n);
        let i0 = pos.floor() as usize % self.frames;
        let i1 = (i0 + 1) % self.frames;
        let t = pos - pos.floor();
        let a = self.at(i0).unwrap_or_else(|_| vec![0.0; ch]);
        let b = self.at(i1).unwrap_or_else(|_| vec![0.0; ch]);
        a.iter().zip(b.iter()).map(|(x, y)| x + (y - x) * t).collect()
    }

    /// `at/phase(phase_stream)`: plays this tape back at a driven phase in
    /// `[0,1)`, wrapping.
    pub fn at_phase(&self, phase: Stream) -> Stream {
        let tape = self.clone();
        let n = self.frames as f64;
        Stream::from_generator(
            self.channels as usize,
            phase.nframes_hint(),
            TapePhaseGen { tape, phase, n },
        )
    }

    /// Converts this tape into a finite stream that yields its frames in
    /// order (used when a bare `Tape` value is treated as `Streamable`).
    pub fn into_stream(self) -> Stream {
        let nframes = self.frames;
        let channels = self.channels as usize;
        Stream::from_generator(channels, nframes, TapePlaybackGen { tape: self, pos: 0 })
    }

    pub fn resample(&self, converter: crate::resample::Converter, ratio: f64) -> Result<Tape> {
        crate::resample::resample_tape(self, converter, ratio)
    }
}

struct TapePhaseGen {
    tape: Tape,
    phase: Stream,
    n: f64,
}

impl Generator for TapePhaseGen {
    fn pull(&mut self) -> Option<Frame> {
        let ph = self.phase.pull()?;
        let p = ph[0].rem_euclid(1.0) * self.n;
        Some(self.tape.interp(p))
    }
}

struct TapePlaybackGen {
    tape: Tape,
    pos: usize,
}

impl Generator for TapePlaybackGen {
    fn pull(&mut self) -> Option<Frame> {
        if self.pos >= self.tape.frames {
            return None;
        }
        let frame = self.tape.at(self.pos).ok()?;
        self.pos += 1;
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_shares_backing() {
        let t = Tape::from_interleaved(48000, 1, vec![0.0, 1.0, 2.0, 3.0]);
        let s = t.slice(1, 3).unwrap();
        assert_eq!(s.nframes(), 2);
        assert_eq!(s.at(0).unwrap(), vec![1.0]);
    }

    #[test]
    fn shift_rotates_cyclically() {
        let mut t = Tape::from_interleaved(48000, 1, vec![0.0, 1.0, 2.0, 3.0]);
        t.shift(1.0);
        assert_eq!(t.samples().to_vec(), vec![3.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn shift_accepts_fractional_amount() {
        let mut t = Tape::from_interleaved(48000, 1, vec![0.0, 1.0, 2.0, 3.0]);
        t.shift(0.5);
        assert_eq!(t.samples().to_vec(), vec![2.0, 3.0, 0.0, 1.0]);
    }

    #[test]
    fn add_at_grows_when_needed() {
        let mut t = Tape::from_interleaved(48000, 1, vec![1.0, 1.0]);
        let other = Tape::from_interleaved(48000, 1, vec![5.0, 5.0, 5.0]);
        t.add_at(&other, 1).unwrap();
        assert_eq!(t.nframes(), 4);
        assert_eq!(t.samples().to_vec(), vec![1.0, 6.0, 5.0, 5.0]);
    }

    #[test]
    fn remove_dc_centers_mean() {
        let mut t = Tape::from_interleaved(48000, 1, vec![1.0, 2.0, 3.0]);
        t.remove_dc_in_place();
        let s = t.samples();
        let mean: f64 = s.iter().sum::<f64>() / s.len() as f64;
        assert!(mean.abs() < 1e-9);
    }
}
