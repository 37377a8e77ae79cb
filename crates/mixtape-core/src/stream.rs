//! Lazy, pull-based signal streams (spec §3, §4.4).
//!
//! A `Stream` is a per-frame generator pulled one frame at a time by the
//! host or by another stream. There is no buffering beyond a single frame:
//! combinators pull their inputs exactly as often as they are pulled
//! themselves, which is what makes `take` cancellable mid-render (spec
//! §5). Cloning a `Stream` shares the same generator state — two clones
//! pulling independently will race each other through the same sequence,
//! same as the teacher's channel values share one underlying queue.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Result;
use crate::tape::Tape;

/// One frame's worth of channel samples.
pub type Frame = Vec<f64>;

/// Something that can be pulled one frame at a time.
///
/// `pull` returns `None` once the stream is exhausted; a `Stream` backed by
/// a generator that never returns `None` is an infinite stream (spec §4.4
/// calls a bare `Num` "the infinite constant stream").
pub trait Generator {
    fn pull(&mut self) -> Option<Frame>;
}

struct Inner {
    nchannels: usize,
    nframes_hint: usize,
    r#gen: Box<dyn Generator>,
}

/// A lazy per-frame signal generator.
#[derive(Clone)]
pub struct Stream {
    inner: Rc<RefCell<Inner>>,
}

impl Stream {
    pub fn from_generator(nchannels: usize, nframes_hint: usize, r#gen: impl Generator + 'static) -> Stream {
        Stream {
            inner: Rc::new(RefCell::new(Inner {
                nchannels,
                nframes_hint,
                r#gen: Box::new(r#gen),
            })),
        }
    }

    pub fn nchannels(&self) -> usize {
        self.inner.borrow().nchannels
    }

    /// `0` means unbounded (the stream claims no known length).
    pub fn nframes_hint(&self) -> usize {
        self.inner.borrow().nframes_hint
    }

    pub fn identity_eq(&self, other: &Stream) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Pulls the next frame, or `None` at end of stream.
    pub fn pull(&self) -> Option<Frame> {
        self.inner.borrow_mut().r#gen.pull()
    }

    /// An infinite mono stream that always yields `n`.
    pub fn constant(n: f64) -> Stream {
        Stream::from_generator(1, 0, ConstantGen(n))
    }

    /// Coerces anything streamable into a `Stream` at a fixed channel
    /// count by repeating or truncating the last channel produced.
    pub fn mono(self) -> Stream {
        self.reshape(1)
    }

    pub fn stereo(self) -> Stream {
        self.reshape(2)
    }

    fn reshape(self, nchannels: usize) -> Stream {
        if self.nchannels() == nchannels {
            return self;
        }
        let hint = self.nframes_hint();
        Stream::from_generator(nchannels, hint, ReshapeGen { inner: self, nchannels })
    }

    /// Delays the stream by `n` frames of silence, preserving channel
    /// count.
    pub fn delay(self, n: usize) -> Stream {
        let ch = self.nchannels();
        let hint = if self.nframes_hint() == 0 { 0 } else { self.nframes_hint() + n };
        Stream::from_generator(ch, hint, DelayGen { inner: self, remaining: n, channels: ch })
    }

    /// Drops the first `n` frames.
    pub fn skip(self, n: usize) -> Stream {
        let ch = self.nchannels();
        let hint = self.nframes_hint().saturating_sub(n);
        Stream::from_generator(ch, hint, SkipGen { inner: self, remaining: n })
    }

    /// Limits the stream to at most `n` frames.
    pub fn take(self, n: usize) -> Stream {
        let ch = self.nchannels();
        let hint = match self.nframes_hint() {
            0 => n,
            h => h.min(n),
        };
        Stream::from_generator(ch, hint, TakeGen { inner: self, remaining: n })
    }

    /// Concatenates `self` then `other`, both must share a channel count.
    pub fn join(self, other: Stream) -> Result<Stream> {
        if self.nchannels() != other.nchannels() {
            return Err(crate::error::Error::type_mismatch(format!(
                "join: channel mismatch ({} vs {})",
                self.nchannels(),
                other.nchannels()
            )));
        }
        let ch = self.nchannels();
        let hint = if self.nframes_hint() == 0 || other.nframes_hint() == 0 {
            0
        } else {
            self.nframes_hint() + other.nframes_hint()
        };
        Ok(Stream::from_generator(
            ch,
            hint,
            JoinGen { first: Some(self), second: other },
        ))
    }

    /// Applies `f` to every frame.
    pub fn map(self, f: impl Fn(&[f64]) -> Frame + 'static) -> Stream {
        let ch = self.nchannels();
        let hint = self.nframes_hint();
        Stream::from_generator(ch, hint, MapGen { input: self, f: Box::new(f) })
    }

    /// Combines two streams frame-by-frame with `f`, stopping when either
    /// input is exhausted.
    pub fn combine(self, other: Stream, f: impl Fn(&[f64], &[f64]) -> Frame + 'static) -> Stream {
        let ch = self.nchannels().max(other.nchannels());
        let hint = match (self.nframes_hint(), other.nframes_hint()) {
            (0, 0) => 0,
            (0, h) | (h, 0) => h,
            (a, b) => a.min(b),
        };
        Stream::from_generator(ch, hint, CombineGen { a: self, b: other, f: Box::new(f) })
    }

    /// Pulls frames into a `Tape`, calling `progress` every `REPORT_EVERY`
    /// frames and checking `cancel` at the same cadence (spec §5's bounded
    /// cancellation/progress plumbing).
    pub fn take_into_tape(
        &self,
        sample_rate: u32,
        nframes: usize,
        cancel: &crate::cancel::CancelToken,
        mut progress: Option<&mut dyn FnMut(usize, usize)>,
    ) -> Result<Tape> {
        const REPORT_EVERY: usize = 4096;
        let ch = self.nchannels();
        let mut samples = Vec::with_capacity(nframes * ch);
        let mut done = 0usize;
        while done < nframes {
            if cancel.is_cancelled() {
                return Err(crate::error::Error::Cancelled);
            }
            match self.pull() {
                Some(frame) => {
                    samples.extend_from_slice(&frame[..ch.min(frame.len())]);
                    if frame.len() < ch {
                        samples.extend(std::iter::repeat(0.0).take(ch - frame.len()));
                    }
                    done += 1;
                    if done % REPORT_EVERY == 0 {
                        if let Some(cb) = progress.as_deref_mut() {
                            cb(done, nframes);
                        }
                    }
                }
                None => break,
            }
        }
        if let Some(cb) = progress.as_deref_mut() {
            cb(done, nframes);
        }
        Ok(Tape::from_interleaved(sample_rate, ch as u8, samples))
    }
}

struct ConstantGen(f64);
impl Generator for ConstantGen {
    fn pull(&mut self) -> Option<Frame> {
        Some(vec![self.0])
    }
}

struct ReshapeGen {
    inner: Stream,
    nchannels: usize,
}
impl Generator for ReshapeGen {
    fn pull(&mut self) -> Option<Frame> {
        let frame = self.inner.pull()?;
        Some(reshape_frame(&frame, self.nchannels))
    }
}

fn reshape_frame(frame: &[f64], nchannels: usize) -> Frame {
    match frame.len().cmp(&nchannels) {
        std::cmp::Ordering::Equal => frame.to_vec(),
        std::cmp::Ordering::Greater => frame[..nchannels].to_vec(),
        std::cmp::Ordering::Less => {
            let last = *frame.last().unwrap_or(&0.0);
            let mut out = frame.to_vec();
            out.resize(nchannels, last);
            out
        }
    }
}

struct DelayGen {
    inner: Stream,
    remaining: usize,
    channels: usize,
}
impl Generator for DelayGen {
    fn pull(&mut self) -> Option<Frame> {
        if self.remaining > 0 {
            self.remaining -= 1;
            Some(vec![0.0; self.channels])
        } else {
            self.inner.pull()
        }
    }
}

struct SkipGen {
    inner: Stream,
    remaining: usize,
}
impl Generator for SkipGen {
    fn pull(&mut self) -> Option<Frame> {
        while self.remaining > 0 {
            self.remaining -= 1;
            self.inner.pull()?;
        }
        self.inner.pull()
    }
}

struct TakeGen {
    inner: Stream,
    remaining: usize,
}
impl Generator for TakeGen {
    fn pull(&mut self) -> Option<Frame> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.inner.pull()
    }
}

struct JoinGen {
    first: Option<Stream>,
    second: Stream,
}
impl Generator for JoinGen {
    fn pull(&mut self) -> Option<Frame> {
        if let Some(first) = &self.first {
            if let Some(frame) = first.pull() {
                return Some(frame);
            }
            self.first = None;
        }
        self.second.pull()
    }
}

struct MapGen {
    input: Stream,
    f: Box<dyn Fn(&[f64]) -> Frame>,
}
impl Generator for MapGen {
    fn pull(&mut self) -> Option<Frame> {
        let frame = self.input.pull()?;
        Some((self.f)(&frame))
    }
}

struct CombineGen {
    a: Stream,
    b: Stream,
    f: Box<dyn Fn(&[f64], &[f64]) -> Frame>,
}
impl Generator for CombineGen {
    fn pull(&mut self) -> Option<Frame> {
        let a = self.a.pull()?;
        let b = self.b.pull()?;
        Some((self.f)(&a, &b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_is_infinite() {
        let s = Stream::constant(3.0);
        assert_eq!(s.pull(), Some(vec![3.0]));
        assert_eq!(s.pull(), Some(vec![3.0]));
        assert_eq!(s.nframes_hint(), 0);
    }

    #[test]
    fn take_limits_length() {
        let s = Stream::constant(1.0).take(3);
        let mut n = 0;
        while s.pull().is_some() {
            n += 1;
        }
        assert_eq!(n, 3);
    }

    #[test]
    fn join_concatenates_then_falls_through() {
        let a = Stream::constant(1.0).take(2);
        let b = Stream::constant(2.0).take(2);
        let j = a.join(b).unwrap();
        let mut out = vec![];
        while let Some(f) = j.pull() {
            out.push(f[0]);
        }
        assert_eq!(out, vec![1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn combine_stops_at_shorter_input() {
        let a = Stream::constant(1.0).take(5);
        let b = Stream::constant(2.0).take(2);
        let c = a.combine(b, |x, y| vec![x[0] + y[0]]);
        let mut n = 0;
        while c.pull().is_some() {
            n += 1;
        }
        assert_eq!(n, 2);
    }

    #[test]
    fn take_into_tape_respects_cancellation() {
        let s = Stream::constant(1.0);
        let cancel = crate::cancel::CancelToken::new();
        cancel.cancel();
        let result = s.take_into_tape(48000, 100, &cancel, None);
        assert!(matches!(result, Err(crate::error::Error::Cancelled)));
    }
}
