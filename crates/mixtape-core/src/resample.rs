//! Sample-rate conversion (spec §4.11).
//!
//! `Zoh` and `Linear` are plain per-frame interpolation; the three `Sinc*`
//! variants delegate to `rubato`'s windowed-sinc resampler at different
//! quality/cost points.

use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

use crate::error::{Error, Result};
use crate::tape::Tape;

/// Resampling quality/cost tradeoff, selectable per call (spec §4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    SincBest,
    SincMedium,
    SincFastest,
    Zoh,
    Linear,
}

/// Resamples `tape` by `ratio` (output_sample_rate / input_sample_rate).
pub fn resample_tape(tape: &Tape, converter: Converter, ratio: f64) -> Result<Tape> {
    if ratio <= 0.0 {
        return Err(Error::domain(format!("resample: ratio must be positive, got {ratio}")));
    }
    match converter {
        Converter::Zoh => Ok(resample_basic(tape, ratio, false)),
        Converter::Linear => Ok(resample_basic(tape, ratio, true)),
        Converter::SincBest | Converter::SincMedium | Converter::SincFastest => resample_sinc(tape, converter, ratio),
    }
}

fn resample_basic(tape: &Tape, ratio: f64, linear: bool) -> Tape {
    let ch = tape.nchannels();
    let out_frames = ((tape.nframes() as f64) * ratio).round().max(0.0) as usize;
    let mut out = Vec::with_capacity(out_frames * ch as usize);
    for i in 0..out_frames {
        let src_pos = i as f64 / ratio;
        let frame = if linear {
            tape.interp(src_pos)
        } else {
            let idx = (src_pos.round() as usize).min(tape.nframes().saturating_sub(1));
            tape.at(idx).unwrap_or_else(|_| vec![0.0; ch as usize])
        };
        out.extend(frame);
    }
    let out_sr = (tape.sample_rate() as f64 * ratio).round() as u32;
    Tape::from_interleaved(out_sr, ch, out)
}

fn sinc_params(converter: Converter) -> SincInterpolationParameters {
    let (sinc_len, interpolation) = match converter {
        Converter::SincBest => (256, SincInterpolationType::Cubic),
        Converter::SincMedium => (128, SincInterpolationType::Quadratic),
        Converter::SincFastest => (64, SincInterpolationType::Linear),
        _ => unreachable!("sinc_params only called for Sinc* converters"),
    };
    SincInterpolationParameters {
        sinc_len,
        f_cutoff: 0.95,
        oversampling_factor: 256,
        interpolation,
        window: WindowFunction::BlackmanHarris2,
    }
}

fn resample_sinc(tape: &Tape, converter: Converter, ratio: f64) -> Result<Tape> {
    let ch = tape.nchannels() as usize;
    let nframes = tape.nframes();
    let samples = tape.samples();
    let deinterleaved: Vec<Vec<f64>> = (0..ch)
        .map(|c| samples.iter().skip(c).step_by(ch).copied().collect())
        .collect();
    drop(samples);

    let params = sinc_params(converter);
    let mut resampler = SincFixedIn::<f64>::new(ratio, 2.0, params, nframes.max(1), ch)
        .map_err(|e| Error::domain(format!("resample: failed to build sinc resampler: {e}")))?;
    let out = resampler
        .process(&deinterleaved, None)
        .map_err(|e| Error::domain(format!("resample: sinc resampling failed: {e}")))?;

    let out_frames = out.first().map(|c| c.len()).unwrap_or(0);
    let mut interleaved = vec![0.0; out_frames * ch];
    for (c, channel) in out.iter().enumerate() {
        for (i, s) in channel.iter().enumerate() {
            interleaved[i * ch + c] = *s;
        }
    }
    let out_sr = (tape.sample_rate() as f64 * ratio).round() as u32;
    Ok(Tape::from_interleaved(out_sr, ch as u8, interleaved))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_doubling_preserves_endpoints_roughly() {
        let t = Tape::from_interleaved(48000, 1, vec![0.0, 1.0, 0.0, -1.0]);
        let out = resample_tape(&t, Converter::Linear, 2.0).unwrap();
        assert_eq!(out.sample_rate(), 96000);
        assert!(out.nframes() >= t.nframes());
    }

    #[test]
    fn zoh_keeps_exact_values() {
        let t = Tape::from_interleaved(48000, 1, vec![0.0, 1.0, -1.0, 0.5]);
        let out = resample_tape(&t, Converter::Zoh, 1.0).unwrap();
        assert_eq!(out.samples().to_vec(), t.samples().to_vec());
    }

    #[test]
    fn rejects_non_positive_ratio() {
        let t = Tape::silence(48000, 1, 10);
        assert!(resample_tape(&t, Converter::Linear, 0.0).is_err());
    }
}
