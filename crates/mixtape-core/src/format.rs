//! Audio file I/O: `.wav`/`.mp3` decoding and `.wav` encoding (spec §4.12).
//!
//! Decoding always normalizes to `f64` interleaved samples; the asset
//! loader in `mixtape-runtime` is responsible for resampling the result to
//! the engine's working sample rate via [`crate::resample`].

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{Error, Result};
use crate::tape::Tape;

/// Loads a `.wav` or `.mp3` file by extension, returning an interleaved
/// `Tape` at the file's native sample rate.
pub fn load(path: &Path) -> Result<Tape> {
    match path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()) {
        Some(ext) if ext == "wav" => load_wav(path),
        Some(ext) if ext == "mp3" => load_mp3(path),
        Some(ext) => Err(Error::domain(format!("unsupported audio file extension: .{ext}"))),
        None => Err(Error::domain(format!("audio file has no extension: {}", path.display()))),
    }
}

fn load_wav(path: &Path) -> Result<Tape> {
    let mut reader = hound::WavReader::open(path).map_err(|e| Error::domain(format!("wav read: {e}")))?;
    let spec = reader.spec();
    let max = match spec.bits_per_sample {
        b if b <= 16 => i16::MAX as f64,
        _ => i32::MAX as f64,
    };
    let samples: Vec<f64> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(|v| v as f64))
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::domain(format!("wav read: {e}")))?,
        hound::SampleFormat::Int => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f64 / max))
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::domain(format!("wav read: {e}")))?,
    };
    Ok(Tape::from_interleaved(spec.sample_rate, spec.channels as u8, samples))
}

fn load_mp3(path: &Path) -> Result<Tape> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("mp3");

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| Error::domain(format!("mp3 probe: {e}")))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| Error::domain("mp3: no decodable track found".to_string()))?;
    let track_id = track.id;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| Error::domain(format!("mp3 decoder init: {e}")))?;

    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2) as u8;
    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(_)) => break,
            Err(e) => return Err(Error::domain(format!("mp3 demux: {e}"))),
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(buf) => {
                channels = buf.spec().channels.count() as u8;
                append_decoded(&buf, &mut samples);
            }
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(Error::domain(format!("mp3 decode: {e}"))),
        }
    }

    Ok(Tape::from_interleaved(sample_rate, channels, samples))
}

fn append_decoded(buf: &AudioBufferRef<'_>, out: &mut Vec<f64>) {
    macro_rules! push_planar {
        ($buf:expr, $conv:expr) => {{
            let spec = $buf.spec();
            let nch = spec.channels.count();
            let nframes = $buf.frames();
            let start = out.len();
            out.resize(start + nframes * nch, 0.0);
            for ch in 0..nch {
                let plane = $buf.chan(ch);
                for (i, s) in plane.iter().enumerate() {
                    out[start + i * nch + ch] = $conv(*s);
                }
            }
        }};
    }
    match buf {
        AudioBufferRef::F32(b) => push_planar!(b, |s: f32| s as f64),
        AudioBufferRef::F64(b) => push_planar!(b, |s: f64| s),
        AudioBufferRef::S32(b) => push_planar!(b, |s: i32| s as f64 / i32::MAX as f64),
        AudioBufferRef::S16(b) => push_planar!(b, |s: i16| s as f64 / i16::MAX as f64),
        AudioBufferRef::U8(b) => push_planar!(b, |s: u8| (s as f64 - 128.0) / 128.0),
        _ => {}
    }
}

/// Writes `tape` out as a 32-bit float `.wav` file.
pub fn write_wav(path: &Path, tape: &Tape) -> Result<()> {
    let spec = hound::WavSpec {
        channels: tape.nchannels() as u16,
        sample_rate: tape.sample_rate(),
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(|e| Error::domain(format!("wav write: {e}")))?;
    for s in tape.samples().iter() {
        writer.write_sample(*s as f32).map_err(|e| Error::domain(format!("wav write: {e}")))?;
    }
    writer.finalize().map_err(|e| Error::domain(format!("wav write: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_through_wav() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.wav");
        let original = Tape::from_interleaved(44100, 2, vec![0.0, 0.0, 0.5, -0.5, -1.0, 1.0]);
        write_wav(&path, &original).unwrap();
        let loaded = load_wav(&path).unwrap();
        assert_eq!(loaded.sample_rate(), 44100);
        assert_eq!(loaded.nchannels(), 2);
        for (a, b) in original.samples().iter().zip(loaded.samples().iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn rejects_unknown_extension() {
        let path = Path::new("asset.xyz");
        assert!(load(path).is_err());
    }
}
