//! Mipmapped band-limited wave tables (spec §4.5).
//!
//! A `Wavetable` is built once from a single-cycle waveform and holds a
//! chain of mip levels, each brickwall-filtered in the frequency domain to
//! remove harmonics that would alias at some playback frequency, then
//! decimated to a shorter table. Playback picks the lowest-harmonic-count
//! (and therefore shortest) level whose harmonics still fit under Nyquist
//! for the requested frequency, and interpolates within that level with a
//! 4-point Catmull-Rom spline (open question (b): linear is used for plain
//! `Tape` playback, Catmull-Rom here, per spec §9).

use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;

const MIN_TABLE_LEN: usize = 64;

struct Level {
    table: Vec<f64>,
    /// Highest harmonic index retained at this level.
    max_harmonic: usize,
}

/// A mipmapped, band-limited single-cycle waveform.
pub struct Wavetable {
    levels: Vec<Level>,
    sample_rate: u32,
}

impl Wavetable {
    /// Builds mip levels from one cycle of a waveform. `cycle.len()` should
    /// be a power of two; levels halve in length until `MIN_TABLE_LEN`.
    pub fn from_cycle(sample_rate: u32, cycle: &[f64]) -> Wavetable {
        let base_len = cycle.len().next_power_of_two();
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(base_len);
        let ifft = planner.plan_fft_inverse(base_len);

        let mut spectrum: Vec<Complex64> = cycle
            .iter()
            .copied()
            .chain(std::iter::repeat(0.0))
            .take(base_len)
            .map(|s| Complex64::new(s, 0.0))
            .collect();
        fft.process(&mut spectrum);

        let nyquist_bin = base_len / 2;
        let mut levels = Vec::new();
        let mut len = base_len;
        let mut max_harmonic = nyquist_bin;
        loop {
            levels.push(Level {
                table: brickwall_and_resynth(&spectrum, base_len, max_harmonic, len, &ifft),
                max_harmonic,
            });
            if len <= MIN_TABLE_LEN {
                break;
            }
            len /= 2;
            max_harmonic /= 2;
        }

        Wavetable { levels, sample_rate }
    }

    pub fn wave_count(&self) -> usize {
        self.levels.len()
    }

    pub fn wave_len(&self) -> usize {
        self.levels.first().map(|l| l.table.len()).unwrap_or(0)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Selects the shortest mip level whose harmonics stay under Nyquist
    /// for `freq_hz`, then samples it at `phase` (`[0, 1)`) with Catmull-Rom
    /// interpolation.
    pub fn sample(&self, phase: f64, freq_hz: f64) -> f64 {
        let nyquist = self.sample_rate as f64 / 2.0;
        let max_harmonics = if freq_hz.abs() < 1e-9 {
            usize::MAX
        } else {
            (nyquist / freq_hz.abs()).floor().max(1.0) as usize
        };
        let level = self
            .levels
            .iter()
            .find(|l| l.max_harmonic <= max_harmonics)
            .unwrap_or_else(|| self.levels.last().unwrap());
        catmull_rom_wrapped(&level.table, phase.rem_euclid(1.0))
    }
}

fn brickwall_and_resynth(
    spectrum: &[Complex64],
    base_len: usize,
    max_harmonic: usize,
    out_len: usize,
    ifft: &std::sync::Arc<dyn rustfft::Fft<f64>>,
) -> Vec<f64> {
    let mut filtered = spectrum.to_vec();
    let nyquist_bin = base_len / 2;
    for bin in 0..=nyquist_bin {
        if bin > max_harmonic {
            filtered[bin] = Complex64::new(0.0, 0.0);
            if bin != 0 && base_len - bin < filtered.len() {
                filtered[base_len - bin] = Complex64::new(0.0, 0.0);
            }
        }
    }
    ifft.process(&mut filtered);
    let scale = 1.0 / base_len as f64;
    let full: Vec<f64> = filtered.iter().map(|c| c.re * scale).collect();
    decimate(&full, out_len)
}

/// Resamples a full-length band-limited cycle down to `out_len` samples by
/// picking evenly spaced points (the signal has already been brickwalled,
/// so plain decimation does not re-introduce aliasing).
fn decimate(full: &[f64], out_len: usize) -> Vec<f64> {
    if out_len >= full.len() {
        return full.to_vec();
    }
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * full.len() as f64 / out_len as f64;
            let i0 = pos.floor() as usize % full.len();
            let i1 = (i0 + 1) % full.len();
            let t = pos - pos.floor();
            full[i0] + (full[i1] - full[i0]) * t
        })
        .collect()
}

/// 4-point Catmull-Rom interpolation over a cyclically wrapped table.
fn catmull_rom_wrapped(table: &[f64], phase: f64) -> f64 {
    let n = table.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return table[0];
    }
    let pos = phase * n as f64;
    let i1 = pos.floor() as isize;
    let t = pos - pos.floor();
    let idx = |k: isize| table[k.rem_euclid(n as isize) as usize];
    let p0 = idx(i1 - 1);
    let p1 = idx(i1);
    let p2 = idx(i1 + 1);
    let p3 = idx(i1 + 2);
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (-p0 + p2) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::TAU;

    fn sine_cycle(len: usize) -> Vec<f64> {
        (0..len).map(|i| (i as f64 / len as f64 * TAU).sin()).collect()
    }

    #[test]
    fn mip_levels_shrink_to_minimum() {
        let wt = Wavetable::from_cycle(48000, &sine_cycle(2048));
        assert_eq!(wt.wave_len(), 2048);
        assert!(wt.levels.last().unwrap().table.len() <= MIN_TABLE_LEN);
    }

    #[test]
    fn sampling_a_sine_stays_in_range() {
        let wt = Wavetable::from_cycle(48000, &sine_cycle(1024));
        for i in 0..100 {
            let s = wt.sample(i as f64 / 100.0, 440.0);
            assert!(s.abs() <= 1.05, "sample out of range: {s}");
        }
    }

    #[test]
    fn high_frequency_picks_a_shorter_level() {
        let wt = Wavetable::from_cycle(48000, &sine_cycle(2048));
        let nyquist: f64 = 48000.0 / 2.0;
        let high_max = (nyquist / 15000.0).floor().max(1.0) as usize;
        let chosen = wt.levels.iter().find(|l| l.max_harmonic <= high_max).unwrap();
        assert!(chosen.table.len() < wt.wave_len());
    }
}
