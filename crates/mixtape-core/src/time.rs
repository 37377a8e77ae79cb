//! Musical-time conversions (spec §4.9, §6).
//!
//! Mixtape's transport is BPM plus ticks-per-beat; everything downstream —
//! envelope segment lengths, `take` counts — is expressed in frames at the
//! engine's sample rate, so this module is the one place tempo math
//! happens.

/// Tempo and meter context a program renders against.
#[derive(Debug, Clone, Copy)]
pub struct Transport {
    pub sample_rate: u32,
    pub bpm: f64,
    pub ticks_per_beat: u32,
}

impl Transport {
    pub fn new(sample_rate: u32, bpm: f64, ticks_per_beat: u32) -> Self {
        Transport { sample_rate, bpm, ticks_per_beat }
    }

    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.bpm
    }

    pub fn frames_per_beat(&self) -> f64 {
        self.seconds_per_beat() * self.sample_rate as f64
    }

    pub fn frames_per_tick(&self) -> f64 {
        self.frames_per_beat() / self.ticks_per_beat as f64
    }

    pub fn beats_to_frames(&self, beats: f64) -> usize {
        (beats * self.frames_per_beat()).round() as usize
    }

    pub fn ticks_to_frames(&self, ticks: f64) -> usize {
        (ticks * self.frames_per_tick()).round() as usize
    }

    pub fn seconds_to_frames(&self, seconds: f64) -> usize {
        (seconds * self.sample_rate as f64).round() as usize
    }

    pub fn frames_to_seconds(&self, frames: usize) -> f64 {
        frames as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_note_at_120_bpm_is_half_a_second() {
        let t = Transport::new(48000, 120.0, 960);
        assert_eq!(t.beats_to_frames(1.0), 24000);
    }

    #[test]
    fn ticks_subdivide_the_beat() {
        let t = Transport::new(48000, 120.0, 4);
        assert_eq!(t.ticks_to_frames(4.0), t.beats_to_frames(1.0));
    }
}
