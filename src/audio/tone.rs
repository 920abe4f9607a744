//! Tone synthesis - faded sine bursts for loudness matching
//!
//! Pure functions: the same inputs always produce the same samples. The
//! fade-in/out keeps onsets and offsets free of audible clicks, which would
//! otherwise add broadband energy and bias the listener's judgment.

use crate::config::AudioConfig;

/// Duration, fade and rate of a synthesized tone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneShape {
    pub sample_rate: u32,
    pub duration_s: f64,
    pub fade_s: f64,
}

impl From<&AudioConfig> for ToneShape {
    fn from(config: &AudioConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            duration_s: config.tone_duration_ms as f64 / 1000.0,
            fade_s: config.fade_ms as f64 / 1000.0,
        }
    }
}

impl Default for ToneShape {
    fn default() -> Self {
        Self::from(&AudioConfig::default())
    }
}

impl ToneShape {
    /// Same shape at a different sample rate
    pub fn at_rate(self, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..self
        }
    }

    pub fn sample_count(&self) -> usize {
        (self.sample_rate as f64 * self.duration_s) as usize
    }
}

/// Linear amplitude for a level relative to full scale
#[inline]
pub fn dbfs_to_amplitude(volume_dbfs: f64) -> f64 {
    10f64.powf(volume_dbfs / 20.0)
}

/// Generate a mono sine tone with linear fade-in and fade-out
///
/// # Arguments
/// * `frequency_hz` - Tone frequency
/// * `volume_dbfs` - Peak level; 0 dBFS is full scale
/// * `shape` - Duration, fade length and sample rate
///
/// # Returns
/// `shape.sample_count()` samples
pub fn generate_tone(frequency_hz: f64, volume_dbfs: f64, shape: &ToneShape) -> Vec<f32> {
    let count = shape.sample_count();
    let rate = shape.sample_rate as f64;
    let amplitude = dbfs_to_amplitude(volume_dbfs);
    let fade = ((rate * shape.fade_s) as usize).min(count / 2);
    let step = 2.0 * std::f64::consts::PI * frequency_hz / rate;

    (0..count)
        .map(|i| {
            let envelope = if fade == 0 {
                1.0
            } else if i < fade {
                i as f64 / fade as f64
            } else if i >= count - fade {
                (count - 1 - i) as f64 / fade as f64
            } else {
                1.0
            };
            (amplitude * envelope * (step * i as f64).sin()) as f32
        })
        .collect()
}
