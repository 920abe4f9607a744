//! In-memory audio output for tests and headless runs
//!
//! Keeps the same validation as the real backend but records each tone
//! instead of opening a stream, so playback paths can be asserted on
//! machines without sound hardware.

use std::sync::Mutex;

use super::output::{validate_tone, AudioOutput, DeviceInfo};
use super::tone::{generate_tone, ToneShape};
use crate::config::AudioConfig;
use crate::error::PlaybackError;

/// One recorded `play` call
#[derive(Debug, Clone, PartialEq)]
pub struct PlayedTone {
    pub device_id: Option<u32>,
    pub frequency_hz: f64,
    pub volume_dbfs: f64,
    /// Length of the synthesized buffer
    pub samples: usize,
}

pub struct NullOutput {
    devices: Vec<DeviceInfo>,
    shape: ToneShape,
    played: Mutex<Vec<PlayedTone>>,
}

impl NullOutput {
    pub fn new(config: &AudioConfig) -> Self {
        Self::with_devices(
            config,
            vec![DeviceInfo {
                id: 0,
                name: "Null Output".to_string(),
            }],
        )
    }

    pub fn with_devices(config: &AudioConfig, devices: Vec<DeviceInfo>) -> Self {
        Self {
            devices,
            shape: ToneShape::from(config),
            played: Mutex::new(Vec::new()),
        }
    }

    /// Tones played so far, oldest first
    pub fn played(&self) -> Vec<PlayedTone> {
        self.played
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl Default for NullOutput {
    fn default() -> Self {
        Self::new(&AudioConfig::default())
    }
}

impl AudioOutput for NullOutput {
    fn list_output_devices(&self) -> Result<Vec<DeviceInfo>, PlaybackError> {
        Ok(self.devices.clone())
    }

    fn play(
        &self,
        device_id: Option<u32>,
        frequency_hz: f64,
        volume_dbfs: f64,
    ) -> Result<(), PlaybackError> {
        validate_tone(frequency_hz, volume_dbfs)?;
        if let Some(id) = device_id {
            if !self.devices.iter().any(|d| d.id == id) {
                return Err(PlaybackError::DeviceNotFound { device_id: id });
            }
        }

        let samples = generate_tone(frequency_hz, volume_dbfs, &self.shape).len();
        let mut played = self
            .played
            .lock()
            .map_err(|_| PlaybackError::StreamFailed {
                reason: "playback log poisoned".to_string(),
            })?;
        played.push(PlayedTone {
            device_id,
            frequency_hz,
            volume_dbfs,
            samples,
        });
        Ok(())
    }
}
