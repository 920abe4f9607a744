use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::output::{validate_tone, AudioOutput, DeviceInfo};
use super::tone::{generate_tone, ToneShape};
use crate::config::AudioConfig;
use crate::error::{log_playback_error, PlaybackError};

/// Extra time the stream stays open after the last sample
const DRAIN_MARGIN: Duration = Duration::from_millis(50);

/// Host audio output through cpal
///
/// Device ids are indices into the host's output device enumeration.
/// Each tone plays on its own thread that owns the `cpal::Stream` for the
/// tone's duration, so callers never block on playback.
pub struct CpalOutput {
    shape: ToneShape,
}

impl CpalOutput {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            shape: ToneShape::from(config),
        }
    }
}

fn has_output_config(device: &cpal::Device) -> bool {
    device
        .supported_output_configs()
        .map(|mut configs| configs.next().is_some())
        .unwrap_or(false)
}

fn resolve_device(host: &cpal::Host, device_id: Option<u32>) -> Result<cpal::Device, PlaybackError> {
    match device_id {
        Some(id) => host
            .output_devices()
            .map_err(|e| PlaybackError::HostUnavailable {
                details: e.to_string(),
            })?
            .nth(id as usize)
            .ok_or(PlaybackError::DeviceNotFound { device_id: id }),
        None => host
            .default_output_device()
            .ok_or_else(|| PlaybackError::StreamFailed {
                reason: "No default output device found".to_string(),
            }),
    }
}

/// F32 config at the preferred rate if the device offers one, else its default
fn stream_config(
    device: &cpal::Device,
    preferred_rate: u32,
) -> Result<cpal::StreamConfig, PlaybackError> {
    let preferred = device.supported_output_configs().ok().and_then(|mut configs| {
        configs.find(|range| {
            range.sample_format() == cpal::SampleFormat::F32
                && range.min_sample_rate().0 <= preferred_rate
                && range.max_sample_rate().0 >= preferred_rate
        })
    });
    if let Some(range) = preferred {
        return Ok(range.with_sample_rate(cpal::SampleRate(preferred_rate)).into());
    }

    let default = device
        .default_output_config()
        .map_err(|e| PlaybackError::StreamFailed {
            reason: format!("Failed to get default output config: {:?}", e),
        })?;
    if default.sample_format() != cpal::SampleFormat::F32 {
        return Err(PlaybackError::StreamFailed {
            reason: "Only F32 sample format is currently supported for output".to_string(),
        });
    }
    Ok(default.into())
}

fn play_blocking(
    device_id: Option<u32>,
    frequency_hz: f64,
    volume_dbfs: f64,
    shape: ToneShape,
) -> Result<(), PlaybackError> {
    let host = cpal::default_host();
    let device = resolve_device(&host, device_id)?;
    let config = stream_config(&device, shape.sample_rate)?;
    let channels = config.channels.max(1) as usize;
    let shape = shape.at_rate(config.sample_rate.0);
    let samples = generate_tone(frequency_hz, volume_dbfs, &shape);

    let mut position = 0usize;
    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let value = samples.get(position).copied().unwrap_or(0.0);
                    position += 1;
                    frame.fill(value);
                }
            },
            |err| log::error!("[Audio] Output stream error: {}", err),
            None,
        )
        .map_err(|e| PlaybackError::StreamFailed {
            reason: format!("{:?}", e),
        })?;

    stream.play().map_err(|e| PlaybackError::StreamFailed {
        reason: format!("{:?}", e),
    })?;
    thread::sleep(Duration::from_secs_f64(shape.duration_s) + DRAIN_MARGIN);
    Ok(())
}

impl AudioOutput for CpalOutput {
    fn list_output_devices(&self) -> Result<Vec<DeviceInfo>, PlaybackError> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| PlaybackError::HostUnavailable {
                details: e.to_string(),
            })?;

        Ok(devices
            .enumerate()
            .filter(|(_, device)| has_output_config(device))
            .map(|(index, device)| DeviceInfo {
                id: index as u32,
                name: device
                    .name()
                    .unwrap_or_else(|_| format!("Output device {}", index)),
            })
            .collect())
    }

    fn play(
        &self,
        device_id: Option<u32>,
        frequency_hz: f64,
        volume_dbfs: f64,
    ) -> Result<(), PlaybackError> {
        validate_tone(frequency_hz, volume_dbfs)?;
        if let Some(id) = device_id {
            let known = self.list_output_devices()?;
            if !known.iter().any(|d| d.id == id) {
                return Err(PlaybackError::DeviceNotFound { device_id: id });
            }
        }

        let shape = self.shape;
        thread::Builder::new()
            .name("tone-playback".to_string())
            .spawn(move || {
                if let Err(err) = play_blocking(device_id, frequency_hz, volume_dbfs, shape) {
                    log_playback_error(&err, "CpalOutput::play");
                }
            })
            .map_err(|e| PlaybackError::StreamFailed {
                reason: format!("Failed to spawn playback thread: {}", e),
            })?;

        log::debug!(
            "[Audio] Playing {:.1} Hz at {:.1} dBFS on {:?}",
            frequency_hz,
            volume_dbfs,
            device_id
        );
        Ok(())
    }
}
