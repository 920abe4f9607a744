// Audio output collaborator interface

use serde::Serialize;

use crate::error::PlaybackError;

/// One selectable output device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// Enumeration index; opaque to the session
    pub id: u32,
    pub name: String,
}

/// Device directory plus fire-and-forget tone playback
///
/// `play` validates its arguments and the device synchronously and returns
/// before the tone finishes.
pub trait AudioOutput: Send + Sync {
    fn list_output_devices(&self) -> Result<Vec<DeviceInfo>, PlaybackError>;

    /// Play a tone; `None` selects the host's default output
    fn play(
        &self,
        device_id: Option<u32>,
        frequency_hz: f64,
        volume_dbfs: f64,
    ) -> Result<(), PlaybackError>;
}

/// Reject tones no backend can play
pub fn validate_tone(frequency_hz: f64, volume_dbfs: f64) -> Result<(), PlaybackError> {
    if frequency_hz.is_finite() && frequency_hz > 0.0 && volume_dbfs.is_finite() {
        Ok(())
    } else {
        Err(PlaybackError::InvalidTone {
            frequency_hz,
            volume_dbfs,
        })
    }
}
