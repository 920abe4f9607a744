// Playback error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Playback error code constants
///
/// Single source of truth for the numeric codes sent to the browser client
/// inside `error` messages.
///
/// Error code range: 1001-1004
pub struct PlaybackErrorCodes {}

impl PlaybackErrorCodes {
    /// Requested output device does not exist
    pub const DEVICE_NOT_FOUND: i32 = 1001;

    /// Tone parameters are not playable (non-positive or non-finite)
    pub const INVALID_TONE: i32 = 1002;

    /// Audio host could not be queried
    pub const HOST_UNAVAILABLE: i32 = 1003;

    /// Output stream could not be opened or failed while playing
    pub const STREAM_FAILED: i32 = 1004;
}

/// Log a playback error with structured context
///
/// Playback failures never touch session state, so logging is the only
/// place they surface besides the error message sent to the client.
pub fn log_playback_error(err: &PlaybackError, context: &str) {
    error!(
        "Playback error in {}: code={}, component=AudioOutput, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by the audio output collaborator
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackError {
    /// No output device with this enumeration index
    DeviceNotFound { device_id: u32 },

    /// Frequency must be positive and finite, volume finite
    InvalidTone { frequency_hz: f64, volume_dbfs: f64 },

    /// Host enumeration failed
    HostUnavailable { details: String },

    /// Stream build or playback failed
    StreamFailed { reason: String },
}

impl ErrorCode for PlaybackError {
    fn code(&self) -> i32 {
        match self {
            PlaybackError::DeviceNotFound { .. } => PlaybackErrorCodes::DEVICE_NOT_FOUND,
            PlaybackError::InvalidTone { .. } => PlaybackErrorCodes::INVALID_TONE,
            PlaybackError::HostUnavailable { .. } => PlaybackErrorCodes::HOST_UNAVAILABLE,
            PlaybackError::StreamFailed { .. } => PlaybackErrorCodes::STREAM_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            PlaybackError::DeviceNotFound { device_id } => {
                format!("Output device {} not found", device_id)
            }
            PlaybackError::InvalidTone {
                frequency_hz,
                volume_dbfs,
            } => format!(
                "Invalid tone: frequency {} Hz, volume {} dBFS",
                frequency_hz, volume_dbfs
            ),
            PlaybackError::HostUnavailable { details } => {
                format!("Audio host unavailable: {}", details)
            }
            PlaybackError::StreamFailed { reason } => {
                format!("Failed to play tone: {}", reason)
            }
        }
    }
}

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PlaybackError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for PlaybackError {}
