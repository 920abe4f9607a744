// Error types for the loudness profiler
//
// This module defines custom error types for playback, model and session
// operations, providing structured error handling with error codes suitable
// for reporting over the session protocol.

mod audio;
mod model;
mod session;

pub use audio::{log_playback_error, PlaybackError, PlaybackErrorCodes};
pub use model::{log_model_error, ModelError, ModelErrorCodes};
pub use session::{log_session_error, SessionError, SessionErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the protocol boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
