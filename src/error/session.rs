// Session error types and constants

use crate::error::ErrorCode;
use log::warn;
use std::fmt;

/// Session error code constants
///
/// Error code range: 3001-3003
pub struct SessionErrorCodes {}

impl SessionErrorCodes {
    /// Malformed or missing request fields
    pub const INVALID_INPUT: i32 = 3001;

    /// Message not valid in the current phase
    pub const PROTOCOL_VIOLATION: i32 = 3002;

    /// Transport-side failure while handling a message
    pub const INTERNAL: i32 = 3003;
}

/// Log a session error with structured context
///
/// Session errors are scoped to one connection and reported back to the
/// client, so they are logged at warn level.
pub fn log_session_error(err: &SessionError, context: &str) {
    warn!(
        "Session error in {}: code={}, component=TestSession, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors rejected by a test session; state is never changed by them
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Request could not be parsed or failed validation
    InvalidInput { reason: String },

    /// Request arrived in a phase that cannot accept it
    ProtocolViolation {
        message_type: &'static str,
        phase: &'static str,
    },

    /// Handler task failed
    Internal { reason: String },
}

impl ErrorCode for SessionError {
    fn code(&self) -> i32 {
        match self {
            SessionError::InvalidInput { .. } => SessionErrorCodes::INVALID_INPUT,
            SessionError::ProtocolViolation { .. } => SessionErrorCodes::PROTOCOL_VIOLATION,
            SessionError::Internal { .. } => SessionErrorCodes::INTERNAL,
        }
    }

    fn message(&self) -> String {
        match self {
            SessionError::InvalidInput { reason } => format!("Invalid input: {}", reason),
            SessionError::ProtocolViolation {
                message_type,
                phase,
            } => format!(
                "Message '{}' is not accepted while session is {}",
                message_type, phase
            ),
            SessionError::Internal { reason } => format!("Internal error: {}", reason),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SessionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SessionError {}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::InvalidInput {
            reason: err.to_string(),
        }
    }
}
