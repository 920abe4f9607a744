// Model error types and constants

use crate::error::ErrorCode;
use log::{error, warn};
use std::fmt;

/// Model error code constants
///
/// Error code range: 2001-2003
pub struct ModelErrorCodes {}

impl ModelErrorCodes {
    /// Hyperparameter optimization could not evaluate the likelihood
    pub const NUMERIC_INSTABILITY: i32 = 2001;

    /// Frequency bands do not partition the configured range
    pub const INVALID_BANDS: i32 = 2002;

    /// Model configuration value out of range
    pub const INVALID_CONFIG: i32 = 2003;
}

/// Log a model error with structured context
///
/// Numeric instability is recovered locally, so it is logged as a warning.
/// Configuration errors are logged as errors.
pub fn log_model_error(err: &ModelError, context: &str) {
    match err {
        ModelError::NumericInstability { .. } => warn!(
            "Model warning in {}: code={}, component=GaussianProcess, message={}",
            context,
            err.code(),
            err.message()
        ),
        _ => error!(
            "Model error in {}: code={}, component=CurveFitter, message={}",
            context,
            err.code(),
            err.message()
        ),
    }
}

/// Model-related errors
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Covariance matrix could not be factorized even with jitter
    NumericInstability { restart: usize, details: String },

    /// Band layout rejected
    InvalidBands { reason: String },

    /// Config value rejected
    InvalidConfig { field: String, reason: String },
}

impl ErrorCode for ModelError {
    fn code(&self) -> i32 {
        match self {
            ModelError::NumericInstability { .. } => ModelErrorCodes::NUMERIC_INSTABILITY,
            ModelError::InvalidBands { .. } => ModelErrorCodes::INVALID_BANDS,
            ModelError::InvalidConfig { .. } => ModelErrorCodes::INVALID_CONFIG,
        }
    }

    fn message(&self) -> String {
        match self {
            ModelError::NumericInstability { restart, details } => {
                format!("Numeric instability in restart {}: {}", restart, details)
            }
            ModelError::InvalidBands { reason } => format!("Invalid bands: {}", reason),
            ModelError::InvalidConfig { field, reason } => {
                format!("Invalid config value for {}: {}", field, reason)
            }
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ModelError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ModelError {}
