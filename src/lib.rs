// Loudness Profiler Core - adaptive loudness-matching engine
// Gaussian-process surrogate with banded max-uncertainty acquisition

// Module declarations
pub mod audio;
pub mod config;
pub mod error;
pub mod model;
pub mod session;
pub mod telemetry;
pub mod testing;

#[cfg(feature = "http")]
pub mod http;

// Re-exports for convenience
pub use config::AppConfig;
pub use model::{Curve, CurveFitter, Observation};
pub use session::{ClientMessage, ServerMessage, TestSession};
