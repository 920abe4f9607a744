//! Telemetry event types exposed through `/metrics`.

use serde::{Deserialize, Serialize};

/// Session lifecycle and model events, tagged for JSON consumers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    SessionStarted {
        session_id: u64,
        seed_count: usize,
    },
    SeedingComplete {
        session_id: u64,
    },
    ModelFitted {
        session_id: u64,
        observations: usize,
        log_likelihood: Option<f64>,
        duration_ms: u64,
    },
    FitLatency {
        avg_ms: f64,
        max_ms: f64,
        sample_count: usize,
    },
    PlaybackFailed {
        session_id: u64,
        code: i32,
    },
    ProtocolRejected {
        session_id: u64,
        code: i32,
    },
    SessionClosed {
        session_id: u64,
        timestamp_ms: u64,
    },
}
