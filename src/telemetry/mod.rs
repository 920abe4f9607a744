//! Session telemetry collector and helpers.
//!
//! The collector multiplexes session lifecycle, fit timing, playback and
//! protocol failures into a bounded history plus async broadcast stream.
//! Connections report here; the session state machine itself stays pure.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use tokio::sync::broadcast;

use crate::error::{ErrorCode, PlaybackError, SessionError};
use crate::session::SessionEvent;

pub mod events;

pub use events::MetricEvent;

/// Global telemetry hub shared across the crate.
static HUB: Lazy<TelemetryHub> = Lazy::new(TelemetryHub::default);

/// Access the global telemetry hub.
pub fn hub() -> &'static TelemetryHub {
    &HUB
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Snapshot of collector state for HTTP/CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
    pub active_sessions: u64,
}

/// Broadcast-based collector retaining a bounded history of metrics.
pub struct TelemetryCollector {
    tx: broadcast::Sender<MetricEvent>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        {
            let mut history = lock(&self.history);
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.tx.subscribe()
    }

    fn recent(&self) -> Vec<MetricEvent> {
        lock(&self.history).iter().cloned().collect()
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

/// Rolling window of fit durations for avg/max reporting.
struct FitTracker {
    samples: VecDeque<f64>,
    max_samples: usize,
}

impl FitTracker {
    fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
        }
    }

    fn observe(&mut self, value: f64) -> (f64, f64, usize) {
        if self.samples.len() == self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(value);

        let count = self.samples.len();
        let sum: f64 = self.samples.iter().sum();
        let max = self.samples.iter().copied().fold(0.0_f64, f64::max);
        (sum / count as f64, max, count)
    }
}

/// Top-level hub wrapping collector state plus derived gauges.
pub struct TelemetryHub {
    collector: TelemetryCollector,
    fits: Mutex<FitTracker>,
    active_sessions: AtomicU64,
    next_session_id: AtomicU64,
}

impl TelemetryHub {
    pub fn new(channel_capacity: usize, history_capacity: usize, fit_window: usize) -> Self {
        Self {
            collector: TelemetryCollector::new(channel_capacity, history_capacity),
            fits: Mutex::new(FitTracker::new(fit_window)),
            active_sessions: AtomicU64::new(0),
            next_session_id: AtomicU64::new(1),
        }
    }

    pub fn collector(&self) -> &TelemetryCollector {
        &self.collector
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            recent: self.collector.recent(),
            total_events: self.collector.total_events.load(Ordering::Relaxed),
            dropped_events: self.collector.dropped_history.load(Ordering::Relaxed),
            active_sessions: self.active_sessions(),
        }
    }

    pub fn active_sessions(&self) -> u64 {
        self.active_sessions.load(Ordering::Relaxed)
    }

    /// Register a new connection and return its id
    pub fn session_opened(&self) -> u64 {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
        self.next_session_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn session_closed(&self, session_id: u64) {
        let _ = self
            .active_sessions
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
        self.collector.publish(MetricEvent::SessionClosed {
            session_id,
            timestamp_ms: now_timestamp_ms(),
        });
    }

    pub fn record_session_event(&self, session_id: u64, event: &SessionEvent) {
        match *event {
            SessionEvent::Started { seed_count } => {
                self.collector.publish(MetricEvent::SessionStarted {
                    session_id,
                    seed_count,
                });
            }
            SessionEvent::SeedingComplete => {
                self.collector
                    .publish(MetricEvent::SeedingComplete { session_id });
            }
            SessionEvent::ModelFitted(report) => {
                self.collector.publish(MetricEvent::ModelFitted {
                    session_id,
                    observations: report.observations,
                    log_likelihood: report.log_likelihood,
                    duration_ms: report.duration_ms,
                });

                let (avg, max, count) = lock(&self.fits).observe(report.duration_ms as f64);
                self.collector.publish(MetricEvent::FitLatency {
                    avg_ms: avg,
                    max_ms: max,
                    sample_count: count,
                });
            }
        }
    }

    pub fn record_playback_failure(&self, session_id: u64, err: &PlaybackError) {
        self.collector.publish(MetricEvent::PlaybackFailed {
            session_id,
            code: err.code(),
        });
    }

    pub fn record_rejection(&self, session_id: u64, err: &SessionError) {
        self.collector.publish(MetricEvent::ProtocolRejected {
            session_id,
            code: err.code(),
        });
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(256, 64, 32)
    }
}

fn now_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FitReport;

    fn fitted(duration_ms: u64) -> SessionEvent {
        SessionEvent::ModelFitted(FitReport {
            observations: 6,
            log_likelihood: Some(-3.2),
            duration_ms,
        })
    }

    #[test]
    fn collector_preserves_order_within_history() {
        let collector = TelemetryCollector::new(8, 3);
        collector.publish(MetricEvent::SessionStarted {
            session_id: 1,
            seed_count: 5,
        });
        collector.publish(MetricEvent::SeedingComplete { session_id: 1 });
        collector.publish(MetricEvent::PlaybackFailed {
            session_id: 1,
            code: 1001,
        });

        let recent = collector.recent();
        assert_eq!(recent.len(), 3);
        assert!(matches!(
            recent[0],
            MetricEvent::SessionStarted { seed_count: 5, .. }
        ));
        assert!(matches!(recent[2], MetricEvent::PlaybackFailed { .. }));
    }

    #[test]
    fn collector_drops_history_when_full() {
        let hub = TelemetryHub::new(8, 2, 4);
        for id in 1..=3 {
            hub.collector().publish(MetricEvent::SeedingComplete { session_id: id });
        }

        let snapshot = hub.snapshot();
        assert_eq!(snapshot.recent.len(), 2);
        assert_eq!(snapshot.dropped_events, 1);
        assert_eq!(snapshot.total_events, 3);
        assert_eq!(
            snapshot.recent[0],
            MetricEvent::SeedingComplete { session_id: 2 }
        );
    }

    #[test]
    fn hub_tracks_active_sessions() {
        let hub = TelemetryHub::new(8, 8, 4);
        let a = hub.session_opened();
        let b = hub.session_opened();
        assert_ne!(a, b);
        assert_eq!(hub.active_sessions(), 2);

        hub.session_closed(a);
        hub.session_closed(b);
        hub.session_closed(b);
        assert_eq!(hub.active_sessions(), 0);
    }

    #[test]
    fn hub_emits_fit_latency_with_model_fitted() {
        let hub = TelemetryHub::new(8, 16, 4);
        hub.record_session_event(7, &fitted(10));
        hub.record_session_event(7, &fitted(30));

        let recent = hub.snapshot().recent;
        assert_eq!(
            recent
                .iter()
                .filter(|e| matches!(e, MetricEvent::ModelFitted { .. }))
                .count(),
            2
        );
        let last_latency = recent
            .iter()
            .rev()
            .find_map(|e| match e {
                MetricEvent::FitLatency {
                    avg_ms,
                    max_ms,
                    sample_count,
                } => Some((*avg_ms, *max_ms, *sample_count)),
                _ => None,
            })
            .unwrap();
        assert_eq!(last_latency, (20.0, 30.0, 2));
    }

    #[test]
    fn failures_carry_error_codes() {
        let hub = TelemetryHub::new(8, 8, 4);
        hub.record_playback_failure(3, &PlaybackError::DeviceNotFound { device_id: 9 });
        hub.record_rejection(
            3,
            &SessionError::ProtocolViolation {
                message_type: "submit_volume",
                phase: "idle",
            },
        );

        let recent = hub.snapshot().recent;
        assert_eq!(
            recent[0],
            MetricEvent::PlaybackFailed {
                session_id: 3,
                code: 1001
            }
        );
        assert_eq!(
            recent[1],
            MetricEvent::ProtocolRejected {
                session_id: 3,
                code: 3002
            }
        );
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let hub = TelemetryHub::new(8, 8, 4);
        let mut rx = hub.collector().subscribe();
        hub.record_session_event(
            4,
            &SessionEvent::Started { seed_count: 3 },
        );
        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            MetricEvent::SessionStarted {
                session_id: 4,
                seed_count: 3
            }
        );
    }
}
