// TestSession - per-connection listening-test state machine
//
// Phases:
// 1. Idle: no test running; submissions are rejected
// 2. Seeding: walking a quasi-random schedule, no fits
// 3. Active: every submission refits the model and asks for new points
//
// `start_test` moves any phase to Seeding with a freshly built fitter.
// Transitions do no I/O: they return messages for the client, an optional
// playback request and events for telemetry. A rejected message leaves the
// session exactly as it was.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::AppConfig;
use crate::error::SessionError;
use crate::model::{quasi_random_schedule, CurveFitter, FitReport, Observation, SeedRequest};

use super::protocol::{ClientMessage, ServerMessage};

/// Externally visible phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Seeding,
    Active,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Seeding => "seeding",
            SessionState::Active => "active",
        }
    }
}

/// Tone the transport should hand to the audio backend
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackRequest {
    /// `None` plays on the host's default output
    pub device_id: Option<u32>,
    pub frequency_hz: f64,
    pub volume_dbfs: f64,
}

/// Notable transitions, reported for telemetry
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    Started { seed_count: usize },
    SeedingComplete,
    ModelFitted(FitReport),
}

/// Everything one handled message produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionOutput {
    pub messages: Vec<ServerMessage>,
    pub playback: Option<PlaybackRequest>,
    pub events: Vec<SessionEvent>,
}

impl SessionOutput {
    fn messages(messages: Vec<ServerMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    fn playback(request: PlaybackRequest) -> Self {
        Self {
            playback: Some(request),
            ..Self::default()
        }
    }
}

/// State shared by the seeding and active phases of one test
struct TestRun {
    device_id: Option<u32>,
    root_freq: f64,
    root_volume: f64,
    fitter: CurveFitter,
}

impl TestRun {
    /// `new_point` in single mode, `new_points` in stratified mode
    fn query_message(&self) -> ServerMessage {
        let points = self.fitter.next_query();
        if self.fitter.layout().is_stratified() {
            ServerMessage::NewPoints { points }
        } else {
            let frequency = points
                .first()
                .map(|p| p.frequency_hz)
                .unwrap_or(self.root_freq);
            ServerMessage::NewPoint { frequency }
        }
    }

    fn refit(&mut self, output: &mut SessionOutput) {
        if let Some(report) = self.fitter.fit() {
            output.events.push(SessionEvent::ModelFitted(report));
        }
        output.messages.push(ServerMessage::UpdateCurve {
            data: self.fitter.curve(),
        });
        output.messages.push(self.query_message());
    }
}

enum Phase {
    Idle,
    Seeding {
        run: TestRun,
        schedule: Vec<f64>,
        index: usize,
    },
    Active {
        run: TestRun,
    },
}

pub struct TestSession {
    config: Arc<AppConfig>,
    rng: StdRng,
    phase: Phase,
}

impl TestSession {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let rng = match config.model.seed_rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            rng,
            phase: Phase::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        match self.phase {
            Phase::Idle => SessionState::Idle,
            Phase::Seeding { .. } => SessionState::Seeding,
            Phase::Active { .. } => SessionState::Active,
        }
    }

    fn run(&self) -> Option<&TestRun> {
        match &self.phase {
            Phase::Idle => None,
            Phase::Seeding { run, .. } | Phase::Active { run } => Some(run),
        }
    }

    /// Observations recorded in the current test, root included
    pub fn observation_count(&self) -> usize {
        self.run().map_or(0, |run| run.fitter.len())
    }

    /// Seed frequencies not yet submitted
    pub fn remaining_seeds(&self) -> &[f64] {
        match &self.phase {
            Phase::Seeding {
                schedule, index, ..
            } => &schedule[(*index).min(schedule.len())..],
            _ => &[],
        }
    }

    /// Apply one client message
    pub fn handle(&mut self, message: ClientMessage) -> Result<SessionOutput, SessionError> {
        message.validate()?;
        match message {
            ClientMessage::StartTest {
                device_id,
                root_freq,
                root_volume,
                seed_count,
            } => self.start_test(device_id, root_freq, root_volume, seed_count),
            ClientMessage::SubmitVolume { frequency, volume } => {
                self.submit("submit_volume", vec![(frequency, volume)])
            }
            ClientMessage::SubmitVolumes { submissions } => self.submit(
                "submit_volumes",
                submissions.iter().map(|s| (s.freq, s.vol)).collect(),
            ),
            ClientMessage::PlayTone { frequency, volume } => {
                Ok(SessionOutput::playback(PlaybackRequest {
                    device_id: self.run().and_then(|run| run.device_id),
                    frequency_hz: frequency,
                    volume_dbfs: volume,
                }))
            }
            ClientMessage::PlayReference {} => Ok(SessionOutput::playback(self.reference_tone())),
            ClientMessage::GetCurve {} => {
                let data = self
                    .run()
                    .map(|run| run.fitter.curve())
                    .unwrap_or_default();
                Ok(SessionOutput::messages(vec![ServerMessage::UpdateCurve { data }]))
            }
            ClientMessage::Reset {} => {
                log::info!("[TestSession] Reset from {}", self.state().as_str());
                self.phase = Phase::Idle;
                Ok(SessionOutput::default())
            }
        }
    }

    fn reference_tone(&self) -> PlaybackRequest {
        match self.run() {
            Some(run) => PlaybackRequest {
                device_id: run.device_id,
                frequency_hz: run.root_freq,
                volume_dbfs: run.root_volume,
            },
            None => PlaybackRequest {
                device_id: None,
                frequency_hz: self.config.session.default_root_freq,
                volume_dbfs: self.config.session.default_root_volume,
            },
        }
    }

    fn start_test(
        &mut self,
        device_id: Option<u32>,
        root_freq: f64,
        root_volume: f64,
        seed_count: Option<usize>,
    ) -> Result<SessionOutput, SessionError> {
        let defaults = &self.config.session;
        let seed_count = seed_count.unwrap_or(defaults.default_seed_count);
        if seed_count == 0 || seed_count > defaults.max_seed_count {
            return Err(SessionError::InvalidInput {
                reason: format!(
                    "seed_count must be within 1..={}, got {}",
                    defaults.max_seed_count, seed_count
                ),
            });
        }

        let mut fitter =
            CurveFitter::from_config(&self.config).map_err(|err| SessionError::Internal {
                reason: err.to_string(),
            })?;
        fitter.add(Observation::from_hz(root_freq, root_volume));

        let request = SeedRequest {
            anchor_hz: root_freq,
            count: seed_count,
            separation: self.config.model.seed_separation,
            max_attempts: self
                .config
                .model
                .seed_attempts_per_point
                .saturating_mul(seed_count),
        };
        let schedule = quasi_random_schedule(&request, fitter.layout(), &mut self.rng);

        log::info!(
            "[TestSession] Starting test: root {:.1} Hz @ {:.1} dB, {} seeds, device {:?}",
            root_freq,
            root_volume,
            schedule.len(),
            device_id
        );

        let first = schedule[0];
        self.phase = Phase::Seeding {
            run: TestRun {
                device_id,
                root_freq,
                root_volume,
                fitter,
            },
            schedule,
            index: 0,
        };

        Ok(SessionOutput {
            messages: vec![
                ServerMessage::TestStarted { seed_count },
                ServerMessage::NewPoint { frequency: first },
            ],
            playback: None,
            events: vec![SessionEvent::Started { seed_count }],
        })
    }

    fn submit(
        &mut self,
        message_type: &'static str,
        points: Vec<(f64, f64)>,
    ) -> Result<SessionOutput, SessionError> {
        let mut output = SessionOutput::default();

        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => {
                return Err(SessionError::ProtocolViolation {
                    message_type,
                    phase: SessionState::Idle.as_str(),
                });
            }
            Phase::Seeding {
                mut run,
                schedule,
                index,
            } => {
                run.fitter.add_points(&points);
                let index = index + points.len();

                if let Some(&next) = schedule.get(index) {
                    log::debug!(
                        "[TestSession] Seed {}/{} submitted",
                        index,
                        schedule.len()
                    );
                    output.messages.push(ServerMessage::NewPoint { frequency: next });
                    self.phase = Phase::Seeding {
                        run,
                        schedule,
                        index,
                    };
                } else {
                    log::info!(
                        "[TestSession] Seeding complete with {} observations",
                        run.fitter.len()
                    );
                    output.events.push(SessionEvent::SeedingComplete);
                    run.refit(&mut output);
                    self.phase = Phase::Active { run };
                }
            }
            Phase::Active { mut run } => {
                run.fitter.add_points(&points);
                run.refit(&mut output);
                self.phase = Phase::Active { run };
            }
        }

        Ok(output)
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
