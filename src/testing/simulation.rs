//! Drive a full test session against a [`SimulatedListener`].

use std::sync::Arc;

use serde::Serialize;

use crate::config::AppConfig;
use crate::error::SessionError;
use crate::model::Curve;
use crate::session::{ClientMessage, ServerMessage, SessionState, Submission, TestSession};

use super::listener::SimulatedListener;

/// Outcome of a simulated run
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    /// Model-driven rounds answered after seeding
    pub rounds: usize,
    pub observations: usize,
    /// Root-mean-square distance between the fitted mean and the true curve
    pub rms_error_db: f64,
    pub curve: Curve,
}

fn queried_frequencies(messages: &[ServerMessage]) -> Vec<f64> {
    messages
        .iter()
        .flat_map(|message| match message {
            ServerMessage::NewPoint { frequency } => vec![*frequency],
            ServerMessage::NewPoints { points } => {
                points.iter().map(|p| p.frequency_hz).collect()
            }
            _ => Vec::new(),
        })
        .collect()
}

fn latest_curve(messages: &[ServerMessage]) -> Option<Curve> {
    messages.iter().rev().find_map(|message| match message {
        ServerMessage::UpdateCurve { data } => Some(data.clone()),
        _ => None,
    })
}

fn rms_error(curve: &Curve) -> f64 {
    if curve.is_empty() {
        return f64::NAN;
    }
    let sum: f64 = curve
        .freqs
        .iter()
        .zip(&curve.mean)
        .map(|(f, m)| (m - SimulatedListener::true_volume(*f)).powi(2))
        .sum();
    (sum / curve.freqs.len() as f64).sqrt()
}

/// Seed, then answer `rounds` model-driven rounds
pub fn run_simulation(
    config: Arc<AppConfig>,
    listener: &mut SimulatedListener,
    seed_count: usize,
    rounds: usize,
) -> Result<SimulationReport, SessionError> {
    let root_freq = config.session.default_root_freq;
    let mut session = TestSession::new(Arc::clone(&config));

    let output = session.handle(ClientMessage::StartTest {
        device_id: None,
        root_freq,
        root_volume: SimulatedListener::true_volume(root_freq),
        seed_count: Some(seed_count),
    })?;
    let mut pending = queried_frequencies(&output.messages);
    let mut curve = Curve::empty();
    let mut answered = 0;

    while session.state() != SessionState::Active || answered < rounds {
        if pending.is_empty() {
            return Err(SessionError::Internal {
                reason: "session stopped asking for frequencies".to_string(),
            });
        }

        let was_active = session.state() == SessionState::Active;
        let submissions = pending
            .iter()
            .map(|&freq| Submission {
                freq,
                vol: listener.respond(freq),
            })
            .collect();
        let output = session.handle(ClientMessage::SubmitVolumes { submissions })?;

        if was_active {
            answered += 1;
        }
        if let Some(updated) = latest_curve(&output.messages) {
            curve = updated;
        }
        pending = queried_frequencies(&output.messages);
    }

    log::info!(
        "[Simulation] {} rounds, {} observations",
        answered,
        session.observation_count()
    );

    Ok(SimulationReport {
        rounds: answered,
        observations: session.observation_count(),
        rms_error_db: rms_error(&curve),
        curve,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AcquisitionMode, GpConfig};

    fn config(mode: AcquisitionMode) -> Arc<AppConfig> {
        let mut config = AppConfig::default();
        config.model.mode = mode;
        config.model.seed_rng_seed = Some(3);
        config.model.acquisition_grid_points = 100;
        config.gp = GpConfig {
            n_restarts: 2,
            ..GpConfig::default()
        };
        Arc::new(config)
    }

    #[test]
    fn test_single_mode_counts_observations() {
        let mut listener = SimulatedListener::new(1, 1.0);
        let report = run_simulation(config(AcquisitionMode::Single), &mut listener, 5, 3).unwrap();
        assert_eq!(report.rounds, 3);
        // root + 5 seeds + 3 model-driven points
        assert_eq!(report.observations, 9);
        assert_eq!(report.curve.freqs.len(), 200);
        assert!(report.rms_error_db.is_finite());
    }

    #[test]
    fn test_stratified_mode_answers_one_point_per_band() {
        let mut listener = SimulatedListener::new(2, 1.0);
        let report =
            run_simulation(config(AcquisitionMode::Stratified), &mut listener, 3, 2).unwrap();
        // root + 3 seeds + 2 rounds of 3 bands
        assert_eq!(report.observations, 10);
    }

    #[test]
    fn test_zero_rounds_stops_after_first_fit() {
        let mut listener = SimulatedListener::new(4, 0.0);
        let report = run_simulation(config(AcquisitionMode::Single), &mut listener, 2, 0).unwrap();
        assert_eq!(report.rounds, 0);
        assert_eq!(report.observations, 3);
        assert!(!report.curve.is_empty());
    }
}
