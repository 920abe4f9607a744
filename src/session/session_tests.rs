use super::*;
use crate::config::{AcquisitionMode, GpConfig};
use crate::error::{ErrorCode, SessionErrorCodes};
use crate::session::protocol::Submission;

fn test_config(mode: AcquisitionMode) -> Arc<AppConfig> {
    let mut config = AppConfig::default();
    config.model.mode = mode;
    config.model.acquisition_grid_points = 100;
    config.model.seed_rng_seed = Some(42);
    config.gp = GpConfig {
        n_restarts: 2,
        ..GpConfig::default()
    };
    Arc::new(config)
}

fn session() -> TestSession {
    TestSession::new(test_config(AcquisitionMode::Single))
}

fn start(seed_count: usize) -> ClientMessage {
    ClientMessage::StartTest {
        device_id: Some(3),
        root_freq: 1_000.0,
        root_volume: -25.0,
        seed_count: Some(seed_count),
    }
}

fn submit(frequency: f64, volume: f64) -> ClientMessage {
    ClientMessage::SubmitVolume { frequency, volume }
}

/// Simple bowl-shaped listener used to answer seeds
fn listener(frequency: f64) -> f64 {
    let x = frequency.log10() - 3.3;
    -28.0 + 12.0 * x * x
}

fn expect_new_point(message: &ServerMessage) -> f64 {
    match message {
        ServerMessage::NewPoint { frequency } => *frequency,
        other => panic!("expected new_point, got {:?}", other),
    }
}

#[test]
fn test_scenario_seeding_then_first_fit() {
    let mut session = session();
    let output = session.handle(start(5)).unwrap();

    assert_eq!(output.messages.len(), 2);
    assert_eq!(output.messages[0], ServerMessage::TestStarted { seed_count: 5 });
    assert_eq!(session.state(), SessionState::Seeding);

    let mut seeds = vec![expect_new_point(&output.messages[1])];
    for round in 0..4 {
        let frequency = *seeds.last().unwrap();
        let output = session.handle(submit(frequency, listener(frequency))).unwrap();
        assert_eq!(output.messages.len(), 1, "round {} emitted extra messages", round);
        assert!(!output
            .messages
            .iter()
            .any(|m| matches!(m, ServerMessage::UpdateCurve { .. })));
        seeds.push(expect_new_point(&output.messages[0]));
    }

    let mut distinct = seeds.clone();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();
    assert_eq!(distinct.len(), 5);
    assert!(seeds.iter().all(|f| (f.log10() - 3.0).abs() >= 0.1 - 1e-12));

    let last = *seeds.last().unwrap();
    let output = session.handle(submit(last, listener(last))).unwrap();
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(output.messages.len(), 2);
    match &output.messages[0] {
        ServerMessage::UpdateCurve { data } => {
            assert_eq!(data.freqs.len(), 200);
            assert_eq!(data.points.freqs.len(), 6);
        }
        other => panic!("expected update_curve, got {:?}", other),
    }
    let next = expect_new_point(&output.messages[1]);
    assert!((40.0..=16_000.0).contains(&next));

    assert!(output.events.contains(&SessionEvent::SeedingComplete));
    assert!(output
        .events
        .iter()
        .any(|e| matches!(e, SessionEvent::ModelFitted(r) if r.observations == 6)));
}

#[test]
fn test_scenario_duplicate_frequency_is_retained() {
    let mut session = session();
    session.handle(start(2)).unwrap();
    session.handle(submit(500.0, -20.0)).unwrap();
    let output = session.handle(submit(500.0, -30.0)).unwrap();

    assert_eq!(session.state(), SessionState::Active);
    match &output.messages[0] {
        ServerMessage::UpdateCurve { data } => {
            assert_eq!(data.points.volumes, vec![-25.0, -20.0, -30.0]);
        }
        other => panic!("expected update_curve, got {:?}", other),
    }
}

#[test]
fn test_scenario_curve_with_root_only_is_empty() {
    let mut session = session();
    session.handle(start(5)).unwrap();
    assert_eq!(session.observation_count(), 1);

    let output = session.handle(ClientMessage::GetCurve {}).unwrap();
    assert_eq!(
        serde_json::to_value(&output.messages[0]).unwrap(),
        serde_json::json!({
            "type": "update_curve",
            "data": {"freqs": [], "mean": [], "std": [], "points": []}
        })
    );
}

#[test]
fn test_submission_while_idle_is_rejected() {
    let mut session = session();
    let err = session.handle(submit(500.0, -20.0)).unwrap_err();
    assert_eq!(err.code(), SessionErrorCodes::PROTOCOL_VIOLATION);
    assert_eq!(session.state(), SessionState::Idle);

    let err = session
        .handle(ClientMessage::SubmitVolumes {
            submissions: vec![Submission {
                freq: 500.0,
                vol: -20.0,
            }],
        })
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::ProtocolViolation {
            message_type: "submit_volumes",
            phase: "idle"
        }
    ));
}

#[test]
fn test_invalid_seed_count_leaves_state_unchanged() {
    let mut session = session();
    session.handle(start(5)).unwrap();
    let remaining = session.remaining_seeds().to_vec();

    for bad in [0, 33] {
        let err = session.handle(start(bad)).unwrap_err();
        assert_eq!(err.code(), SessionErrorCodes::INVALID_INPUT);
    }
    let err = session.handle(submit(f64::NAN, -10.0)).unwrap_err();
    assert_eq!(err.code(), SessionErrorCodes::INVALID_INPUT);

    assert_eq!(session.state(), SessionState::Seeding);
    assert_eq!(session.remaining_seeds(), remaining.as_slice());
    assert_eq!(session.observation_count(), 1);
}

#[test]
fn test_batched_submission_advances_by_count() {
    let mut session = session();
    session.handle(start(4)).unwrap();
    let seeds = session.remaining_seeds().to_vec();

    let output = session
        .handle(ClientMessage::SubmitVolumes {
            submissions: seeds[..2]
                .iter()
                .map(|&f| Submission {
                    freq: f,
                    vol: listener(f),
                })
                .collect(),
        })
        .unwrap();

    assert_eq!(expect_new_point(&output.messages[0]), seeds[2]);
    assert_eq!(session.remaining_seeds(), &seeds[2..]);
    assert_eq!(session.observation_count(), 3);
}

#[test]
fn test_restart_discards_previous_run() {
    let mut session = session();
    session.handle(start(1)).unwrap();
    session.handle(submit(200.0, -15.0)).unwrap();
    assert_eq!(session.state(), SessionState::Active);

    session.handle(start(3)).unwrap();
    assert_eq!(session.state(), SessionState::Seeding);
    assert_eq!(session.observation_count(), 1);
    assert_eq!(session.remaining_seeds().len(), 3);
}

#[test]
fn test_active_submissions_refit_each_time() {
    let mut session = session();
    session.handle(start(1)).unwrap();
    session.handle(submit(200.0, -15.0)).unwrap();

    let output = session.handle(submit(5_000.0, -27.0)).unwrap();
    assert!(matches!(output.messages[0], ServerMessage::UpdateCurve { .. }));
    expect_new_point(&output.messages[1]);
    assert_eq!(session.observation_count(), 4);
}

#[test]
fn test_stratified_active_round_emits_new_points() {
    let mut session = TestSession::new(test_config(AcquisitionMode::Stratified));
    session.handle(start(3)).unwrap();
    for f in session.remaining_seeds().to_vec() {
        session.handle(submit(f, listener(f))).unwrap();
    }

    assert_eq!(session.state(), SessionState::Active);
    let output = session
        .handle(ClientMessage::SubmitVolumes {
            submissions: vec![
                Submission {
                    freq: 100.0,
                    vol: -12.0,
                },
                Submission {
                    freq: 800.0,
                    vol: -26.0,
                },
                Submission {
                    freq: 9_000.0,
                    vol: -20.0,
                },
            ],
        })
        .unwrap();

    match &output.messages[1] {
        ServerMessage::NewPoints { points } => {
            let bands: Vec<&str> = points.iter().map(|p| p.band.as_str()).collect();
            assert_eq!(bands, vec!["low", "mid", "high"]);
        }
        other => panic!("expected new_points, got {:?}", other),
    }
}

#[test]
fn test_playback_requests_do_not_change_state() {
    let mut session = session();

    let idle_ref = session.handle(ClientMessage::PlayReference {}).unwrap();
    assert_eq!(
        idle_ref.playback,
        Some(PlaybackRequest {
            device_id: None,
            frequency_hz: 1_000.0,
            volume_dbfs: -25.0,
        })
    );
    assert_eq!(session.state(), SessionState::Idle);

    session.handle(start(5)).unwrap();
    let remaining = session.remaining_seeds().to_vec();
    let tone = session
        .handle(ClientMessage::PlayTone {
            frequency: 440.0,
            volume: -18.0,
        })
        .unwrap();
    assert!(tone.messages.is_empty());
    assert_eq!(tone.playback.map(|p| p.device_id), Some(Some(3)));
    assert_eq!(session.remaining_seeds(), remaining.as_slice());
}

#[test]
fn test_reset_returns_to_idle() {
    let mut session = session();
    session.handle(start(2)).unwrap();
    session.handle(ClientMessage::Reset {}).unwrap();

    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.observation_count(), 0);
    assert!(session.handle(submit(500.0, -20.0)).is_err());
}
