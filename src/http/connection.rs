//! One WebSocket connection's session driver.
//!
//! The driver owns the connection's `TestSession`, turns text frames into
//! session transitions and hands playback to the audio backend. Submissions
//! may refit the model, so those transitions run on the blocking pool with
//! the session moved in and back out; other sessions keep being served
//! while a fit is running. Playback is handed over from the blocking pool
//! too, since resolving a device enumerates the audio host.

use std::sync::Arc;

use crate::audio::AudioOutput;
use crate::config::AppConfig;
use crate::error::{log_playback_error, log_session_error, PlaybackError, SessionError};
use crate::session::{
    parse_client_message, ClientMessage, PlaybackRequest, ServerMessage, SessionOutput, TestSession,
};
use crate::telemetry;

pub struct SessionDriver {
    id: u64,
    config: Arc<AppConfig>,
    audio: Arc<dyn AudioOutput>,
    session: Option<TestSession>,
}

impl SessionDriver {
    pub fn new(config: Arc<AppConfig>, audio: Arc<dyn AudioOutput>) -> Self {
        let id = telemetry::hub().session_opened();
        log::info!("[Http] Session {} connected", id);
        Self {
            id,
            session: Some(TestSession::new(Arc::clone(&config))),
            config,
            audio,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Handle one text frame, returning the JSON frames to send back
    pub async fn handle_text(&mut self, text: &str) -> Vec<String> {
        let result = match parse_client_message(text) {
            Ok(message) => self.dispatch(message).await,
            Err(err) => Err(err),
        };

        let messages = match result {
            Ok(output) => self.apply(output).await,
            Err(err) => {
                log_session_error(&err, "SessionDriver::handle_text");
                telemetry::hub().record_rejection(self.id, &err);
                vec![ServerMessage::from_error(&err)]
            }
        };

        messages
            .iter()
            .filter_map(|message| match message.to_json() {
                Ok(json) => Some(json),
                Err(err) => {
                    log_session_error(&err, "SessionDriver::encode");
                    None
                }
            })
            .collect()
    }

    async fn dispatch(&mut self, message: ClientMessage) -> Result<SessionOutput, SessionError> {
        let mut session = match self.session.take() {
            Some(session) => session,
            None => TestSession::new(Arc::clone(&self.config)),
        };

        if !message.may_fit() {
            let result = session.handle(message);
            self.session = Some(session);
            return result;
        }

        let joined = tokio::task::spawn_blocking(move || {
            let result = session.handle(message);
            (session, result)
        })
        .await;

        match joined {
            Ok((session, result)) => {
                self.session = Some(session);
                result
            }
            Err(err) => {
                // The session was lost with the task; start over from idle.
                self.session = Some(TestSession::new(Arc::clone(&self.config)));
                Err(SessionError::Internal {
                    reason: format!("session task failed: {}", err),
                })
            }
        }
    }

    /// Device lookups can touch the audio host, so playback starts on the
    /// blocking pool rather than the executor thread
    async fn play(&mut self, request: PlaybackRequest) -> Result<(), PlaybackError> {
        let audio = Arc::clone(&self.audio);
        tokio::task::spawn_blocking(move || {
            audio.play(request.device_id, request.frequency_hz, request.volume_dbfs)
        })
        .await
        .map_err(|err| PlaybackError::StreamFailed {
            reason: format!("playback task failed: {}", err),
        })
        .and_then(|result| result)
    }

    async fn apply(&mut self, output: SessionOutput) -> Vec<ServerMessage> {
        let hub = telemetry::hub();
        for event in &output.events {
            hub.record_session_event(self.id, event);
        }

        let mut messages = output.messages;
        if let Some(request) = output.playback {
            if let Err(err) = self.play(request).await {
                log_playback_error(&err, "SessionDriver::play");
                hub.record_playback_failure(self.id, &err);
                messages.push(ServerMessage::from_error(&err));
            }
        }
        messages
    }
}

impl Drop for SessionDriver {
    fn drop(&mut self) {
        log::info!("[Http] Session {} closed", self.id);
        telemetry::hub().session_closed(self.id);
    }
}
