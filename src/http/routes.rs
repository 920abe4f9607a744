use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use tracing::Instrument;

use crate::audio::{AudioOutput, DeviceInfo};
use crate::config::AppConfig;
use crate::error::{log_playback_error, ErrorCode, PlaybackError};
use crate::telemetry::{self, TelemetrySnapshot};

use super::connection::SessionDriver;
use super::sse::{self, MetricStream};

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub audio: Arc<dyn AudioOutput>,
    started: Instant,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, audio: Arc<dyn AudioOutput>) -> Self {
        Self {
            config,
            audio,
            started: Instant::now(),
        }
    }

    fn uptime_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// HTTP error variants mapped to JSON responses.
#[derive(Debug)]
pub enum HttpServerError {
    ServiceUnavailable { code: i32, message: String },
}

impl From<PlaybackError> for HttpServerError {
    fn from(err: PlaybackError) -> Self {
        Self::ServiceUnavailable {
            code: err.code(),
            message: err.message(),
        }
    }
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::ServiceUnavailable { code, message } => {
                (StatusCode::SERVICE_UNAVAILABLE, code, message)
            }
        };

        (
            status,
            Json(serde_json::json!({ "error": message, "code": code })),
        )
            .into_response()
    }
}

/// Health endpoint response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub active_sessions: u64,
    pub uptime_ms: u64,
}

/// Build the Axum router with all handlers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/devices", get(devices))
        .route("/metrics", get(metrics))
        .route("/metrics/stream", get(metrics_stream))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

/// Run the HTTP server loop until ctrl-c.
pub async fn run_http_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding HTTP listener on {}", addr))?;
    log::info!("[Http] Listening on {}", addr);

    let router = build_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("[Http] Shutdown requested");
        })
        .await
        .context("serving HTTP router")?;
    Ok(())
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        active_sessions: telemetry::hub().active_sessions(),
        uptime_ms: state.uptime_ms(),
    })
}

pub async fn devices(
    State(state): State<AppState>,
) -> Result<Json<Vec<DeviceInfo>>, HttpServerError> {
    let audio = Arc::clone(&state.audio);
    let listed = tokio::task::spawn_blocking(move || audio.list_output_devices())
        .await
        .map_err(|err| PlaybackError::HostUnavailable {
            details: err.to_string(),
        })
        .and_then(|result| result);

    match listed {
        Ok(devices) => Ok(Json(devices)),
        Err(err) => {
            log_playback_error(&err, "GET /api/devices");
            Err(err.into())
        }
    }
}

pub async fn metrics_stream() -> MetricStream {
    sse::metrics()
}

pub async fn metrics() -> Json<TelemetrySnapshot> {
    Json(telemetry::hub().snapshot())
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| run_connection(socket, state))
}

async fn run_connection(mut socket: WebSocket, state: AppState) {
    let mut driver = SessionDriver::new(state.config, state.audio);
    let span = tracing::info_span!("session", id = driver.id());

    async move {
        while let Some(received) = socket.recv().await {
            let text = match received {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(err) => {
                    log::warn!("[Http] WebSocket receive failed: {}", err);
                    break;
                }
            };

            for frame in driver.handle_text(&text).await {
                if let Err(err) = socket.send(Message::Text(frame)).await {
                    log::warn!("[Http] WebSocket send failed: {}", err);
                    return;
                }
            }
        }
    }
    .instrument(span)
    .await;
}
