//! HTTP and WebSocket transport.
//!
//! An Axum server exposing health, device listing and telemetry endpoints
//! (a snapshot and an SSE feed) plus the `/ws` session socket. Each socket owns its own `TestSession`
//! through a [`SessionDriver`]; no lock is shared between sessions.

pub mod connection;
pub mod routes;
pub mod sse;

pub use connection::SessionDriver;
pub use routes::{build_router, run_http_server, AppState, HealthResponse, HttpServerError};
