//! Per-connection test sessions and their JSON protocol

pub mod protocol;
pub mod state;

pub use protocol::{parse_client_message, ClientMessage, ServerMessage, Submission};
pub use state::{PlaybackRequest, SessionEvent, SessionOutput, SessionState, TestSession};
