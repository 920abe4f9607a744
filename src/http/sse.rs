//! Server-Sent Events feed of live telemetry.

use std::convert::Infallible;
use std::pin::Pin;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::telemetry::{self, MetricEvent};

pub type MetricStream = Sse<Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>>;

fn to_event(event: &MetricEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(payload) => Some(Event::default().event("metric").data(payload)),
        Err(err) => {
            log::warn!("[Http] Dropping unserializable metric event: {}", err);
            None
        }
    }
}

/// Stream every event published to the telemetry hub from now on.
///
/// Subscribers that fall behind the broadcast buffer skip the events they
/// missed; `/metrics` still has the bounded history.
pub fn metrics() -> MetricStream {
    let receiver = telemetry::hub().collector().subscribe();
    let stream = BroadcastStream::new(receiver).filter_map(|result| match result {
        Ok(event) => to_event(&event).map(Ok),
        Err(_) => None,
    });

    Sse::new(Box::pin(stream) as Pin<Box<_>>).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(5))
            .text("metrics-keepalive"),
    )
}
