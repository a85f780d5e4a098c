//! Server-Sent Events stream of run changes.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

use crate::state::{AppState, ChangeEvent};

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct SsePayload {
    #[serde(rename = "type")]
    event_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frames: Option<usize>,
}

impl SsePayload {
    fn run(event_type: &'static str, run_id: &str) -> Self {
        SsePayload {
            event_type,
            run_id: Some(run_id.to_string()),
            frames: None,
        }
    }
}

impl From<&ChangeEvent> for SsePayload {
    fn from(event: &ChangeEvent) -> Self {
        match event {
            ChangeEvent::RunStarted { run_id } => SsePayload::run("run_started", run_id),
            ChangeEvent::FramesAppended { run_id, frames } => SsePayload {
                frames: Some(*frames),
                ..SsePayload::run("frames_appended", run_id)
            },
            ChangeEvent::RunCompleted { run_id } => SsePayload::run("run_completed", run_id),
            ChangeEvent::RunReset { run_id } => SsePayload::run("run_reset", run_id),
            ChangeEvent::AllReset => SsePayload {
                event_type: "all_reset",
                run_id: None,
                frames: None,
            },
        }
    }
}

/// SSE endpoint handler.
pub async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.event_tx.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("connected").data("{}"));

        loop {
            match rx.recv().await {
                Ok(change_event) => {
                    let payload = SsePayload::from(&change_event);
                    if let Ok(json) = serde_json::to_string(&payload) {
                        yield Ok(Event::default().event("change").data(json));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "SSE client lagged, some events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(state.config.server.keep_alive_secs))
            .text("ping"),
    )
}
