//! Runner WebSocket ingestion.
//!
//! Every text or binary message becomes one ledger frame. The socket closing
//! (cleanly or not) marks the run completed; the view keeps whatever the
//! ledger holds at that point.
//!
//! A socket task only touches its run while it is the registered socket for
//! that run. Ownership is checked under the monitor lock, so once a reset has
//! taken the socket out of the registry no later frame reaches the ledger.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use flowrun::core::types::FrameKind;
use futures::{Stream, StreamExt};
use tokio::sync::oneshot;
use tokio::task::{Id, JoinHandle};
use tracing::{debug, info, trace, warn};

use crate::state::{AppState, ChangeEvent};

/// GET /api/runs/{id}/ws - open the ingestion socket for a run.
///
/// Connecting starts the run afresh and replaces any socket still attached
/// to the same id.
pub async fn ws_handler(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| attach(state, run_id, socket))
}

async fn attach(state: AppState, run_id: String, socket: WebSocket) {
    let task = start_ingestion(state.clone(), run_id.clone(), socket).await;
    let task_id = task.id();
    match task.await {
        Ok(()) => {}
        Err(err) if err.is_cancelled() => debug!(run_id, "ingestion socket aborted"),
        Err(err) => warn!(run_id, error = %err, "ingestion task failed"),
    }
    state.release_socket(&run_id, task_id);
}

/// Register a pump for `messages`, start the run, then let the pump go.
///
/// If the registration is taken away before the run starts (a reset or a
/// newer socket), the run is left untouched and the pump never reads.
pub async fn start_ingestion<S, E>(
    state: AppState,
    run_id: String,
    messages: S,
) -> JoinHandle<()>
where
    S: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let (gate_tx, gate_rx) = oneshot::channel();
    let task = tokio::spawn(pump(state.clone(), run_id.clone(), gate_rx, messages));
    let task_id = task.id();
    state.register_socket(&run_id, task.abort_handle());

    {
        let mut monitor = state.monitor.lock().await;
        if !state.owns_socket(&run_id, task_id) {
            debug!(run_id, "socket replaced before the run started");
            return task;
        }
        monitor.start_run(&run_id);
    }
    state.notify(ChangeEvent::RunStarted {
        run_id: run_id.clone(),
    });
    info!(run_id, "ingestion socket attached");
    let _ = gate_tx.send(task_id);
    task
}

/// Drain `messages` into the run's ledger, then mark the run completed.
async fn pump<S, E>(
    state: AppState,
    run_id: String,
    gate: oneshot::Receiver<Id>,
    mut messages: S,
) where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    let Ok(task) = gate.await else {
        return;
    };

    while let Some(msg) = messages.next().await {
        let ingested = match msg {
            Ok(Message::Text(text)) => ingest_owned(&state, &run_id, task, text.as_str()).await,
            Ok(Message::Binary(data)) => {
                let text = String::from_utf8_lossy(&data);
                ingest_owned(&state, &run_id, task, &text).await
            }
            Ok(Message::Close(_)) => {
                debug!(run_id, "runner closed socket");
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                trace!(run_id, "keep-alive");
                true
            }
            Err(e) => {
                warn!(run_id, error = %e, "socket error");
                break;
            }
        };
        if !ingested {
            debug!(run_id, "socket no longer owns the run; dropping");
            return;
        }
    }

    {
        let mut monitor = state.monitor.lock().await;
        if !state.owns_socket(&run_id, task) {
            return;
        }
        monitor.complete_run(&run_id);
    }
    state.notify(ChangeEvent::RunCompleted { run_id });
}

/// Ingest for the socket task `task`. Returns false once it lost the run.
async fn ingest_owned(state: &AppState, run_id: &str, task: Id, raw: &str) -> bool {
    let frames = {
        let mut monitor = state.monitor.lock().await;
        if !state.owns_socket(run_id, task) {
            return false;
        }
        monitor.ingest(run_id, raw, None)
    };
    state.notify(ChangeEvent::FramesAppended {
        run_id: run_id.to_string(),
        frames,
    });
    true
}

/// Append one raw message to the run and tell subscribers.
pub async fn ingest_message(
    state: &AppState,
    run_id: &str,
    raw: &str,
    kind_hint: Option<FrameKind>,
) -> usize {
    let frames = state.monitor.lock().await.ingest(run_id, raw, kind_hint);
    state.notify(ChangeEvent::FramesAppended {
        run_id: run_id.to_string(),
        frames,
    });
    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowrun::core::types::OverallStatus;
    use flowrun::io::config::MonitorConfig;
    use flowrun::monitor::RunLifecycle;
    use futures::channel::mpsc;

    type Incoming = Result<Message, axum::Error>;

    fn text(raw: &str) -> Incoming {
        Ok(Message::Text(raw.into()))
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<ChangeEvent>) -> Vec<ChangeEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    #[tokio::test]
    async fn pump_ingests_until_close() {
        let state = AppState::new(MonitorConfig::default());
        let mut rx = state.event_tx.subscribe();
        let messages = futures::stream::iter(vec![
            text(r#"{"item":"Running request: Login"}"#),
            Ok(Message::Binary(
                br#"{"response":{"name":"Login","type":"request","success":true}}"#
                    .to_vec()
                    .into(),
            )),
            Ok(Message::Close(None)),
            text(r#"{"item":"Running request: Late"}"#),
        ]);

        let task = start_ingestion(state.clone(), "run-1".to_string(), messages).await;
        task.await.expect("pump");

        let monitor = state.monitor.lock().await;
        assert_eq!(monitor.frame_count("run-1"), 2);
        assert_eq!(monitor.lifecycle("run-1"), Some(RunLifecycle::Completed));
        assert_eq!(monitor.overall_status("run-1"), OverallStatus::AllOk);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 4);
        assert_eq!(
            events.first(),
            Some(&ChangeEvent::RunStarted {
                run_id: "run-1".to_string()
            })
        );
        assert_eq!(
            events.last(),
            Some(&ChangeEvent::RunCompleted {
                run_id: "run-1".to_string()
            })
        );
    }

    #[tokio::test]
    async fn stream_end_without_done_stays_pending() {
        let state = AppState::new(MonitorConfig::default());
        let messages = futures::stream::iter(vec![text(r#"{"item":"Running request: Slow"}"#)]);

        let task = start_ingestion(state.clone(), "run-2".to_string(), messages).await;
        task.await.expect("pump");

        let monitor = state.monitor.lock().await;
        assert_eq!(monitor.lifecycle("run-2"), Some(RunLifecycle::Completed));
        assert_eq!(monitor.overall_status("run-2"), OverallStatus::Pending);
    }

    #[tokio::test]
    async fn reset_before_first_message_keeps_run_gone() {
        let state = AppState::new(MonitorConfig::default());
        let (tx, rx) = mpsc::unbounded::<Incoming>();

        let task = start_ingestion(state.clone(), "run-3".to_string(), rx).await;
        assert_eq!(
            state.monitor.lock().await.lifecycle("run-3"),
            Some(RunLifecycle::Running)
        );

        assert!(state.close_socket("run-3"));
        assert!(state.monitor.lock().await.reset_run("run-3"));
        let _ = tx.unbounded_send(text(r#"{"item":"Running request: Late"}"#));
        drop(tx);

        let joined = task.await;
        assert!(joined.is_ok() || joined.is_err_and(|e| e.is_cancelled()));
        let monitor = state.monitor.lock().await;
        assert_eq!(monitor.frame_count("run-3"), 0);
        assert_eq!(monitor.lifecycle("run-3"), None);
        assert!(monitor.runs().is_empty());
    }

    #[tokio::test]
    async fn unregistered_socket_never_writes() {
        let state = AppState::new(MonitorConfig::default());
        let (tx, rx) = mpsc::unbounded::<Incoming>();
        let task = start_ingestion(state.clone(), "run-4".to_string(), rx).await;
        let task_id = task.id();

        // Registry entry gone, task still running.
        state.release_socket("run-4", task_id);
        tx.unbounded_send(text(r#"{"item":"Running request: Late"}"#))
            .expect("send");
        task.await.expect("pump");

        let monitor = state.monitor.lock().await;
        assert_eq!(monitor.frame_count("run-4"), 0);
        assert_eq!(monitor.lifecycle("run-4"), Some(RunLifecycle::Running));
    }

    #[tokio::test]
    async fn newer_socket_takes_over_the_run() {
        let state = AppState::new(MonitorConfig::default());
        let (_old_tx, old_rx) = mpsc::unbounded::<Incoming>();
        let old = start_ingestion(state.clone(), "run-5".to_string(), old_rx).await;

        let (new_tx, new_rx) = mpsc::unbounded::<Incoming>();
        let new = start_ingestion(state.clone(), "run-5".to_string(), new_rx).await;
        assert!(old.await.expect_err("replaced").is_cancelled());

        new_tx
            .unbounded_send(text(r#"{"item":"Running request: A"}"#))
            .expect("send");
        drop(new_tx);
        new.await.expect("pump");

        let monitor = state.monitor.lock().await;
        assert_eq!(monitor.frame_count("run-5"), 1);
        assert_eq!(monitor.lifecycle("run-5"), Some(RunLifecycle::Completed));
    }
}
