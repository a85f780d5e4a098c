//! HTTP route handlers for the UI API.

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use flowrun::core::types::{ExecutionView, Frame, FrameKind, OverallStatus, RunMetrics};
use flowrun::io::capture::{capture_path, write_capture};
use flowrun::monitor::{RunLifecycle, RunSummary};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::relay::{self, ingest_message};
use crate::state::{AppState, ChangeEvent};

/// Build the API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/runs", get(list_runs).delete(reset_all))
        .route("/runs/{run_id}/start", post(start_run))
        .route("/runs/{run_id}/complete", post(complete_run))
        .route("/runs/{run_id}/reset", post(reset_run))
        .route("/runs/{run_id}/frames", post(ingest_frame))
        .route("/runs/{run_id}/capture", post(capture_run))
        .route("/runs/{run_id}/view", get(get_view))
        .route("/runs/{run_id}/status", get(get_status))
        .route("/runs/{run_id}/metrics", get(get_metrics))
        .route("/runs/{run_id}/ledger", get(get_ledger))
        .route("/runs/{run_id}/ws", get(relay::ws_handler))
}

async fn health() -> &'static str {
    "ok"
}

/// GET /api/runs - one summary per known run.
async fn list_runs(State(state): State<AppState>) -> Json<Vec<RunSummary>> {
    Json(state.monitor.lock().await.runs())
}

/// DELETE /api/runs - drop every run and close all sockets.
async fn reset_all(State(state): State<AppState>) -> StatusCode {
    state.close_all_sockets();
    state.monitor.lock().await.reset_all();
    state.notify(ChangeEvent::AllReset);
    StatusCode::NO_CONTENT
}

/// POST /api/runs/:id/start - begin a run with an empty ledger.
async fn start_run(State(state): State<AppState>, Path(run_id): Path<String>) -> StatusCode {
    state.close_socket(&run_id);
    state.monitor.lock().await.start_run(&run_id);
    state.notify(ChangeEvent::RunStarted { run_id });
    StatusCode::NO_CONTENT
}

/// POST /api/runs/:id/complete - mark the run's stream finished.
async fn complete_run(State(state): State<AppState>, Path(run_id): Path<String>) -> StatusCode {
    state.close_socket(&run_id);
    state.monitor.lock().await.complete_run(&run_id);
    state.notify(ChangeEvent::RunCompleted { run_id });
    StatusCode::NO_CONTENT
}

/// POST /api/runs/:id/reset - close the socket, then forget the run.
async fn reset_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let had_socket = state.close_socket(&run_id);
    let known = state.monitor.lock().await.reset_run(&run_id);
    if !known && !had_socket {
        return Err(StatusCode::NOT_FOUND);
    }
    state.notify(ChangeEvent::RunReset { run_id });
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
struct FrameQuery {
    kind: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
struct Appended {
    frames: usize,
}

/// POST /api/runs/:id/frames?kind= - append one raw message.
async fn ingest_frame(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Query(query): Query<FrameQuery>,
    body: String,
) -> Result<Json<Appended>, StatusCode> {
    let kind_hint = match query.kind.as_deref() {
        None => None,
        Some(kind) => Some(FrameKind::parse_hint(kind).ok_or(StatusCode::BAD_REQUEST)?),
    };
    let frames = ingest_message(&state, &run_id, &body, kind_hint).await;
    Ok(Json(Appended { frames }))
}

/// GET /api/runs/:id/view - the reduced execution view.
async fn get_view(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Json<ExecutionView> {
    Json(state.monitor.lock().await.execution_view(&run_id))
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct RunStatus {
    run_id: String,
    lifecycle: Option<RunLifecycle>,
    overall_status: OverallStatus,
}

/// GET /api/runs/:id/status - overall status and socket lifecycle.
async fn get_status(State(state): State<AppState>, Path(run_id): Path<String>) -> Json<RunStatus> {
    let monitor = state.monitor.lock().await;
    Json(RunStatus {
        lifecycle: monitor.lifecycle(&run_id),
        overall_status: monitor.overall_status(&run_id),
        run_id,
    })
}

/// GET /api/runs/:id/metrics - outcome counts across the run.
async fn get_metrics(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Json<RunMetrics> {
    Json(state.monitor.lock().await.metrics(&run_id))
}

/// GET /api/runs/:id/ledger - every frame in receipt order.
async fn get_ledger(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Json<Vec<Frame>> {
    Json(state.monitor.lock().await.snapshot(&run_id))
}

#[derive(Debug, Serialize)]
struct Captured {
    path: String,
    frames: usize,
}

/// POST /api/runs/:id/capture - write the ledger under the capture dir.
async fn capture_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<Captured>, StatusCode> {
    let frames = {
        let monitor = state.monitor.lock().await;
        if monitor.lifecycle(&run_id).is_none() {
            return Err(StatusCode::NOT_FOUND);
        }
        monitor.snapshot(&run_id)
    };
    let path = capture_path(&state.config.capture.dir, &run_id);
    write_capture(&path, &frames).map_err(|e| {
        warn!(run_id, error = %format!("{e:#}"), "capture failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    info!(run_id, path = %path.display(), frames = frames.len(), "capture written");
    Ok(Json(Captured {
        path: path.display().to_string(),
        frames: frames.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowrun::core::types::Outcome;
    use flowrun::io::capture::read_capture;
    use flowrun::io::config::MonitorConfig;

    fn state() -> AppState {
        AppState::new(MonitorConfig::default())
    }

    async fn post_frame(state: &AppState, run_id: &str, kind: Option<&str>, body: &str) -> usize {
        ingest_frame(
            State(state.clone()),
            Path(run_id.to_string()),
            Query(FrameQuery {
                kind: kind.map(str::to_string),
            }),
            body.to_string(),
        )
        .await
        .expect("ingest")
        .0
        .frames
    }

    #[tokio::test]
    async fn posted_frames_reduce_into_view() {
        let state = state();
        start_run(State(state.clone()), Path("r1".to_string())).await;
        assert_eq!(
            post_frame(&state, "r1", None, r#"{"item":"Running request: Login"}"#).await,
            1
        );
        post_frame(
            &state,
            "r1",
            Some("done"),
            r#"{"summary":{"results":[{"name":"Login","type":"request","success":false,"status":500}]}}"#,
        )
        .await;

        let view = get_view(State(state.clone()), Path("r1".to_string())).await.0;
        let request = view
            .piece(0, "Login")
            .and_then(|p| p.request.as_ref())
            .expect("request");
        assert_eq!(request.success, Some(Outcome::Failure));
        assert_eq!(request.status, Some(500));

        let status = get_status(State(state.clone()), Path("r1".to_string())).await.0;
        assert_eq!(status.overall_status, OverallStatus::Failed);
        assert_eq!(status.lifecycle, Some(RunLifecycle::Running));

        let ledger = get_ledger(State(state.clone()), Path("r1".to_string())).await.0;
        assert_eq!(ledger[1].kind, FrameKind::Done);
    }

    #[tokio::test]
    async fn unknown_kind_hint_is_rejected() {
        let state = state();
        let err = ingest_frame(
            State(state.clone()),
            Path("r".to_string()),
            Query(FrameQuery {
                kind: Some("bogus".to_string()),
            }),
            "{}".to_string(),
        )
        .await
        .expect_err("bad kind");
        assert_eq!(err, StatusCode::BAD_REQUEST);
        assert_eq!(state.monitor.lock().await.frame_count("r"), 0);
    }

    #[tokio::test]
    async fn unknown_run_has_empty_pending_view() {
        let state = state();
        let view = get_view(State(state.clone()), Path("nope".to_string())).await.0;
        assert_eq!(view, ExecutionView::empty());
        let status = get_status(State(state), Path("nope".to_string())).await.0;
        assert_eq!(status.lifecycle, None);
        assert_eq!(status.overall_status, OverallStatus::Pending);
    }

    #[tokio::test]
    async fn reset_clears_one_run_and_reports_unknown() {
        let state = state();
        let mut rx = state.event_tx.subscribe();
        post_frame(&state, "a", None, r#"{"item":"Running request: A"}"#).await;
        post_frame(&state, "b", None, r#"{"item":"Running request: B"}"#).await;

        let reset = reset_run(State(state.clone()), Path("a".to_string())).await;
        assert_eq!(reset, Ok(StatusCode::NO_CONTENT));
        let again = reset_run(State(state.clone()), Path("a".to_string())).await;
        assert_eq!(again, Err(StatusCode::NOT_FOUND));

        let runs = list_runs(State(state.clone())).await.0;
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_id, "b");

        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        assert!(events.contains(&ChangeEvent::RunReset {
            run_id: "a".to_string()
        }));
    }

    #[tokio::test]
    async fn reset_aborts_attached_socket() {
        let state = state();
        let task = tokio::spawn(std::future::pending::<()>());
        state.register_socket("live", task.abort_handle());

        let reset = reset_run(State(state.clone()), Path("live".to_string())).await;

        assert_eq!(reset, Ok(StatusCode::NO_CONTENT));
        assert!(!state.has_socket("live"));
        let joined = task.await.expect_err("aborted");
        assert!(joined.is_cancelled());
    }

    #[tokio::test]
    async fn capture_writes_ledger_to_configured_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut config = MonitorConfig::default();
        config.capture.dir = temp.path().join("caps");
        let state = AppState::new(config);
        post_frame(&state, "run/7", None, r#"{"item":"Running request: A"}"#).await;
        post_frame(&state, "run/7", None, "not json").await;

        let captured = capture_run(State(state.clone()), Path("run/7".to_string()))
            .await
            .expect("capture")
            .0;
        assert_eq!(captured.frames, 2);
        let frames = read_capture(&temp.path().join("caps").join("run_7.jsonl")).expect("read");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].kind, FrameKind::Raw);

        let missing = capture_run(State(state), Path("other".to_string())).await;
        assert!(matches!(missing, Err(StatusCode::NOT_FOUND)));
    }
}
