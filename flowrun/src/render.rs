//! Plain-text run reports.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::reducer::ERROR_DETAIL_KEY;
use crate::core::types::{ApiPiece, ExecutionView, Outcome, RunMetrics};

const REPORT_TEMPLATE: &str = include_str!("templates/report.txt");

#[derive(Debug, Serialize)]
struct PieceRow {
    marker: &'static str,
    name: String,
    request: &'static str,
    status: Option<u16>,
    test: &'static str,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct IterationRow {
    index: u32,
    progress_pct: u8,
    pieces: Vec<PieceRow>,
}

impl PieceRow {
    fn from_piece(piece: &ApiPiece) -> Self {
        let marker = if piece.has_failure() {
            "x"
        } else if piece.registered_outcomes().all(|o| o.is_some()) {
            "+"
        } else {
            "."
        };
        Self {
            marker,
            name: piece.name.clone(),
            request: label(piece.request.as_ref().map(|r| r.success)),
            status: piece.request.as_ref().and_then(|r| r.status),
            test: label(piece.test.as_ref().map(|t| t.success)),
            error: piece
                .request
                .as_ref()
                .and_then(|r| r.detail.get(ERROR_DETAIL_KEY))
                .and_then(|v| v.as_str())
                .map(str::to_string),
        }
    }
}

fn label(registered: Option<Option<Outcome>>) -> &'static str {
    match registered {
        None => "-",
        Some(None) => "pending",
        Some(Some(Outcome::Success)) => "pass",
        Some(Some(Outcome::Failure)) => "fail",
        Some(Some(Outcome::Skipped)) => "skipped",
    }
}

/// Render a human-readable report of one run.
pub fn render_report(run_id: &str, view: &ExecutionView, metrics: &RunMetrics) -> Result<String> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_template("report", REPORT_TEMPLATE)
        .context("load report template")?;

    let iterations: Vec<IterationRow> = view
        .iterations
        .iter()
        .map(|it| IterationRow {
            index: it.index,
            progress_pct: it.progress_pct,
            pieces: it.pieces.iter().map(PieceRow::from_piece).collect(),
        })
        .collect();

    let template = env.get_template("report")?;
    let rendered = template
        .render(context! {
            run_id => run_id,
            status => view.overall_status.as_str(),
            metrics => metrics,
            iterations => iterations,
        })
        .context("render report")?;
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregate::run_metrics;
    use crate::core::types::{IterationView, OverallStatus, RequestState, TestState};
    use serde_json::{Map, Value};

    fn view() -> ExecutionView {
        let mut detail = Map::new();
        detail.insert(ERROR_DETAIL_KEY.to_string(), Value::String("Timeout".into()));
        ExecutionView {
            iterations: vec![IterationView {
                index: 1,
                progress_pct: 67,
                pieces: vec![
                    ApiPiece {
                        name: "Login".to_string(),
                        request: Some(RequestState {
                            success: Some(Outcome::Success),
                            status: Some(200),
                            ..RequestState::default()
                        }),
                        test: Some(TestState::default()),
                        response: None,
                    },
                    ApiPiece {
                        name: "Checkout".to_string(),
                        request: Some(RequestState {
                            success: Some(Outcome::Failure),
                            status: None,
                            detail,
                            errored: true,
                        }),
                        test: None,
                        response: None,
                    },
                ],
            }],
            overall_status: OverallStatus::Failed,
        }
    }

    #[test]
    fn report_lists_pieces_with_labels() {
        let view = view();
        let metrics = run_metrics(&view.iterations);
        let report = render_report("run-7", &view, &metrics).expect("render");

        assert!(report.starts_with("run run-7: failed\n"));
        assert!(report.contains("1 passed, 1 failed, 0 skipped, 1 pending (50% success)"));
        assert!(report.contains("iteration 1 (67%)"));
        assert!(report.contains(". Login  request=pass [200]  test=pending"));
        assert!(report.contains("x Checkout  request=fail  test=-  error: Timeout"));
    }

    #[test]
    fn zero_status_is_still_printed() {
        let mut view = view();
        view.iterations[0].pieces[0]
            .request
            .as_mut()
            .expect("request")
            .status = Some(0);
        let metrics = run_metrics(&view.iterations);
        let report = render_report("run-7", &view, &metrics).expect("render");
        assert!(report.contains(". Login  request=pass [0]  test=pending"));
        assert!(report.contains("x Checkout  request=fail  test=-"));
    }

    #[test]
    fn empty_view_says_so() {
        let report = render_report("r", &ExecutionView::empty(), &RunMetrics::default())
            .expect("render");
        assert!(report.contains("run r: pending"));
        assert!(report.contains("no API calls recorded"));
    }
}
