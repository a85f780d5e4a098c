//! Offline replay of captured or raw message logs through the monitor.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::core::classifier::ReduceOptions;
use crate::core::types::{ExecutionView, OverallStatus, PendingFrame, RunMetrics};
use crate::io::capture::{read_capture, read_raw_messages, write_capture};
use crate::monitor::FlowMonitor;

/// Input format of a replay file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaySource {
    /// JSONL capture written by `write_capture`.
    Capture,
    /// One raw WebSocket message per line.
    RawMessages,
}

/// Result of replaying one file.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayOutcome {
    pub run_id: String,
    pub frames: usize,
    pub view: ExecutionView,
    pub metrics: RunMetrics,
}

impl ReplayOutcome {
    pub fn overall_status(&self) -> OverallStatus {
        self.view.overall_status
    }
}

/// Load `path` into a fresh monitor run and reduce it.
///
/// When `capture_out` is set, the resulting ledger is written there.
pub fn replay_file(
    path: &Path,
    source: ReplaySource,
    run_id: &str,
    options: ReduceOptions,
    capture_out: Option<&Path>,
) -> Result<ReplayOutcome> {
    let mut monitor = FlowMonitor::new(options);
    monitor.start_run(run_id);

    match source {
        ReplaySource::Capture => {
            let frames = read_capture(path).with_context(|| "load capture for replay")?;
            for frame in frames {
                monitor.append(
                    run_id,
                    PendingFrame {
                        kind: frame.kind,
                        payload: frame.payload,
                        received_at: Some(frame.received_at),
                    },
                );
            }
        }
        ReplaySource::RawMessages => {
            let messages =
                read_raw_messages(path).with_context(|| "load raw messages for replay")?;
            for message in &messages {
                monitor.ingest(run_id, message, None);
            }
        }
    }
    monitor.complete_run(run_id);

    if let Some(out) = capture_out {
        write_capture(out, &monitor.snapshot(run_id))
            .with_context(|| format!("write capture {}", out.display()))?;
    }

    let view = monitor.execution_view(run_id);
    let outcome = ReplayOutcome {
        run_id: run_id.to_string(),
        frames: monitor.frame_count(run_id),
        metrics: monitor.metrics(run_id),
        view,
    };
    info!(
        run_id,
        frames = outcome.frames,
        status = outcome.overall_status().as_str(),
        "replay finished"
    );
    Ok(outcome)
}
