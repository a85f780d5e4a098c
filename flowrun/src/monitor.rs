//! Per-run ledgers, lifecycle and derived views.
//!
//! [`FlowMonitor`] is the in-process contract between the socket-management
//! layer (which calls [`ingest`] once per message) and the rendering layer
//! (which calls [`execution_view`] / [`overall_status`]). Views are recomputed
//! from the full ledger on every query. The monitor never owns sockets;
//! callers tear theirs down before [`reset_run`].
//!
//! [`ingest`]: FlowMonitor::ingest
//! [`execution_view`]: FlowMonitor::execution_view
//! [`overall_status`]: FlowMonitor::overall_status
//! [`reset_run`]: FlowMonitor::reset_run

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::core::aggregate::run_metrics;
use crate::core::classifier::ReduceOptions;
use crate::core::ledger::Ledgers;
use crate::core::reducer::reduce;
use crate::core::types::{
    ExecutionView, Frame, FrameKind, OverallStatus, PendingFrame, RunMetrics,
};
use crate::ingest::{normalize, normalize_value};

/// Lifecycle of a run's ledger as seen by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunLifecycle {
    /// Socket open (or frames arriving).
    Running,
    /// Socket closed; the ledger still accepts a trailing `done` frame.
    Completed,
}

/// Row of the flow list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub lifecycle: RunLifecycle,
    pub frames: usize,
    pub overall_status: OverallStatus,
    pub metrics: RunMetrics,
}

#[derive(Debug, Default)]
pub struct FlowMonitor {
    options: ReduceOptions,
    ledgers: Ledgers,
    lifecycles: BTreeMap<String, RunLifecycle>,
}

impl FlowMonitor {
    pub fn new(options: ReduceOptions) -> Self {
        Self {
            options,
            ledgers: Ledgers::new(),
            lifecycles: BTreeMap::new(),
        }
    }

    pub fn options(&self) -> &ReduceOptions {
        &self.options
    }

    /// Begin (or restart) a run with an empty ledger.
    pub fn start_run(&mut self, run_id: &str) {
        self.ledgers.reset(run_id);
        self.ledgers.ledger_mut(run_id);
        self.lifecycles
            .insert(run_id.to_string(), RunLifecycle::Running);
        info!(run_id, "run started");
    }

    /// Mark the run's socket closed. Ledger and view are kept.
    pub fn complete_run(&mut self, run_id: &str) {
        self.ledgers.ledger_mut(run_id);
        self.lifecycles
            .insert(run_id.to_string(), RunLifecycle::Completed);
        info!(run_id, "run completed");
    }

    /// Drop the run's ledger and status. Returns whether the run was known.
    pub fn reset_run(&mut self, run_id: &str) -> bool {
        let known = self.ledgers.reset(run_id);
        self.lifecycles.remove(run_id);
        info!(run_id, known, "run reset");
        known
    }

    pub fn reset_all(&mut self) {
        self.ledgers.reset_all();
        self.lifecycles.clear();
        info!("all runs reset");
    }

    /// Normalize and append one raw message. Returns the ledger length.
    ///
    /// Never fails; unknown runs are created as running.
    pub fn ingest(&mut self, run_id: &str, raw: &str, kind_hint: Option<FrameKind>) -> usize {
        self.append(run_id, normalize(raw, kind_hint))
    }

    /// Same as [`FlowMonitor::ingest`] for an already-parsed message.
    pub fn ingest_value(
        &mut self,
        run_id: &str,
        value: Value,
        kind_hint: Option<FrameKind>,
    ) -> usize {
        self.append(run_id, normalize_value(value, kind_hint))
    }

    /// Append a normalized frame. Returns the ledger length.
    pub fn append(&mut self, run_id: &str, frame: PendingFrame) -> usize {
        self.lifecycles
            .entry(run_id.to_string())
            .or_insert(RunLifecycle::Running);
        let ledger = self.ledgers.ledger_mut(run_id);
        let appended = ledger.append(frame);
        debug!(
            run_id,
            seq = appended.seq,
            kind = appended.kind.as_str(),
            "frame appended"
        );
        ledger.len()
    }

    /// Chronological copy of the run's frames.
    pub fn snapshot(&self, run_id: &str) -> Vec<Frame> {
        self.ledgers.snapshot(run_id)
    }

    pub fn frame_count(&self, run_id: &str) -> usize {
        self.ledgers.get(run_id).map_or(0, |ledger| ledger.len())
    }

    pub fn lifecycle(&self, run_id: &str) -> Option<RunLifecycle> {
        self.lifecycles.get(run_id).copied()
    }

    /// Reduce the run's full history. Unknown runs yield an empty view.
    pub fn execution_view(&self, run_id: &str) -> ExecutionView {
        reduce(&self.snapshot(run_id), &self.options)
    }

    pub fn overall_status(&self, run_id: &str) -> OverallStatus {
        self.execution_view(run_id).overall_status
    }

    pub fn metrics(&self, run_id: &str) -> RunMetrics {
        run_metrics(&self.execution_view(run_id).iterations)
    }

    /// Summaries of every known run, ordered by id.
    pub fn runs(&self) -> Vec<RunSummary> {
        self.lifecycles
            .iter()
            .map(|(run_id, lifecycle)| {
                let view = self.execution_view(run_id);
                RunSummary {
                    run_id: run_id.clone(),
                    lifecycle: *lifecycle,
                    frames: self.frame_count(run_id),
                    overall_status: view.overall_status,
                    metrics: run_metrics(&view.iterations),
                }
            })
            .collect()
    }
}
