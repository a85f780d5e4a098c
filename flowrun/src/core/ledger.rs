//! Append-only per-run history of received frames.

use std::collections::BTreeMap;

use crate::core::types::{Frame, PendingFrame};

/// Append-only history of one flow run.
///
/// Frames are never mutated or removed after append; only [`clear`] drops
/// the whole history when the run is explicitly reset.
///
/// [`clear`]: MessageLedger::clear
#[derive(Debug, Clone, Default)]
pub struct MessageLedger {
    frames: Vec<Frame>,
    next_seq: u64,
}

impl MessageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame, stamping `received_at` with `now_ms` when untagged.
    pub fn append_at(&mut self, frame: PendingFrame, now_ms: i64) -> &Frame {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.frames.push(Frame {
            seq,
            received_at: frame.received_at.unwrap_or(now_ms),
            kind: frame.kind,
            payload: frame.payload,
        });
        &self.frames[self.frames.len() - 1]
    }

    /// Append a frame, stamping it with the current wall clock when untagged.
    pub fn append(&mut self, frame: PendingFrame) -> &Frame {
        self.append_at(frame, now_ms())
    }

    /// Frames in ascending `(received_at, seq)` order.
    ///
    /// Returns an owned copy; storage keeps append order.
    pub fn snapshot(&self) -> Vec<Frame> {
        let mut frames = self.frames.clone();
        frames.sort_by_key(|frame| (frame.received_at, frame.seq));
        frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Drop the whole history. Sequence numbers restart at zero.
    pub fn clear(&mut self) {
        self.frames.clear();
        self.next_seq = 0;
    }
}

/// Ledgers keyed by flow-run id.
#[derive(Debug, Clone, Default)]
pub struct Ledgers {
    runs: BTreeMap<String, MessageLedger>,
}

impl Ledgers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the run's ledger, creating it on first use.
    pub fn append(&mut self, run_id: &str, frame: PendingFrame) -> &Frame {
        self.ledger_mut(run_id).append(frame)
    }

    /// Chronological copy of a run's frames; empty for unknown runs.
    pub fn snapshot(&self, run_id: &str) -> Vec<Frame> {
        self.runs
            .get(run_id)
            .map(MessageLedger::snapshot)
            .unwrap_or_default()
    }

    pub fn get(&self, run_id: &str) -> Option<&MessageLedger> {
        self.runs.get(run_id)
    }

    pub fn ledger_mut(&mut self, run_id: &str) -> &mut MessageLedger {
        self.runs.entry(run_id.to_string()).or_default()
    }

    /// Remove a run's ledger. Returns whether it existed.
    pub fn reset(&mut self, run_id: &str) -> bool {
        self.runs.remove(run_id).is_some()
    }

    pub fn reset_all(&mut self) {
        self.runs.clear();
    }

    /// Known run ids in ascending order.
    pub fn run_ids(&self) -> impl Iterator<Item = &str> {
        self.runs.keys().map(String::as_str)
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FrameKind;
    use serde_json::json;

    fn log(text: &str) -> PendingFrame {
        PendingFrame::new(FrameKind::Log, json!({ "item": text }))
    }

    #[test]
    fn append_stamps_untagged_frames_and_keeps_tags() {
        let mut ledger = MessageLedger::new();
        let stamped = ledger.append_at(log("a"), 500).clone();
        let tagged = ledger.append_at(log("b").at(42), 500).clone();

        assert_eq!(stamped.received_at, 500);
        assert_eq!(stamped.seq, 0);
        assert_eq!(tagged.received_at, 42);
        assert_eq!(tagged.seq, 1);
    }

    #[test]
    fn snapshot_orders_by_time_then_append_order() {
        let mut ledger = MessageLedger::new();
        ledger.append(log("late").at(20));
        ledger.append(log("tie-first").at(10));
        ledger.append(log("tie-second").at(10));
        ledger.append(log("early").at(5));

        let items: Vec<String> = ledger
            .snapshot()
            .iter()
            .map(|f| f.payload["item"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(items, vec!["early", "tie-first", "tie-second", "late"]);
    }

    #[test]
    fn snapshot_does_not_reorder_storage() {
        let mut ledger = MessageLedger::new();
        ledger.append(log("b").at(2));
        ledger.append(log("a").at(1));
        let first = ledger.snapshot();
        ledger.append(log("c").at(3));

        assert_eq!(first.len(), 2);
        assert_eq!(ledger.snapshot().len(), 3);
        assert_eq!(ledger.frames[0].payload["item"], json!("b"));
    }

    #[test]
    fn reset_only_touches_one_run() {
        let mut ledgers = Ledgers::new();
        ledgers.append("run-a", log("x"));
        ledgers.append("run-b", log("y"));

        assert!(ledgers.reset("run-a"));
        assert!(!ledgers.reset("run-a"));
        assert!(ledgers.snapshot("run-a").is_empty());
        assert_eq!(ledgers.snapshot("run-b").len(), 1);

        ledgers.reset_all();
        assert_eq!(ledgers.run_ids().count(), 0);
    }

    #[test]
    fn clear_restarts_sequence() {
        let mut ledger = MessageLedger::new();
        ledger.append(log("x"));
        ledger.clear();
        assert!(ledger.is_empty());
        assert_eq!(ledger.append(log("y")).seq, 0);
    }
}
