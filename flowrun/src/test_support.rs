//! Test-only builders for runner frames.

use serde_json::{Value, json};

use crate::core::types::{Frame, FrameKind};

/// A log frame whose text is `item`.
pub fn log_item(text: &str) -> Value {
    json!({ "kind": "log", "payload": { "item": text } })
}

/// A structured `request` outcome.
pub fn request_outcome(name: &str, success: Value, status: Option<u16>) -> Value {
    let mut response = json!({ "name": name, "type": "request", "success": success });
    if let Some(status) = status {
        response["status"] = json!(status);
    }
    json!({ "kind": "log", "payload": { "response": response } })
}

/// A structured test-script outcome.
pub fn test_outcome(name: &str, success: Value) -> Value {
    json!({
        "kind": "log",
        "payload": { "response": { "name": name, "type": "script", "listen": "test", "success": success } }
    })
}

/// A `done` frame whose nested summary lists `results`.
pub fn done_with_results(results: Value) -> Value {
    json!({ "kind": "done", "payload": { "summary": { "summary": { "results": results } } } })
}

/// An error frame whose raw response names `name`.
pub fn error_for(name: &str, message: &str) -> Value {
    json!({
        "kind": "error",
        "payload": { "message": message, "raw": { "response": { "name": name, "type": "request" } } }
    })
}

/// Ledger frames with sequential receipt times, for reducer tests.
pub fn frames(items: Vec<(FrameKind, Value)>) -> Vec<Frame> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, (kind, payload))| Frame {
            seq: i as u64,
            received_at: i as i64,
            kind,
            payload,
        })
        .collect()
}
