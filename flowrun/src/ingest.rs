//! Normalization of raw WebSocket messages into ledger frames.
//!
//! Ingestion never fails: text that is not JSON is kept verbatim as a
//! [`FrameKind::Raw`] frame. The reducer skips raw frames; they only
//! complete the ledger's audit trail.

use serde_json::Value;
use tracing::trace;

use crate::core::classifier::{self, RUN_COMPLETED_MESSAGE, ReduceOptions};
use crate::core::types::{FrameKind, PendingFrame};

/// Normalize one raw message.
///
/// `kind_hint` (from the transport) wins over any kind found in the message.
pub fn normalize(raw: &str, kind_hint: Option<FrameKind>) -> PendingFrame {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => normalize_value(value, kind_hint),
        Err(err) => {
            trace!(error = %err, "frame is not json; storing raw");
            PendingFrame::new(FrameKind::Raw, Value::String(raw.to_string()))
        }
    }
}

/// Normalize an already-parsed message.
///
/// An envelope `{ "kind": ..., "payload": ..., "receivedAt": ... }` is
/// unwrapped; anything else is the payload itself and its kind is inferred.
pub fn normalize_value(value: Value, kind_hint: Option<FrameKind>) -> PendingFrame {
    let (envelope_kind, received_at, payload) = match unwrap_envelope(value) {
        Ok(envelope) => envelope,
        Err(value) => (None, None, value),
    };
    let kind = kind_hint
        .or(envelope_kind)
        .unwrap_or_else(|| infer_kind(&payload));
    PendingFrame {
        kind,
        payload,
        received_at,
    }
}

type Envelope = (Option<FrameKind>, Option<i64>, Value);

fn unwrap_envelope(value: Value) -> Result<Envelope, Value> {
    let is_envelope = value.get("payload").is_some()
        && value
            .get("kind")
            .and_then(Value::as_str)
            .and_then(FrameKind::parse_hint)
            .is_some();
    if !is_envelope {
        return Err(value);
    }
    let Value::Object(mut map) = value else {
        return Err(value);
    };
    let kind = map
        .get("kind")
        .and_then(Value::as_str)
        .and_then(FrameKind::parse_hint);
    let received_at = map.get("receivedAt").and_then(Value::as_i64);
    let payload = map.remove("payload").unwrap_or(Value::Null);
    Ok((kind, received_at, payload))
}

/// Coarse transport kind for a payload that arrived without one.
///
/// Text is read with the default text fields, in the reducer's order.
pub fn infer_kind(payload: &Value) -> FrameKind {
    if payload.get("error").is_some_and(carries_error)
        || payload.get("type").and_then(Value::as_str) == Some("error")
    {
        return FrameKind::Error;
    }
    let options = ReduceOptions::default();
    let text = classifier::text_of(payload, &options.text_fields);
    if payload.get("routeKey").and_then(Value::as_str) == Some("runApis")
        && text.map(str::trim) == Some(RUN_COMPLETED_MESSAGE)
    {
        return FrameKind::Done;
    }
    if classifier::iteration_signal(payload, text).is_some() {
        return FrameKind::Progress;
    }
    FrameKind::Log
}

/// `error: null`, `false`, `""` and `{}` are the runner's "no error".
fn carries_error(value: &Value) -> bool {
    match value {
        Value::String(text) => !text.trim().is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => false,
    }
}
