//! Deterministic classification of frame payloads.
//!
//! Every accessor is defensive: a missing or mistyped field reads as absent.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::core::types::FrameKind;

/// Message carried by the runner's final `runApis` frame.
pub const RUN_COMPLETED_MESSAGE: &str = "APIs run completed";

static RUNNING_ITERATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Running iteration:\s*(\d+)\s*$").expect("valid regex"));
static ITERATION_COMPLETED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^APIs iteration\s+(\d+)\s+completed\s*$").expect("valid regex")
});
static LIFECYCLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(Running request|Request completed|Running test script|Test script completed):\s*(.+?)\s*$",
    )
    .expect("valid regex")
});

/// Options that tune which payload fields the reducer reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReduceOptions {
    /// Literal placeholder responses that carry no outcome.
    pub placeholders: Vec<String>,
    /// Payload fields searched, in order, for the frame's text.
    pub text_fields: Vec<String>,
}

impl Default for ReduceOptions {
    fn default() -> Self {
        Self {
            placeholders: vec!["Processing...".to_string(), "Processing…".to_string()],
            text_fields: ["item", "message", "text", "log"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// A lifecycle line that reveals a piece before its outcome arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    RunningRequest(String),
    RequestCompleted(String),
    RunningTest(String),
    TestCompleted(String),
}

/// Which sub-state a structured record addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    /// Raw response body; informational.
    Resp,
    Request,
    /// `type == "script"` with `listen == "test"`.
    TestScript,
}

/// A structured `{ name, type, ... }` record found in a payload.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    pub name: &'a str,
    pub record_type: RecordType,
    pub fields: &'a Map<String, Value>,
}

/// The frame's text: a string payload, or the first string among `text_fields`.
pub fn text_of<'a>(payload: &'a Value, text_fields: &[String]) -> Option<&'a str> {
    if let Value::String(text) = payload {
        return Some(text.as_str());
    }
    let map = payload.as_object()?;
    text_fields
        .iter()
        .find_map(|field| map.get(field).and_then(Value::as_str))
}

/// New iteration index signalled by a numeric `iteration` field or by a
/// `Running iteration: N` line.
pub fn iteration_signal(payload: &Value, text: Option<&str>) -> Option<u32> {
    if let Some(index) = payload
        .get("iteration")
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
    {
        return Some(index);
    }
    let caps = RUNNING_ITERATION_RE.captures(text?.trim())?;
    caps[1].parse().ok()
}

/// Transport noise: placeholders and iteration lifecycle markers.
pub fn is_ignored(payload: &Value, text: Option<&str>, options: &ReduceOptions) -> bool {
    let is_placeholder =
        |value: &str| options.placeholders.iter().any(|p| p.as_str() == value.trim());

    if let Some(Value::String(response)) = payload.get("response")
        && is_placeholder(response.as_str())
    {
        return true;
    }
    let Some(text) = text else {
        return false;
    };
    let text = text.trim();
    is_placeholder(text)
        || RUNNING_ITERATION_RE.is_match(text)
        || ITERATION_COMPLETED_RE.is_match(text)
}

pub fn parse_lifecycle(text: &str) -> Option<Lifecycle> {
    let caps = LIFECYCLE_RE.captures(text.trim())?;
    let name = caps[2].to_string();
    match &caps[1] {
        "Running request" => Some(Lifecycle::RunningRequest(name)),
        "Request completed" => Some(Lifecycle::RequestCompleted(name)),
        "Running test script" => Some(Lifecycle::RunningTest(name)),
        "Test script completed" => Some(Lifecycle::TestCompleted(name)),
        _ => None,
    }
}

/// Interpret a `{ name, type, listen }` object.
pub fn record(fields: &Map<String, Value>) -> Option<Record<'_>> {
    let name = non_empty_name(fields)?;
    let record_type = match fields.get("type").and_then(Value::as_str)? {
        "resp" => RecordType::Resp,
        "request" => RecordType::Request,
        "script" if fields.get("listen").and_then(Value::as_str) == Some("test") => {
            RecordType::TestScript
        }
        _ => return None,
    };
    Some(Record {
        name,
        record_type,
        fields,
    })
}

/// Structured outcome record at `response` (or `data.response`).
pub fn structured_record(payload: &Value) -> Option<Record<'_>> {
    let fields = payload
        .get("response")
        .and_then(Value::as_object)
        .or_else(|| {
            payload
                .get("data")
                .and_then(|d| d.get("response"))
                .and_then(Value::as_object)
        })?;
    record(fields)
}

/// Body attached by a `resp` record: `body`, `response`, `data`, else the record.
pub fn response_body(fields: &Map<String, Value>) -> Value {
    ["body", "response", "data"]
        .iter()
        .find_map(|key| fields.get(*key).filter(|v| !v.is_null()))
        .cloned()
        .unwrap_or_else(|| Value::Object(fields.clone()))
}

/// Recover the named response object carried by an error payload.
///
/// Looks at `response`, `raw.response`, `raw`, `error.response` and
/// `data.response`. A string `raw` is parsed as JSON first.
pub fn error_response(payload: &Value) -> Option<Map<String, Value>> {
    let raw_parsed = match payload.get("raw") {
        Some(Value::String(text)) => serde_json::from_str::<Value>(text).ok(),
        Some(other) => Some(other.clone()),
        None => None,
    };

    let candidates = [
        payload.get("response"),
        raw_parsed.as_ref().and_then(|raw| raw.get("response")),
        raw_parsed.as_ref(),
        payload.get("error").and_then(|e| e.get("response")),
        payload.get("data").and_then(|d| d.get("response")),
    ];

    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
        .find(|fields| non_empty_name(fields).is_some())
        .cloned()
}

/// Top-level error text: `message`, else a string `error`, else `description`.
/// `message` and `description` are joined when both exist.
pub fn error_message(payload: &Value) -> Option<String> {
    let message = payload.get("message").and_then(Value::as_str);
    let description = payload.get("description").and_then(Value::as_str);
    match (message, description) {
        (Some(m), Some(d)) if m != d => Some(format!("{m}: {d}")),
        (Some(m), _) => Some(m.to_string()),
        (None, _) => payload
            .get("error")
            .and_then(Value::as_str)
            .or(description)
            .map(str::to_string),
    }
}

/// Whether a frame marks the end of the run.
pub fn is_run_completed(kind: FrameKind, payload: &Value, text: Option<&str>) -> bool {
    if kind == FrameKind::Done {
        return true;
    }
    payload.get("routeKey").and_then(Value::as_str) == Some("runApis")
        && text.map(str::trim) == Some(RUN_COMPLETED_MESSAGE)
}

/// Final result records at `summary.summary.results`, `summary.results` or `results`.
pub fn summary_results(payload: &Value) -> Option<&Vec<Value>> {
    let summary = payload.get("summary");
    summary
        .and_then(|s| s.get("summary"))
        .and_then(|s| s.get("results"))
        .and_then(Value::as_array)
        .or_else(|| {
            summary
                .and_then(|s| s.get("results"))
                .and_then(Value::as_array)
        })
        .or_else(|| payload.get("results").and_then(Value::as_array))
}

/// HTTP status when the value is a number that fits a status code.
pub fn numeric_status(value: Option<&Value>) -> Option<u16> {
    value
        .and_then(Value::as_u64)
        .and_then(|n| u16::try_from(n).ok())
}

fn non_empty_name(fields: &Map<String, Value>) -> Option<&str> {
    fields
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
}
