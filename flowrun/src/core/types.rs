//! Shared deterministic types for the flow-run core.
//!
//! These types define stable contracts between the ledger, the reducer and
//! the rendering layer. They do not depend on external state or I/O.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Transport-level classification assigned when a frame is ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    Log,
    Progress,
    Done,
    Error,
    /// Payload could not be parsed; the raw text is kept verbatim.
    Raw,
}

impl FrameKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FrameKind::Log => "log",
            FrameKind::Progress => "progress",
            FrameKind::Done => "done",
            FrameKind::Error => "error",
            FrameKind::Raw => "raw",
        }
    }

    /// Parse a kind name. `raw` is never accepted as a hint or envelope kind.
    pub fn parse_hint(value: &str) -> Option<Self> {
        match value {
            "log" => Some(FrameKind::Log),
            "progress" => Some(FrameKind::Progress),
            "done" => Some(FrameKind::Done),
            "error" => Some(FrameKind::Error),
            _ => None,
        }
    }
}

/// A frame that has been normalized but not yet appended to a ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingFrame {
    pub kind: FrameKind,
    pub payload: Value,
    /// Pre-assigned receipt time (epoch ms). `None` means "stamp on append".
    pub received_at: Option<i64>,
}

impl PendingFrame {
    pub fn new(kind: FrameKind, payload: Value) -> Self {
        Self {
            kind,
            payload,
            received_at: None,
        }
    }

    pub fn at(mut self, received_at: i64) -> Self {
        self.received_at = Some(received_at);
        self
    }
}

/// One inbound message as stored in a ledger. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    /// Append order within the ledger; tie-breaker for equal `received_at`.
    pub seq: u64,
    /// Receipt time in epoch milliseconds.
    pub received_at: i64,
    pub kind: FrameKind,
    pub payload: Value,
}

/// Interpretable outcome of a request or test-script phase.
///
/// Serialized the way the runner reports it: `true`, `false` or `"skipped"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    Failure,
    Skipped,
}

impl Outcome {
    /// Interpret a raw `success` value. Anything other than a JSON boolean or
    /// the string `"skipped"` is uninterpretable.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(true) => Some(Outcome::Success),
            Value::Bool(false) => Some(Outcome::Failure),
            Value::String(s) if s == "skipped" => Some(Outcome::Skipped),
            _ => None,
        }
    }

    /// Successful or skipped; neither counts against a run.
    pub fn is_ok(self) -> bool {
        matches!(self, Outcome::Success | Outcome::Skipped)
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Outcome::Success => serializer.serialize_bool(true),
            Outcome::Failure => serializer.serialize_bool(false),
            Outcome::Skipped => serializer.serialize_str("skipped"),
        }
    }
}

impl<'de> Deserialize<'de> for Outcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Outcome::from_value(&value)
            .ok_or_else(|| de::Error::custom(format!("invalid outcome {value}")))
    }
}

/// Request-phase sub-state of an API piece.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestState {
    pub success: Option<Outcome>,
    pub status: Option<u16>,
    pub detail: Map<String, Value>,
    /// Set once an error frame force-failed this sub-state.
    #[serde(default, skip_serializing_if = "is_false")]
    pub errored: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Test-script sub-state of an API piece.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestState {
    pub success: Option<Outcome>,
    pub detail: Map<String, Value>,
}

/// Outcome-tracking unit for one named API call within one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiPiece {
    pub name: String,
    pub request: Option<RequestState>,
    pub test: Option<TestState>,
    /// Body attached by `resp` frames. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl ApiPiece {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            request: None,
            test: None,
            response: None,
        }
    }

    /// A piece is visible once at least one sub-state is registered.
    pub fn is_registered(&self) -> bool {
        self.request.is_some() || self.test.is_some()
    }

    /// Outcomes of registered sub-states, request first.
    pub fn registered_outcomes(&self) -> impl Iterator<Item = Option<Outcome>> + '_ {
        self.request
            .iter()
            .map(|r| r.success)
            .chain(self.test.iter().map(|t| t.success))
    }

    pub fn has_failure(&self) -> bool {
        self.registered_outcomes()
            .any(|outcome| outcome == Some(Outcome::Failure))
    }
}

/// Pieces of one iteration bucket with derived progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationView {
    pub index: u32,
    pub pieces: Vec<ApiPiece>,
    pub progress_pct: u8,
}

/// Derived classification of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OverallStatus {
    Failed,
    AllOk,
    Pending,
}

impl OverallStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OverallStatus::Failed => "failed",
            OverallStatus::AllOk => "allOk",
            OverallStatus::Pending => "pending",
        }
    }
}

/// Per-run structured model produced by the reducer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionView {
    pub iterations: Vec<IterationView>,
    pub overall_status: OverallStatus,
}

impl ExecutionView {
    pub fn empty() -> Self {
        Self {
            iterations: Vec::new(),
            overall_status: OverallStatus::Pending,
        }
    }

    pub fn iteration(&self, index: u32) -> Option<&IterationView> {
        self.iterations.iter().find(|it| it.index == index)
    }

    /// Find a piece by iteration index and name.
    pub fn piece(&self, index: u32, name: &str) -> Option<&ApiPiece> {
        self.iteration(index)?
            .pieces
            .iter()
            .find(|piece| piece.name == name)
    }

    pub fn pieces(&self) -> impl Iterator<Item = &ApiPiece> {
        self.iterations.iter().flat_map(|it| it.pieces.iter())
    }
}

/// Pass/fail counters over every registered sub-state of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetrics {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub pending: u32,
    pub success_rate_pct: u8,
}
