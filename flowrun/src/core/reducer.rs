//! Pure fold from a chronological frame sequence to an [`ExecutionView`].
//!
//! The view is always recomputed from the full history: [`reduce`] keeps no
//! state between calls, so reducing the same frames twice yields the same
//! view.
//!
//! Raw (unparseable) frames are skipped. Per frame, in order:
//! 1. iteration signals move the current bucket;
//! 2. placeholders and iteration markers stop further processing;
//! 3. lifecycle lines register pending sub-states;
//! 4. structured `resp` / `request` / test `script` records merge outcomes;
//! 5. error frames force-fail the named request;
//! 6. the final summary backfills outcomes, creating overflow pieces.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};
use tracing::trace;

use crate::core::aggregate::{overall_status, progress_pct};
use crate::core::classifier::{self, Lifecycle, Record, RecordType, ReduceOptions};
use crate::core::merge::{merge_detail_keys, merge_success};
use crate::core::types::{
    ApiPiece, ExecutionView, Frame, FrameKind, IterationView, Outcome, RequestState, TestState,
};

/// Key under which an error frame's message is stored in request detail.
pub const ERROR_DETAIL_KEY: &str = "_error";

/// Reduce frames (already in ascending receipt order) into a view.
pub fn reduce(frames: &[Frame], options: &ReduceOptions) -> ExecutionView {
    let mut fold = Fold::new(options);
    for frame in frames {
        fold.apply(frame);
    }
    fold.finish()
}

#[derive(Debug)]
struct TrackedPiece {
    piece: ApiPiece,
    /// First seen in the final summary; sorts after naturally discovered pieces.
    overflow: bool,
}

#[derive(Debug, Default)]
struct Bucket {
    pieces: Vec<TrackedPiece>,
    by_name: HashMap<String, usize>,
    /// Opened by an explicit iteration signal.
    signaled: bool,
}

impl Bucket {
    fn ensure(&mut self, name: &str, overflow: bool) -> &mut ApiPiece {
        let idx = match self.by_name.get(name) {
            Some(idx) => *idx,
            None => {
                self.pieces.push(TrackedPiece {
                    piece: ApiPiece::new(name),
                    overflow,
                });
                let idx = self.pieces.len() - 1;
                self.by_name.insert(name.to_string(), idx);
                idx
            }
        };
        &mut self.pieces[idx].piece
    }

    fn into_view(self, index: u32) -> Option<IterationView> {
        let (natural, overflow): (Vec<_>, Vec<_>) =
            self.pieces.into_iter().partition(|tracked| !tracked.overflow);
        let pieces: Vec<ApiPiece> = natural
            .into_iter()
            .chain(overflow)
            .map(|tracked| tracked.piece)
            .filter(ApiPiece::is_registered)
            .collect();
        if pieces.is_empty() && !self.signaled {
            return None;
        }
        Some(IterationView {
            index,
            progress_pct: progress_pct(&pieces),
            pieces,
        })
    }
}

struct Fold<'a> {
    options: &'a ReduceOptions,
    current: u32,
    buckets: BTreeMap<u32, Bucket>,
}

impl<'a> Fold<'a> {
    fn new(options: &'a ReduceOptions) -> Self {
        Self {
            options,
            current: 0,
            buckets: BTreeMap::new(),
        }
    }

    fn apply(&mut self, frame: &Frame) {
        if frame.kind == FrameKind::Raw {
            trace!(seq = frame.seq, "raw frame kept for audit only");
            return;
        }
        let payload = &frame.payload;
        let text = classifier::text_of(payload, &self.options.text_fields);

        if let Some(index) = classifier::iteration_signal(payload, text) {
            self.current = index;
            self.buckets.entry(index).or_default().signaled = true;
        }

        if classifier::is_ignored(payload, text, self.options) {
            trace!(seq = frame.seq, "frame ignored");
            return;
        }

        if let Some(event) = text.and_then(classifier::parse_lifecycle) {
            self.apply_lifecycle(event);
        }

        if let Some(record) = classifier::structured_record(payload) {
            self.apply_record(record, payload.as_object());
        }

        if frame.kind == FrameKind::Error {
            self.apply_error(payload);
        }

        if classifier::is_run_completed(frame.kind, payload, text) {
            self.apply_summary(payload);
        }
    }

    fn piece(&mut self, index: u32, name: &str, overflow: bool) -> &mut ApiPiece {
        self.buckets.entry(index).or_default().ensure(name, overflow)
    }

    fn apply_lifecycle(&mut self, event: Lifecycle) {
        let current = self.current;
        match event {
            Lifecycle::RunningRequest(name) | Lifecycle::RequestCompleted(name) => {
                self.piece(current, &name, false)
                    .request
                    .get_or_insert_with(RequestState::default);
            }
            Lifecycle::RunningTest(name) | Lifecycle::TestCompleted(name) => {
                self.piece(current, &name, false)
                    .test
                    .get_or_insert_with(TestState::default);
            }
        }
    }

    fn apply_record(&mut self, record: Record<'_>, payload: Option<&Map<String, Value>>) {
        let current = self.current;
        let fields = record.fields;
        let piece = self.piece(current, record.name, false);
        match record.record_type {
            RecordType::Resp => {
                piece.response = Some(classifier::response_body(fields));
                if let Some(request) = piece.request.as_mut() {
                    merge_request_success(request, fields.get("success"));
                }
            }
            RecordType::Request => {
                let request = piece.request.get_or_insert_with(RequestState::default);
                merge_request_success(request, fields.get("success"));
                if let Some(status) = classifier::numeric_status(fields.get("status")) {
                    request.status = Some(status);
                }
                merge_detail(&mut request.detail, fields, payload);
            }
            RecordType::TestScript => {
                let test = piece.test.get_or_insert_with(TestState::default);
                test.success = merge_success(test.success, fields.get("success"));
                merge_detail(&mut test.detail, fields, payload);
            }
        }
    }

    fn apply_error(&mut self, payload: &Value) {
        let Some(response) = classifier::error_response(payload) else {
            trace!("error frame without a recoverable response name");
            return;
        };
        let Some(name) = response.get("name").and_then(Value::as_str).map(str::trim) else {
            return;
        };
        let current = self.current;
        let piece = self.piece(current, name, false);
        let request = piece.request.get_or_insert_with(RequestState::default);
        request.success = Some(Outcome::Failure);
        request.errored = true;
        if let Some(status) = classifier::numeric_status(response.get("status")) {
            request.status = Some(status);
        }
        merge_detail(&mut request.detail, &response, payload.as_object());
        if let Some(message) = classifier::error_message(payload) {
            request
                .detail
                .insert(ERROR_DETAIL_KEY.to_string(), Value::String(message));
        }
    }

    fn apply_summary(&mut self, payload: &Value) {
        let Some(results) = classifier::summary_results(payload) else {
            return;
        };
        for result in results {
            let Some(record) = result.as_object().and_then(classifier::record) else {
                continue;
            };
            let index = result
                .get("iteration")
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(self.current);
            let fields = record.fields;
            match record.record_type {
                RecordType::Request => {
                    let request = self
                        .piece(index, record.name, true)
                        .request
                        .get_or_insert_with(RequestState::default);
                    merge_request_success(request, fields.get("success"));
                    if let Some(status) = classifier::numeric_status(fields.get("status")) {
                        request.status = Some(status);
                    }
                }
                RecordType::TestScript => {
                    let test = self
                        .piece(index, record.name, true)
                        .test
                        .get_or_insert_with(TestState::default);
                    test.success = merge_success(test.success, fields.get("success"));
                }
                RecordType::Resp => {}
            }
        }
    }

    fn finish(self) -> ExecutionView {
        let iterations: Vec<IterationView> = self
            .buckets
            .into_iter()
            .filter_map(|(index, bucket)| bucket.into_view(index))
            .collect();
        ExecutionView {
            overall_status: overall_status(&iterations),
            iterations,
        }
    }
}

/// Merge `request`, `response` and `env` from a record into `detail`.
///
/// `payload.response` is usually the record itself, so only `request` and
/// `env` fall back to payload-level values.
fn merge_detail(
    detail: &mut Map<String, Value>,
    fields: &Map<String, Value>,
    payload: Option<&Map<String, Value>>,
) {
    merge_detail_keys(detail, fields, payload, &["request", "env"]);
    merge_detail_keys(detail, fields, None, &["response"]);
}

/// Success merge for requests. A request force-failed by an error frame
/// stays failed.
fn merge_request_success(request: &mut RequestState, incoming: Option<&Value>) {
    if request.errored {
        return;
    }
    request.success = merge_success(request.success, incoming);
}
