//! Derived aggregates over reduced pieces.

use crate::core::types::{ApiPiece, IterationView, Outcome, OverallStatus, RunMetrics};

/// `round(100 * done / total)` over registered sub-states; 0 when none.
pub fn progress_pct(pieces: &[ApiPiece]) -> u8 {
    let (done, total) = pieces
        .iter()
        .flat_map(ApiPiece::registered_outcomes)
        .fold((0u64, 0u64), |(done, total), outcome| {
            (done + u64::from(outcome.is_some()), total + 1)
        });
    round_pct(done, total)
}

/// Classify a run from its iteration buckets.
///
/// - `Failed` if any request or test sub-state failed.
/// - `AllOk` if at least one piece exists and every registered sub-state
///   succeeded or was skipped.
/// - `Pending` otherwise.
pub fn overall_status(iterations: &[IterationView]) -> OverallStatus {
    let mut any_piece = false;
    let mut all_ok = true;
    for piece in iterations.iter().flat_map(|it| it.pieces.iter()) {
        any_piece = true;
        for outcome in piece.registered_outcomes() {
            match outcome {
                Some(Outcome::Failure) => return OverallStatus::Failed,
                Some(_) => {}
                None => all_ok = false,
            }
        }
    }
    if any_piece && all_ok {
        OverallStatus::AllOk
    } else {
        OverallStatus::Pending
    }
}

/// Pass/fail counters across every iteration.
pub fn run_metrics(iterations: &[IterationView]) -> RunMetrics {
    let mut metrics = RunMetrics::default();
    let outcomes = iterations
        .iter()
        .flat_map(|it| it.pieces.iter())
        .flat_map(ApiPiece::registered_outcomes);
    for outcome in outcomes {
        metrics.total += 1;
        match outcome {
            Some(Outcome::Success) => metrics.passed += 1,
            Some(Outcome::Failure) => metrics.failed += 1,
            Some(Outcome::Skipped) => metrics.skipped += 1,
            None => metrics.pending += 1,
        }
    }
    metrics.success_rate_pct = round_pct(
        u64::from(metrics.passed),
        u64::from(metrics.passed + metrics.failed),
    );
    metrics
}

fn round_pct(part: u64, whole: u64) -> u8 {
    if whole == 0 {
        return 0;
    }
    // Half rounds up, matching the dashboard's rounding.
    let pct = (200 * part + whole) / (2 * whole);
    u8::try_from(pct.min(100)).unwrap_or(100)
}
