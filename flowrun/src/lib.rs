//! Flow-run execution monitor.
//!
//! This crate reduces the interleaved WebSocket frames of concurrently running
//! API flows into a per-iteration, per-API model of which calls succeeded,
//! failed, were skipped or are still pending. The architecture enforces a
//! strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (ledger, classification, reducer,
//!   aggregates). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (config files, ledger captures).
//!
//! Orchestration modules ([`ingest`], [`monitor`], [`replay`], [`render`])
//! coordinate core logic with I/O for the CLI and the UI server.

pub mod core;
pub mod exit_codes;
pub mod ingest;
pub mod io;
pub mod logging;
pub mod monitor;
pub mod render;
pub mod replay;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
