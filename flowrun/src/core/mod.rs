//! Deterministic, pure logic for reducing flow-run frames.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod aggregate;
pub mod classifier;
pub mod ledger;
pub mod merge;
pub mod reducer;
pub mod types;
