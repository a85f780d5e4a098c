//! Stable exit codes for flowrun CLI commands.

/// Command succeeded; for `flowrun status`, every API call passed or was skipped.
pub const OK: i32 = 0;
/// Command failed due to invalid input, config or other errors.
pub const INVALID: i32 = 1;
/// `flowrun status` found calls without an outcome yet.
pub const PENDING: i32 = 2;
/// `flowrun status` found a failed request or test.
pub const FAILED: i32 = 3;
