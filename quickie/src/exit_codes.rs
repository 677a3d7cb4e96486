//! Stable exit codes for the `quickie` CLI.

/// Invocation finished; individual commands may still have failed.
pub const OK: i32 = 0;
/// Fatal condition: missing directory or config, unreadable or unwritable
/// history, workspace isolation failure, or a malformed invocation.
pub const FATAL: i32 = 1;
/// Interrupted by SIGINT/SIGTERM after the workspace was cleaned up.
pub const INTERRUPTED: i32 = 130;
