//! Quick-and-dirty benchmarking of a project's build and run commands.
//!
//! Each invocation copies the target directory into a disposable workspace,
//! runs the configured build commands there, times each run command, and
//! appends the timings to a JSON history that a bundled static page charts.
//!
//! - **[`core`]**: Pure data: timing, result types, history merging.
//! - **[`io`]**: Side-effecting adapters (filesystem, git, child processes).
//!
//! [`run`] wires the two together for the `quickie` binary.

pub mod console;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod interrupt;
pub mod io;
pub mod logging;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
