//! Deterministic logic with no I/O.
//!
//! Core modules operate on in-memory values only; anything that touches the
//! filesystem, git, or child processes belongs in [`crate::io`].

pub mod history;
pub mod timer;
pub mod types;
