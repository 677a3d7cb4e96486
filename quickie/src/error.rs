//! Conditions that abort an invocation.
//!
//! These travel inside `anyhow::Error`; callers that need to tell them apart
//! use `downcast_ref::<QuickieError>()`. Recoverable outcomes (failed commands,
//! skipped branches, missing repository context) are never represented here.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuickieError {
    #[error("{} doesn't exist", .0.display())]
    TargetMissing(PathBuf),

    #[error("{} doesn't exist", .0.display())]
    ConfigMissing(PathBuf),

    #[error("invalid configuration {}: {reason}", path.display())]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("couldn't create data directory {}: {reason}", path.display())]
    DataDirectory { path: PathBuf, reason: String },

    #[error("couldn't isolate {}: {reason}", source_path.display())]
    Isolation { source_path: PathBuf, reason: String },

    #[error("{} is not a git repository", .0.display())]
    NotAVersionedRepository(PathBuf),

    #[error("couldn't open the data file {}: {reason}", path.display())]
    HistoryUnreadable { path: PathBuf, reason: String },

    #[error("couldn't write the data file {}: {reason}", path.display())]
    HistoryWrite { path: PathBuf, reason: String },
}

/// Render an error chain on one line, the way `{:#}` does for `anyhow`.
pub(crate) fn reason(err: &anyhow::Error) -> String {
    format!("{err:#}")
}
