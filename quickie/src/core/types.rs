//! Shared value types passed between the orchestrator and its collaborators.
//!
//! Everything here is plain data. Producing these values (spawning commands,
//! querying git) lives in [`crate::io`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source-control identifiers for the workspace at the time a command ran.
///
/// Both fields are best-effort: `None` means "could not be determined".
/// Serializes to `{}` when nothing is known.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

impl RepoContext {
    pub fn is_empty(&self) -> bool {
        self.branch.is_none() && self.commit.is_none()
    }
}

/// Result of running one shell command to completion.
///
/// A non-zero exit is an expected outcome and is reported here, not as an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    pub succeeded: bool,
    /// Exit code, when the process exited normally.
    pub exit_code: Option<i32>,
    /// The command was killed after exceeding `command_timeout_secs`.
    pub timed_out: bool,
    /// Last lines of stderr, only captured in quiet mode.
    pub stderr_tail: Option<String>,
}

impl CommandOutcome {
    pub fn success() -> Self {
        Self {
            succeeded: true,
            exit_code: Some(0),
            ..Self::default()
        }
    }

    pub fn failure(exit_code: Option<i32>) -> Self {
        Self {
            succeeded: false,
            exit_code,
            ..Self::default()
        }
    }
}

/// One measured execution of a run command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    pub command: String,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub context: RepoContext,
    pub succeeded: bool,
}

/// Unit of work for one build+run cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The workspace exactly as copied.
    Current,
    /// A configured branch, checked out before building.
    Branch(String),
}

impl Target {
    pub fn label(&self) -> &str {
        match self {
            Target::Current => "(current)",
            Target::Branch(name) => name,
        }
    }
}

/// How a target's build+run cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetOutcome {
    /// Build succeeded and every run command produced a result.
    Completed { results: Vec<CommandResult> },
    /// A build command failed; no run commands were executed.
    BuildFailed { command: String },
    /// The target could not be prepared (e.g. branch checkout failed).
    Skipped { reason: String },
}

impl TargetOutcome {
    pub fn results(&self) -> &[CommandResult] {
        match self {
            TargetOutcome::Completed { results } => results,
            TargetOutcome::BuildFailed { .. } | TargetOutcome::Skipped { .. } => &[],
        }
    }
}

/// Per-target record of an invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetReport {
    pub target: Target,
    /// Aggregate build-phase time; `None` when the build phase never started.
    pub build_secs: Option<f64>,
    pub outcome: TargetOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_context_serializes_to_empty_object() {
        let json = serde_json::to_string(&RepoContext::default()).expect("serialize");
        assert_eq!(json, "{}");
    }

    #[test]
    fn context_round_trips_partial_fields() {
        let ctx: RepoContext = serde_json::from_str(r#"{"branch":"main"}"#).expect("parse");
        assert_eq!(ctx.branch.as_deref(), Some("main"));
        assert!(ctx.commit.is_none());
        assert!(!ctx.is_empty());
    }

    #[test]
    fn only_completed_targets_expose_results() {
        let skipped = TargetOutcome::Skipped {
            reason: "no branch".to_string(),
        };
        assert!(skipped.results().is_empty());
        assert_eq!(Target::Branch("dev".to_string()).label(), "dev");
        assert_eq!(Target::Current.label(), "(current)");
    }
}
