//! Persisted history shapes and the append-only merge.
//!
//! The canonical on-disk shape is flat: one ordered list of entries per
//! command string. Older files keyed durations by branch instead; those are
//! read through [`StoredHistory::Branched`] and converted with
//! [`StoredHistory::into_flat`].
//!
//! Each entry is persisted as a JSON array
//! `[started_at, duration_secs, context, succeeded]` because that is what the
//! bundled visualization indexes into. Entries written before the success flag
//! existed have three elements and load with `succeeded: None`.

use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::types::{CommandResult, RepoContext};

/// Seconds since the Unix epoch, the time unit used throughout `data.json`.
pub fn unix_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}

/// One persisted measurement of a run command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredEntry", into = "StoredEntry")]
pub struct RunEntry {
    pub started_at: f64,
    pub duration_secs: f64,
    pub context: RepoContext,
    /// `None` for entries recorded without an outcome marker.
    pub succeeded: Option<bool>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Full(f64, f64, RepoContext, Option<bool>),
    Legacy(f64, f64, RepoContext),
}

impl From<StoredEntry> for RunEntry {
    fn from(stored: StoredEntry) -> Self {
        match stored {
            StoredEntry::Full(started_at, duration_secs, context, succeeded) => Self {
                started_at,
                duration_secs,
                context,
                succeeded,
            },
            StoredEntry::Legacy(started_at, duration_secs, context) => Self {
                started_at,
                duration_secs,
                context,
                succeeded: None,
            },
        }
    }
}

impl From<RunEntry> for StoredEntry {
    fn from(entry: RunEntry) -> Self {
        StoredEntry::Full(
            entry.started_at,
            entry.duration_secs,
            entry.context,
            entry.succeeded,
        )
    }
}

impl From<&CommandResult> for RunEntry {
    fn from(result: &CommandResult) -> Self {
        Self {
            started_at: unix_seconds(result.started_at),
            duration_secs: result.duration_secs,
            context: result.context.clone(),
            succeeded: Some(result.succeeded),
        }
    }
}

/// Canonical (flat) history record.
///
/// `run_data` only ever grows: merges append to the end of a command's list
/// and never touch existing entries. Unknown top-level keys are preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_run: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<f64>,
    #[serde(default)]
    pub run_data: BTreeMap<String, Vec<RunEntry>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HistoryRecord {
    /// Fold one invocation's results into the record.
    ///
    /// `first_run` is set only if it was never set; `last_run` moves to
    /// `invoked_at` unless that would move it backwards.
    pub fn merge(
        &mut self,
        repository: &str,
        results: &[CommandResult],
        invoked_at: DateTime<Utc>,
    ) {
        let now = unix_seconds(invoked_at);
        self.repository = Some(repository.to_string());
        if self.first_run.is_none() {
            self.first_run = Some(now);
        }
        self.last_run = Some(match self.last_run {
            Some(previous) if previous > now => previous,
            _ => now,
        });
        for result in results {
            self.run_data
                .entry(result.command.clone())
                .or_default()
                .push(RunEntry::from(result));
        }
    }

    pub fn entries(&self, command: &str) -> &[RunEntry] {
        self.run_data.get(command).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Legacy record keyed by branch, holding bare durations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BranchedHistory {
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub first_run: Option<f64>,
    #[serde(default)]
    pub last_run: Option<f64>,
    #[serde(default)]
    pub branches: BTreeMap<String, BTreeMap<String, Vec<f64>>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Either supported on-disk shape.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredHistory {
    Flat(HistoryRecord),
    Branched(BranchedHistory),
}

impl StoredHistory {
    /// Classify and parse a `data.json` document.
    ///
    /// A document is branched when it carries `branches` but no `run_data`.
    pub fn from_value(value: Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| anyhow!("expected a JSON object at the top level"))?;
        if object.contains_key("branches") && !object.contains_key("run_data") {
            let branched = serde_json::from_value(value).context("parse branched history")?;
            return Ok(StoredHistory::Branched(branched));
        }
        let flat = serde_json::from_value(value).context("parse history")?;
        Ok(StoredHistory::Flat(flat))
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, StoredHistory::Branched(_))
    }

    /// Convert to the canonical shape.
    ///
    /// Branched durations have no timestamp of their own, so they are stamped
    /// with the record's `last_run` (falling back to `first_run`, then 0) and
    /// tagged with their branch. Order within each command is preserved;
    /// branches are visited in name order.
    pub fn into_flat(self) -> HistoryRecord {
        match self {
            StoredHistory::Flat(record) => record,
            StoredHistory::Branched(branched) => {
                let stamp = branched.last_run.or(branched.first_run).unwrap_or(0.0);
                let mut run_data: BTreeMap<String, Vec<RunEntry>> = BTreeMap::new();
                for (branch, commands) in branched.branches {
                    for (command, durations) in commands {
                        let entries = run_data.entry(command).or_default();
                        entries.extend(durations.into_iter().map(|duration_secs| RunEntry {
                            started_at: stamp,
                            duration_secs,
                            context: RepoContext {
                                branch: Some(branch.clone()),
                                commit: None,
                            },
                            succeeded: None,
                        }));
                    }
                }
                HistoryRecord {
                    repository: branched.repository,
                    first_run: branched.first_run,
                    last_run: branched.last_run,
                    run_data,
                    extra: branched.extra,
                }
            }
        }
    }
}
