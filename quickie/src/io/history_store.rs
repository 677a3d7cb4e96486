//! Load and persist `data.json`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info};

use crate::core::history::{HistoryRecord, StoredHistory};
use crate::error::{QuickieError, reason};

pub const HISTORY_FILE_NAME: &str = "data.json";

/// Read and parse the history file.
///
/// A missing, unreadable, or malformed file is the fatal
/// [`QuickieError::HistoryUnreadable`]. Legacy branched files are converted
/// to the flat shape in memory; the next [`persist_history`] writes them back
/// flat.
pub fn load_history(path: &Path) -> Result<HistoryRecord> {
    debug!(path = %path.display(), "loading history");
    let stored = read_stored(path).map_err(|err| QuickieError::HistoryUnreadable {
        path: path.to_path_buf(),
        reason: reason(&err),
    })?;
    if stored.is_legacy() {
        info!(path = %path.display(), "migrating branched history to flat shape");
    }
    let record = stored.into_flat();
    debug!(commands = record.run_data.len(), "history loaded");
    Ok(record)
}

fn read_stored(path: &Path) -> Result<StoredHistory> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let value: Value =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    StoredHistory::from_value(value)
}

/// Atomically overwrite the history file (temp file + rename).
///
/// On failure the previous file is left as it was. Concurrent invocations
/// against the same file are not coordinated: the last rename wins.
pub fn persist_history(path: &Path, record: &HistoryRecord) -> Result<()> {
    debug!(path = %path.display(), commands = record.run_data.len(), "writing history");
    write_atomic(path, record).map_err(|err| {
        QuickieError::HistoryWrite {
            path: path.to_path_buf(),
            reason: reason(&err),
        }
        .into()
    })
}

fn write_atomic(path: &Path, record: &HistoryRecord) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(record).context("serialize history")?;
    buf.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp history {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace history {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::core::types::{CommandResult, RepoContext};

    fn sample_result(command: &str) -> CommandResult {
        CommandResult {
            command: command.to_string(),
            started_at: Utc.timestamp_opt(1_600_000_000, 250_000_000).unwrap(),
            duration_secs: 0.125,
            context: RepoContext::default(),
            succeeded: true,
        }
    }

    #[test]
    fn persist_then_load_preserves_record() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(HISTORY_FILE_NAME);
        let mut record = HistoryRecord::default();
        record.merge("/repo", &[sample_result("make")], Utc::now());

        persist_history(&path, &record).expect("persist");
        let loaded = load_history(&path).expect("load");
        assert_eq!(loaded, record);
        assert!(!temp.path().join("data.json.tmp").exists());
    }

    #[test]
    fn reads_files_written_by_older_versions() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(HISTORY_FILE_NAME);
        fs::write(
            &path,
            r#"{"repository": "/repo", "first_run": 1453412345.25, "last_run": 1453412399.5,
                "run_data": {"make test": [[1453412345.25, 2.75, {}],
                                           [1453412399.5, 3.1, {"branch": "main", "commit": "abc"}]]}}"#,
        )
        .expect("write");

        let record = load_history(&path).expect("load");
        let entries = record.entries("make test");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].started_at, 1453412345.25);
        assert_eq!(entries[0].duration_secs, 2.75);
        assert_eq!(entries[0].succeeded, None);
        assert_eq!(entries[1].context.commit.as_deref(), Some("abc"));
    }

    #[test]
    fn missing_file_is_unreadable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = load_history(&temp.path().join(HISTORY_FILE_NAME)).expect_err("missing");
        assert!(matches!(
            err.downcast_ref::<QuickieError>(),
            Some(QuickieError::HistoryUnreadable { .. })
        ));
    }

    #[test]
    fn malformed_file_is_unreadable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(HISTORY_FILE_NAME);
        fs::write(&path, "{\"run_data\": {\"x\": [\"oops\"]}}").expect("write");
        let err = load_history(&path).expect_err("malformed");
        assert!(matches!(
            err.downcast_ref::<QuickieError>(),
            Some(QuickieError::HistoryUnreadable { .. })
        ));
    }

    #[test]
    fn write_into_missing_directory_fails_without_side_effects() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("absent").join(HISTORY_FILE_NAME);
        let err = persist_history(&path, &HistoryRecord::default()).expect_err("write");
        assert!(matches!(
            err.downcast_ref::<QuickieError>(),
            Some(QuickieError::HistoryWrite { .. })
        ));
        assert!(!path.exists());
    }
}
