//! CLI tests for the `quickie` binary.
//!
//! Spawns the binary and checks exit codes, persisted history, and that no
//! workspace copy outlives the process.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use quickie::core::history::HistoryRecord;
use quickie::exit_codes;
use quickie::io::config::{CONFIG_FILE_NAME, DEFAULT_DATA_DIR};
use quickie::io::history_store::HISTORY_FILE_NAME;

/// Run the binary with its temporary directory redirected to `tmp`.
fn quickie(args: &[&Path], tmp: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_quickie"))
        .args(args)
        .env("TMPDIR", tmp)
        .env_remove("RUST_LOG")
        .output()
        .expect("run quickie")
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path).expect("read tmp").next().is_none()
}

fn read_history(project: &Path) -> HistoryRecord {
    let path = project.join(DEFAULT_DATA_DIR).join(HISTORY_FILE_NAME);
    serde_json::from_str(&fs::read_to_string(path).expect("read history")).expect("parse")
}

#[test]
fn no_arguments_is_a_fatal_invocation() {
    let tmp = tempfile::tempdir().expect("tmp");
    let out = quickie(&[], tmp.path());
    assert_eq!(out.status.code(), Some(exit_codes::FATAL));
}

#[test]
fn help_exits_cleanly() {
    let out = Command::new(env!("CARGO_BIN_EXE_quickie"))
        .arg("--help")
        .output()
        .expect("run quickie");
    assert_eq!(out.status.code(), Some(exit_codes::OK));
    assert!(String::from_utf8_lossy(&out.stdout).contains("--config"));
}

#[test]
fn missing_directory_is_fatal() {
    let tmp = tempfile::tempdir().expect("tmp");
    let project = tempfile::tempdir().expect("project");
    let missing = project.path().join("absent");

    let out = quickie(&[&missing], tmp.path());

    assert_eq!(out.status.code(), Some(exit_codes::FATAL));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("FATAL ERROR"), "stderr: {stderr}");
    assert!(stderr.contains("doesn't exist"), "stderr: {stderr}");
}

#[test]
fn missing_config_is_fatal_and_creates_nothing() {
    let tmp = tempfile::tempdir().expect("tmp");
    let project = tempfile::tempdir().expect("project");

    let out = quickie(&[project.path()], tmp.path());

    assert_eq!(out.status.code(), Some(exit_codes::FATAL));
    assert!(!project.path().join(DEFAULT_DATA_DIR).exists());
    assert!(is_empty_dir(tmp.path()));
}

#[cfg(unix)]
#[test]
fn explicit_config_path_is_used() {
    let tmp = tempfile::tempdir().expect("tmp");
    let project = tempfile::tempdir().expect("project");
    let config_dir = tempfile::tempdir().expect("config dir");
    let config = config_dir.path().join("bench.yml");
    fs::write(&config, "quiet: true\ncommands:\n  run: [\"true\"]\n").expect("config");

    let out = quickie(&[project.path(), Path::new("--config"), &config], tmp.path());

    assert_eq!(out.status.code(), Some(exit_codes::OK));
    assert_eq!(read_history(project.path()).entries("true").len(), 1);
}

#[cfg(unix)]
#[test]
fn measures_run_command_and_removes_workspace() {
    let tmp = tempfile::tempdir().expect("tmp");
    let project = tempfile::tempdir().expect("project");
    fs::write(
        project.path().join(CONFIG_FILE_NAME),
        "quiet: true\ncommands:\n  build: [\"true\"]\n  run: [\"sleep 0.1\"]\n",
    )
    .expect("config");

    let out = quickie(&[project.path()], tmp.path());

    assert_eq!(
        out.status.code(),
        Some(exit_codes::OK),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    let record = read_history(project.path());
    let entries = record.entries("sleep 0.1");
    assert_eq!(entries.len(), 1);
    assert!(entries[0].duration_secs >= 0.1, "{entries:?}");
    assert!(entries[0].duration_secs < 5.0, "{entries:?}");
    assert_eq!(entries[0].succeeded, Some(true));
    for asset in ["index.html", "quickie.js", "quickie.css"] {
        assert!(project.path().join(DEFAULT_DATA_DIR).join(asset).is_file());
    }
    assert!(is_empty_dir(tmp.path()));
}

#[cfg(unix)]
#[test]
fn build_failure_still_exits_ok_without_results() {
    let tmp = tempfile::tempdir().expect("tmp");
    let project = tempfile::tempdir().expect("project");
    fs::write(
        project.path().join(CONFIG_FILE_NAME),
        "quiet: true\ncommands:\n  build: [\"false\"]\n  run: [\"true\"]\n",
    )
    .expect("config");

    let out = quickie(&[project.path()], tmp.path());

    assert_eq!(out.status.code(), Some(exit_codes::OK));
    let record = read_history(project.path());
    assert!(record.entries("true").is_empty());
    assert!(record.first_run.is_some());
    assert!(is_empty_dir(tmp.path()));
}

#[test]
fn branch_mode_on_plain_directory_is_fatal_and_cleans_up() {
    let tmp = tempfile::tempdir().expect("tmp");
    let project = tempfile::tempdir().expect("project");
    fs::write(
        project.path().join(CONFIG_FILE_NAME),
        "quiet: true\nbranches: [main]\ncommands:\n  run: [\"true\"]\n",
    )
    .expect("config");

    let out = quickie(&[project.path()], tmp.path());

    assert_eq!(out.status.code(), Some(exit_codes::FATAL));
    assert!(String::from_utf8_lossy(&out.stderr).contains("not a git repository"));
    assert!(read_history(project.path()).run_data.is_empty());
    assert!(is_empty_dir(tmp.path()));
}
