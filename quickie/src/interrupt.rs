//! Workspace cleanup on SIGINT/SIGTERM.
//!
//! [`install`] starts a listener thread once per process. On an interrupt it
//! kills the process group of every command still running, removes every
//! workspace whose [`WorkspaceGuard`] is alive, and exits with
//! [`crate::exit_codes::INTERRUPTED`]. History is never written from the
//! signal path.
//!
//! Commands run in their own process group, so the terminal's Ctrl-C does not
//! reach them directly; [`ProcessGuard`] registers them here instead.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use tracing::debug;

static ACTIVE_WORKSPACES: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());
static ACTIVE_PROCESSES: Mutex<Vec<u32>> = Mutex::new(Vec::new());

/// Register the signal listener.
#[cfg(unix)]
pub fn install() -> Result<()> {
    use anyhow::Context;
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("register signal handlers")?;
    std::thread::Builder::new()
        .name("quickie-signals".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                debug!(signal, "interrupted");
                clean_up_after_interrupt();
                std::process::exit(crate::exit_codes::INTERRUPTED);
            }
        })
        .context("spawn signal listener")?;
    Ok(())
}

#[cfg(not(unix))]
pub fn install() -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn clean_up_after_interrupt() {
    use crate::console;
    use crate::io::process::kill_process_group;

    for pid in std::mem::take(&mut *lock(&ACTIVE_PROCESSES)) {
        if let Err(err) = kill_process_group(pid) {
            debug!(pid, %err, "process group already gone");
        }
    }
    for path in std::mem::take(&mut *lock(&ACTIVE_WORKSPACES)) {
        console::warning(format!("Interrupted, removing {}", path.display()));
        if let Err(err) = remove_workspace(&path) {
            console::error(format!(
                "Couldn't remove temp directory {}: {err}",
                path.display()
            ));
        }
    }
}

/// Remove a workspace directory; one that is already gone is not an error.
#[cfg(any(unix, test))]
fn remove_workspace(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Marks a workspace for removal on interrupt until dropped.
#[derive(Debug)]
#[must_use = "the workspace is only protected while the guard is alive"]
pub struct WorkspaceGuard {
    path: PathBuf,
}

pub fn guard_workspace(path: &Path) -> WorkspaceGuard {
    debug!(workspace = %path.display(), "guarding workspace");
    lock(&ACTIVE_WORKSPACES).push(path.to_path_buf());
    WorkspaceGuard {
        path: path.to_path_buf(),
    }
}

impl Drop for WorkspaceGuard {
    fn drop(&mut self) {
        lock(&ACTIVE_WORKSPACES).retain(|p| p != &self.path);
    }
}

/// Marks a running command's process group for killing on interrupt.
#[derive(Debug)]
#[must_use = "the command is only tracked while the guard is alive"]
pub struct ProcessGuard {
    pid: u32,
}

pub fn guard_process(pid: u32) -> ProcessGuard {
    lock(&ACTIVE_PROCESSES).push(pid);
    ProcessGuard { pid }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        lock(&ACTIVE_PROCESSES).retain(|p| *p != self.pid);
    }
}

/// Workspaces currently guarded.
pub fn active_workspaces() -> Vec<PathBuf> {
    lock(&ACTIVE_WORKSPACES).clone()
}

/// Command process groups currently tracked.
pub fn active_processes() -> Vec<u32> {
    lock(&ACTIVE_PROCESSES).clone()
}

fn lock<T>(registry: &'static Mutex<Vec<T>>) -> MutexGuard<'static, Vec<T>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_registers_and_clears_workspace() {
        let temp = tempfile::tempdir().expect("tempdir");
        {
            let _guard = guard_workspace(temp.path());
            assert!(active_workspaces().iter().any(|p| p == temp.path()));
        }
        assert!(!active_workspaces().iter().any(|p| p == temp.path()));
    }

    #[test]
    fn remove_workspace_reports_only_real_failures() {
        let temp = tempfile::tempdir().expect("tempdir");
        let workspace = temp.path().join("quickie-ws");
        std::fs::create_dir_all(workspace.join("nested")).expect("dirs");

        remove_workspace(&workspace).expect("remove");
        assert!(!workspace.exists());
        remove_workspace(&workspace).expect("already gone");

        let not_a_dir = temp.path().join("file");
        std::fs::write(&not_a_dir, "x").expect("write");
        assert!(remove_workspace(&not_a_dir).is_err());
    }

    #[test]
    fn guard_registers_and_clears_process() {
        let pid = u32::MAX - 7;
        {
            let _guard = guard_process(pid);
            assert!(active_processes().contains(&pid));
        }
        assert!(!active_processes().contains(&pid));
    }
}
