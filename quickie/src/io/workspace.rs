//! Disposable copies of the target project.
//!
//! Every invocation measures inside its own temporary copy so uncommitted work
//! in the caller's tree is never touched. The copy is owned by [`Workspace`];
//! dropping it removes the directory, so every early return cleans up. The
//! directory is registered for interrupt cleanup before anything is copied
//! into it.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;
use tracing::{debug, info, instrument};

use crate::error::{QuickieError, reason};
use crate::interrupt::{self, WorkspaceGuard};
use crate::io::git::Git;

const WORKSPACE_PREFIX: &str = "quickie-";

/// An ephemeral full copy of a project directory.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    // Dropped after `dir`, so the path stays registered until it is gone.
    _interrupt_guard: WorkspaceGuard,
}

impl Workspace {
    /// Copy `source` (including hidden files) into a fresh temporary directory.
    #[instrument(skip_all, fields(source = %source.display()))]
    pub fn isolate(source: &Path) -> Result<Self> {
        let isolation_error = |reason: String| QuickieError::Isolation {
            source_path: source.to_path_buf(),
            reason,
        };
        if !source.is_dir() {
            return Err(isolation_error("not a directory".to_string()).into());
        }
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir()
            .context("create temporary directory")
            .map_err(|err| isolation_error(reason(&err)))?;
        let workspace = Self {
            _interrupt_guard: interrupt::guard_workspace(dir.path()),
            dir,
        };
        copy_dir_recursive(source, workspace.path())
            .map_err(|err| isolation_error(reason(&err)))?;
        info!(workspace = %workspace.path().display(), "workspace isolated");
        Ok(workspace)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn git(&self) -> Git {
        Git::new(self.path())
    }

    /// Discard local modifications and untracked files.
    ///
    /// Fails with [`QuickieError::NotAVersionedRepository`] when the copy has
    /// no git metadata.
    pub fn reset_to_clean_state(&self) -> Result<()> {
        let git = self.git();
        if !git.is_repository() {
            return Err(QuickieError::NotAVersionedRepository(self.path().to_path_buf()).into());
        }
        git.reset_hard()?;
        git.clean_untracked()?;
        Ok(())
    }

    /// Switch to `branch`, overwriting local state and dropping untracked
    /// files left behind by the previous target.
    ///
    /// Failure is recoverable: the caller skips this branch.
    pub fn checkout_branch(&self, branch: &str) -> Result<()> {
        let git = self.git();
        git.checkout_force(branch)
            .with_context(|| format!("checkout branch {branch}"))?;
        git.clean_untracked()
            .with_context(|| format!("clean after checkout of {branch}"))?;
        Ok(())
    }

    /// Remove the directory now, reporting failures.
    ///
    /// Dropping the workspace also removes it, but silently.
    pub fn dispose(self) -> Result<()> {
        let path = self.path().to_path_buf();
        let Self {
            dir,
            _interrupt_guard,
        } = self;
        dir.close()
            .with_context(|| format!("remove workspace {}", path.display()))?;
        debug!(workspace = %path.display(), "workspace removed");
        Ok(())
    }
}

/// Recursively copy `src` into the existing directory `dst`.
///
/// Symlinks are recreated rather than followed.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    if !src.exists() {
        return Err(anyhow!("missing {}", src.display()));
    }
    fs::create_dir_all(dst).with_context(|| format!("create {}", dst.display()))?;
    for entry in fs::read_dir(src).with_context(|| format!("read {}", src.display()))? {
        let entry = entry.context("read entry")?;
        let path = entry.path();
        let target = dst.join(entry.file_name());
        let file_type = entry
            .file_type()
            .with_context(|| format!("stat {}", path.display()))?;
        if file_type.is_symlink() {
            copy_symlink(&path, &target)?;
        } else if file_type.is_dir() {
            copy_dir_recursive(&path, &target)?;
        } else {
            fs::copy(&path, &target).with_context(|| format!("copy {}", path.display()))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let link = fs::read_link(src).with_context(|| format!("read link {}", src.display()))?;
    std::os::unix::fs::symlink(&link, dst)
        .with_context(|| format!("create link {}", dst.display()))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    if src.is_dir() {
        copy_dir_recursive(src, dst)
    } else {
        fs::copy(src, dst)
            .map(|_| ())
            .with_context(|| format!("copy {}", src.display()))
    }
}
