//! Git adapter for workspace preparation and repository context.
//!
//! Quickie only ever touches git inside its own disposable workspace, so the
//! wrapper exposes the destructive operations (hard reset, clean, forced
//! checkout) without further guards.

use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// True if the working directory carries git metadata at its root.
    pub fn is_repository(&self) -> bool {
        self.workdir.join(".git").exists()
    }

    /// Current branch name (`HEAD` when detached).
    pub fn current_branch(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--verify", "--abbrev-ref", "HEAD"])?;
        Ok(out.trim().to_string())
    }

    /// Abbreviated HEAD commit id.
    pub fn head_short_sha(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--short", "--verify", "HEAD"])?;
        Ok(out.trim().to_string())
    }

    /// Discard tracked modifications.
    #[instrument(skip_all)]
    pub fn reset_hard(&self) -> Result<()> {
        debug!("resetting worktree");
        self.run_checked(&["reset", "--hard"])?;
        Ok(())
    }

    /// Remove untracked files and directories (ignored files are kept).
    #[instrument(skip_all)]
    pub fn clean_untracked(&self) -> Result<()> {
        debug!("removing untracked files");
        self.run_checked(&["clean", "-f", "-d"])?;
        Ok(())
    }

    /// Checkout an existing branch, overwriting local modifications.
    ///
    /// The trailing `--` keeps git from reading an unknown branch name as a
    /// path to restore.
    #[instrument(skip_all, fields(branch))]
    pub fn checkout_force(&self, branch: &str) -> Result<()> {
        debug!(branch, "force checkout");
        self.run_checked(&["checkout", "--force", branch, "--"])?;
        Ok(())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}
