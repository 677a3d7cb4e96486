//! Fixtures shared by unit and integration tests.

use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::core::types::CommandOutcome;
use crate::io::config::CONFIG_FILE_NAME;
use crate::io::process::CommandRunner;

/// A throwaway git repository on branch `main` with one commit.
#[derive(Debug)]
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    /// Contents of the committed `README.md`.
    pub const README: &'static str = "quickie test repository\n";

    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create test repo dir")?;
        let repo = Self { dir };
        repo.git(&["init", "--quiet"])?;
        repo.git(&["symbolic-ref", "HEAD", "refs/heads/main"])?;
        repo.git(&["config", "user.name", "Quickie Test"])?;
        repo.git(&["config", "user.email", "quickie@example.com"])?;
        repo.git(&["config", "commit.gpgsign", "false"])?;
        repo.write_file("README.md", Self::README)?;
        repo.commit_all("initial commit")?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_file(&self, relative: &str, contents: &str) -> Result<()> {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    /// Write `.quickierc` at the repository root (left untracked).
    pub fn write_config(&self, yaml: &str) -> Result<()> {
        self.write_file(CONFIG_FILE_NAME, yaml)
    }

    pub fn commit_all(&self, message: &str) -> Result<()> {
        self.git(&["add", "--all"])?;
        self.git(&["commit", "--quiet", "-m", message])?;
        Ok(())
    }

    /// Create `name` from `main` with one extra committed file, then switch
    /// back to `main`.
    pub fn create_branch(&self, name: &str, file: &str, contents: &str) -> Result<()> {
        self.git(&["checkout", "--quiet", "-b", name])?;
        self.write_file(file, contents)?;
        self.git(&["add", file])?;
        self.git(&["commit", "--quiet", "-m", &format!("add {file}")])?;
        self.git(&["checkout", "--quiet", "main"])?;
        Ok(())
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !output.status.success() {
            return Err(anyhow!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// A [`CommandRunner`] that records commands instead of spawning them.
///
/// Every command succeeds unless listed in `failing` (non-zero exit) or
/// `erroring` (cannot be spawned).
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    failing: Vec<String>,
    erroring: Vec<String>,
    executed: RefCell<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, commands: &[&str]) -> Self {
        self.failing.extend(commands.iter().map(|c| c.to_string()));
        self
    }

    pub fn erroring(mut self, commands: &[&str]) -> Self {
        self.erroring.extend(commands.iter().map(|c| c.to_string()));
        self
    }

    /// Commands executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.borrow().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn execute(&self, command: &str, _workdir: &Path) -> Result<CommandOutcome> {
        self.executed.borrow_mut().push(command.to_string());
        if self.erroring.iter().any(|c| c == command) {
            return Err(anyhow!("cannot spawn `{command}`"));
        }
        if self.failing.iter().any(|c| c == command) {
            return Ok(CommandOutcome::failure(Some(1)));
        }
        Ok(CommandOutcome::success())
    }
}
