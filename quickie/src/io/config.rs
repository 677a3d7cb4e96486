//! Run configuration loaded from `.quickierc` (YAML).
//!
//! ```yaml
//! data_dir: .quickiedata
//! quiet: false
//! branches: [main, next]
//! command_timeout_secs: 600
//! commands:
//!   build: ["make"]
//!   run: ["make test", "make bench"]
//! ```
//!
//! Command strings are executed by a shell verbatim, so this file must come
//! from a trusted local source.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::error::QuickieError;

pub const CONFIG_FILE_NAME: &str = ".quickierc";
pub const DEFAULT_DATA_DIR: &str = ".quickiedata";

/// Immutable per-invocation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunConfig {
    /// Where history and visualization assets live, relative to the target
    /// directory unless absolute.
    pub data_dir: PathBuf,

    /// Suppress child-process output on the console.
    pub quiet: bool,

    /// Branches to measure, in order. Empty means "measure the copy as-is".
    #[serde(deserialize_with = "null_as_empty")]
    pub branches: Vec<String>,

    /// Kill a command that runs longer than this. Unset waits indefinitely.
    pub command_timeout_secs: Option<u64>,

    pub commands: Commands,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Commands {
    /// Setup commands; all must succeed before anything is measured.
    #[serde(deserialize_with = "null_as_empty")]
    pub build: Vec<String>,
    /// Measured commands.
    #[serde(deserialize_with = "null_as_empty")]
    pub run: Vec<String>,
}

/// YAML writes an empty list as `key:` (null); treat that as empty.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            quiet: false,
            branches: Vec::new(),
            command_timeout_secs: None,
            commands: Commands::default(),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.data_dir.as_os_str().is_empty() {
            return Err("data_dir must not be empty".to_string());
        }
        if self.command_timeout_secs == Some(0) {
            return Err("command_timeout_secs must be > 0".to_string());
        }
        for (phase, commands) in [("build", &self.commands.build), ("run", &self.commands.run)] {
            if commands.iter().any(|cmd| cmd.trim().is_empty()) {
                return Err(format!("commands.{phase} contains an empty command"));
            }
        }
        if self.branches.iter().any(|branch| branch.trim().is_empty()) {
            return Err("branches contains an empty name".to_string());
        }
        Ok(())
    }

    /// Absolute location of the data directory for a target directory.
    pub fn data_path(&self, repo: &Path) -> PathBuf {
        repo.join(&self.data_dir)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }

    pub fn uses_branches(&self) -> bool {
        !self.branches.is_empty()
    }
}

/// Default config location for a target directory.
pub fn default_config_path(repo: &Path) -> PathBuf {
    repo.join(CONFIG_FILE_NAME)
}

/// Load and validate config from a YAML file.
///
/// A missing file is the fatal [`QuickieError::ConfigMissing`]; an empty file
/// yields the defaults.
pub fn load_config(path: &Path) -> Result<RunConfig> {
    if !path.is_file() {
        return Err(QuickieError::ConfigMissing(path.to_path_buf()).into());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg = parse_config(&contents).map_err(|reason| QuickieError::ConfigInvalid {
        path: path.to_path_buf(),
        reason,
    })?;
    debug!(
        path = %path.display(),
        build = cfg.commands.build.len(),
        run = cfg.commands.run.len(),
        branches = cfg.branches.len(),
        "config loaded"
    );
    Ok(cfg)
}

fn parse_config(contents: &str) -> std::result::Result<RunConfig, String> {
    let cfg: RunConfig = if contents.trim().is_empty() {
        RunConfig::default()
    } else {
        serde_yaml::from_str(contents).map_err(|err| err.to_string())?
    };
    cfg.validate()?;
    Ok(cfg)
}
