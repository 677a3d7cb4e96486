//! Invocation orchestration.
//!
//! One invocation walks these phases in order:
//!
//! ```text
//! Isolating -> ReadingContext -> (per target: Building -> Running) -> Persisting -> CleaningUp
//! ```
//!
//! A fatal error in any phase ends in `Aborted`.
//!
//! Build commands are fail-fast: the first failure ends the target's build and
//! its run phase is skipped. Run commands are fail-soft: every run command
//! produces a result whether or not it succeeded. A branch that cannot be
//! checked out is skipped with a warning. Only isolation, a non-git workspace
//! in branch mode, and history I/O abort the invocation, and the workspace is
//! removed on every path once it exists.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::console;
use crate::core::history::HistoryRecord;
use crate::core::timer::timed;
use crate::core::types::{
    CommandOutcome, CommandResult, RepoContext, Target, TargetOutcome, TargetReport,
};
use crate::error::QuickieError;
use crate::io::assets::prepare_data_dir;
use crate::io::config::{RunConfig, default_config_path, load_config};
use crate::io::history_store::{load_history, persist_history};
use crate::io::process::{CommandRunner, ShellRunner};
use crate::io::repo_context::read_repo_context;
use crate::io::workspace::Workspace;

/// Orchestrator phase, used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Isolating,
    ReadingContext,
    Building,
    Running,
    Persisting,
    CleaningUp,
    /// Terminal state after a fatal error.
    Aborted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Isolating => "isolating",
            Phase::ReadingContext => "reading_context",
            Phase::Building => "building",
            Phase::Running => "running",
            Phase::Persisting => "persisting",
            Phase::CleaningUp => "cleaning_up",
            Phase::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// What the CLI asked for.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Project directory to copy and measure.
    pub directory: PathBuf,
    /// Config file; defaults to `<directory>/.quickierc`.
    pub config: Option<PathBuf>,
}

/// Result of a completed invocation.
#[derive(Debug)]
pub struct InvocationSummary {
    pub repository: PathBuf,
    pub history_path: PathBuf,
    /// Where the workspace lived; removed by the time this is returned.
    pub workspace_path: PathBuf,
    pub targets: Vec<TargetReport>,
    pub record: HistoryRecord,
}

impl InvocationSummary {
    pub fn results(&self) -> impl Iterator<Item = &CommandResult> {
        self.targets.iter().flat_map(|t| t.outcome.results())
    }
}

/// Resolve the CLI arguments, load config, and run with the shell runner.
pub fn run_invocation(invocation: &Invocation) -> Result<InvocationSummary> {
    let repository = resolve_directory(&invocation.directory)?;
    let config_path = invocation
        .config
        .clone()
        .unwrap_or_else(|| default_config_path(&repository));
    let config = load_config(&config_path)?;
    let runner = ShellRunner::new(config.quiet, config.command_timeout());
    run_with(&repository, &config, &runner)
}

fn resolve_directory(directory: &Path) -> Result<PathBuf> {
    if !directory.is_dir() {
        return Err(QuickieError::TargetMissing(directory.to_path_buf()).into());
    }
    directory
        .canonicalize()
        .with_context(|| format!("resolve {}", directory.display()))
}

/// Run one full invocation against `repository` using `runner` for commands.
#[instrument(skip_all, fields(repository = %repository.display()))]
pub fn run_with<R: CommandRunner>(
    repository: &Path,
    config: &RunConfig,
    runner: &R,
) -> Result<InvocationSummary> {
    invoke(repository, config, runner).inspect_err(|err| {
        enter(Phase::Aborted);
        debug!(err = %format!("{err:#}"), "invocation aborted");
    })
}

fn invoke<R: CommandRunner>(
    repository: &Path,
    config: &RunConfig,
    runner: &R,
) -> Result<InvocationSummary> {
    let invoked_at = Utc::now();
    let history_path = prepare_data_dir(&config.data_path(repository))?;
    let mut record = load_history(&history_path)?;

    enter(Phase::Isolating);
    let workspace = Workspace::isolate(repository)?;
    let workspace_path = workspace.path().to_path_buf();

    // On error the workspace is dropped, which removes it.
    let targets = run_targets(&workspace, config, runner)?;

    enter(Phase::Persisting);
    let results: Vec<CommandResult> = targets
        .iter()
        .flat_map(|t| t.outcome.results().iter().cloned())
        .collect();
    record.merge(&repository.display().to_string(), &results, invoked_at);
    let persisted = persist_history(&history_path, &record);

    enter(Phase::CleaningUp);
    console::status("Removing temp directory...");
    if let Err(err) = workspace.dispose() {
        console::warning(format!("{err:#}"));
    }
    persisted?;

    info!(
        targets = targets.len(),
        results = results.len(),
        "invocation complete"
    );
    Ok(InvocationSummary {
        repository: repository.to_path_buf(),
        history_path,
        workspace_path,
        targets,
        record,
    })
}

/// Build and run every target inside `workspace`.
///
/// Targets are the configured branches, or the workspace as copied when none
/// are configured. Branch mode first resets the copy to its committed state;
/// a copy without git metadata is fatal there.
pub fn run_targets<R: CommandRunner>(
    workspace: &Workspace,
    config: &RunConfig,
    runner: &R,
) -> Result<Vec<TargetReport>> {
    let targets: Vec<Target> = if config.uses_branches() {
        workspace.reset_to_clean_state()?;
        config.branches.iter().cloned().map(Target::Branch).collect()
    } else {
        vec![Target::Current]
    };

    let reports = targets
        .into_iter()
        .map(|target| run_target(workspace, config, runner, target))
        .collect();
    Ok(reports)
}

#[instrument(skip_all, fields(target = target.label()))]
fn run_target<R: CommandRunner>(
    workspace: &Workspace,
    config: &RunConfig,
    runner: &R,
    target: Target,
) -> TargetReport {
    if let Target::Branch(branch) = &target {
        console::status(format!("Checking out {branch}..."));
        if let Err(err) = workspace.checkout_branch(branch) {
            let reason = format!("{err:#}");
            console::warning(format!("Couldn't check out {branch}, skipping: {reason}"));
            return TargetReport {
                target,
                build_secs: None,
                outcome: TargetOutcome::Skipped { reason },
            };
        }
    }

    enter(Phase::ReadingContext);
    let context = read_repo_context(workspace.path());

    enter(Phase::Building);
    console::status("Building...");
    let (failed_build, span) = timed(|| build(workspace.path(), &config.commands.build, runner));
    console::status(format!("Build complete ({:.3} s)", span.elapsed_seconds()));
    let build_secs = Some(span.elapsed_seconds());

    if let Some(command) = failed_build {
        console::warning("Build failed, skipping run");
        return TargetReport {
            target,
            build_secs,
            outcome: TargetOutcome::BuildFailed { command },
        };
    }

    enter(Phase::Running);
    console::status("Running...");
    let results = config
        .commands
        .run
        .iter()
        .map(|command| measure(workspace.path(), command, &context, runner))
        .collect();

    TargetReport {
        target,
        build_secs,
        outcome: TargetOutcome::Completed { results },
    }
}

/// Run build commands in order, stopping at the first failure.
///
/// Returns the failing command, if any.
fn build<R: CommandRunner>(workdir: &Path, commands: &[String], runner: &R) -> Option<String> {
    for command in commands {
        console::status(format!("\t{command}"));
        let outcome = execute(runner, command, workdir);
        if !outcome.succeeded {
            report_failure(&outcome);
            return Some(command.clone());
        }
    }
    None
}

/// Run and time one measured command. Always yields a result.
fn measure<R: CommandRunner>(
    workdir: &Path,
    command: &str,
    context: &RepoContext,
    runner: &R,
) -> CommandResult {
    console::status(format!("\t{command}"));
    let started_at = Utc::now();
    let (outcome, span) = timed(|| execute(runner, command, workdir));
    if !outcome.succeeded {
        report_failure(&outcome);
    }
    console::status(format!(
        "`{command}` completed in {:.3} seconds",
        span.elapsed_seconds()
    ));
    CommandResult {
        command: command.to_string(),
        started_at,
        duration_secs: span.elapsed_seconds(),
        context: context.clone(),
        succeeded: outcome.succeeded,
    }
}

/// A command that cannot even be spawned counts as a failed command.
fn execute<R: CommandRunner>(runner: &R, command: &str, workdir: &Path) -> CommandOutcome {
    match runner.execute(command, workdir) {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(command, err = %format!("{err:#}"), "command could not be executed");
            console::error(format!("Couldn't execute `{command}`: {err:#}"));
            CommandOutcome::failure(None)
        }
    }
}

fn report_failure(outcome: &CommandOutcome) {
    if outcome.timed_out {
        console::warning("Command timed out");
    } else {
        console::warning("Command failed");
    }
    if let Some(tail) = &outcome.stderr_tail {
        console::warning(tail);
    }
}

fn enter(phase: Phase) {
    debug!(%phase, "phase");
}
