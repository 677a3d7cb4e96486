//! Shell command execution for build and run phases.
//!
//! Commands are opaque command lines handed to `sh -c` (`cmd /C` on Windows)
//! and run to completion in the workspace directory. A non-zero exit is a
//! normal [`CommandOutcome`], not an error; only failing to spawn or wait on
//! the child is reported as `Err`.
//!
//! On Unix each command runs as the leader of its own process group, so a
//! timeout or an interrupt kills everything the shell started, not just the
//! shell.

use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::types::CommandOutcome;
use crate::interrupt;

/// Bytes of stderr kept in memory in quiet mode; stdout is discarded.
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 64 * 1024;
/// Lines of stderr surfaced when a quiet command fails.
const STDERR_TAIL_LINES: usize = 20;

/// Executes one command line to completion.
///
/// The orchestrator only talks to this trait, so tests can script outcomes
/// without spawning processes.
pub trait CommandRunner {
    fn execute(&self, command: &str, workdir: &Path) -> Result<CommandOutcome>;
}

/// Runs commands through the platform shell.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    /// Capture child output instead of streaming it to the console.
    pub quiet: bool,
    /// Kill commands that exceed this; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub output_limit_bytes: usize,
}

impl ShellRunner {
    pub fn new(quiet: bool, timeout: Option<Duration>) -> Self {
        Self {
            quiet,
            timeout,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }
}

impl CommandRunner for ShellRunner {
    #[instrument(skip_all, fields(command = %command, quiet = self.quiet))]
    fn execute(&self, command: &str, workdir: &Path) -> Result<CommandOutcome> {
        let mut cmd = shell_command(command);
        cmd.current_dir(workdir).stdin(Stdio::null());
        own_process_group(&mut cmd);
        if self.quiet {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        debug!("spawning shell");
        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawn shell for `{command}`"))?;
        let _process_guard = interrupt::guard_process(child.id());

        // Drain pipes concurrently so a chatty child never blocks on a full pipe.
        let readers = if self.quiet {
            Some(spawn_readers(&mut child, self.output_limit_bytes)?)
        } else {
            None
        };

        let (status, timed_out) = wait(&mut child, self.timeout)?;

        let stderr_tail = match readers {
            Some((stdout, stderr)) => {
                join_output(stdout).context("join stdout")?;
                let stderr = join_output(stderr).context("join stderr")?;
                if status.success() {
                    None
                } else {
                    Some(tail_lines(&String::from_utf8_lossy(&stderr), STDERR_TAIL_LINES))
                }
            }
            None => None,
        };

        debug!(exit_code = ?status.code(), timed_out, "command finished");
        Ok(CommandOutcome {
            succeeded: status.success() && !timed_out,
            exit_code: status.code(),
            timed_out,
            stderr_tail: stderr_tail.filter(|tail| !tail.is_empty()),
        })
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(unix)]
fn own_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_cmd: &mut Command) {}

/// Send SIGKILL to the process group led by `pgid`.
#[cfg(unix)]
#[allow(unsafe_code)]
pub fn kill_process_group(pgid: u32) -> io::Result<()> {
    let pgid = libc::pid_t::try_from(pgid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "process id out of range"))?;
    // SAFETY: killpg only takes integers and touches no memory of ours.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Kill the command and, on Unix, everything it spawned.
fn kill_command(child: &mut Child) -> Result<()> {
    #[cfg(unix)]
    kill_process_group(child.id()).context("kill command process group")?;
    #[cfg(not(unix))]
    child.kill().context("kill command")?;
    Ok(())
}

fn wait(child: &mut Child, timeout: Option<Duration>) -> Result<(ExitStatus, bool)> {
    let Some(timeout) = timeout else {
        let status = child.wait().context("wait for command")?;
        return Ok((status, false));
    };
    match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => Ok((status, false)),
        None => {
            warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
            kill_command(child)?;
            let status = child.wait().context("wait command after kill")?;
            Ok((status, true))
        }
    }
}

type Drain = thread::JoinHandle<Result<()>>;
type Capture = thread::JoinHandle<Result<Vec<u8>>>;

/// Discard stdout and keep the bounded tail of stderr.
fn spawn_readers(child: &mut Child, limit: usize) -> Result<(Drain, Capture)> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stdout_handle = thread::spawn(move || {
        let mut stdout = stdout;
        io::copy(&mut stdout, &mut io::sink()).context("drain stdout")?;
        Ok(())
    });
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, limit));
    Ok((stdout_handle, stderr_handle))
}

fn join_output<T>(handle: thread::JoinHandle<Result<T>>) -> Result<T> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

/// Keep the last `limit` bytes of a stream, draining the rest.
fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > limit {
            let excess = buf.len() - limit;
            buf.drain(..excess);
        }
    }

    Ok(buf)
}

fn tail_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn quiet() -> ShellRunner {
        ShellRunner::new(true, None)
    }

    #[test]
    fn zero_exit_succeeds() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome = quiet().execute("true", temp.path()).expect("execute");
        assert!(outcome.succeeded);
        assert_eq!(outcome.exit_code, Some(0));
        assert!(outcome.stderr_tail.is_none());
    }

    #[test]
    fn non_zero_exit_is_an_outcome_not_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome = quiet()
            .execute("echo boom >&2; exit 3", temp.path())
            .expect("execute");
        assert!(!outcome.succeeded);
        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(outcome.stderr_tail.as_deref(), Some("boom"));
    }

    #[test]
    fn runs_in_the_given_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome = quiet()
            .execute("touch marker.txt", temp.path())
            .expect("execute");
        assert!(outcome.succeeded);
        assert!(temp.path().join("marker.txt").exists());
    }

    #[test]
    fn timeout_kills_and_fails_the_command() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ShellRunner::new(true, Some(Duration::from_millis(200)));
        let outcome = runner.execute("sleep 2", temp.path()).expect("execute");
        assert!(outcome.timed_out);
        assert!(!outcome.succeeded);
    }

    #[test]
    fn timeout_kills_everything_the_shell_started() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ShellRunner::new(true, Some(Duration::from_millis(200)));
        let started = std::time::Instant::now();

        let outcome = runner
            .execute("sleep 3; true", temp.path())
            .expect("execute");

        assert!(outcome.timed_out);
        assert!(!outcome.succeeded);
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn limited_reader_keeps_the_tail() {
        let data = b"0123456789".to_vec();
        let kept = read_stream_limited(&data[..], 4).expect("read");
        assert_eq!(kept, b"6789");
    }

    #[test]
    fn tail_lines_keeps_last_lines() {
        assert_eq!(tail_lines("a\nb\nc\n", 2), "b\nc");
        assert_eq!(tail_lines("", 2), "");
    }
}
