//! `quickie`: time a project's build and run commands and keep the history.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use clap::error::ErrorKind;
use quickie::run::{Invocation, run_invocation};
use quickie::{console, exit_codes, interrupt, logging};
use tracing::error;

#[derive(Parser, Debug)]
#[command(
    name = "quickie",
    version,
    about = "Time a project's build and run commands in an isolated copy"
)]
struct Cli {
    /// Project directory to measure.
    directory: PathBuf,

    /// Config file (default: <DIRECTORY>/.quickierc).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => exit_code(exit_codes::OK),
                _ => exit_code(exit_codes::FATAL),
            };
        }
    };
    logging::init();

    match run(cli) {
        Ok(()) => exit_code(exit_codes::OK),
        Err(err) => {
            error!(err = %format!("{err:#}"), "invocation failed");
            console::fatal(format!("{err:#}"));
            exit_code(exit_codes::FATAL)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    interrupt::install()?;
    let summary = run_invocation(&Invocation {
        directory: cli.directory,
        config: cli.config,
    })?;
    console::status(format!("Results saved to {}", summary.history_path.display()));
    Ok(())
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_directory_and_config() {
        let cli = Cli::try_parse_from(["quickie", "proj", "-c", "bench.yml"]).expect("parse");
        assert_eq!(cli.directory, PathBuf::from("proj"));
        assert_eq!(cli.config, Some(PathBuf::from("bench.yml")));

        let cli = Cli::try_parse_from(["quickie", "proj", "--config", "x"]).expect("parse");
        assert_eq!(cli.config, Some(PathBuf::from("x")));
    }

    #[test]
    fn directory_is_required() {
        let err = Cli::try_parse_from(["quickie"]).expect_err("missing directory");
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn rejects_extra_positionals() {
        assert!(Cli::try_parse_from(["quickie", "a", "b"]).is_err());
    }
}
