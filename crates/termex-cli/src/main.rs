//! Termex CLI: record and replay terminal UI test sessions.
//!
//! `run` and `record` mirror the program under test onto the local terminal;
//! `test` replays a recorded playbook headlessly and reports the verdict.

// CLI-specific lint allowances (CLI binary, not library)
#![allow(missing_docs)]
#![allow(clippy::print_stdout)] // CLI must print to stdout
#![allow(clippy::print_stderr)] // CLI must print to stderr
#![allow(clippy::exit)] // CLI uses exit codes

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::Result;
use termex::{replay, Mode, Playbook, SessionConfig, TestVerdict};

mod display;

#[derive(Debug, Parser)]
#[command(name = "termex", version, about = "Automated testing of terminal UI programs")]
struct Cli {
    /// Directory exported as TERMINFO to the program under test
    #[arg(short = 't', long, global = true)]
    terminfo: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a program interactively without recording anything
    Run {
        /// Program to execute, invoked with no arguments
        program: String,
    },
    /// Run a program interactively, recording keystrokes and captures
    ///
    /// F12 captures the current screen as an expectation; Ctrl+Q ends the
    /// session and writes the playbook.
    Record {
        /// Program to execute, invoked with no arguments
        program: String,
        /// Playbook file to write
        #[arg(short, long)]
        playbook: PathBuf,
    },
    /// Replay a playbook against a program and verify the screen states
    Test {
        /// Program to execute, invoked with no arguments
        program: String,
        /// Playbook file to replay
        #[arg(short, long)]
        playbook: PathBuf,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("TERMEX_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let terminfo = cli.terminfo.as_deref();

    let code = match &cli.command {
        Commands::Run { program } => display::interactive(program, terminfo, Mode::Run, None)?,
        Commands::Record { program, playbook } => {
            display::interactive(program, terminfo, Mode::Record, Some(playbook.as_path()))?
        }
        Commands::Test { program, playbook } => run_test(program, playbook, terminfo)?,
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn run_test(program: &str, playbook_path: &Path, terminfo: Option<&Path>) -> Result<i32> {
    let playbook = Playbook::load(playbook_path)?;
    let config = SessionConfig::new(program).terminfo(terminfo);

    match replay(&config, &playbook)? {
        TestVerdict::Passed => {
            println!(
                "Run of '{program}' using playbook '{}' succeeded.",
                playbook_path.display()
            );
            Ok(0)
        }
        TestVerdict::Failed { reason, report } => {
            if let Some(report) = report {
                println!("{report}");
            }
            println!("{reason}");
            println!(
                "Run of '{program}' using playbook '{}' failed.",
                playbook_path.display()
            );
            Ok(1)
        }
    }
}
