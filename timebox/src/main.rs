//! Run a single test program under a wall-clock timeout.
//!
//! `timebox run -- <program> [args..]` treats the program as one test
//! invocation, prints the outcome as JSON, and exits with a status from
//! [`timebox::exit_codes`].

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use timebox::command::TestCommand;
use timebox::context::ExecutionContext;
use timebox::exit_codes;
use timebox::io::command_test::ProcessTestCommand;
use timebox::io::config::{TimeboxConfig, apply_env_overrides, load_config, write_config};
use timebox::strategy::{self, Strategy};
use timebox::timeout::TimeoutCommand;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "timebox",
    version,
    about = "Run a test under a wall-clock timeout"
)]
struct Cli {
    /// Configuration file; defaults apply when it does not exist.
    #[arg(long, global = true, default_value = "timebox.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a program as a single test and report its outcome.
    Run {
        /// Timeout in milliseconds (defaults to `default_timeout_ms`).
        #[arg(long, allow_negative_numbers = true)]
        timeout_ms: Option<i64>,

        /// Override the configured strategy (`racing` or `interrupting`).
        #[arg(long)]
        strategy: Option<Strategy>,

        /// Test name used in the report (defaults to the program name).
        #[arg(long)]
        name: Option<String>,

        /// Program to run, followed by its arguments.
        #[arg(required = true, last = true)]
        program: Vec<OsString>,
    },
    /// Print the resolved configuration.
    Config {
        /// Also write it to the `--config` path, creating the file.
        #[arg(long)]
        write: bool,
    },
}

fn main() {
    timebox::logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let cfg = resolve_config(&cli.config)?;
    match cli.command {
        Command::Run {
            timeout_ms,
            strategy,
            name,
            program,
        } => cmd_run(cfg, timeout_ms, strategy, name, program),
        Command::Config { write } => {
            if write {
                write_config(&cli.config, &cfg)?;
                info!(path = %cli.config.display(), "wrote config");
            }
            print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
            Ok(exit_codes::PASSED)
        }
    }
}

fn resolve_config(path: &std::path::Path) -> Result<TimeboxConfig> {
    let cfg = load_config(path)?;
    apply_env_overrides(cfg)
}

fn cmd_run(
    mut cfg: TimeboxConfig,
    timeout_ms: Option<i64>,
    strategy: Option<Strategy>,
    name: Option<String>,
    program: Vec<OsString>,
) -> Result<i32> {
    if let Some(strategy) = strategy {
        cfg.strategy = strategy;
    }
    strategy::install(&cfg)?;

    let mut parts = program.into_iter();
    let Some(executable) = parts.next() else {
        anyhow::bail!("missing program to run");
    };
    let name = name.unwrap_or_else(|| executable.to_string_lossy().into_owned());
    let test = ProcessTestCommand::new(name, executable)
        .args(parts)
        .output_limit_bytes(cfg.output_limit_bytes);

    // `validate` bounds the default to i64.
    let timeout_ms = timeout_ms.unwrap_or(cfg.default_timeout_ms as i64);
    let command = TimeoutCommand::new(Arc::new(test), timeout_ms).context("configure timeout")?;

    let ctx = ExecutionContext::new(command.test().clone());
    let result = command.execute(&ctx);
    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("serialize result")?
    );
    Ok(exit_codes::for_status(result.status))
}
