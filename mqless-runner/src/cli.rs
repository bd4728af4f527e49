use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "mqless-runner", version, about = "Run mqless workers against a SQL job table")]
pub struct CliArgs {
    /// Path to configuration file (overrides MQLESS_CONFIG_PATH env var)
    #[arg(short = 'c', long = "config-path", global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Start the worker pool and poll the job table until Ctrl-C (default)
    Run,
    /// Insert a queued job
    Enqueue {
        /// Job type, e.g. `print-msg`
        job_type: String,
        /// JSON payload stored with the job
        #[arg(long)]
        payload: Option<String>,
    },
}

impl CliArgs {
    /// Config path from the command line, falling back to `MQLESS_CONFIG_PATH`.
    pub fn resolve_config_path(&self) -> Option<PathBuf> {
        self.config_path
            .clone()
            .or_else(|| std::env::var_os("MQLESS_CONFIG_PATH").map(PathBuf::from))
    }

    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Run)
    }
}
