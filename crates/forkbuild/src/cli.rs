//! Command line interface.

use crate::commands::Command;
use crate::commands::prepare::PrepareOptions;
use crate::config::DEFAULT_CONFIG_FILE;
use crate::tracing::{LogLevel, TracingFormat};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Top-level arguments.
#[derive(Parser, Debug)]
#[command(name = "forkbuild")]
#[command(about = "Build upstream releases on a fork by composing their GitHub Actions workflows")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file
    #[arg(
        short = 'c',
        long,
        global = true,
        env = "FORKBUILD_CONFIG",
        default_value = DEFAULT_CONFIG_FILE
    )]
    pub config: PathBuf,

    /// Logging level
    #[arg(
        short = 'l',
        long,
        global = true,
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    /// Log output format
    #[arg(long, global = true, default_value = "compact", value_enum)]
    pub log_format: TracingFormat,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compose the build workflow for a tag without touching git
    Compose {
        /// Upstream tag (e.g. v0.12.2)
        tag: String,
        /// Write the workflow to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Create the build branch for a tag and commit the composed workflow
    Prepare {
        /// Upstream tag (e.g. v0.12.2)
        tag: String,
        /// Commit locally without pushing
        #[arg(long)]
        no_push: bool,
        /// Git remote to push to (defaults to fork.remote)
        #[arg(long)]
        remote: Option<String>,
        /// Dispatch the workflow after pushing
        #[arg(long, conflicts_with = "no_push")]
        dispatch: bool,
    },
    /// Dispatch the workflow of an already prepared build branch
    Dispatch {
        /// Upstream tag (e.g. v0.12.2)
        tag: String,
    },
}

impl From<Commands> for Command {
    fn from(cmd: Commands) -> Self {
        match cmd {
            Commands::Compose { tag, output } => Self::Compose { tag, output },
            Commands::Prepare {
                tag,
                no_push,
                remote,
                dispatch,
            } => Self::Prepare(PrepareOptions {
                tag,
                push: !no_push,
                remote,
                dispatch,
            }),
            Commands::Dispatch { tag } => Self::Dispatch { tag },
        }
    }
}

/// Parse the process arguments.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}
