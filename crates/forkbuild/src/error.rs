//! Error types for the forkbuild CLI.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the forkbuild commands.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The configuration file could not be read or parsed.
    #[error("Failed to read configuration {}: {message}", path.display())]
    #[diagnostic(
        code(forkbuild::config::read),
        help("Pass the configuration file with --config or create forkbuild.toml")
    )]
    ConfigRead {
        /// Path of the configuration file
        path: PathBuf,
        /// Description of the failure
        message: String,
    },

    /// The configuration parsed but is not usable.
    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(forkbuild::config::invalid))]
    InvalidConfig {
        /// What is wrong with it
        message: String,
    },

    /// A git command failed.
    #[error("git {command} failed: {message}")]
    #[diagnostic(
        code(forkbuild::git),
        help("Run forkbuild from the root of a clone of the fork repository")
    )]
    Git {
        /// Arguments passed to git
        command: String,
        /// stderr of the command, or the spawn error
        message: String,
    },

    /// A file could not be read or written.
    #[error("I/O error on {}", path.display())]
    #[diagnostic(code(forkbuild::io))]
    Io {
        /// The file involved
        path: PathBuf,
        /// The underlying error
        #[source]
        source: std::io::Error,
    },

    /// Composition failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Workflow(#[from] forkbuild_workflow::Error),

    /// A GitHub operation failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    GitHub(#[from] forkbuild_github::Error),
}

impl Error {
    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an I/O error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
