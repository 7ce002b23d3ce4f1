//! forkbuild - build upstream releases on a fork.
//!
//! Fetches an upstream project's GitHub Actions workflows at a tag, composes
//! them into a single dispatchable workflow with [`forkbuild_workflow`] and
//! publishes it on a build branch of the fork.

/// CLI argument parsing.
pub mod cli;
/// Command implementations (compose, prepare, dispatch).
pub mod commands;
/// `forkbuild.toml` loading and validation.
pub mod config;
/// Error types.
pub mod error;
/// Git operations on the fork clone.
pub mod git;
/// Tracing and logging configuration.
pub mod tracing;

pub use config::Config;
pub use error::{Error, Result};
