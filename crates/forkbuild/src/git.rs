//! Git operations on the fork clone.
//!
//! Thin wrapper over the `git` binary. Every command runs in the configured
//! working tree and fails with the command's stderr.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

/// Identity used for build branch commits.
pub const BOT_NAME: &str = "github-actions[bot]";

/// Email of [`BOT_NAME`].
pub const BOT_EMAIL: &str = "github-actions[bot]@users.noreply.github.com";

/// A git working tree.
#[derive(Debug, Clone)]
pub struct Git {
    root: PathBuf,
}

impl Git {
    /// Operate on the working tree at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root of the working tree.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn output(&self, args: &[&str]) -> Result<Output> {
        debug!(args = ?args, "Running git");
        Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .map_err(|e| Error::Git {
                command: args.join(" "),
                message: e.to_string(),
            })
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args)?;
        if !output.status.success() {
            return Err(Error::Git {
                command: args.join(" "),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Check out an existing branch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Git`] if the checkout fails.
    pub fn checkout(&self, branch: &str) -> Result<()> {
        self.run(&["checkout", branch]).map(drop)
    }

    /// Create `branch` from the current HEAD and switch to it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Git`] if the branch cannot be created.
    pub fn create_branch(&self, branch: &str) -> Result<()> {
        self.run(&["checkout", "-b", branch]).map(drop)
    }

    /// Name of the current branch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Git`] outside a repository.
    pub fn current_branch(&self) -> Result<String> {
        self.run(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    /// Whether a local branch named `branch` exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Git`] outside a repository.
    pub fn local_branch_exists(&self, branch: &str) -> Result<bool> {
        Ok(!self.run(&["branch", "--list", branch])?.is_empty())
    }

    /// Force-delete a local branch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Git`] if the branch cannot be deleted.
    pub fn delete_local_branch(&self, branch: &str) -> Result<()> {
        self.run(&["branch", "-D", branch]).map(drop)
    }

    /// Fetch `remote`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Git`] if the fetch fails.
    pub fn fetch(&self, remote: &str) -> Result<()> {
        self.run(&["fetch", remote]).map(drop)
    }

    /// Whether `remote` has a branch named `branch`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Git`] if the remote cannot be queried.
    pub fn remote_branch_exists(&self, remote: &str, branch: &str) -> Result<bool> {
        Ok(!self.run(&["ls-remote", "--heads", remote, branch])?.is_empty())
    }

    /// Delete `branch` on `remote`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Git`] if the push fails.
    pub fn delete_remote_branch(&self, remote: &str, branch: &str) -> Result<()> {
        self.run(&["push", remote, "--delete", branch]).map(drop)
    }

    /// URL of `remote`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Git`] if the remote does not exist.
    pub fn remote_url(&self, remote: &str) -> Result<String> {
        self.run(&["remote", "get-url", remote])
    }

    /// Stage `paths`, relative to the working tree root.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Git`] if staging fails.
    pub fn add(&self, paths: &[&Path]) -> Result<()> {
        let paths: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        let mut args = vec!["add", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.run(&args).map(drop)
    }

    /// Commit the staged changes as [`BOT_NAME`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Git`] if the commit fails, e.g. when nothing is staged.
    pub fn commit(&self, message: &str) -> Result<()> {
        let name = format!("user.name={BOT_NAME}");
        let email = format!("user.email={BOT_EMAIL}");
        self.run(&[
            "-c",
            name.as_str(),
            "-c",
            email.as_str(),
            "commit",
            "--no-gpg-sign",
            "-m",
            message,
        ])
        .map(drop)
    }

    /// Push `branch` to `remote`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Git`] if the push fails.
    pub fn push(&self, remote: &str, branch: &str) -> Result<()> {
        self.run(&["push", remote, branch]).map(drop)
    }

    /// Subject line of the last commit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Git`] if there is no commit.
    pub fn last_commit_subject(&self) -> Result<String> {
        self.run(&["log", "-1", "--format=%s"])
    }
}
