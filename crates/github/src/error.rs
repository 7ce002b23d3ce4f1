//! Error types for the GitHub collaborators.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for GitHub operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while talking to GitHub.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// No token was found in the environment.
    #[error("GITHUB_TOKEN is not set or empty")]
    #[diagnostic(
        code(forkbuild::github::missing_token),
        help("Export GITHUB_TOKEN or GH_TOKEN with the `actions:write` scope")
    )]
    MissingToken,

    /// A repository was not given as `owner/name`.
    #[error("Invalid repository '{value}'")]
    #[diagnostic(
        code(forkbuild::github::invalid_repository),
        help("Repositories are written as owner/name, e.g. wolfpld/tracy")
    )]
    InvalidRepository {
        /// The rejected value
        value: String,
    },

    /// An HTTP or API client could not be created.
    #[error("Failed to create GitHub client: {message}")]
    #[diagnostic(code(forkbuild::github::client))]
    Client {
        /// Description of the failure
        message: String,
    },

    /// GitHub refused or failed a workflow dispatch.
    #[error("Failed to dispatch '{workflow}' on {repository}@{reference}: {message}")]
    #[diagnostic(
        code(forkbuild::github::dispatch),
        help("Make sure the workflow file is pushed to the branch and declares a workflow_dispatch trigger")
    )]
    Dispatch {
        /// Repository the dispatch targeted
        repository: String,
        /// Workflow file name
        workflow: String,
        /// Branch the workflow runs on
        reference: String,
        /// Description of the failure
        message: String,
    },
}

impl Error {
    /// Create a client construction error.
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client {
            message: message.into(),
        }
    }
}
