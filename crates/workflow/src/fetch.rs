//! Source fetcher boundary.
//!
//! The composer never talks to the network itself. Upstream workflow files
//! are retrieved through a [`SourceFetcher`], which makes composition
//! testable offline and leaves retry policy to the fetcher.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Location of one upstream workflow file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchRequest {
    /// Upstream repository in `owner/name` form
    pub repository: String,
    /// Tag or other ref the file is read at
    pub reference: String,
    /// Path of the workflow file relative to the repository root
    pub path: String,
}

impl FetchRequest {
    /// Create a new fetch request.
    pub fn new(
        repository: impl Into<String>,
        reference: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            reference: reference.into(),
            path: path.into(),
        }
    }
}

impl std::fmt::Display for FetchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}:{}", self.repository, self.reference, self.path)
    }
}

/// Failure to retrieve a workflow file.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The file does not exist at the requested ref.
    #[error("{request} was not found")]
    NotFound {
        /// The request that failed
        request: FetchRequest,
    },

    /// The file could not be retrieved.
    #[error("Failed to fetch {request}: {message}")]
    Transport {
        /// The request that failed
        request: FetchRequest,
        /// Description of the failure
        message: String,
    },
}

impl FetchError {
    /// Whether the failure means the file does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Retrieves raw workflow documents.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch the raw bytes of the requested file.
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<u8>, FetchError>;
}

/// Fetcher serving documents from memory, keyed by path.
///
/// Repository and ref are ignored. Useful for tests and for replaying a
/// previously saved set of upstream workflows.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    documents: HashMap<String, Vec<u8>>,
}

impl StaticFetcher {
    /// Create an empty fetcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `contents` for `path`.
    #[must_use]
    pub fn with_document(mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.documents.insert(path.into(), contents.into());
        self
    }
}

#[async_trait]
impl SourceFetcher for StaticFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<u8>, FetchError> {
        self.documents
            .get(&request.path)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                request: request.clone(),
            })
    }
}

/// Fetcher reading workflow files from a local checkout of the upstream
/// repository. The ref is not checked out; the directory is read as is.
#[derive(Debug, Clone)]
pub struct LocalFetcher {
    root: PathBuf,
}

impl LocalFetcher {
    /// Read files relative to `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SourceFetcher for LocalFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<u8>, FetchError> {
        let path = self.root.join(&request.path);
        debug!(path = %path.display(), "Reading local workflow");

        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FetchError::NotFound {
                    request: request.clone(),
                }
            } else {
                FetchError::Transport {
                    request: request.clone(),
                    message: e.to_string(),
                }
            }
        })
    }
}
