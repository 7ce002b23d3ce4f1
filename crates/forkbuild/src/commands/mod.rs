//! Command implementations.

pub mod compose;
pub mod dispatch;
pub mod prepare;

use crate::config::Config;
use crate::error::Result;
use forkbuild_github::{RawContentFetcher, token_from_env};
use forkbuild_workflow::{LocalFetcher, SourceFetcher};
use std::path::{Path, PathBuf};

/// A parsed CLI command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print or write the composed workflow.
    Compose {
        /// Upstream tag
        tag: String,
        /// Output file; stdout when absent
        output: Option<PathBuf>,
    },
    /// Create the build branch.
    Prepare(prepare::PrepareOptions),
    /// Dispatch a prepared build branch.
    Dispatch {
        /// Upstream tag
        tag: String,
    },
}

/// Shared inputs of every command.
#[derive(Debug, Clone)]
pub struct Context {
    /// Loaded configuration
    pub config: Config,
    /// Directory relative configuration paths resolve against
    pub config_dir: PathBuf,
    /// Working tree of the fork clone
    pub root: PathBuf,
}

impl Context {
    /// Load the configuration at `config_path` and work in `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded.
    pub fn load(config_path: &Path, root: impl Into<PathBuf>) -> Result<Self> {
        let config = Config::load(config_path)?;
        let config_dir = config_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Ok(Self {
            config,
            config_dir,
            root: root.into(),
        })
    }

    /// Fetcher for the upstream workflows.
    ///
    /// A configured `local_dir` takes precedence over the network.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn fetcher(&self) -> Result<Box<dyn SourceFetcher>> {
        let upstream = &self.config.upstream;
        if let Some(dir) = &upstream.local_dir {
            return Ok(Box::new(LocalFetcher::new(self.config_dir.join(dir))));
        }

        let fetcher = match &upstream.raw_base_url {
            Some(url) => RawContentFetcher::with_base_url(url.as_str())?,
            None => RawContentFetcher::new()?,
        };
        Ok(Box::new(
            fetcher
                .with_token(token_from_env())
                .with_token_for_custom_host(upstream.raw_base_url_token),
        ))
    }
}
