//! Raw content fetcher.
//!
//! Reads upstream workflow files through `raw.githubusercontent.com`, which
//! serves any file at any ref without API rate limits for public
//! repositories.

use crate::error::{Error, Result};
use async_trait::async_trait;
use forkbuild_workflow::{FetchError, FetchRequest, SourceFetcher};
use reqwest::{Client, StatusCode};
use tracing::debug;

/// Default base URL for raw file access.
pub const DEFAULT_RAW_BASE_URL: &str = "https://raw.githubusercontent.com";

/// [`SourceFetcher`] backed by GitHub's raw content host.
#[derive(Debug, Clone)]
pub struct RawContentFetcher {
    client: Client,
    base_url: String,
    token: Option<String>,
    token_for_custom_host: bool,
}

impl RawContentFetcher {
    /// Create a fetcher against [`DEFAULT_RAW_BASE_URL`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Client`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_RAW_BASE_URL)
    }

    /// Create a fetcher against a custom raw content host.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Client`] if the HTTP client cannot be built.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("forkbuild/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            token_for_custom_host: false,
        })
    }

    /// Authenticate requests with `token`.
    ///
    /// The token is only sent to [`DEFAULT_RAW_BASE_URL`] unless
    /// [`Self::with_token_for_custom_host`] allows another host.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Send the token to a custom base URL as well.
    #[must_use]
    pub const fn with_token_for_custom_host(mut self, allow: bool) -> Self {
        self.token_for_custom_host = allow;
        self
    }

    /// Token attached to requests, if any.
    #[must_use]
    pub fn request_token(&self) -> Option<&str> {
        let trusted = self.base_url == DEFAULT_RAW_BASE_URL || self.token_for_custom_host;
        self.token.as_deref().filter(|_| trusted)
    }

    /// URL serving the requested file.
    #[must_use]
    pub fn url_for(&self, request: &FetchRequest) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url,
            request.repository,
            request.reference,
            request.path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl SourceFetcher for RawContentFetcher {
    async fn fetch(&self, request: &FetchRequest) -> std::result::Result<Vec<u8>, FetchError> {
        let url = self.url_for(request);
        debug!(%url, "Fetching upstream workflow");

        let transport = |message: String| FetchError::Transport {
            request: request.clone(),
            message,
        };

        let mut builder = self.client.get(&url);
        if let Some(token) = self.request_token() {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| transport(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(FetchError::NotFound {
                request: request.clone(),
            }),
            status if !status.is_success() => Err(transport(format!("HTTP {status}"))),
            _ => response
                .bytes()
                .await
                .map(|body| body.to_vec())
                .map_err(|e| transport(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for() {
        let fetcher = RawContentFetcher::new().unwrap();
        let request = FetchRequest::new("wolfpld/tracy", "v0.12.2", ".github/workflows/linux.yml");
        assert_eq!(
            fetcher.url_for(&request),
            "https://raw.githubusercontent.com/wolfpld/tracy/v0.12.2/.github/workflows/linux.yml"
        );
    }

    #[test]
    fn test_custom_base_url() {
        let fetcher = RawContentFetcher::with_base_url("http://localhost:8080/raw/").unwrap();
        let request = FetchRequest::new("o/r", "main", "/build.yml");
        assert_eq!(fetcher.url_for(&request), "http://localhost:8080/raw/o/r/main/build.yml");
    }

    #[test]
    fn test_token_sent_to_github_host() {
        let fetcher = RawContentFetcher::new()
            .unwrap()
            .with_token(Some("ghp_secret".to_string()));
        assert_eq!(fetcher.request_token(), Some("ghp_secret"));
    }

    #[test]
    fn test_token_withheld_from_custom_host() {
        let fetcher = RawContentFetcher::with_base_url("https://mirror.example.com/raw")
            .unwrap()
            .with_token(Some("ghp_secret".to_string()));
        assert_eq!(fetcher.request_token(), None);

        let fetcher = fetcher.with_token_for_custom_host(true);
        assert_eq!(fetcher.request_token(), Some("ghp_secret"));
    }
}
