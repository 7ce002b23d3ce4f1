//! `forkbuild compose`.

use super::Context;
use crate::error::{Error, Result};
use forkbuild_workflow::Composition;
use std::path::Path;
use tracing::info;

/// Fetch and compose the workflows of `tag`.
///
/// # Errors
///
/// Returns any fetch or composition error.
pub async fn compose(context: &Context, tag: &str) -> Result<Composition> {
    let composer = context.config.composer(&context.config_dir)?;
    let request = context.config.composition_request(tag);
    let fetcher = context.fetcher()?;
    Ok(composer.compose(fetcher.as_ref(), &request).await?)
}

/// Compose and write the workflow to `output`, or return it for printing.
///
/// # Errors
///
/// Returns any composition error, or [`Error::Io`] if `output` cannot be
/// written.
pub async fn execute(context: &Context, tag: &str, output: Option<&Path>) -> Result<Option<String>> {
    let composition = compose(context, tag).await?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::io(parent, e))?;
            }
            tokio::fs::write(path, &composition.yaml)
                .await
                .map_err(|e| Error::io(path, e))?;
            info!(path = %path.display(), "Wrote composed workflow");
            Ok(None)
        }
        None => Ok(Some(composition.yaml)),
    }
}
