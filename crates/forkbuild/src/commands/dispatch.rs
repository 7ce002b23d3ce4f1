//! `forkbuild dispatch`.

use super::Context;
use crate::error::Result;
use forkbuild_github::{DispatchRequest, WorkflowDispatcher};

/// Dispatch the composed workflow on the build branch of `tag`.
///
/// # Errors
///
/// Returns an error if no token is available or GitHub rejects the event.
pub async fn execute(context: &Context, tag: &str) -> Result<DispatchRequest> {
    let request = context.config.dispatch_request(tag);
    WorkflowDispatcher::from_env()?.dispatch(&request).await?;
    Ok(request)
}
