//! `forkbuild prepare`.
//!
//! Composes the workflow for a tag and publishes it on a fresh build branch
//! of the fork. Composition runs before any git command, so a failing tag
//! leaves the working tree and the remote untouched.

use super::Context;
use super::compose::compose;
use crate::config::copy_name;
use crate::error::{Error, Result};
use crate::git::Git;
use forkbuild_github::{DispatchRequest, Repository, WorkflowDispatcher};
use forkbuild_workflow::Composition;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Options of `forkbuild prepare`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareOptions {
    /// Upstream tag
    pub tag: String,
    /// Push the branch
    pub push: bool,
    /// Remote overriding `fork.remote`
    pub remote: Option<String>,
    /// Dispatch the workflow after pushing
    pub dispatch: bool,
}

/// What `prepare` produced.
#[derive(Debug, Clone)]
pub struct PrepareOutcome {
    /// Build branch
    pub branch: String,
    /// Remote the branch was (or would be) pushed to
    pub remote: String,
    /// Files committed on the branch, relative to the working tree
    pub files: Vec<PathBuf>,
    /// Whether the branch was pushed
    pub pushed: bool,
    /// The dispatch event, sent when `dispatched` is set
    pub dispatch: DispatchRequest,
    /// Whether the workflow was dispatched
    pub dispatched: bool,
    /// Number of non-fatal composition warnings
    pub warnings: usize,
}

/// Run `prepare`.
///
/// # Errors
///
/// Returns composition errors before touching git, then any git, file or
/// dispatch error.
pub async fn execute(context: &Context, options: &PrepareOptions) -> Result<PrepareOutcome> {
    let config = &context.config;
    let tag = options.tag.as_str();
    let branch = config.branch_name(tag);
    let remote = options
        .remote
        .clone()
        .unwrap_or_else(|| config.fork.remote.clone());

    let composition = compose(context, tag).await?;

    let git = Git::new(&context.root);
    reset_branch(&git, &config.fork.base_branch, &branch, options.push.then_some(remote.as_str()))?;
    if options.push {
        check_remote(&git, &remote, &config.fork.repository);
    }

    let files = write_files(
        &context.root,
        &config.workflow_path(),
        &config.fork.upstream_copy_dir,
        &composition,
    )
    .await?;

    let staged: Vec<&Path> = files.iter().map(PathBuf::as_path).collect();
    git.add(&staged)?;
    git.commit(&format!("Add combined workflow for {tag}"))?;
    info!(branch = %branch, files = files.len(), "Committed build branch");

    if options.push {
        git.push(&remote, &branch)?;
        info!(remote = %remote, branch = %branch, "Pushed build branch");
    }

    let dispatch = config.dispatch_request(tag);
    let dispatched = if options.dispatch && options.push {
        WorkflowDispatcher::from_env()?.dispatch(&dispatch).await?;
        true
    } else {
        if options.dispatch {
            warn!("Not dispatching: the build branch was not pushed");
        }
        false
    };

    Ok(PrepareOutcome {
        branch,
        remote,
        files,
        pushed: options.push,
        dispatch,
        dispatched,
        warnings: composition.warnings.len(),
    })
}

/// Recreate `branch` from `base`, deleting stale local and remote copies.
fn reset_branch(git: &Git, base: &str, branch: &str, remote: Option<&str>) -> Result<()> {
    if let Err(e) = git.checkout(base) {
        warn!(branch = %base, error = %e, "Could not check out base branch; branching from HEAD");
    }

    if let Some(remote) = remote {
        if let Err(e) = git.fetch(remote) {
            warn!(remote = %remote, error = %e, "Fetch failed");
        }
        if git.remote_branch_exists(remote, branch).unwrap_or(false) {
            info!(remote = %remote, branch = %branch, "Deleting stale remote branch");
            if let Err(e) = git.delete_remote_branch(remote, branch) {
                warn!(remote = %remote, branch = %branch, error = %e, "Could not delete remote branch");
            }
        }
    }

    if git.local_branch_exists(branch)? {
        info!(branch = %branch, "Deleting stale local branch");
        git.delete_local_branch(branch)?;
    }

    git.create_branch(branch)
}

fn check_remote(git: &Git, remote: &str, fork: &Repository) {
    match git.remote_url(remote) {
        Ok(url) => match Repository::from_remote_url(&url) {
            Some(repository) if &repository == fork => {}
            _ => warn!(remote = %remote, url = %url, fork = %fork, "Remote does not point at the fork"),
        },
        Err(e) => warn!(remote = %remote, error = %e, "Could not resolve remote URL"),
    }
}

/// Write the composed workflow and the upstream copies.
///
/// Returns the written paths relative to `root`.
async fn write_files(
    root: &Path,
    workflow_path: &Path,
    copy_dir: &Path,
    composition: &Composition,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::with_capacity(composition.sources.len() + 1);

    write_file(root, workflow_path, composition.yaml.as_bytes()).await?;
    files.push(workflow_path.to_path_buf());

    for source in &composition.sources {
        let relative = copy_dir.join(copy_name(&source.spec.label, &source.spec.path));
        write_file(root, &relative, &source.raw).await?;
        files.push(relative);
    }

    Ok(files)
}

async fn write_file(root: &Path, relative: &Path, contents: &[u8]) -> Result<()> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io(parent, e))?;
    }
    tokio::fs::write(&path, contents)
        .await
        .map_err(|e| Error::io(&path, e))
}
