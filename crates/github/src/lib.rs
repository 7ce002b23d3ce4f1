//! GitHub collaborators for forkbuild.
//!
//! This crate provides GitHub-specific implementations of:
//! - [`RawContentFetcher`], a [`forkbuild_workflow::SourceFetcher`] reading
//!   upstream workflows from the raw content host (feature: `fetch`)
//! - [`WorkflowDispatcher`] for starting the composed workflow on the fork
//!   (feature: `dispatch`)
//!
//! # Features
//!
//! - `fetch` (default): HTTP fetching of upstream workflow files
//! - `dispatch` (default): `workflow_dispatch` through the GitHub API

#![warn(missing_docs)]

pub mod error;
pub mod repository;
pub mod token;

#[cfg(feature = "fetch")]
pub mod raw;

#[cfg(feature = "dispatch")]
pub mod dispatch;

pub use error::{Error, Result};
pub use repository::Repository;
pub use token::token_from_env;

#[cfg(feature = "fetch")]
pub use raw::RawContentFetcher;

#[cfg(feature = "dispatch")]
pub use dispatch::{DispatchRequest, WorkflowDispatcher};
