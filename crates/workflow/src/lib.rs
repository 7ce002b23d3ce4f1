//! Composition of upstream GitHub Actions workflows into a single fork build.
//!
//! Upstream projects often split their CI across one workflow per platform.
//! This crate fetches those workflows at a given tag, merges their job graphs,
//! redirects every checkout step to a fork and wraps the result in a fresh
//! `workflow_dispatch` envelope, optionally followed by a release job.
//!
//! ```rust,no_run
//! use forkbuild_workflow::{
//!     CheckoutTarget, Composer, CompositionRequest, EnvelopeConfig, LocalFetcher, SourceSpec,
//! };
//!
//! # async fn run() -> forkbuild_workflow::Result<()> {
//! let composer = Composer::new(EnvelopeConfig::new("Combined Build"));
//! let request = CompositionRequest {
//!     upstream: "wolfpld/tracy".to_string(),
//!     tag: "v0.12.2".to_string(),
//!     sources: vec![SourceSpec::new("linux", ".github/workflows/linux.yml")],
//!     target: CheckoutTarget::new("me/tracy", "build-v0.12.2"),
//! };
//! let composition = composer.compose(&LocalFetcher::new("../tracy"), &request).await?;
//! println!("{}", composition.yaml);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod artifacts;
pub mod assemble;
pub mod composer;
pub mod document;
pub mod envelope;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod merge;
pub mod release;
pub mod rewrite;

pub use artifacts::ArtifactRule;
pub use assemble::{MergedWorkflow, assemble};
pub use composer::{
    Composer, Composition, CompositionRequest, FetchedSource, ReleasePolicy, SourceSpec,
};
pub use document::{JobDefinition, JobGraph, StepDefinition, WorkflowDocument};
pub use envelope::{Concurrency, EnvelopeConfig, PermissionLevel, Permissions};
pub use error::{Error, Result};
pub use extract::extract_jobs;
pub use fetch::{FetchError, FetchRequest, LocalFetcher, SourceFetcher, StaticFetcher};
pub use merge::{MergedGraph, MergedJob, SourceJobs, merge, validate};
pub use release::{DEFAULT_RELEASE_JOB_ID, ReleaseJob};
pub use rewrite::{CheckoutRecognizer, CheckoutTarget, CompositionWarning, rewrite_checkout};
