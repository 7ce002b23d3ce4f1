//! Error types for workflow composition.

use crate::fetch::FetchError;
use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for composition operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort the composition of a build workflow.
///
/// Every variant is fatal for the tag being composed. Nothing is dispatched
/// or published once one of these is returned.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// An upstream workflow document could not be retrieved.
    #[error("Failed to fetch workflow '{path}' for source '{label}'")]
    #[diagnostic(
        code(forkbuild::workflow::fetch),
        help("Check that the upstream tag exists and that the workflow file is present at that tag")
    )]
    Fetch {
        /// Source label of the failed fetch
        label: String,
        /// Relative path of the workflow in the upstream repository
        path: String,
        /// The underlying fetch failure
        #[source]
        source: FetchError,
    },

    /// A workflow document is not valid YAML or is not a mapping.
    #[error("Failed to parse workflow from source '{label}': {message}")]
    #[diagnostic(
        code(forkbuild::workflow::parse),
        help("Workflow documents must be YAML mappings with unique keys")
    )]
    Parse {
        /// Source label of the offending document
        label: String,
        /// Parser message, including the location when known
        message: String,
    },

    /// A workflow document has no `jobs` section.
    #[error("Workflow from source '{label}' has no 'jobs' section")]
    #[diagnostic(code(forkbuild::workflow::missing_job_graph))]
    MissingJobGraph {
        /// Source label of the offending document
        label: String,
    },

    /// The `jobs` section exists but is not a mapping.
    #[error("The 'jobs' section of source '{label}' must be a mapping, found {found}")]
    #[diagnostic(code(forkbuild::workflow::malformed_job_graph))]
    MalformedJobGraph {
        /// Source label of the offending document
        label: String,
        /// Kind of YAML node found instead
        found: &'static str,
    },

    /// A job entry does not have the minimal required shape.
    #[error("Job '{job}' in source '{label}' is malformed: {reason}")]
    #[diagnostic(code(forkbuild::workflow::malformed_job))]
    MalformedJob {
        /// Source label of the offending document
        label: String,
        /// Job identifier (or a rendering of the offending key)
        job: String,
        /// What is wrong with the entry
        reason: String,
    },

    /// Two sources define the same job identifier.
    #[error("Job '{id}' is defined by more than one source: {}", .sources.join(", "))]
    #[diagnostic(
        code(forkbuild::workflow::duplicate_job),
        help("Rename the job upstream or set a distinct `job_prefix` on one of the sources")
    )]
    DuplicateJobIdentifier {
        /// The colliding job identifier
        id: String,
        /// Labels of every source defining the identifier, in merge order
        sources: Vec<String>,
    },

    /// A `needs` reference names a job missing from the merged graph.
    #[error("Job '{job}' depends on '{reference}', which is not in the merged workflow")]
    #[diagnostic(code(forkbuild::workflow::unresolved_dependency))]
    UnresolvedDependency {
        /// The job holding the reference
        job: String,
        /// The identifier that could not be resolved
        reference: String,
    },

    /// The merged `needs` graph contains a cycle.
    #[error("Jobs form a dependency cycle: {}", .jobs.join(" -> "))]
    #[diagnostic(code(forkbuild::workflow::dependency_cycle))]
    DependencyCycle {
        /// Jobs participating in the cycle
        jobs: Vec<String>,
    },

    /// The configured release job could not be loaded.
    #[error("Invalid release job: {message}")]
    #[diagnostic(
        code(forkbuild::workflow::release_job),
        help("The release job file must be a YAML mapping holding a single job keyed by its id")
    )]
    InvalidReleaseJob {
        /// What is wrong with the release job
        message: String,
    },

    /// The assembled document could not be serialized.
    #[error("Failed to serialize workflow: {message}")]
    #[diagnostic(code(forkbuild::workflow::serialization))]
    Serialization {
        /// Serializer message
        message: String,
    },
}

impl Error {
    /// Creates a parse error for the given source.
    pub fn parse(label: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            label: label.into(),
            message: message.into(),
        }
    }

    /// Creates a malformed-job error.
    pub fn malformed_job(
        label: impl Into<String>,
        job: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedJob {
            label: label.into(),
            job: job.into(),
            reason: reason.into(),
        }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}
