//! Release job.
//!
//! The composed workflow ends with a job that collects every platform's
//! artifacts and publishes them as one release tagged like the upstream
//! version. It depends on every composed job.

use crate::document::{JOBS_KEY, JobDefinition, StepDefinition, WorkflowDocument};
use crate::error::{Error, Result};
use crate::extract::extract_jobs;
use crate::merge::{MergedGraph, MergedJob};
use serde_yaml::{Mapping, Value};
use tracing::debug;

/// Default identifier of the release job.
pub const DEFAULT_RELEASE_JOB_ID: &str = "create-release";

/// Source label attached to the release job in the merged graph.
pub const RELEASE_SOURCE: &str = "release";

/// A release job ready to be appended to a composed workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseJob {
    /// Job identifier
    pub id: String,
    /// Job definition; its `needs` is replaced when attached
    pub definition: JobDefinition,
}

impl ReleaseJob {
    /// The built-in release job.
    ///
    /// Downloads every artifact of the run and publishes them under the tag
    /// given by `tag_expression`.
    #[must_use]
    pub fn standard(id: impl Into<String>, tag_expression: &str) -> Self {
        let mut permissions = Mapping::new();
        permissions.insert(Value::from("contents"), Value::from("write"));

        let definition = JobDefinition::new()
            .with_name("Create release")
            .with_runs_on("ubuntu-latest")
            .with_entry("permissions", Value::Mapping(permissions))
            .with_step(
                StepDefinition::uses_action("actions/download-artifact@v4")
                    .with_name("Download artifacts")
                    .with_input("path", "artifacts"),
            )
            .with_step(
                StepDefinition::uses_action("softprops/action-gh-release@v2")
                    .with_name("Publish release")
                    .with_input("tag_name", tag_expression)
                    .with_input("name", tag_expression)
                    .with_input("files", "artifacts/**/*")
                    .with_input("fail_on_unmatched_files", true),
            );

        Self {
            id: id.into(),
            definition,
        }
    }

    /// Load the job keyed `id` from a YAML file holding a mapping of jobs.
    ///
    /// A file with a top-level `jobs` section is accepted as well.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidReleaseJob`] if the file cannot be parsed or
    /// does not define a well-formed job `id`.
    pub fn from_yaml(id: &str, raw: &[u8]) -> Result<Self> {
        let invalid = |message: String| Error::InvalidReleaseJob { message };

        let mut document = WorkflowDocument::parse(RELEASE_SOURCE, raw)
            .map_err(|e| invalid(e.to_string()))?;
        if document.section(JOBS_KEY).is_none() {
            let jobs = Value::Mapping(document.sections().clone());
            document = WorkflowDocument::new();
            document.insert_section(JOBS_KEY, jobs);
        }

        let mut jobs =
            extract_jobs(&document, RELEASE_SOURCE).map_err(|e| invalid(e.to_string()))?;
        let definition = jobs
            .shift_remove(id)
            .ok_or_else(|| invalid(format!("no job named '{id}' in release job file")))?;

        Ok(Self {
            id: id.to_string(),
            definition,
        })
    }

    /// Append the release job to `graph`, depending on every job already in it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateJobIdentifier`] if a composed job already
    /// uses the release job's identifier.
    pub fn attach(self, graph: &mut MergedGraph) -> Result<()> {
        if let Some(existing) = graph.get(&self.id) {
            return Err(Error::DuplicateJobIdentifier {
                id: self.id,
                sources: vec![existing.source.clone(), RELEASE_SOURCE.to_string()],
            });
        }

        let needs: Vec<String> = graph.keys().cloned().collect();
        debug!(job = %self.id, needs = needs.len(), "Attaching release job");

        let mut definition = self.definition;
        definition.set_needs(needs);
        graph.insert(
            self.id,
            MergedJob {
                source: RELEASE_SOURCE.to_string(),
                definition,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::validate;

    fn graph(ids: &[&str]) -> MergedGraph {
        ids.iter()
            .map(|id| {
                (
                    (*id).to_string(),
                    MergedJob {
                        source: "build".to_string(),
                        definition: JobDefinition::new().with_runs_on("ubuntu-latest"),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_attach_depends_on_every_job() {
        let mut g = graph(&["tracy-windows", "tracy-macos", "tracy-linux-build"]);
        ReleaseJob::standard(DEFAULT_RELEASE_JOB_ID, "v1")
            .attach(&mut g)
            .unwrap();

        let release = &g[DEFAULT_RELEASE_JOB_ID];
        assert_eq!(release.source, RELEASE_SOURCE);
        assert_eq!(
            release.definition.needs(),
            ["tracy-windows", "tracy-macos", "tracy-linux-build"]
        );
        assert!(validate(&g).is_ok());
    }

    #[test]
    fn test_attach_rejects_collision() {
        let mut g = graph(&["create-release"]);
        let err = ReleaseJob::standard("create-release", "v1")
            .attach(&mut g)
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateJobIdentifier { ref sources, .. } if sources == &["build", "release"]));
    }

    #[test]
    fn test_standard_job_publishes_tag() {
        let job = ReleaseJob::standard("create-release", "${{ inputs.tag || 'v1' }}");
        let publish = &job.definition.steps()[1];
        assert_eq!(publish.uses(), Some("softprops/action-gh-release@v2"));
        assert_eq!(
            publish.input("tag_name"),
            Some(&Value::from("${{ inputs.tag || 'v1' }}"))
        );
    }

    #[test]
    fn test_from_yaml_bare_job_mapping() {
        let raw = b"create-release:\n  runs-on: ubuntu-latest\n  steps:\n    - run: gh release create\n";
        let job = ReleaseJob::from_yaml("create-release", raw).unwrap();
        assert_eq!(job.definition.steps().len(), 1);
    }

    #[test]
    fn test_from_yaml_with_jobs_section() {
        let raw = b"jobs:\n  publish:\n    runs-on: ubuntu-latest\n";
        let job = ReleaseJob::from_yaml("publish", raw).unwrap();
        assert_eq!(job.id, "publish");
    }

    #[test]
    fn test_from_yaml_missing_job() {
        let err = ReleaseJob::from_yaml("create-release", b"other:\n  runs-on: x\n").unwrap_err();
        assert!(err.to_string().contains("no job named 'create-release'"));
    }
}
