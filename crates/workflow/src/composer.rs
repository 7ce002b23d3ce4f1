//! The composition pipeline.
//!
//! fetch → extract → merge → rewrite → assemble, once per upstream tag.
//! Nothing is retained between invocations; a [`Composer`] only holds policy.

use crate::artifacts::{ArtifactRule, inject_artifact_upload};
use crate::assemble::{MergedWorkflow, assemble, render_with_header};
use crate::document::WorkflowDocument;
use crate::envelope::EnvelopeConfig;
use crate::error::{Error, Result};
use crate::extract::extract_jobs;
use crate::fetch::{FetchRequest, SourceFetcher};
use crate::merge::{SourceJobs, merge, validate};
use crate::release::{DEFAULT_RELEASE_JOB_ID, ReleaseJob};
use crate::rewrite::{CheckoutRecognizer, CheckoutTarget, CompositionWarning, rewrite_graph};
use futures::future::join_all;
use tracing::{debug, info};

/// One upstream workflow file taking part in the composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    /// Short label used in diagnostics (e.g. "windows")
    pub label: String,
    /// Workflow path relative to the upstream repository root
    pub path: String,
    /// Optional prefix qualifying every job identifier of this source
    pub job_prefix: Option<String>,
}

impl SourceSpec {
    /// Create a source without qualification.
    pub fn new(label: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
            job_prefix: None,
        }
    }

    /// Qualify this source's job identifiers with `prefix`.
    #[must_use]
    pub fn with_job_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.job_prefix = Some(prefix.into());
        self
    }
}

/// Inputs of a single composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionRequest {
    /// Upstream repository in `owner/name` form
    pub upstream: String,
    /// Upstream tag the sources are read at
    pub tag: String,
    /// Sources, in merge order
    pub sources: Vec<SourceSpec>,
    /// Where checkout steps are redirected
    pub target: CheckoutTarget,
}

/// Raw bytes of one fetched source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedSource {
    /// The source the bytes belong to
    pub spec: SourceSpec,
    /// Document exactly as fetched
    pub raw: Vec<u8>,
}

/// Result of a successful composition.
#[derive(Debug, Clone)]
pub struct Composition {
    /// The assembled workflow
    pub document: WorkflowDocument,
    /// Serialized workflow, header included
    pub yaml: String,
    /// Non-fatal findings
    pub warnings: Vec<CompositionWarning>,
    /// Every fetched upstream document, in source order
    pub sources: Vec<FetchedSource>,
}

/// How the release job is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ReleasePolicy {
    /// No release job is appended.
    Disabled,
    /// The built-in release job with the given identifier.
    Standard {
        /// Job identifier
        id: String,
    },
    /// A caller-supplied job.
    Custom(ReleaseJob),
}

impl Default for ReleasePolicy {
    fn default() -> Self {
        Self::Standard {
            id: DEFAULT_RELEASE_JOB_ID.to_string(),
        }
    }
}

/// Composes upstream workflows into one build workflow.
#[derive(Debug, Clone)]
pub struct Composer {
    envelope: EnvelopeConfig,
    recognizer: CheckoutRecognizer,
    artifact_rules: Vec<ArtifactRule>,
    release: ReleasePolicy,
}

impl Composer {
    /// Create a composer with the default recognizer, no artifact rules and
    /// the built-in release job.
    #[must_use]
    pub fn new(envelope: EnvelopeConfig) -> Self {
        Self {
            envelope,
            recognizer: CheckoutRecognizer::default(),
            artifact_rules: Vec::new(),
            release: ReleasePolicy::default(),
        }
    }

    /// Set the actions treated as checkout steps.
    #[must_use]
    pub fn with_recognizer(mut self, recognizer: CheckoutRecognizer) -> Self {
        self.recognizer = recognizer;
        self
    }

    /// Set the artifact upload rules.
    #[must_use]
    pub fn with_artifact_rules(mut self, rules: Vec<ArtifactRule>) -> Self {
        self.artifact_rules = rules;
        self
    }

    /// Set the release job policy.
    #[must_use]
    pub fn with_release(mut self, release: ReleasePolicy) -> Self {
        self.release = release;
        self
    }

    /// Envelope settings used for assembly.
    #[must_use]
    pub const fn envelope(&self) -> &EnvelopeConfig {
        &self.envelope
    }

    /// Fetch every source concurrently and compose them.
    ///
    /// All fetches must succeed; the first failing source (in source order)
    /// aborts the composition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] if any fetch fails, or any error of
    /// [`Composer::compose_fetched`].
    pub async fn compose(
        &self,
        fetcher: &dyn SourceFetcher,
        request: &CompositionRequest,
    ) -> Result<Composition> {
        info!(
            upstream = %request.upstream,
            tag = %request.tag,
            sources = request.sources.len(),
            "Fetching upstream workflows"
        );

        let fetches = request.sources.iter().map(|spec| async move {
            let fetch = FetchRequest::new(&request.upstream, &request.tag, &spec.path);
            match fetcher.fetch(&fetch).await {
                Ok(raw) => {
                    debug!(source = %spec.label, bytes = raw.len(), "Fetched workflow");
                    Ok(FetchedSource {
                        spec: spec.clone(),
                        raw,
                    })
                }
                Err(source) => Err(Error::Fetch {
                    label: spec.label.clone(),
                    path: spec.path.clone(),
                    source,
                }),
            }
        });

        let fetched = join_all(fetches)
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        self.compose_fetched(request, fetched)
    }

    /// Compose already fetched sources.
    ///
    /// # Errors
    ///
    /// Returns the first parse, shape, collision or dependency error found.
    /// Checkout steps that cannot be found are reported as warnings instead.
    pub fn compose_fetched(
        &self,
        request: &CompositionRequest,
        fetched: Vec<FetchedSource>,
    ) -> Result<Composition> {
        let mut extracted = Vec::with_capacity(fetched.len());
        for source in &fetched {
            let label = source.spec.label.as_str();
            let document = WorkflowDocument::parse(label, &source.raw)?;
            let jobs = SourceJobs::new(label, extract_jobs(&document, label)?);
            extracted.push(match source.spec.job_prefix.as_deref() {
                Some(prefix) => jobs.qualified(prefix),
                None => jobs,
            });
        }

        let merged = merge(extracted)?;
        validate(&merged)?;

        let (mut merged, warnings) = rewrite_graph(merged, &self.recognizer, &request.target);

        for (id, job) in &mut merged {
            if let Some(rule) =
                inject_artifact_upload(id, &mut job.definition, &self.artifact_rules)
            {
                debug!(job = %id, artifact = %rule.name, "Added artifact upload step");
            }
        }

        let release = match &self.release {
            ReleasePolicy::Disabled => None,
            ReleasePolicy::Standard { id } => Some(ReleaseJob::standard(
                id.as_str(),
                &self.envelope.tag_expression(&request.tag),
            )),
            ReleasePolicy::Custom(job) => Some(job.clone()),
        };
        if let Some(release) = release {
            release.attach(&mut merged)?;
        }

        let workflow = MergedWorkflow {
            tag: request.tag.clone(),
            jobs: merged,
        };
        let document = assemble(&workflow, &self.envelope)?;
        let yaml = render_with_header(&document, &header(request))?;

        info!(
            tag = %request.tag,
            jobs = workflow.jobs.len(),
            warnings = warnings.len(),
            "Composed build workflow"
        );

        Ok(Composition {
            document,
            yaml,
            warnings,
            sources: fetched,
        })
    }
}

fn header(request: &CompositionRequest) -> String {
    let labels: Vec<&str> = request.sources.iter().map(|s| s.label.as_str()).collect();
    format!(
        "Generated by forkbuild from {}@{} ({})\nDo not edit manually; regenerate with `forkbuild prepare {}`",
        request.upstream,
        request.tag,
        labels.join(", "),
        request.tag
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::StaticFetcher;

    const WINDOWS: &str = "\
name: windows
on: [push]
jobs:
  build:
    runs-on: windows-2022
    steps:
      - uses: actions/checkout@v4
      - run: msbuild tracy.sln
";

    const LINUX: &str = "\
name: linux
on: [push]
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4
      - run: make
";

    fn request(sources: Vec<SourceSpec>) -> CompositionRequest {
        CompositionRequest {
            upstream: "wolfpld/tracy".to_string(),
            tag: "v0.12.2".to_string(),
            sources,
            target: CheckoutTarget::new("fork/tracy", "build-v0.12.2"),
        }
    }

    fn fetcher() -> StaticFetcher {
        StaticFetcher::new()
            .with_document("windows.yml", WINDOWS)
            .with_document("linux.yml", LINUX)
    }

    #[tokio::test]
    async fn test_collision_is_fatal_by_default() {
        let composer = Composer::new(EnvelopeConfig::new("Build"));
        let err = composer
            .compose(
                &fetcher(),
                &request(vec![
                    SourceSpec::new("windows", "windows.yml"),
                    SourceSpec::new("linux", "linux.yml"),
                ]),
            )
            .await
            .unwrap_err();

        assert!(
            matches!(err, Error::DuplicateJobIdentifier { ref id, ref sources } if id == "build" && sources == &["windows", "linux"])
        );
    }

    #[tokio::test]
    async fn test_prefix_resolves_collision() {
        let composer = Composer::new(EnvelopeConfig::new("Build"));
        let composition = composer
            .compose(
                &fetcher(),
                &request(vec![
                    SourceSpec::new("windows", "windows.yml").with_job_prefix("windows-"),
                    SourceSpec::new("linux", "linux.yml").with_job_prefix("linux-"),
                ]),
            )
            .await
            .unwrap();

        let jobs = composition.document.section("jobs").unwrap();
        let jobs = jobs.as_mapping().unwrap();
        let ids: Vec<_> = jobs.keys().filter_map(|k| k.as_str()).collect();
        assert_eq!(ids, ["windows-build", "linux-build", "create-release"]);
        assert_eq!(composition.sources.len(), 2);
        assert!(composition.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_missing_source_aborts() {
        let composer = Composer::new(EnvelopeConfig::new("Build"));
        let err = composer
            .compose(
                &fetcher(),
                &request(vec![
                    SourceSpec::new("windows", "windows.yml"),
                    SourceSpec::new("macos", "macos.yml"),
                ]),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Fetch { ref label, .. } if label == "macos"));
    }

    #[test]
    fn test_release_disabled() {
        let composer =
            Composer::new(EnvelopeConfig::new("Build")).with_release(ReleasePolicy::Disabled);
        let composition = composer
            .compose_fetched(
                &request(vec![SourceSpec::new("linux", "linux.yml")]),
                vec![FetchedSource {
                    spec: SourceSpec::new("linux", "linux.yml"),
                    raw: LINUX.as_bytes().to_vec(),
                }],
            )
            .unwrap();

        assert!(!composition.yaml.contains("create-release"));
        assert!(composition.yaml.starts_with("# Generated by forkbuild from wolfpld/tracy@v0.12.2 (linux)\n"));
    }

    #[test]
    fn test_artifact_rules_applied() {
        let composer = Composer::new(EnvelopeConfig::new("Build"))
            .with_release(ReleasePolicy::Disabled)
            .with_artifact_rules(vec![ArtifactRule::new("tracy-linux", "profiler/build/tracy")]);
        let composition = composer
            .compose_fetched(
                &request(vec![SourceSpec::new("linux", "linux.yml")]),
                vec![FetchedSource {
                    spec: SourceSpec::new("linux", "linux.yml"),
                    raw: LINUX.as_bytes().to_vec(),
                }],
            )
            .unwrap();

        assert!(composition.yaml.contains("actions/upload-artifact@v4"));
        assert!(composition.yaml.contains("name: tracy-linux"));
    }
}
