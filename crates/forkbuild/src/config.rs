//! `forkbuild.toml` configuration.
//!
//! ```toml
//! [upstream]
//! repository = "wolfpld/tracy"
//!
//! [fork]
//! repository = "me/tracy-builds"
//!
//! [[sources]]
//! label = "build"
//! path = ".github/workflows/build.yml"
//! job_prefix = "tracy-"
//!
//! [envelope]
//! name = "Combined Tracy Build"
//! tag_input = "tracy_tag"
//! ```
//!
//! String templates may reference `{tag}`, `{branch}`, `{upstream}` and
//! `{fork}`.

use crate::error::{Error, Result};
use forkbuild_github::{DispatchRequest, Repository};
use forkbuild_workflow::{
    ArtifactRule, CheckoutRecognizer, CheckoutTarget, Composer, CompositionRequest, Concurrency,
    DEFAULT_RELEASE_JOB_ID, EnvelopeConfig, Permissions, ReleaseJob, ReleasePolicy, SourceSpec,
};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "forkbuild.toml";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Repository the workflows are read from
    pub upstream: UpstreamConfig,
    /// Repository the build runs on
    pub fork: ForkConfig,
    /// Upstream workflow files, in merge order
    pub sources: Vec<SourceConfig>,
    /// Checkout redirection
    #[serde(default)]
    pub checkout: CheckoutConfig,
    /// Generated workflow envelope
    pub envelope: EnvelopeSettings,
    /// Artifact upload rules
    #[serde(default)]
    pub artifacts: Vec<ArtifactRule>,
    /// Release job
    #[serde(default)]
    pub release: ReleaseConfig,
}

/// `[upstream]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Upstream repository (`owner/name`)
    pub repository: Repository,
    /// Alternative raw content host
    #[serde(default)]
    pub raw_base_url: Option<String>,
    /// Send the GitHub token to `raw_base_url` too
    #[serde(default)]
    pub raw_base_url_token: bool,
    /// Read workflows from a local checkout instead of the network
    #[serde(default)]
    pub local_dir: Option<PathBuf>,
}

/// `[fork]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForkConfig {
    /// Fork repository (`owner/name`)
    pub repository: Repository,
    /// Git remote pointing at the fork
    #[serde(default = "default_remote")]
    pub remote: String,
    /// Branch build branches are created from
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
    /// Name of the build branch
    #[serde(default = "default_branch_template")]
    pub branch_template: String,
    /// Directory receiving copies of the upstream workflows
    #[serde(default = "default_upstream_copy_dir")]
    pub upstream_copy_dir: PathBuf,
}

/// One `[[sources]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Label used in diagnostics
    pub label: String,
    /// Workflow path in the upstream repository
    pub path: String,
    /// Prefix qualifying the source's job identifiers
    #[serde(default)]
    pub job_prefix: Option<String>,
}

impl SourceConfig {
    /// File name of this source's copy under `fork.upstream_copy_dir`.
    #[must_use]
    pub fn copy_name(&self) -> String {
        copy_name(&self.label, &self.path)
    }
}

/// File name of an upstream copy: the workflow's own file name, or
/// `{label}.yml` when the path has none.
#[must_use]
pub fn copy_name(label: &str, path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .map_or_else(|| format!("{label}.yml"), str::to_string)
}

/// `[checkout]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckoutConfig {
    /// Actions treated as checkout steps
    #[serde(default)]
    pub recognizers: CheckoutRecognizer,
    /// Repository template for redirected checkouts
    #[serde(default = "default_checkout_repository")]
    pub repository: String,
    /// Ref template for redirected checkouts
    #[serde(rename = "ref", default = "default_checkout_ref")]
    pub reference: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            recognizers: CheckoutRecognizer::default(),
            repository: default_checkout_repository(),
            reference: default_checkout_ref(),
        }
    }
}

/// `[envelope]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvelopeSettings {
    /// Workflow name
    pub name: String,
    /// File name under `.github/workflows`
    #[serde(default = "default_file_name")]
    pub file_name: String,
    /// Dispatch input carrying the tag
    #[serde(default = "default_tag_input")]
    pub tag_input: String,
    /// Default token permissions
    #[serde(default)]
    pub permissions: Option<Permissions>,
    /// Concurrency group
    #[serde(default)]
    pub concurrency: Option<Concurrency>,
}

/// `[release]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReleaseConfig {
    /// Append a release job
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Release job identifier
    #[serde(default = "default_release_job_id")]
    pub job_id: String,
    /// YAML file holding a custom release job keyed by `job_id`
    #[serde(default)]
    pub job_file: Option<PathBuf>,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            job_id: default_release_job_id(),
            job_file: None,
        }
    }
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_base_branch() -> String {
    "main".to_string()
}

fn default_branch_template() -> String {
    "build-{tag}".to_string()
}

fn default_upstream_copy_dir() -> PathBuf {
    PathBuf::from("upstream-workflows")
}

fn default_checkout_repository() -> String {
    "{fork}".to_string()
}

fn default_checkout_ref() -> String {
    "{branch}".to_string()
}

fn default_file_name() -> String {
    "build-combined.yml".to_string()
}

fn default_tag_input() -> String {
    "tag".to_string()
}

fn default_release_job_id() -> String {
    DEFAULT_RELEASE_JOB_ID.to_string()
}

const fn default_true() -> bool {
    true
}

/// Values substituted into configuration templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateContext {
    /// Upstream tag
    pub tag: String,
    /// Build branch
    pub branch: String,
    /// Upstream repository
    pub upstream: String,
    /// Fork repository
    pub fork: String,
}

impl TemplateContext {
    /// Substitute every known placeholder in `template`.
    #[must_use]
    pub fn expand(&self, template: &str) -> String {
        template
            .replace("{tag}", &self.tag)
            .replace("{branch}", &self.branch)
            .replace("{upstream}", &self.upstream)
            .replace("{fork}", &self.fork)
    }
}

impl Config {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigRead`] if the file cannot be read or parsed and
    /// [`Error::InvalidConfig`] if it fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let read_error = |message: String| Error::ConfigRead {
            path: path.to_path_buf(),
            message,
        };

        let content = std::fs::read_to_string(path).map_err(|e| read_error(e.to_string()))?;
        let config: Self = toml::from_str(&content).map_err(|e| read_error(e.to_string()))?;
        config.validate()?;

        debug!(
            path = %path.display(),
            sources = config.sources.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Check the constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(Error::invalid_config("at least one [[sources]] entry is required"));
        }

        let mut labels = HashSet::new();
        let mut copies = HashMap::new();
        for source in &self.sources {
            if source.label.trim().is_empty() {
                return Err(Error::invalid_config("source labels must not be empty"));
            }
            if !labels.insert(source.label.as_str()) {
                return Err(Error::invalid_config(format!(
                    "source label '{}' is used more than once",
                    source.label
                )));
            }
            if source.path.trim().is_empty() {
                return Err(Error::invalid_config(format!(
                    "source '{}' has an empty path",
                    source.label
                )));
            }
            if source.job_prefix.as_deref().is_some_and(str::is_empty) {
                return Err(Error::invalid_config(format!(
                    "source '{}' has an empty job_prefix; remove it to keep job identifiers unchanged",
                    source.label
                )));
            }
            if let Some(other) = copies.insert(source.copy_name(), source.label.as_str()) {
                return Err(Error::invalid_config(format!(
                    "sources '{other}' and '{}' would both be copied to {}; rename one of the upstream files or drop a source",
                    source.label,
                    self.fork.upstream_copy_dir.join(source.copy_name()).display()
                )));
            }
        }

        if self.checkout.recognizers.actions().is_empty() {
            return Err(Error::invalid_config(
                "checkout.recognizers must name at least one action",
            ));
        }

        if !self.fork.branch_template.contains("{tag}") {
            return Err(Error::invalid_config(
                "fork.branch_template must contain {tag}",
            ));
        }

        let file_name = &self.envelope.file_name;
        if file_name.contains('/')
            || !(file_name.ends_with(".yml") || file_name.ends_with(".yaml"))
        {
            return Err(Error::invalid_config(format!(
                "envelope.file_name '{file_name}' must be a .yml or .yaml file name"
            )));
        }

        if self.envelope.tag_input.trim().is_empty() {
            return Err(Error::invalid_config("envelope.tag_input must not be empty"));
        }

        Ok(())
    }

    /// Build branch for `tag`.
    #[must_use]
    pub fn branch_name(&self, tag: &str) -> String {
        TemplateContext {
            tag: tag.to_string(),
            branch: String::new(),
            upstream: self.upstream.repository.to_string(),
            fork: self.fork.repository.to_string(),
        }
        .expand(&self.fork.branch_template)
    }

    /// Template values for `tag`.
    #[must_use]
    pub fn context(&self, tag: &str) -> TemplateContext {
        TemplateContext {
            tag: tag.to_string(),
            branch: self.branch_name(tag),
            upstream: self.upstream.repository.to_string(),
            fork: self.fork.repository.to_string(),
        }
    }

    /// Where checkout steps are redirected for `tag`.
    #[must_use]
    pub fn checkout_target(&self, tag: &str) -> CheckoutTarget {
        let context = self.context(tag);
        CheckoutTarget::new(
            context.expand(&self.checkout.repository),
            context.expand(&self.checkout.reference),
        )
    }

    /// Composition inputs for `tag`.
    #[must_use]
    pub fn composition_request(&self, tag: &str) -> CompositionRequest {
        CompositionRequest {
            upstream: self.upstream.repository.to_string(),
            tag: tag.to_string(),
            sources: self
                .sources
                .iter()
                .map(|source| SourceSpec {
                    label: source.label.clone(),
                    path: source.path.clone(),
                    job_prefix: source.job_prefix.clone(),
                })
                .collect(),
            target: self.checkout_target(tag),
        }
    }

    /// Envelope settings for the composer.
    #[must_use]
    pub fn envelope_config(&self) -> EnvelopeConfig {
        EnvelopeConfig {
            name: self.envelope.name.clone(),
            tag_input: self.envelope.tag_input.clone(),
            permissions: self.envelope.permissions,
            concurrency: self.envelope.concurrency.clone(),
        }
    }

    /// Build the composer. Relative paths resolve against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the custom release job file cannot be read or
    /// does not define `release.job_id`.
    pub fn composer(&self, base_dir: &Path) -> Result<Composer> {
        let release = if !self.release.enabled {
            ReleasePolicy::Disabled
        } else if let Some(job_file) = &self.release.job_file {
            let path = base_dir.join(job_file);
            let raw = std::fs::read(&path).map_err(|e| Error::io(&path, e))?;
            ReleasePolicy::Custom(ReleaseJob::from_yaml(&self.release.job_id, &raw)?)
        } else {
            ReleasePolicy::Standard {
                id: self.release.job_id.clone(),
            }
        };

        Ok(Composer::new(self.envelope_config())
            .with_recognizer(self.checkout.recognizers.clone())
            .with_artifact_rules(self.artifacts.clone())
            .with_release(release))
    }

    /// Path of the generated workflow relative to the repository root.
    #[must_use]
    pub fn workflow_path(&self) -> PathBuf {
        Path::new(".github/workflows").join(&self.envelope.file_name)
    }

    /// Dispatch event starting the build of `tag`.
    #[must_use]
    pub fn dispatch_request(&self, tag: &str) -> DispatchRequest {
        DispatchRequest::new(
            self.fork.repository.clone(),
            self.envelope.file_name.clone(),
            self.branch_name(tag),
        )
        .with_input(self.envelope.tag_input.clone(), tag)
    }
}
