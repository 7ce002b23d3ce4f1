//! Artifact upload injection.
//!
//! Upstream build jobs do not always upload what they build. The release job
//! needs every platform's binaries, so jobs matching a configured rule get an
//! upload step appended. Jobs that already upload artifacts are left alone.

use crate::document::{JobDefinition, StepDefinition};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// Action identifier of the artifact upload action.
pub const UPLOAD_ARTIFACT_ACTION: &str = "actions/upload-artifact";

const UPLOAD_ARTIFACT_VERSION: &str = "v4";

/// Rule deciding which artifact a job uploads.
///
/// Every matcher that is set must match. A rule with no matcher applies to
/// every job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRule {
    /// Artifact name (e.g. "tracy-windows")
    pub name: String,
    /// Path glob(s), one per line
    pub path: String,
    /// Case-insensitive substring of `runs-on` or `strategy.matrix.os`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner_contains: Option<String>,
    /// Case-insensitive substring of the job identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_contains: Option<String>,
    /// Job key that must be present (e.g. "container" for Linux images)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_has_key: Option<String>,
}

impl ArtifactRule {
    /// Create a rule that matches every job.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            runner_contains: None,
            job_contains: None,
            job_has_key: None,
        }
    }

    /// Restrict the rule to jobs whose runner mentions `needle`.
    #[must_use]
    pub fn for_runner(mut self, needle: impl Into<String>) -> Self {
        self.runner_contains = Some(needle.into());
        self
    }

    /// Restrict the rule to jobs whose identifier mentions `needle`.
    #[must_use]
    pub fn for_job(mut self, needle: impl Into<String>) -> Self {
        self.job_contains = Some(needle.into());
        self
    }

    /// Restrict the rule to jobs declaring `key` (e.g. "container").
    #[must_use]
    pub fn for_jobs_with(mut self, key: impl Into<String>) -> Self {
        self.job_has_key = Some(key.into());
        self
    }

    /// Whether this rule applies to the job `id`.
    #[must_use]
    pub fn matches(&self, id: &str, job: &JobDefinition) -> bool {
        let runner_ok = self.runner_contains.as_deref().is_none_or(|needle| {
            let needle = needle.to_lowercase();
            let mut runner = String::new();
            if let Some(runs_on) = job.runs_on() {
                collect_text(runs_on, &mut runner);
            }
            if let Some(os) = job.matrix().and_then(|m| m.get("os")) {
                collect_text(os, &mut runner);
            }
            runner.to_lowercase().contains(&needle)
        });

        let job_ok = self
            .job_contains
            .as_deref()
            .is_none_or(|needle| id.to_lowercase().contains(&needle.to_lowercase()));

        let key_ok = self
            .job_has_key
            .as_deref()
            .is_none_or(|key| job.get(key).is_some());

        runner_ok && job_ok && key_ok
    }
}

/// Whether the job already uploads an artifact.
#[must_use]
pub fn has_artifact_upload(job: &JobDefinition) -> bool {
    job.steps().iter().any(|step| {
        step.uses()
            .and_then(|uses| uses.split('@').next())
            .is_some_and(|action| action.eq_ignore_ascii_case(UPLOAD_ARTIFACT_ACTION))
    })
}

/// Append an upload step to `job` using the first rule that matches.
///
/// Returns the rule that was applied. Jobs without steps (e.g. reusable
/// workflow calls) and jobs that already upload are never modified.
pub fn inject_artifact_upload<'r>(
    id: &str,
    job: &mut JobDefinition,
    rules: &'r [ArtifactRule],
) -> Option<&'r ArtifactRule> {
    if !job.has_steps() || has_artifact_upload(job) {
        return None;
    }

    let rule = rules.iter().find(|rule| rule.matches(id, job))?;
    job.push_step(
        StepDefinition::uses_action(format!("{UPLOAD_ARTIFACT_ACTION}@{UPLOAD_ARTIFACT_VERSION}"))
            .with_name("Upload artifacts")
            .with_input("name", rule.name.as_str())
            .with_input("path", rule.path.as_str()),
    );
    Some(rule)
}

fn collect_text(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => {
            out.push_str(s);
            out.push(' ');
        }
        Value::Sequence(items) => items.iter().for_each(|item| collect_text(item, out)),
        Value::Mapping(map) => map.values().for_each(|item| collect_text(item, out)),
        Value::Tagged(tagged) => collect_text(&tagged.value, out),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Mapping;

    fn job(yaml: &str) -> JobDefinition {
        let mapping: Mapping = serde_yaml::from_str(yaml).unwrap();
        JobDefinition::from_mapping(mapping).unwrap()
    }

    fn rules() -> Vec<ArtifactRule> {
        vec![
            ArtifactRule::new("tracy-windows", "**/*.exe").for_runner("windows"),
            ArtifactRule::new("tracy-macos", "**/Tracy-release").for_runner("macos"),
            ArtifactRule::new("tracy-linux", "**/Tracy-release").for_job("linux"),
        ]
    }

    #[test]
    fn test_matches_runs_on() {
        let mut j = job("runs-on: windows-2022\nsteps:\n  - run: build\n");
        let rules = rules();
        let applied = inject_artifact_upload("build", &mut j, &rules).unwrap();
        assert_eq!(applied.name, "tracy-windows");

        let upload = j.steps().last().unwrap();
        assert_eq!(upload.uses(), Some("actions/upload-artifact@v4"));
        assert_eq!(upload.input("name"), Some(&Value::from("tracy-windows")));
        assert_eq!(upload.input("path"), Some(&Value::from("**/*.exe")));
    }

    #[test]
    fn test_matches_matrix_os() {
        let mut j = job(
            "runs-on: ${{ matrix.os }}\nstrategy:\n  matrix:\n    os: [macos-14]\nsteps:\n  - run: build\n",
        );
        let rules = rules();
        let applied = inject_artifact_upload("build", &mut j, &rules).unwrap();
        assert_eq!(applied.name, "tracy-macos");
    }

    #[test]
    fn test_matches_job_identifier() {
        let mut j = job("runs-on: ubuntu-latest\ncontainer: archlinux\nsteps:\n  - run: make\n");
        let rules = rules();
        let applied = inject_artifact_upload("linux-build", &mut j, &rules).unwrap();
        assert_eq!(applied.name, "tracy-linux");
    }

    #[test]
    fn test_matches_container_job() {
        let rules = [
            ArtifactRule::new("tracy-windows", "**/*.exe").for_runner("windows"),
            ArtifactRule::new("tracy-linux", "**/Tracy-release").for_jobs_with("container"),
        ];

        let mut j = job("runs-on: ubuntu-latest\ncontainer: archlinux\nsteps:\n  - run: make\n");
        let applied = inject_artifact_upload("build", &mut j, &rules).unwrap();
        assert_eq!(applied.name, "tracy-linux");

        let mut j = job("runs-on: ubuntu-latest\nsteps:\n  - run: make\n");
        assert!(inject_artifact_upload("build", &mut j, &rules).is_none());
    }

    #[test]
    fn test_job_has_key_from_config() {
        let rule: ArtifactRule = serde_yaml::from_str(
            "name: tracy-linux\npath: '**/Tracy-release'\njob_has_key: container\n",
        )
        .unwrap();
        assert_eq!(rule.job_has_key.as_deref(), Some("container"));
    }

    #[test]
    fn test_existing_upload_is_kept() {
        let original = job(
            "runs-on: windows-latest\nsteps:\n  - uses: actions/upload-artifact@v3\n    with:\n      name: custom\n",
        );
        let mut j = original.clone();
        assert!(inject_artifact_upload("build", &mut j, &rules()).is_none());
        assert_eq!(j, original);
    }

    #[test]
    fn test_no_matching_rule() {
        let mut j = job("runs-on: self-hosted\nsteps:\n  - run: make\n");
        assert!(inject_artifact_upload("build", &mut j, &rules()).is_none());
        assert_eq!(j.steps().len(), 1);
    }

    #[test]
    fn test_job_without_steps_is_skipped() {
        let mut j = job("uses: ./.github/workflows/reusable.yml\n");
        assert!(inject_artifact_upload("call", &mut j, &[ArtifactRule::new("a", "b")]).is_none());
        assert!(!j.has_steps());
    }
}
