//! Workflow envelope schema.
//!
//! The envelope is the top-level part of the composed workflow: its name,
//! triggers, permissions and concurrency. It is always generated from the
//! caller's configuration; source documents' own triggers are discarded.
//! See: <https://docs.github.com/en/actions/using-workflows/workflow-syntax-for-github-actions>

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

fn default_tag_input() -> String {
    "tag".to_string()
}

/// Caller-supplied envelope settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeConfig {
    /// Workflow name displayed in the GitHub UI
    pub name: String,

    /// Name of the `workflow_dispatch` input carrying the upstream tag
    #[serde(default = "default_tag_input")]
    pub tag_input: String,

    /// Default permissions for `GITHUB_TOKEN`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Permissions>,

    /// Concurrency settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<Concurrency>,
}

impl EnvelopeConfig {
    /// Create an envelope configuration with default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag_input: default_tag_input(),
            permissions: None,
            concurrency: None,
        }
    }

    /// Set the dispatch input name.
    #[must_use]
    pub fn with_tag_input(mut self, input: impl Into<String>) -> Self {
        self.tag_input = input.into();
        self
    }

    /// Set the default permissions.
    #[must_use]
    pub const fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = Some(permissions);
        self
    }

    /// Set the concurrency group.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    /// Build the manual-dispatch trigger for `tag`.
    ///
    /// The tag becomes the default of an optional string input, so the
    /// workflow can be re-run for the same tag from the UI.
    #[must_use]
    pub fn triggers(&self, tag: &str) -> WorkflowTriggers {
        let mut inputs = IndexMap::new();
        inputs.insert(
            self.tag_input.clone(),
            WorkflowInput {
                description: "Upstream tag to build".to_string(),
                required: Some(false),
                default: Some(tag.to_string()),
                input_type: Some("string".to_string()),
            },
        );

        WorkflowTriggers {
            workflow_dispatch: Some(WorkflowDispatchTrigger { inputs }),
        }
    }

    /// Expression resolving to the dispatched tag, falling back to `tag`.
    ///
    /// Quotes in `tag` are doubled, as expression string literals require.
    #[must_use]
    pub fn tag_expression(&self, tag: &str) -> String {
        let literal = tag.replace('\'', "''");
        format!(
            "${{{{ github.event.inputs.{} || '{literal}' }}}}",
            self.tag_input
        )
    }
}

/// Workflow trigger configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTriggers {
    /// Manual trigger with optional inputs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_dispatch: Option<WorkflowDispatchTrigger>,
}

/// Manual workflow dispatch trigger configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDispatchTrigger {
    /// Input parameters for manual trigger
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub inputs: IndexMap<String, WorkflowInput>,
}

/// Input definition for `workflow_dispatch` triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInput {
    /// Human-readable description of the input
    pub description: String,

    /// Whether the input is required
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    /// Default value for the input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Input type (string, boolean, choice, environment)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
}

/// Concurrency configuration to prevent duplicate workflow runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Concurrency {
    /// Concurrency group name (use expressions like `${{ github.workflow }}`)
    pub group: String,

    /// Whether to cancel in-progress runs when a new run is triggered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_in_progress: Option<bool>,
}

/// `GITHUB_TOKEN` permissions configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Permissions {
    /// Repository contents permission
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<PermissionLevel>,

    /// GitHub Actions permission
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<PermissionLevel>,

    /// GitHub Packages permission
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages: Option<PermissionLevel>,

    /// OIDC token permission (for cloud authentication)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<PermissionLevel>,
}

/// Permission level for `GITHUB_TOKEN` scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    /// Read-only access
    Read,
    /// Read and write access
    Write,
    /// No access
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triggers_serialize_as_dispatch_only() {
        let envelope = EnvelopeConfig::new("Combined Build").with_tag_input("tracy_tag");
        let yaml = serde_yaml::to_string(&envelope.triggers("v0.12.2")).unwrap();

        assert!(yaml.contains("workflow_dispatch:"));
        assert!(yaml.contains("tracy_tag:"));
        assert!(yaml.contains("default: v0.12.2"));
        assert!(yaml.contains("type: string"));
        assert!(!yaml.contains("push"));
    }

    #[test]
    fn test_tag_expression() {
        let envelope = EnvelopeConfig::new("x").with_tag_input("tracy_tag");
        assert_eq!(
            envelope.tag_expression("v0.12.2"),
            "${{ github.event.inputs.tracy_tag || 'v0.12.2' }}"
        );
    }

    #[test]
    fn test_tag_expression_escapes_quotes() {
        let envelope = EnvelopeConfig::new("x");
        assert_eq!(
            envelope.tag_expression("it's-1.0"),
            "${{ github.event.inputs.tag || 'it''s-1.0' }}"
        );
    }

    #[test]
    fn test_permissions_use_kebab_case() {
        let permissions = Permissions {
            contents: Some(PermissionLevel::Write),
            id_token: Some(PermissionLevel::Write),
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&permissions).unwrap();
        assert!(yaml.contains("contents: write"));
        assert!(yaml.contains("id-token: write"));
    }

    #[test]
    fn test_concurrency_serialization() {
        let concurrency = Concurrency {
            group: "${{ github.workflow }}-${{ github.ref }}".to_string(),
            cancel_in_progress: Some(true),
        };
        let yaml = serde_yaml::to_string(&concurrency).unwrap();
        assert!(yaml.contains("cancel-in-progress: true"));
    }

    #[test]
    fn test_envelope_defaults_when_deserialized() {
        let envelope: EnvelopeConfig = serde_yaml::from_str("name: Build\n").unwrap();
        assert_eq!(envelope.tag_input, "tag");
        assert!(envelope.permissions.is_none());
    }
}
