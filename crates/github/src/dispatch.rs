//! Workflow dispatch.
//!
//! Starts the composed workflow on the fork's build branch through the
//! GitHub Actions API.

use crate::error::{Error, Result};
use crate::repository::Repository;
use octocrab::Octocrab;
use serde_json::{Map, Value};
use tracing::info;

/// A `workflow_dispatch` event to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    /// Repository holding the workflow
    pub repository: Repository,
    /// Workflow file name (e.g. "build-combined.yml")
    pub workflow: String,
    /// Branch the workflow runs on
    pub reference: String,
    /// Workflow inputs, in declaration order
    pub inputs: Vec<(String, String)>,
}

impl DispatchRequest {
    /// Create a dispatch without inputs.
    pub fn new(
        repository: Repository,
        workflow: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            workflow: workflow.into(),
            reference: reference.into(),
            inputs: Vec::new(),
        }
    }

    /// Add a workflow input.
    #[must_use]
    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inputs.push((name.into(), value.into()));
        self
    }

    /// Inputs as the JSON object expected by the API.
    #[must_use]
    pub fn inputs_json(&self) -> Value {
        let inputs: Map<String, Value> = self
            .inputs
            .iter()
            .map(|(name, value)| (name.clone(), Value::String(value.clone())))
            .collect();
        Value::Object(inputs)
    }

    /// Equivalent `gh` CLI invocation, for manual dispatch.
    #[must_use]
    pub fn gh_command(&self) -> String {
        let mut command = format!(
            "gh workflow run {} --repo {} --ref {}",
            self.workflow, self.repository, self.reference
        );
        for (name, value) in &self.inputs {
            command.push_str(&format!(" -f {name}={value}"));
        }
        command
    }
}

/// Sends `workflow_dispatch` events.
pub struct WorkflowDispatcher {
    client: Octocrab,
}

impl WorkflowDispatcher {
    /// Create a dispatcher authenticated with `token`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingToken`] for an empty token, or
    /// [`Error::Client`] if the API client cannot be built.
    pub fn new(token: &str) -> Result<Self> {
        if token.is_empty() {
            return Err(Error::MissingToken);
        }
        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .build()
            .map_err(|e| Error::client(e.to_string()))?;
        Ok(Self { client })
    }

    /// Create a dispatcher from `GITHUB_TOKEN` or `GH_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingToken`] if neither variable is set.
    pub fn from_env() -> Result<Self> {
        let token = crate::token::token_from_env().ok_or(Error::MissingToken)?;
        Self::new(&token)
    }

    /// Dispatch the workflow.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dispatch`] if GitHub rejects the event.
    pub async fn dispatch(&self, request: &DispatchRequest) -> Result<()> {
        info!(
            repository = %request.repository,
            workflow = %request.workflow,
            reference = %request.reference,
            "Dispatching workflow"
        );

        self.client
            .actions()
            .create_workflow_dispatch(
                &request.repository.owner,
                &request.repository.name,
                &request.workflow,
                &request.reference,
            )
            .inputs(request.inputs_json())
            .send()
            .await
            .map_err(|e| Error::Dispatch {
                repository: request.repository.to_string(),
                workflow: request.workflow.clone(),
                reference: request.reference.clone(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> DispatchRequest {
        DispatchRequest::new(
            Repository::new("me", "tracy"),
            "build-combined.yml",
            "build-v0.12.2",
        )
        .with_input("tag", "v0.12.2")
    }

    #[test]
    fn test_inputs_json() {
        assert_eq!(
            request().inputs_json(),
            serde_json::json!({ "tag": "v0.12.2" })
        );
    }

    #[test]
    fn test_gh_command() {
        assert_eq!(
            request().gh_command(),
            "gh workflow run build-combined.yml --repo me/tracy --ref build-v0.12.2 -f tag=v0.12.2"
        );
    }

    #[test]
    fn test_empty_token_rejected() {
        assert!(matches!(
            WorkflowDispatcher::new(""),
            Err(Error::MissingToken)
        ));
    }

    #[test]
    fn test_from_env_without_token() {
        temp_env::with_vars_unset(["GITHUB_TOKEN", "GH_TOKEN"], || {
            assert!(matches!(
                WorkflowDispatcher::from_env(),
                Err(Error::MissingToken)
            ));
        });
    }
}
