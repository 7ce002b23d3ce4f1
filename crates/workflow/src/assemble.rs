//! Workflow assembly.

use crate::document::{JOBS_KEY, WorkflowDocument};
use crate::envelope::EnvelopeConfig;
use crate::error::{Error, Result};
use crate::merge::MergedGraph;
use serde::Serialize;
use serde_yaml::{Mapping, Value};

/// The merged, rewritten job graph of one upstream tag.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedWorkflow {
    /// Upstream tag the workflow builds
    pub tag: String,
    /// Globally unique jobs, in merge order
    pub jobs: MergedGraph,
}

/// Wrap the merged jobs in a fresh envelope.
///
/// The envelope always comes from `envelope`; names and triggers of the
/// source documents never reach the output.
///
/// # Errors
///
/// Returns [`Error::Serialization`] if an envelope section cannot be
/// converted to YAML.
pub fn assemble(workflow: &MergedWorkflow, envelope: &EnvelopeConfig) -> Result<WorkflowDocument> {
    let mut document = WorkflowDocument::new();
    document.insert_section("name", Value::String(envelope.name.clone()));
    document.insert_section("on", to_value(&envelope.triggers(&workflow.tag))?);
    if let Some(permissions) = &envelope.permissions {
        document.insert_section("permissions", to_value(permissions)?);
    }
    if let Some(concurrency) = &envelope.concurrency {
        document.insert_section("concurrency", to_value(concurrency)?);
    }

    let mut jobs = Mapping::with_capacity(workflow.jobs.len());
    for (id, job) in &workflow.jobs {
        jobs.insert(Value::String(id.clone()), job.definition.to_value());
    }
    document.insert_section(JOBS_KEY, Value::Mapping(jobs));

    Ok(document)
}

/// Serialize `document` with a comment header.
///
/// # Errors
///
/// Returns [`Error::Serialization`] if the YAML emitter fails.
pub fn render_with_header(document: &WorkflowDocument, header: &str) -> Result<String> {
    let yaml = document.to_yaml()?;
    let header: String = header.lines().map(|line| format!("# {line}\n")).collect();
    Ok(format!("{header}\n{yaml}"))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_yaml::to_value(value).map_err(|e| Error::serialization(e.to_string()))
}
