//! Job graph extraction.

use crate::document::{JOBS_KEY, JobDefinition, JobGraph, WorkflowDocument, value_kind};
use crate::error::{Error, Result};
use serde_yaml::Value;
use tracing::debug;

/// Isolate the job graph of a parsed workflow.
///
/// Only the minimal shape is checked: `jobs` must be a mapping from string
/// identifiers to mappings, `steps` (when present) a list of mappings and
/// `needs` (when present) an identifier or a list of identifiers.
///
/// # Errors
///
/// - [`Error::MissingJobGraph`] if the document has no `jobs` section
/// - [`Error::MalformedJobGraph`] if `jobs` is not a mapping
/// - [`Error::MalformedJob`] if an entry does not have the required shape
pub fn extract_jobs(document: &WorkflowDocument, label: &str) -> Result<JobGraph> {
    let jobs = match document.section(JOBS_KEY) {
        None | Some(Value::Null) => {
            return Err(Error::MissingJobGraph {
                label: label.to_string(),
            });
        }
        Some(Value::Mapping(jobs)) => jobs,
        Some(other) => {
            return Err(Error::MalformedJobGraph {
                label: label.to_string(),
                found: value_kind(other),
            });
        }
    };

    let mut graph = JobGraph::with_capacity(jobs.len());
    for (key, value) in jobs {
        let Some(id) = key.as_str() else {
            return Err(Error::malformed_job(
                label,
                render_key(key),
                format!("job identifiers must be strings, found {}", value_kind(key)),
            ));
        };

        let Value::Mapping(body) = value else {
            return Err(Error::malformed_job(
                label,
                id,
                format!("expected a mapping, found {}", value_kind(value)),
            ));
        };

        let job = JobDefinition::from_mapping(body.clone())
            .map_err(|reason| Error::malformed_job(label, id, reason))?;
        graph.insert(id.to_string(), job);
    }

    debug!(source = %label, jobs = graph.len(), "Extracted job graph");
    Ok(graph)
}

fn render_key(key: &Value) -> String {
    serde_yaml::to_string(key)
        .map(|s| s.trim_end().to_string())
        .unwrap_or_else(|_| value_kind(key).to_string())
}
