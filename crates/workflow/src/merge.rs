//! Job graph merging and validation.
//!
//! Sources are merged in caller order. Job identifiers must be globally
//! unique: a collision fails the merge instead of silently keeping one side,
//! since dropping a job would drop an entire platform from the release.

use crate::document::{JobDefinition, JobGraph};
use crate::error::{Error, Result};
use indexmap::IndexMap;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use tracing::debug;

/// `needs.<id>` or `needs['<id>']` in an expression, with the character
/// before it so that `outputs.needs.x` style paths are not taken for one.
static NEEDS_REFERENCE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r#"(?P<lead>^|[^\w.-])needs(?:\.(?P<dot>[\w-]+)|\[\s*(?P<quote>['"])(?P<bracket>[^'"\]]+)['"]\s*\])"#,
    )
    .ok()
});

/// The job graph extracted from one source document.
#[derive(Debug, Clone)]
pub struct SourceJobs {
    /// Label of the originating source (e.g. "windows")
    pub label: String,
    /// Jobs defined by that source
    pub jobs: JobGraph,
}

impl SourceJobs {
    /// Pair a job graph with its source label.
    pub fn new(label: impl Into<String>, jobs: JobGraph) -> Self {
        Self {
            label: label.into(),
            jobs,
        }
    }

    /// Qualify every job identifier with `prefix`.
    ///
    /// References to a job of this same source are rewritten to the
    /// qualified identifier: `needs` entries, and `needs.<id>` expressions in
    /// any string of the job (`if`, `run`, `with`, `env`, ...). Other
    /// references are left untouched, as they may point at a job from
    /// another source.
    #[must_use]
    pub fn qualified(self, prefix: &str) -> Self {
        let local: HashSet<String> = self.jobs.keys().cloned().collect();

        let jobs = self
            .jobs
            .into_iter()
            .map(|(id, mut job)| {
                job.rewrite_strings(&mut |text| qualify_expression(text, prefix, &local));
                let needs = job.needs();
                if !needs.is_empty() {
                    job.set_needs(
                        needs
                            .into_iter()
                            .map(|dep| {
                                if local.contains(&dep) {
                                    format!("{prefix}{dep}")
                                } else {
                                    dep
                                }
                            })
                            .collect(),
                    );
                }
                (format!("{prefix}{id}"), job)
            })
            .collect();

        Self {
            label: self.label,
            jobs,
        }
    }
}

/// Prefix the job identifiers of `local` referenced through `needs` in `text`.
///
/// Returns `None` when nothing was rewritten.
fn qualify_expression(text: &str, prefix: &str, local: &HashSet<String>) -> Option<String> {
    if !text.contains("needs") {
        return None;
    }
    let pattern = NEEDS_REFERENCE.as_ref()?;

    let mut changed = false;
    let rewritten = pattern.replace_all(text, |caps: &Captures<'_>| {
        let lead = caps.name("lead").map_or("", |m| m.as_str());
        if let Some(id) = caps.name("dot").filter(|id| local.contains(id.as_str())) {
            changed = true;
            format!("{lead}needs.{prefix}{}", id.as_str())
        } else if let Some(id) = caps.name("bracket").filter(|id| local.contains(id.as_str())) {
            changed = true;
            let quote = caps.name("quote").map_or("'", |m| m.as_str());
            format!("{lead}needs[{quote}{prefix}{}{quote}]", id.as_str())
        } else {
            caps[0].to_string()
        }
    });

    if changed {
        Some(rewritten.into_owned())
    } else {
        None
    }
}

/// A job in the merged graph, tagged with the source it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedJob {
    /// Label of the originating source
    pub source: String,
    /// The job itself
    pub definition: JobDefinition,
}

/// Union of all sources' jobs, keyed by globally unique identifier.
pub type MergedGraph = IndexMap<String, MergedJob>;

/// Merge the job graphs of every source, in the order given.
///
/// Dependency references are not checked here; see [`validate`].
///
/// # Errors
///
/// Returns [`Error::DuplicateJobIdentifier`] naming both sources when two
/// sources define the same identifier.
pub fn merge(sources: impl IntoIterator<Item = SourceJobs>) -> Result<MergedGraph> {
    let mut merged = MergedGraph::new();

    for SourceJobs { label, jobs } in sources {
        for (id, definition) in jobs {
            if let Some(existing) = merged.get(&id) {
                return Err(Error::DuplicateJobIdentifier {
                    id,
                    sources: vec![existing.source.clone(), label],
                });
            }
            debug!(source = %label, job = %id, "Merging job");
            merged.insert(
                id,
                MergedJob {
                    source: label.clone(),
                    definition,
                },
            );
        }
    }

    Ok(merged)
}

/// Check that the merged graph is consistent.
///
/// Every `needs` reference must name a job in the graph, and the
/// dependencies must not form a cycle. References across sources are fine.
///
/// # Errors
///
/// - [`Error::UnresolvedDependency`] for the first dangling reference
/// - [`Error::DependencyCycle`] if jobs depend on each other in a loop
pub fn validate(graph: &MergedGraph) -> Result<()> {
    let mut dag: DiGraph<&str, ()> = DiGraph::with_capacity(graph.len(), graph.len());
    let nodes: HashMap<&str, NodeIndex> = graph
        .keys()
        .map(|id| (id.as_str(), dag.add_node(id.as_str())))
        .collect();

    for (id, job) in graph {
        let from = nodes[id.as_str()];
        for reference in job.definition.needs() {
            let Some(&to) = nodes.get(reference.as_str()) else {
                return Err(Error::UnresolvedDependency {
                    job: id.clone(),
                    reference,
                });
            };
            dag.add_edge(from, to, ());
        }
    }

    for component in tarjan_scc(&dag) {
        let is_cycle = component.len() > 1
            || component
                .first()
                .is_some_and(|&node| dag.find_edge(node, node).is_some());
        if is_cycle {
            let mut jobs: Vec<String> = component.iter().map(|&n| dag[n].to_string()).collect();
            // Report in document order for stable messages
            jobs.sort_by_key(|id| graph.get_index_of(id.as_str()));
            return Err(Error::DependencyCycle { jobs });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::WorkflowDocument;
    use crate::extract::extract_jobs;
    use serde_yaml::Value;

    fn source(label: &str, yaml: &str) -> SourceJobs {
        let doc = WorkflowDocument::parse(label, yaml.as_bytes()).unwrap();
        SourceJobs::new(label, extract_jobs(&doc, label).unwrap())
    }

    #[test]
    fn test_merge_keeps_source_order() {
        let merged = merge([
            source("build", "jobs:\n  windows: {}\n  macos: {}\n"),
            source("linux", "jobs:\n  linux: {}\n"),
        ])
        .unwrap();

        let ids: Vec<_> = merged.keys().map(String::as_str).collect();
        assert_eq!(ids, ["windows", "macos", "linux"]);
        assert_eq!(merged["linux"].source, "linux");
        assert_eq!(merged["macos"].source, "build");
    }

    #[test]
    fn test_collision_names_both_sources() {
        let err = merge([
            source("build", "jobs:\n  build: {}\n"),
            source("linux", "jobs:\n  build: {}\n"),
        ])
        .unwrap_err();

        match err {
            Error::DuplicateJobIdentifier { id, sources } => {
                assert_eq!(id, "build");
                assert_eq!(sources, ["build", "linux"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_qualification_avoids_collision() {
        let merged = merge([
            source("build", "jobs:\n  build: {}\n").qualified("tracy-"),
            source("linux", "jobs:\n  build: {}\n").qualified("tracy-linux-"),
        ])
        .unwrap();
        assert!(merged.contains_key("tracy-build"));
        assert!(merged.contains_key("tracy-linux-build"));
    }

    #[test]
    fn test_qualification_rewrites_local_needs_only() {
        let qualified = source(
            "linux",
            "jobs:\n  build: {}\n  package:\n    needs: [build, docs]\n",
        )
        .qualified("linux-");

        assert_eq!(
            qualified.jobs["linux-package"].needs(),
            ["linux-build", "docs"]
        );
    }

    #[test]
    fn test_qualification_rewrites_needs_expressions() {
        let qualified = source(
            "linux",
            r#"jobs:
  version:
    outputs:
      v: ${{ steps.v.outputs.v }}
  build:
    needs: version
    if: ${{ needs.version.outputs.v == '1' }}
    env:
      V: ${{ needs['version'].outputs.v }}
    steps:
      - run: echo ${{ needs.version.outputs.v }} ${{ needs.docs.outputs.url }}
      - uses: actions/upload-artifact@v4
        with:
          name: tracy-${{ needs.version.outputs.v }}
"#,
        )
        .qualified("linux-");

        let build = &qualified.jobs["linux-build"];
        assert_eq!(build.needs(), ["linux-version"]);
        assert_eq!(
            build.get("if").and_then(Value::as_str),
            Some("${{ needs.linux-version.outputs.v == '1' }}")
        );
        let env = build.get("env").and_then(Value::as_mapping).unwrap();
        assert_eq!(
            env.get("V").and_then(Value::as_str),
            Some("${{ needs['linux-version'].outputs.v }}")
        );
        assert_eq!(
            build.steps()[0].run(),
            Some("echo ${{ needs.linux-version.outputs.v }} ${{ needs.docs.outputs.url }}")
        );
        assert_eq!(
            build.steps()[1].input("name").and_then(Value::as_str),
            Some("tracy-${{ needs.linux-version.outputs.v }}")
        );
    }

    #[test]
    fn test_qualify_expression_ignores_other_identifiers() {
        let local: HashSet<String> = ["build".to_string()].into_iter().collect();
        assert_eq!(qualify_expression("needs.build-a.result", "x-", &local), None);
        assert_eq!(qualify_expression("steps.needs.build.x", "x-", &local), None);
        assert_eq!(qualify_expression("echo hello", "x-", &local), None);
        assert_eq!(
            qualify_expression("needs.build.result == 'success'", "x-", &local).as_deref(),
            Some("needs.x-build.result == 'success'")
        );
    }

    #[test]
    fn test_cross_source_dependency_resolves() {
        let merged = merge([
            source("build", "jobs:\n  windows: {}\n"),
            source("pack", "jobs:\n  bundle:\n    needs: windows\n"),
        ])
        .unwrap();
        assert!(validate(&merged).is_ok());
    }

    #[test]
    fn test_unresolved_dependency() {
        let merged = merge([source("build", "jobs:\n  test:\n    needs: [compile]\n")]).unwrap();
        let err = validate(&merged).unwrap_err();
        assert!(matches!(
            err,
            Error::UnresolvedDependency { ref job, ref reference } if job == "test" && reference == "compile"
        ));
    }

    #[test]
    fn test_dependency_cycle() {
        let merged = merge([source(
            "build",
            "jobs:\n  a:\n    needs: b\n  b:\n    needs: a\n  c: {}\n",
        )])
        .unwrap();
        let err = validate(&merged).unwrap_err();
        assert!(matches!(err, Error::DependencyCycle { ref jobs } if jobs == &["a", "b"]));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let merged = merge([source("build", "jobs:\n  a:\n    needs: a\n")]).unwrap();
        assert!(matches!(
            validate(&merged),
            Err(Error::DependencyCycle { .. })
        ));
    }
}
