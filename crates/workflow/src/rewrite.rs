//! Checkout step rewriting.
//!
//! Upstream jobs check out the upstream repository. For the fork build every
//! recognised checkout step is pointed at the target repository and ref,
//! keeping all of its other inputs (path, submodules, fetch-depth, ...).

use crate::document::{JobDefinition, StepDefinition};
use crate::merge::MergedGraph;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Action identifier of the standard checkout action.
pub const CHECKOUT_ACTION: &str = "actions/checkout";

/// Explicit list of actions that count as "check out the source".
///
/// A step is a checkout step when its `uses` reference, without the `@ref`
/// suffix, equals one of the configured identifiers (ASCII case-insensitive,
/// as action owners and names are). Parameters play no part in recognition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckoutRecognizer {
    actions: Vec<String>,
}

impl Default for CheckoutRecognizer {
    fn default() -> Self {
        Self::new([CHECKOUT_ACTION])
    }
}

impl CheckoutRecognizer {
    /// Recognise the given action identifiers.
    pub fn new<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            actions: actions.into_iter().map(Into::into).collect(),
        }
    }

    /// The configured action identifiers.
    #[must_use]
    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    /// Whether `step` is a checkout step.
    #[must_use]
    pub fn is_checkout(&self, step: &StepDefinition) -> bool {
        let Some(uses) = step.uses() else {
            return false;
        };
        let action = uses.split_once('@').map_or(uses, |(action, _)| action).trim();
        self.actions
            .iter()
            .any(|known| known.eq_ignore_ascii_case(action))
    }
}

/// Repository and ref that checkout steps are redirected to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutTarget {
    /// Repository in `owner/name` form
    pub repository: String,
    /// Branch, tag or expression to check out
    pub reference: String,
}

impl CheckoutTarget {
    /// Create a new checkout target.
    pub fn new(repository: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            reference: reference.into(),
        }
    }
}

/// Result of rewriting one job.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRewrite {
    /// The rewritten job
    pub job: JobDefinition,
    /// Indices of the steps that were rewritten
    pub rewritten_steps: Vec<usize>,
}

impl CheckoutRewrite {
    /// Whether the job contained at least one checkout step.
    #[must_use]
    pub fn found_checkout(&self) -> bool {
        !self.rewritten_steps.is_empty()
    }
}

/// Non-fatal findings reported alongside a composed workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositionWarning {
    /// A job has no recognisable checkout step and runs without redirection.
    NoCheckoutStepFound {
        /// Source label of the job
        label: String,
        /// Job identifier
        job: String,
    },
}

impl std::fmt::Display for CompositionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoCheckoutStepFound { label, job } => write!(
                f,
                "Job '{job}' from source '{label}' has no checkout step; it was not redirected"
            ),
        }
    }
}

/// Redirect every checkout step of `job` to `target`.
///
/// Only the `repository` and `ref` inputs of matching steps change. Jobs
/// without a checkout step come back unchanged with no rewritten indices.
#[must_use]
pub fn rewrite_checkout(
    mut job: JobDefinition,
    recognizer: &CheckoutRecognizer,
    target: &CheckoutTarget,
) -> CheckoutRewrite {
    let mut rewritten_steps = Vec::new();

    if let Some(steps) = job.steps_mut() {
        for (index, step) in steps.iter_mut().enumerate() {
            if recognizer.is_checkout(step) {
                step.set_input("repository", target.repository.as_str());
                step.set_input("ref", target.reference.as_str());
                rewritten_steps.push(index);
            }
        }
    }

    CheckoutRewrite {
        job,
        rewritten_steps,
    }
}

/// Rewrite every job of a merged graph, collecting warnings for jobs that
/// never check out source.
#[must_use]
pub fn rewrite_graph(
    graph: MergedGraph,
    recognizer: &CheckoutRecognizer,
    target: &CheckoutTarget,
) -> (MergedGraph, Vec<CompositionWarning>) {
    let mut warnings = Vec::new();

    let graph = graph
        .into_iter()
        .map(|(id, mut merged)| {
            let rewrite = rewrite_checkout(merged.definition, recognizer, target);
            if rewrite.found_checkout() {
                debug!(
                    source = %merged.source,
                    job = %id,
                    steps = ?rewrite.rewritten_steps,
                    repository = %target.repository,
                    reference = %target.reference,
                    "Redirected checkout steps"
                );
            } else {
                warn!(source = %merged.source, job = %id, "Job has no checkout step");
                warnings.push(CompositionWarning::NoCheckoutStepFound {
                    label: merged.source.clone(),
                    job: id.clone(),
                });
            }
            merged.definition = rewrite.job;
            (id, merged)
        })
        .collect();

    (graph, warnings)
}
