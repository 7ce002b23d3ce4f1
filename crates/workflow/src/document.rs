//! Workflow document model.
//!
//! Documents are kept as order-preserving YAML mappings. Only the `jobs`
//! section and the step lists inside each job are interpreted; every other
//! key is carried through untouched so the composer never needs the full
//! workflow schema.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};

/// Top-level key holding the job graph.
pub const JOBS_KEY: &str = "jobs";

const STEPS_KEY: &str = "steps";
const NEEDS_KEY: &str = "needs";
const WITH_KEY: &str = "with";

/// Mapping from job identifier to job definition, in document order.
pub type JobGraph = IndexMap<String, JobDefinition>;

/// One parsed workflow file.
///
/// Top-level sections keep their original order. Sections the composer does
/// not modify serialize back to the same structure they were parsed from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowDocument {
    sections: Mapping,
}

impl WorkflowDocument {
    /// Create an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing mapping.
    #[must_use]
    pub const fn from_mapping(sections: Mapping) -> Self {
        Self { sections }
    }

    /// Parse raw YAML bytes fetched for the source `label`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when the bytes are not valid YAML, contain
    /// duplicate mapping keys, or do not hold a mapping at the top level.
    pub fn parse(label: &str, raw: &[u8]) -> Result<Self> {
        let value: Value =
            serde_yaml::from_slice(raw).map_err(|e| Error::parse(label, e.to_string()))?;

        match value {
            Value::Mapping(sections) => Ok(Self { sections }),
            other => Err(Error::parse(
                label,
                format!(
                    "expected a mapping at the top level, found {}",
                    value_kind(&other)
                ),
            )),
        }
    }

    /// Serialize the document to YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the YAML emitter fails.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.sections).map_err(|e| Error::serialization(e.to_string()))
    }

    /// Serialize the document to YAML bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the YAML emitter fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_yaml().map(String::into_bytes)
    }

    /// Look up a top-level section.
    #[must_use]
    pub fn section(&self, key: &str) -> Option<&Value> {
        self.sections.get(key)
    }

    /// Insert or replace a top-level section.
    ///
    /// Replacing keeps the section's original position.
    pub fn insert_section(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.sections.insert(Value::String(key.into()), value)
    }

    /// The workflow's display name, if it has one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.section("name").and_then(Value::as_str)
    }

    /// All top-level sections in document order.
    #[must_use]
    pub const fn sections(&self) -> &Mapping {
        &self.sections
    }

    /// Consume the document, returning its sections.
    #[must_use]
    pub fn into_mapping(self) -> Mapping {
        self.sections
    }
}

/// A single job in a job graph.
///
/// The job's mapping is kept verbatim. Steps are split out so they can be
/// rewritten in place; their position among the job's keys is preserved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobDefinition {
    raw: Mapping,
    steps: Option<Vec<StepDefinition>>,
}

impl JobDefinition {
    /// Create an empty job.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a job from its raw mapping, checking the parts the composer
    /// interprets (`steps` and `needs`).
    pub(crate) fn from_mapping(mut raw: Mapping) -> std::result::Result<Self, String> {
        if let Some(needs) = raw.get(NEEDS_KEY) {
            match needs {
                Value::String(_) => {}
                Value::Sequence(items) => {
                    if let Some((index, item)) =
                        items.iter().enumerate().find(|(_, v)| !v.is_string())
                    {
                        return Err(format!(
                            "needs entry {index} must be a job identifier, found {}",
                            value_kind(item)
                        ));
                    }
                }
                other => {
                    return Err(format!(
                        "needs must be a job identifier or a list of them, found {}",
                        value_kind(other)
                    ));
                }
            }
        }

        let steps = match raw.get_mut(STEPS_KEY) {
            None => None,
            Some(value) => {
                let items = match std::mem::replace(value, Value::Null) {
                    Value::Sequence(items) => items,
                    other => {
                        return Err(format!(
                            "steps must be a list, found {}",
                            value_kind(&other)
                        ));
                    }
                };
                let mut steps = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    match item {
                        Value::Mapping(step) => steps.push(StepDefinition::from_mapping(step)),
                        other => {
                            return Err(format!(
                                "step {index} must be a mapping, found {}",
                                value_kind(&other)
                            ));
                        }
                    }
                }
                Some(steps)
            }
        };

        Ok(Self { raw, steps })
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(self, name: impl Into<String>) -> Self {
        self.with_entry("name", Value::String(name.into()))
    }

    /// Set the runner label.
    #[must_use]
    pub fn with_runs_on(self, runner: impl Into<String>) -> Self {
        self.with_entry("runs-on", Value::String(runner.into()))
    }

    /// Set an arbitrary job key.
    #[must_use]
    pub fn with_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.raw.insert(Value::String(key.into()), value);
        self
    }

    /// Append a step.
    #[must_use]
    pub fn with_step(mut self, step: StepDefinition) -> Self {
        self.push_step(step);
        self
    }

    /// Look up a job key. Steps are exposed through [`Self::steps`] instead.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        if key == STEPS_KEY {
            return None;
        }
        self.raw.get(key)
    }

    /// Runner descriptor (`runs-on`).
    #[must_use]
    pub fn runs_on(&self) -> Option<&Value> {
        self.raw.get("runs-on")
    }

    /// Strategy specification (`strategy`), including any matrix.
    #[must_use]
    pub fn strategy(&self) -> Option<&Value> {
        self.raw.get("strategy")
    }

    /// Matrix specification (`strategy.matrix`).
    #[must_use]
    pub fn matrix(&self) -> Option<&Value> {
        self.strategy().and_then(|s| s.get("matrix"))
    }

    /// Identifiers listed under `needs`, in order.
    #[must_use]
    pub fn needs(&self) -> Vec<String> {
        match self.raw.get(NEEDS_KEY) {
            Some(Value::String(id)) => vec![id.clone()],
            Some(Value::Sequence(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Replace the `needs` list.
    ///
    /// A single dependency stays a plain string when it was written that way.
    pub fn set_needs(&mut self, needs: Vec<String>) {
        let was_scalar = matches!(self.raw.get(NEEDS_KEY), Some(Value::String(_)));
        if needs.is_empty() && !self.raw.contains_key(NEEDS_KEY) {
            return;
        }

        let value = if was_scalar && needs.len() == 1 {
            Value::String(needs.into_iter().next().unwrap_or_default())
        } else {
            Value::Sequence(needs.into_iter().map(Value::String).collect())
        };
        self.raw.insert(Value::String(NEEDS_KEY.to_string()), value);
    }

    /// The job's steps, in execution order.
    #[must_use]
    pub fn steps(&self) -> &[StepDefinition] {
        self.steps.as_deref().unwrap_or_default()
    }

    /// Mutable access to the steps, if the job declares any.
    pub fn steps_mut(&mut self) -> Option<&mut Vec<StepDefinition>> {
        self.steps.as_mut()
    }

    /// Whether the job declares a `steps` list.
    #[must_use]
    pub const fn has_steps(&self) -> bool {
        self.steps.is_some()
    }

    /// Append a step, creating the `steps` list if needed.
    pub fn push_step(&mut self, step: StepDefinition) {
        self.steps.get_or_insert_with(Vec::new).push(step);
    }

    /// Rewrite string values anywhere in the job, steps included.
    ///
    /// `rewrite` returns `None` to leave a string as it is. Keys are never
    /// visited.
    pub fn rewrite_strings(&mut self, rewrite: &mut dyn FnMut(&str) -> Option<String>) {
        for value in self.raw.values_mut() {
            rewrite_value(value, rewrite);
        }
        for step in self.steps.iter_mut().flatten() {
            for value in step.raw.values_mut() {
                rewrite_value(value, rewrite);
            }
        }
    }

    /// Render the job back into a mapping.
    #[must_use]
    pub fn to_mapping(&self) -> Mapping {
        let mut raw = self.raw.clone();
        if let Some(steps) = &self.steps {
            let steps = steps
                .iter()
                .map(|step| Value::Mapping(step.as_mapping().clone()))
                .collect();
            raw.insert(Value::String(STEPS_KEY.to_string()), Value::Sequence(steps));
        }
        raw
    }

    /// Render the job as a YAML value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Mapping(self.to_mapping())
    }
}

/// A single step within a job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepDefinition {
    raw: Mapping,
}

impl StepDefinition {
    /// Wrap a raw step mapping.
    #[must_use]
    pub const fn from_mapping(raw: Mapping) -> Self {
        Self { raw }
    }

    /// Create a step that uses an action.
    pub fn uses_action(action: impl Into<String>) -> Self {
        let mut raw = Mapping::new();
        raw.insert(Value::String("uses".to_string()), Value::String(action.into()));
        Self { raw }
    }

    /// Create a step that runs a shell command.
    pub fn run_command(command: impl Into<String>) -> Self {
        let mut raw = Mapping::new();
        raw.insert(Value::String("run".to_string()), Value::String(command.into()));
        Self { raw }
    }

    /// Set the step name. The name is placed first, as workflows are usually written.
    #[must_use]
    pub fn with_name(self, name: impl Into<String>) -> Self {
        let mut raw = Mapping::new();
        raw.insert(Value::String("name".to_string()), Value::String(name.into()));
        for (key, value) in self.raw {
            if key.as_str() != Some("name") {
                raw.insert(key, value);
            }
        }
        Self { raw }
    }

    /// Add a `with` input.
    #[must_use]
    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_input(key, value);
        self
    }

    /// Action reference (`uses`).
    #[must_use]
    pub fn uses(&self) -> Option<&str> {
        self.raw.get("uses").and_then(Value::as_str)
    }

    /// Shell command (`run`).
    #[must_use]
    pub fn run(&self) -> Option<&str> {
        self.raw.get("run").and_then(Value::as_str)
    }

    /// Human-readable name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.raw.get("name").and_then(Value::as_str)
    }

    /// Action inputs (`with`).
    #[must_use]
    pub fn inputs(&self) -> Option<&Mapping> {
        self.raw.get(WITH_KEY).and_then(Value::as_mapping)
    }

    /// A single action input.
    #[must_use]
    pub fn input(&self, key: &str) -> Option<&Value> {
        self.inputs().and_then(|inputs| inputs.get(key))
    }

    /// Set an action input, keeping the position of existing inputs.
    pub fn set_input(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let with_key = Value::String(WITH_KEY.to_string());
        if !matches!(self.raw.get(WITH_KEY), Some(Value::Mapping(_))) {
            self.raw.insert(with_key.clone(), Value::Mapping(Mapping::new()));
        }
        if let Some(Value::Mapping(inputs)) = self.raw.get_mut(&with_key) {
            inputs.insert(Value::String(key.into()), value.into());
        }
    }

    /// The raw step mapping.
    #[must_use]
    pub const fn as_mapping(&self) -> &Mapping {
        &self.raw
    }
}

fn rewrite_value(value: &mut Value, rewrite: &mut dyn FnMut(&str) -> Option<String>) {
    match value {
        Value::String(text) => {
            if let Some(rewritten) = rewrite(text.as_str()) {
                *text = rewritten;
            }
        }
        Value::Sequence(items) => {
            for item in items {
                rewrite_value(item, rewrite);
            }
        }
        Value::Mapping(mapping) => {
            for item in mapping.values_mut() {
                rewrite_value(item, rewrite);
            }
        }
        Value::Tagged(tagged) => rewrite_value(&mut tagged.value, rewrite),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Short description of a YAML node's kind, for error messages.
pub(crate) const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
