//! Plan documents: loading and step identity.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use stepweave_types::{PlanDefinition, PlanStep, canonical_step_id, parse_step_number};
use thiserror::Error;

/// A plan step with its resolved ledger identity.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStep<'a> {
    pub step_id: String,
    /// Zero-based index recorded in the ledger.
    pub step_index: usize,
    /// 1-based position in the plan document.
    pub position: usize,
    pub step: &'a PlanStep,
}

/// Structural problems in a plan document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("step at position {position} has no tool name")]
    MissingTool { position: usize },

    #[error("step id '{step_id}' is used more than once")]
    DuplicateStepId { step_id: String },

    #[error("step id '{step_id}' must reference a step number of at least 1")]
    InvalidStepNumber { step_id: String },

    #[error("step '{step_id}' has index {step_index}, which does not follow the previous index {previous_index}")]
    NonMonotonicIndex {
        step_id: String,
        step_index: usize,
        previous_index: usize,
    },
}

/// Assigns ledger identities to every step.
///
/// An id of the form `step<N>` pins the index to `N - 1`. Any other step takes
/// the index right after the previous one; steps without an id are named
/// `step<index + 1>`. Indices must strictly increase but may skip numbers.
pub fn resolve_step_identities(plan: &PlanDefinition) -> Result<Vec<PlannedStep<'_>>, PlanError> {
    let mut planned = Vec::with_capacity(plan.steps.len());
    let mut seen_ids = HashSet::new();
    let mut previous_index: Option<usize> = None;

    for (offset, step) in plan.steps.iter().enumerate() {
        let position = offset + 1;
        if step.tool.trim().is_empty() {
            return Err(PlanError::MissingTool { position });
        }

        let next_index = previous_index.map_or(0, |index| index + 1);
        let explicit_id = step.id.as_deref().map(str::trim).filter(|id| !id.is_empty());
        let (step_id, step_index) = match explicit_id {
            Some(id) => match parse_step_number(id) {
                Some(0) => return Err(PlanError::InvalidStepNumber { step_id: id.to_string() }),
                Some(number) => (id.to_string(), number - 1),
                None => (id.to_string(), next_index),
            },
            None => (canonical_step_id(next_index + 1), next_index),
        };

        if let Some(previous_index) = previous_index
            && step_index <= previous_index
        {
            return Err(PlanError::NonMonotonicIndex {
                step_id,
                step_index,
                previous_index,
            });
        }
        if !seen_ids.insert(step_id.clone()) {
            return Err(PlanError::DuplicateStepId { step_id });
        }

        previous_index = Some(step_index);
        planned.push(PlannedStep {
            step_id,
            step_index,
            position,
            step,
        });
    }

    Ok(planned)
}

/// Parses a plan from YAML or JSON text and validates step identities.
pub fn parse_plan_str(content: &str) -> Result<PlanDefinition> {
    let plan: PlanDefinition = serde_yaml::from_str(content).context("Failed to parse plan document")?;
    resolve_step_identities(&plan).context("Invalid plan document")?;
    Ok(plan)
}

/// Reads and parses a plan file (YAML or JSON).
pub fn parse_plan_file(file_path: impl AsRef<Path>) -> Result<PlanDefinition> {
    let file_path = file_path.as_ref();
    let content = fs::read_to_string(file_path).with_context(|| format!("Failed to read plan file: {}", file_path.display()))?;
    parse_plan_str(&content).with_context(|| format!("Failed to load plan file: {}", file_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn step(id: Option<&str>, tool: &str) -> PlanStep {
        PlanStep {
            id: id.map(str::to_string),
            tool: tool.to_string(),
            args: json!({}),
            ..Default::default()
        }
    }

    fn plan(steps: Vec<PlanStep>) -> PlanDefinition {
        PlanDefinition {
            steps,
            ..Default::default()
        }
    }

    #[test]
    fn positional_steps_get_canonical_ids() {
        let plan = plan(vec![step(None, "a"), step(None, "b")]);
        let planned = resolve_step_identities(&plan).expect("valid");
        assert_eq!(planned[0].step_id, "step1");
        assert_eq!(planned[1].step_id, "step2");
        assert_eq!(planned[1].step_index, 1);
        assert_eq!(planned[1].position, 2);
    }

    #[test]
    fn explicit_step_numbers_allow_gaps() {
        let plan = plan(vec![step(Some("step1"), "a"), step(Some("step4"), "b"), step(None, "c"), step(Some("fetch"), "d")]);
        let planned = resolve_step_identities(&plan).expect("valid");
        let identities: Vec<_> = planned.iter().map(|planned| (planned.step_id.as_str(), planned.step_index)).collect();
        assert_eq!(identities, vec![("step1", 0), ("step4", 3), ("step5", 4), ("fetch", 5)]);
    }

    #[test]
    fn rejects_duplicates_and_backwards_indices() {
        let duplicate = plan(vec![step(Some("fetch"), "a"), step(Some("fetch"), "b")]);
        assert_eq!(
            resolve_step_identities(&duplicate),
            Err(PlanError::DuplicateStepId { step_id: "fetch".into() })
        );

        let backwards = plan(vec![step(Some("step3"), "a"), step(Some("step2"), "b")]);
        assert!(matches!(resolve_step_identities(&backwards), Err(PlanError::NonMonotonicIndex { step_index: 1, .. })));

        let zero = plan(vec![step(Some("step0"), "a")]);
        assert!(matches!(resolve_step_identities(&zero), Err(PlanError::InvalidStepNumber { .. })));
    }

    #[test]
    fn rejects_blank_tool_names() {
        let plan = plan(vec![step(None, " ")]);
        assert_eq!(resolve_step_identities(&plan), Err(PlanError::MissingTool { position: 1 }));
    }

    #[test]
    fn parses_json_plan_files() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"plan": "demo", "steps": [{{"tool": "search", "args": {{"q": "rust"}}}}, {{"tool": "fetch", "args": "{{{{step1.results[0].link}}}}"}}]}}"#
        )
        .expect("write");

        let plan = parse_plan_file(file.path()).expect("parses");
        assert_eq!(plan.plan.as_deref(), Some("demo"));
        assert_eq!(plan.steps[1].args, json!("{{step1.results[0].link}}"));
    }

    #[test]
    fn invalid_plan_reports_file_path() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "steps:\n  - id: a\n    tool: x\n  - id: a\n    tool: y\n").expect("write");
        let error = parse_plan_file(file.path()).expect_err("invalid");
        let rendered = format!("{error:#}");
        assert!(rendered.contains("Failed to load plan file"));
        assert!(rendered.contains("used more than once"));
    }
}
