//! Preflight scan of placeholder references in a plan.
//!
//! At run time a reference to a step that has not executed yet fails like any
//! other missing step. This module finds those references before anything runs.

use serde::Serialize;
use serde_json::Value;
use stepweave_types::{PlanDefinition, canonical_step_id};

use crate::placeholder::scan_placeholders;
use crate::plan::{PlanError, PlannedStep, resolve_step_identities};

/// A placeholder found in a step's arguments or condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaceholderRef {
    /// Step containing the placeholder.
    pub step_id: String,
    /// Location such as `step3.args.filters[0].value` or `step3.when`.
    pub source_path: String,
    /// Placeholder text, delimiters included.
    pub placeholder: String,
    /// Referenced 1-based step number.
    pub referenced_step: usize,
}

/// Why a reference cannot be satisfied when its step runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceProblem {
    /// The referenced step exists but runs at or after the referencing step.
    Forward,
    /// No step in the plan matches the reference.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForwardReference {
    #[serde(flatten)]
    pub reference: PlaceholderRef,
    pub problem: ReferenceProblem,
}

/// Collects every placeholder in every step's `args` and `when`.
pub fn collect_placeholder_references(plan: &PlanDefinition) -> Result<Vec<PlaceholderRef>, PlanError> {
    let planned = resolve_step_identities(plan)?;
    let mut references = Vec::new();
    for planned_step in &planned {
        collect_from_value(
            &planned_step.step.args,
            &format!("{}.args", planned_step.step_id),
            &planned_step.step_id,
            &mut references,
        );
        if let Some(condition) = &planned_step.step.when {
            collect_from_text(condition, &format!("{}.when", planned_step.step_id), &planned_step.step_id, &mut references);
        }
    }
    Ok(references)
}

/// Finds references to steps that are not declared before the referencing step.
pub fn find_forward_references(plan: &PlanDefinition) -> Result<Vec<ForwardReference>, PlanError> {
    let planned = resolve_step_identities(plan)?;
    let references = collect_placeholder_references(plan)?;

    Ok(references
        .into_iter()
        .filter_map(|reference| {
            let position = planned.iter().position(|step| step.step_id == reference.step_id)?;
            let (earlier, later) = planned.split_at(position);
            if earlier.iter().any(|step| matches_step(step, reference.referenced_step)) {
                return None;
            }
            let problem = if later.iter().any(|step| matches_step(step, reference.referenced_step)) {
                ReferenceProblem::Forward
            } else {
                ReferenceProblem::Unknown
            };
            Some(ForwardReference { reference, problem })
        })
        .collect())
}

fn matches_step(step: &PlannedStep<'_>, number: usize) -> bool {
    step.step_id == canonical_step_id(number) || (number >= 1 && step.step_index == number - 1)
}

fn collect_from_value(value: &Value, source_path: &str, step_id: &str, references: &mut Vec<PlaceholderRef>) {
    match value {
        Value::String(text) => collect_from_text(text, source_path, step_id, references),
        Value::Array(values) => {
            for (index, nested_value) in values.iter().enumerate() {
                collect_from_value(nested_value, format!("{source_path}[{index}]").as_str(), step_id, references);
            }
        }
        Value::Object(map) => {
            for (key, nested_value) in map {
                collect_from_value(nested_value, format!("{source_path}.{key}").as_str(), step_id, references);
            }
        }
        _ => {}
    }
}

fn collect_from_text(text: &str, source_path: &str, step_id: &str, references: &mut Vec<PlaceholderRef>) {
    for found in scan_placeholders(text) {
        references.push(PlaceholderRef {
            step_id: step_id.to_string(),
            source_path: source_path.to_string(),
            placeholder: found.text,
            referenced_step: found.expr.step(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stepweave_types::PlanStep;

    fn plan() -> PlanDefinition {
        PlanDefinition {
            steps: vec![
                PlanStep {
                    tool: "search".into(),
                    args: json!({"query": "{{step2.topic}}"}),
                    ..Default::default()
                },
                PlanStep {
                    tool: "fetch".into(),
                    args: json!({"urls": ["{{step1.results[0].link}}", "{{step1.results[1].link}}"]}),
                    when: Some("{{step1.found}}".into()),
                    ..Default::default()
                },
                PlanStep {
                    tool: "summarize".into(),
                    args: json!("Summarize {{step2}} and {{step9.text}}"),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn collects_references_with_source_paths() {
        let references = collect_placeholder_references(&plan()).expect("valid plan");
        let paths: Vec<_> = references.iter().map(|reference| reference.source_path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["step1.args.query", "step2.args.urls[0]", "step2.args.urls[1]", "step2.when", "step3.args", "step3.args"]
        );
        assert_eq!(references[1].placeholder, "{{step1.results[0].link}}");
        assert_eq!(references[1].referenced_step, 1);
    }

    #[test]
    fn flags_forward_and_unknown_references() {
        let problems = find_forward_references(&plan()).expect("valid plan");
        assert_eq!(problems.len(), 2);
        assert_eq!(problems[0].reference.step_id, "step1");
        assert_eq!(problems[0].problem, ReferenceProblem::Forward);
        assert_eq!(problems[1].reference.placeholder, "{{step9.text}}");
        assert_eq!(problems[1].problem, ReferenceProblem::Unknown);
    }

    #[test]
    fn oversized_step_number_is_unknown() {
        let plan = PlanDefinition {
            steps: vec![PlanStep {
                tool: "search".into(),
                args: json!({"q": "{{step99999999999999999999999.a}}"}),
                ..Default::default()
            }],
            ..Default::default()
        };
        let problems = find_forward_references(&plan).expect("valid plan");
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].reference.placeholder, "{{step99999999999999999999999.a}}");
        assert_eq!(problems[0].problem, ReferenceProblem::Unknown);
    }

    #[test]
    fn self_reference_is_forward() {
        let plan = PlanDefinition {
            steps: vec![PlanStep {
                tool: "loop".into(),
                args: json!("{{step1}}"),
                ..Default::default()
            }],
            ..Default::default()
        };
        let problems = find_forward_references(&plan).expect("valid plan");
        assert_eq!(problems[0].problem, ReferenceProblem::Forward);
    }
}
