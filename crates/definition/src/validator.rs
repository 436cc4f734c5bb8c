// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of PlexFlow.
//
// PlexFlow is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// PlexFlow is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with PlexFlow. If not, see <https://www.gnu.org/licenses/>.

//! Structural validator for workflow definitions.
//!
//! ## Purpose
//! Pure validation of the parsed tree: every rule is checked and every
//! offense collected, so a definition author sees the complete list in one
//! pass. Only a fully clean tree converts into a [`WorkflowDefinition`].
//!
//! ## Rules
//! - `name` non-empty; `version` matches `X.Y.Z`
//! - `initiating_event`: non-empty pseudo-step name and topic (the topic is
//!   externally owned and exempt from the execute/success/failure discipline)
//! - at least two steps; step names alphanumeric and unique
//! - step `topic` must be an execute-topic; `response_topic.success` /
//!   `.failure` non-empty and kind-checked
//! - `depends_on` references must name declared steps; the dependency graph
//!   must be acyclic
//! - every `input` value is exactly one `{{Step.field}}` expression
//! - action descriptors carry a non-empty `action` name; unknown names are
//!   warnings, not failures (custom handlers may be registered at startup)

use crate::error::{DefinitionError, DefinitionResult, ValidationIssue};
use crate::template::TemplateExpr;
use crate::topic::{Topic, TopicKind};
use crate::types::{
    ActionSpec, InitiatingEvent, RawStep, RawWorkflow, ResponseTopics, StepDefinition,
    WorkflowDefinition,
};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\d+\.\d+$").expect("version pattern is valid"))
}

fn step_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9]+$").expect("step name pattern is valid"))
}

/// Handler names shipped with the mediator. Used only to warn on likely
/// typos; unknown names remain valid because handlers can be registered at
/// startup.
const BUILTIN_SUCCESS_ACTIONS: &[&str] = &["log", "log_output"];
const BUILTIN_FAILURE_ACTIONS: &[&str] = &["retry", "skip", "abort"];

/// Validate a raw tree and convert it into a [`WorkflowDefinition`].
///
/// ## Errors
/// [`DefinitionError::Invalid`] carrying every offense found; the tree is
/// never partially accepted.
pub fn validate(raw: RawWorkflow) -> DefinitionResult<WorkflowDefinition> {
    let mut issues = Vec::new();

    if raw.name.is_empty() {
        issues.push(ValidationIssue::new("name", "must be non-empty"));
    }
    if !version_regex().is_match(&raw.version) {
        issues.push(ValidationIssue::new(
            "version",
            format!("'{}' is not a semantic X.Y.Z version", raw.version),
        ));
    }
    if raw.initiating_event.name.is_empty() {
        issues.push(ValidationIssue::new(
            "initiating_event.name",
            "must be non-empty",
        ));
    }
    if raw.initiating_event.topic.is_empty() {
        issues.push(ValidationIssue::new(
            "initiating_event.topic",
            "must be non-empty",
        ));
    }
    if raw.steps.len() < 2 {
        issues.push(ValidationIssue::new(
            "steps",
            format!("a workflow requires at least two steps, found {}", raw.steps.len()),
        ));
    }

    let declared: HashSet<&str> = raw.steps.iter().map(|s| s.name.as_str()).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut typed_steps: Vec<Option<StepDefinition>> = Vec::with_capacity(raw.steps.len());

    for (index, step) in raw.steps.iter().enumerate() {
        let path = format!("steps[{}]", index);

        if !step_name_regex().is_match(&step.name) {
            issues.push(ValidationIssue::new(
                format!("{}.name", path),
                format!("'{}' is not a non-empty alphanumeric name", step.name),
            ));
        }
        if !step.name.is_empty() && !seen.insert(step.name.as_str()) {
            issues.push(ValidationIssue::new(
                format!("{}.name", path),
                format!("duplicate step name '{}'", step.name),
            ));
        }
        if !step.name.is_empty() && step.name == raw.initiating_event.name {
            issues.push(ValidationIssue::new(
                format!("{}.name", path),
                format!(
                    "'{}' collides with the initiating pseudo-step",
                    step.name
                ),
            ));
        }

        for dep in &step.depends_on {
            if !declared.contains(dep.as_str()) {
                issues.push(ValidationIssue::new(
                    format!("{}.depends_on", path),
                    format!("references unknown step '{}'", dep),
                ));
            }
        }

        for (key, expr) in &step.input {
            if TemplateExpr::parse(expr).is_none() {
                issues.push(ValidationIssue::new(
                    format!("{}.input.{}", path, key),
                    format!("'{}' is not a single {{{{Step.field}}}} expression", expr),
                ));
            }
        }

        for (position, spec) in step.on_success.iter().enumerate() {
            check_action(
                spec,
                BUILTIN_SUCCESS_ACTIONS,
                format!("{}.on_success[{}]", path, position),
                &mut issues,
            );
        }
        if let Some(spec) = &step.on_failure {
            check_action(
                spec,
                BUILTIN_FAILURE_ACTIONS,
                format!("{}.on_failure", path),
                &mut issues,
            );
        }

        typed_steps.push(typed_step(step, &path, &mut issues));
    }

    check_cycles(&raw.steps, &declared, &mut issues);

    if !issues.is_empty() {
        return Err(DefinitionError::Invalid(issues));
    }

    Ok(WorkflowDefinition {
        name: raw.name,
        description: raw.description,
        version: raw.version,
        initiating_event: InitiatingEvent {
            name: raw.initiating_event.name,
            topic: raw.initiating_event.topic,
        },
        steps: typed_steps.into_iter().flatten().collect(),
    })
}

/// Check one action descriptor; unknown names only warn.
fn check_action(
    spec: &ActionSpec,
    builtins: &[&str],
    path: String,
    issues: &mut Vec<ValidationIssue>,
) {
    if spec.action.is_empty() {
        issues.push(ValidationIssue::new(
            format!("{}.action", path),
            "must be non-empty",
        ));
    } else if !builtins.contains(&spec.action.as_str()) {
        tracing::warn!(
            action = %spec.action,
            path = %path,
            "action is not a built-in handler; it must be registered at startup"
        );
    }
}

/// Parse and kind-check one step's topics, returning the typed step when
/// this step is individually clean.
fn typed_step(
    step: &RawStep,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<StepDefinition> {
    let before = issues.len();

    let topic = check_topic(&step.topic, TopicKind::Execute, &format!("{}.topic", path), issues);

    if step.response_topic.success.is_empty() {
        issues.push(ValidationIssue::new(
            format!("{}.response_topic.success", path),
            "must list at least one topic",
        ));
    }
    if step.response_topic.failure.is_empty() {
        issues.push(ValidationIssue::new(
            format!("{}.response_topic.failure", path),
            "must list at least one topic",
        ));
    }

    let success: Vec<_> = step
        .response_topic
        .success
        .iter()
        .enumerate()
        .filter_map(|(i, name)| {
            check_topic(
                name,
                TopicKind::Success,
                &format!("{}.response_topic.success[{}]", path, i),
                issues,
            )
        })
        .collect();
    let failure: Vec<_> = step
        .response_topic
        .failure
        .iter()
        .enumerate()
        .filter_map(|(i, name)| {
            check_topic(
                name,
                TopicKind::Failure,
                &format!("{}.response_topic.failure[{}]", path, i),
                issues,
            )
        })
        .collect();

    if issues.len() != before {
        return None;
    }

    Some(StepDefinition {
        name: step.name.clone(),
        topic: topic?,
        input: step.input.clone(),
        depends_on: step.depends_on.clone(),
        response_topic: ResponseTopics { success, failure },
        on_success: step.on_success.clone(),
        on_failure: step.on_failure.clone(),
    })
}

fn check_topic(
    name: &str,
    expected: TopicKind,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<Topic> {
    match Topic::parse(name) {
        Ok(topic) if topic.kind() == expected => Some(topic),
        Ok(topic) => {
            issues.push(ValidationIssue::new(
                path,
                format!("'{}' is a {} topic, expected {}", name, topic.kind(), expected),
            ));
            None
        }
        Err(message) => {
            issues.push(ValidationIssue::new(path, message));
            None
        }
    }
}

/// Reject any cycle in the `depends_on` graph. Skipped when references are
/// already known to be broken.
fn check_cycles(steps: &[RawStep], declared: &HashSet<&str>, issues: &mut Vec<ValidationIssue>) {
    let all_resolve = steps
        .iter()
        .flat_map(|s| s.depends_on.iter())
        .all(|d| declared.contains(d.as_str()));
    if !all_resolve {
        return;
    }

    let deps: HashMap<&str, &[String]> = steps
        .iter()
        .map(|s| (s.name.as_str(), s.depends_on.as_slice()))
        .collect();

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'a>(
        name: &'a str,
        deps: &HashMap<&'a str, &'a [String]>,
        marks: &mut HashMap<&'a str, Mark>,
    ) -> bool {
        match marks.get(name) {
            Some(Mark::Done) => return true,
            Some(Mark::Visiting) => return false,
            None => {}
        }
        marks.insert(name, Mark::Visiting);
        for dep in deps.get(name).copied().unwrap_or(&[]) {
            if !visit(dep, deps, marks) {
                return false;
            }
        }
        marks.insert(name, Mark::Done);
        true
    }

    let mut marks = HashMap::new();
    for step in steps {
        if !visit(step.name.as_str(), &deps, &mut marks) {
            issues.push(ValidationIssue::new(
                "steps",
                format!("dependency cycle through step '{}'", step.name),
            ));
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        r#"
name: order-fulfillment
version: 1.0.0
initiating_event:
  name: OrderPlaced
  topic: shop.orders.placed
steps:
  - name: Reserve
    topic: inventory.execute.reserve
    input:
      order: "{{OrderPlaced.order_id}}"
    response_topic:
      success: [inventory.success.reserve]
      failure: [inventory.failure.reserve]
  - name: Charge
    topic: billing.execute.charge
    depends_on: [Reserve]
    input:
      reservation: "{{Reserve.reservation_id}}"
    response_topic:
      success: [billing.success.charge]
      failure: [billing.failure.charge]
"#
    }

    fn raw(yaml: &str) -> RawWorkflow {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn issues_of(yaml: &str) -> Vec<ValidationIssue> {
        match validate(raw(yaml)) {
            Err(DefinitionError::Invalid(issues)) => issues,
            other => panic!("expected Invalid, got {:?}", other.map(|d| d.name)),
        }
    }

    fn has_issue(issues: &[ValidationIssue], path: &str) -> bool {
        issues.iter().any(|i| i.path == path)
    }

    #[test]
    fn test_minimal_workflow_validates() {
        let definition = validate(raw(minimal_yaml())).unwrap();
        assert_eq!(definition.name, "order-fulfillment");
        assert_eq!(definition.steps.len(), 2);
        assert_eq!(definition.steps[1].depends_on, vec!["Reserve"]);
    }

    #[test]
    fn test_empty_tree_reports_all_offenses() {
        let issues = issues_of("{}");
        assert!(has_issue(&issues, "name"));
        assert!(has_issue(&issues, "version"));
        assert!(has_issue(&issues, "initiating_event.name"));
        assert!(has_issue(&issues, "initiating_event.topic"));
        assert!(has_issue(&issues, "steps"));
    }

    #[test]
    fn test_version_must_be_semver() {
        let yaml = minimal_yaml().replace("version: 1.0.0", "version: 1.0");
        assert!(has_issue(&issues_of(&yaml), "version"));
    }

    #[test]
    fn test_single_step_workflow_is_rejected() {
        let yaml = r#"
name: w
version: 1.0.0
initiating_event: {name: E, topic: t.init}
steps:
  - name: Only
    topic: a.execute.x
    response_topic:
      success: [a.success.x]
      failure: [a.failure.x]
"#;
        assert!(has_issue(&issues_of(yaml), "steps"));
    }

    #[test]
    fn test_step_name_must_be_alphanumeric() {
        let yaml = minimal_yaml().replace("name: Charge", "name: Charge-2");
        assert!(has_issue(&issues_of(&yaml), "steps[1].name"));
    }

    #[test]
    fn test_duplicate_step_names_are_rejected() {
        let yaml = minimal_yaml().replace("name: Charge", "name: Reserve");
        let issues = issues_of(&yaml);
        assert!(issues.iter().any(|i| i.message.contains("duplicate")));
    }

    #[test]
    fn test_step_topic_must_be_execute_kind() {
        let yaml = minimal_yaml().replace(
            "topic: billing.execute.charge",
            "topic: billing.success.charge",
        );
        assert!(has_issue(&issues_of(&yaml), "steps[1].topic"));
    }

    #[test]
    fn test_response_topics_are_kind_checked() {
        let yaml = minimal_yaml().replace(
            "success: [billing.success.charge]",
            "success: [billing.failure.charge]",
        );
        assert!(has_issue(
            &issues_of(&yaml),
            "steps[1].response_topic.success[0]"
        ));
    }

    #[test]
    fn test_empty_response_topic_sets_are_rejected() {
        let yaml = minimal_yaml().replace("failure: [billing.failure.charge]", "failure: []");
        assert!(has_issue(
            &issues_of(&yaml),
            "steps[1].response_topic.failure"
        ));
    }

    #[test]
    fn test_unknown_dependency_is_rejected() {
        let yaml = minimal_yaml().replace("depends_on: [Reserve]", "depends_on: [Missing]");
        assert!(has_issue(&issues_of(&yaml), "steps[1].depends_on"));
    }

    #[test]
    fn test_dependency_cycle_is_rejected() {
        let yaml = minimal_yaml().replace(
            "  - name: Reserve\n    topic: inventory.execute.reserve",
            "  - name: Reserve\n    depends_on: [Charge]\n    topic: inventory.execute.reserve",
        );
        let issues = issues_of(&yaml);
        assert!(issues.iter().any(|i| i.message.contains("cycle")));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let yaml = minimal_yaml().replace("depends_on: [Reserve]", "depends_on: [Charge]");
        let issues = issues_of(&yaml);
        assert!(issues.iter().any(|i| i.message.contains("cycle")));
    }

    #[test]
    fn test_input_must_be_single_template_expression() {
        let yaml = minimal_yaml().replace(
            "reservation: \"{{Reserve.reservation_id}}\"",
            "reservation: \"literal-value\"",
        );
        assert!(has_issue(&issues_of(&yaml), "steps[1].input.reservation"));
    }

    #[test]
    fn test_initiating_pseudo_step_collision_is_rejected() {
        let yaml = minimal_yaml().replace("name: OrderPlaced\n", "name: Reserve\n");
        let issues = issues_of(&yaml);
        assert!(issues.iter().any(|i| i.message.contains("pseudo-step")));
    }

    #[test]
    fn test_unknown_action_is_not_an_error() {
        let yaml = minimal_yaml().replace(
            "depends_on: [Reserve]",
            "depends_on: [Reserve]\n    on_success:\n      - action: page_oncall",
        );
        assert!(validate(raw(&yaml)).is_ok());
    }

    #[test]
    fn test_empty_action_name_is_an_error() {
        let yaml = minimal_yaml().replace(
            "depends_on: [Reserve]",
            "depends_on: [Reserve]\n    on_failure:\n      action: \"\"",
        );
        assert!(has_issue(&issues_of(&yaml), "steps[1].on_failure.action"));
    }

    #[test]
    fn test_serialize_parse_validate_round_trip() {
        let definition = validate(raw(minimal_yaml())).unwrap();
        let text = serde_yaml::to_string(&definition).unwrap();
        let reloaded = validate(serde_yaml::from_str(&text).unwrap()).unwrap();
        assert_eq!(reloaded, definition);
    }
}
