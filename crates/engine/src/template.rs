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

//! Template resolution against recorded step outputs.
//!
//! ## Purpose
//! Turns a step's declared input mapping (`name -> {{Step.field}}`) into the
//! concrete JSON object dispatched on the step's execute topic. Resolution
//! is a pure function of the input mapping and the run's recorded steps:
//! either every declared input resolves or the step is not dispatched at
//! all. Partial resolution is never surfaced.

use crate::types::StepState;
use plexflow_definition::TemplateExpr;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Reasons a template expression failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// Input value is not a single `{{Step.field}}` expression
    #[error("'{expr}' is not a single {{{{Step.field}}}} expression")]
    Malformed {
        /// The offending input value
        expr: String,
    },

    /// Expression names a step the run has no record of
    #[error("template references unknown step '{step}'")]
    UnknownStep {
        /// The referenced step name
        step: String,
    },

    /// Referenced step has not produced a payload yet
    #[error("step '{step}' has no recorded payload")]
    NoPayload {
        /// The referenced step name
        step: String,
    },

    /// Referenced output lacks the requested field
    #[error("output of step '{step}' has no field '{field}'")]
    MissingField {
        /// The referenced step name
        step: String,
        /// The missing output field
        field: String,
    },
}

/// Resolve every input of a step against the run's recorded step outputs.
///
/// ## Returns
/// The fully resolved parameter object, ready to serialize as the execute
/// message body.
///
/// ## Errors
/// The first unresolvable input aborts resolution; the caller must not
/// dispatch the step.
pub fn resolve(
    inputs: &BTreeMap<String, String>,
    steps: &BTreeMap<String, StepState>,
) -> Result<serde_json::Map<String, Value>, TemplateError> {
    let mut resolved = serde_json::Map::new();

    for (key, expr) in inputs {
        let parsed = TemplateExpr::parse(expr).ok_or_else(|| TemplateError::Malformed {
            expr: expr.clone(),
        })?;
        let state = steps
            .get(&parsed.step)
            .ok_or_else(|| TemplateError::UnknownStep {
                step: parsed.step.clone(),
            })?;
        let payload = state
            .payload
            .as_ref()
            .ok_or_else(|| TemplateError::NoPayload {
                step: parsed.step.clone(),
            })?;
        let value = payload
            .output
            .get(&parsed.field)
            .ok_or_else(|| TemplateError::MissingField {
                step: parsed.step.clone(),
                field: parsed.field.clone(),
            })?;
        resolved.insert(key.clone(), value.clone());
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventPayload, StepState, StepStatus};
    use chrono::Utc;

    fn steps_with_output(step: &str, output: serde_json::Map<String, Value>) -> BTreeMap<String, StepState> {
        let payload = EventPayload {
            workflow_id: "wf".to_string(),
            timestamp: Utc::now(),
            success: true,
            output,
        };
        BTreeMap::from([(
            step.to_string(),
            StepState::settled(step, StepStatus::Success, payload),
        )])
    }

    fn output(pairs: &[(&str, Value)]) -> serde_json::Map<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_resolves_arbitrary_json_values() {
        let steps = steps_with_output(
            "S1",
            output(&[("v", Value::from(42)), ("nested", serde_json::json!({"a": [1, 2]}))]),
        );
        let inputs = BTreeMap::from([
            ("k".to_string(), "{{S1.v}}".to_string()),
            ("n".to_string(), "{{ S1.nested }}".to_string()),
        ]);

        let resolved = resolve(&inputs, &steps).unwrap();
        assert_eq!(resolved.get("k"), Some(&Value::from(42)));
        assert_eq!(resolved.get("n"), Some(&serde_json::json!({"a": [1, 2]})));
    }

    #[test]
    fn test_empty_inputs_resolve_to_empty_object() {
        let resolved = resolve(&BTreeMap::new(), &BTreeMap::new()).unwrap();
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_unknown_step_fails() {
        let inputs = BTreeMap::from([("k".to_string(), "{{Ghost.v}}".to_string())]);
        assert_eq!(
            resolve(&inputs, &BTreeMap::new()),
            Err(TemplateError::UnknownStep {
                step: "Ghost".to_string()
            })
        );
    }

    #[test]
    fn test_missing_payload_fails() {
        let steps = BTreeMap::from([("S1".to_string(), StepState::ongoing("S1"))]);
        let inputs = BTreeMap::from([("k".to_string(), "{{S1.v}}".to_string())]);
        assert_eq!(
            resolve(&inputs, &steps),
            Err(TemplateError::NoPayload {
                step: "S1".to_string()
            })
        );
    }

    #[test]
    fn test_missing_field_fails() {
        let steps = steps_with_output("S1", output(&[("v", Value::from(42))]));
        let inputs = BTreeMap::from([("k".to_string(), "{{S1.missing}}".to_string())]);
        assert_eq!(
            resolve(&inputs, &steps),
            Err(TemplateError::MissingField {
                step: "S1".to_string(),
                field: "missing".to_string()
            })
        );
    }

    #[test]
    fn test_malformed_expression_fails() {
        let inputs = BTreeMap::from([("k".to_string(), "literal".to_string())]);
        assert_eq!(
            resolve(&inputs, &BTreeMap::new()),
            Err(TemplateError::Malformed {
                expr: "literal".to_string()
            })
        );
    }

    #[test]
    fn test_resolution_is_pure() {
        let steps = steps_with_output("S1", output(&[("v", Value::from(1))]));
        let inputs = BTreeMap::from([("k".to_string(), "{{S1.v}}".to_string())]);
        assert_eq!(resolve(&inputs, &steps), resolve(&inputs, &steps));
    }
}
