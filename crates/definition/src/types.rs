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

//! Workflow definition model.
//!
//! ## Purpose
//! Two layers of types:
//! - `Raw*`: the loosely-typed tree parsed straight from YAML. Every field
//!   is defaulted so that a missing or malformed field becomes a validation
//!   issue instead of a parse abort, letting the validator report all
//!   offenses at once.
//! - The validated model ([`WorkflowDefinition`] and friends), immutable
//!   after load, with topics parsed and classified.

use crate::topic::Topic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ── Raw (pre-validation) tree ────────────────────────────────────────────

/// Unvalidated workflow tree as parsed from YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawWorkflow {
    /// Workflow name
    #[serde(default)]
    pub name: String,
    /// Optional human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Semantic version `X.Y.Z`
    #[serde(default)]
    pub version: String,
    /// Initiating event descriptor
    #[serde(default)]
    pub initiating_event: RawInitiatingEvent,
    /// Step descriptors in presentation order
    #[serde(default)]
    pub steps: Vec<RawStep>,
}

/// Unvalidated initiating-event descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawInitiatingEvent {
    /// Pseudo-step key the initiating payload is stored under
    #[serde(default)]
    pub name: String,
    /// Externally-owned topic whose arrival creates a run
    #[serde(default)]
    pub topic: String,
}

/// Unvalidated step descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawStep {
    /// Step name, unique within the workflow
    #[serde(default)]
    pub name: String,
    /// Execute-topic the step publishes to
    #[serde(default)]
    pub topic: String,
    /// Parameter name to template expression
    #[serde(default)]
    pub input: BTreeMap<String, String>,
    /// Names of steps that must succeed before this one dispatches
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Response-topic sets the step awaits
    #[serde(default)]
    pub response_topic: RawResponseTopics,
    /// Ordered success action descriptors
    #[serde(default)]
    pub on_success: Vec<ActionSpec>,
    /// Optional failure action descriptor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<ActionSpec>,
}

/// Unvalidated response-topic sets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawResponseTopics {
    /// Success-reply topics
    #[serde(default)]
    pub success: Vec<String>,
    /// Failure-reply topics
    #[serde(default)]
    pub failure: Vec<String>,
}

// ── Validated model ──────────────────────────────────────────────────────

/// A validated workflow definition. Immutable after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Workflow name
    pub name: String,
    /// Optional human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Semantic version `X.Y.Z`
    pub version: String,
    /// The event whose arrival creates a new run
    pub initiating_event: InitiatingEvent,
    /// Steps in presentation order; execution follows the dependency DAG
    pub steps: Vec<StepDefinition>,
}

impl WorkflowDefinition {
    /// Look up a step by name.
    pub fn step(&self, name: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Every topic the workflow references: initiating, execute, and both
    /// response sets. Order follows the definition; duplicates retained.
    pub fn referenced_topics(&self) -> Vec<String> {
        let mut topics = vec![self.initiating_event.topic.clone()];
        for step in &self.steps {
            topics.push(step.topic.as_str().to_string());
            for t in &step.response_topic.success {
                topics.push(t.as_str().to_string());
            }
            for t in &step.response_topic.failure {
                topics.push(t.as_str().to_string());
            }
        }
        topics
    }
}

/// The initiating event of a workflow.
///
/// The topic is externally owned and NOT subject to the
/// execute/success/failure discipline; `name` is the pseudo-step key under
/// which the initiating payload is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiatingEvent {
    /// Pseudo-step key
    pub name: String,
    /// Externally-owned event topic
    pub topic: String,
}

/// A validated workflow step. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Step name (alphanumeric, unique within the workflow)
    pub name: String,
    /// Execute-topic this step publishes to
    pub topic: Topic,
    /// Parameter name to `{{Step.field}}` template expression
    #[serde(default)]
    pub input: BTreeMap<String, String>,
    /// Steps that must have succeeded before this step is dispatchable
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Response-topic sets the step awaits
    pub response_topic: ResponseTopics,
    /// Ordered success action descriptors
    #[serde(default)]
    pub on_success: Vec<ActionSpec>,
    /// Optional failure action descriptor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<ActionSpec>,
}

/// Validated response-topic sets; both are non-empty and kind-checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseTopics {
    /// Success-reply topics (`<ns>.success.<action>`)
    pub success: Vec<Topic>,
    /// Failure-reply topics (`<ns>.failure.<action>`)
    pub failure: Vec<Topic>,
}

/// A success/failure action descriptor: a handler name plus free-form
/// parameters. Interpretation is deferred to the action registry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Registered handler name (e.g. `log`, `retry`, `skip`)
    #[serde(default)]
    pub action: String,
    /// Handler parameters, passed through uninterpreted
    #[serde(flatten)]
    pub params: serde_json::Map<String, Value>,
}
