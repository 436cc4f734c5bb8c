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

//! Run-time state types and the engine error taxonomy.

use crate::template::TemplateError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the run state machine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A step input template could not be resolved; the affected step is
    /// never dispatched and the run is marked Failed
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// A wire payload was structurally invalid
    #[error("invalid payload: {0}")]
    Payload(String),

    /// State-store failure; retryable via the bus's at-least-once replay
    #[error("state store error: {0}")]
    Store(#[from] plexflow_keyvalue::KVError),

    /// Bus publish failure
    #[error("bus error: {0}")]
    Bus(#[from] plexflow_channel::BusError),

    /// JSON (de)serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Reply envelope carried on every response topic.
///
/// The initiating message is the exception: it carries a bare JSON object,
/// and the mediator synthesizes this wrapper around it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    /// Opaque identifier of the run this reply belongs to
    pub workflow_id: String,
    /// Producer-side timestamp (ISO-8601)
    pub timestamp: DateTime<Utc>,
    /// Whether the exchange succeeded
    pub success: bool,
    /// Step output fields, readable by downstream templates
    #[serde(default)]
    pub output: serde_json::Map<String, Value>,
}

/// Status of one step within a run.
///
/// Transitions are monotone: `absent -> ongoing -> (success | failure)`.
/// Once terminal, further replies are ignored; only the `retry` action may
/// reset a step to `ongoing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Dispatched, awaiting a reply
    Ongoing,
    /// Success reply recorded
    Success,
    /// Failure reply recorded
    Failure,
}

/// Status of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// At least one step is still outstanding
    InProgress,
    /// Every declared step succeeded (or `skip` rescued a failure)
    Success,
    /// A step failed and no recovery action rewrote the outcome
    Failed,
}

/// Recorded state of one step (or the initiating pseudo-step).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepState {
    /// Step name
    pub name: String,
    /// Current status
    pub status: StepStatus,
    /// Last observed reply, or the synthesized initiating payload; `None`
    /// while dispatched but unanswered
    pub payload: Option<EventPayload>,
}

impl StepState {
    /// A freshly dispatched step: ongoing, no payload yet.
    pub fn ongoing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Ongoing,
            payload: None,
        }
    }

    /// A settled step carrying its reply.
    pub fn settled(name: impl Into<String>, status: StepStatus, payload: EventPayload) -> Self {
        Self {
            name: name.into(),
            status,
            payload: Some(payload),
        }
    }
}

/// Persisted state of one workflow run, stored under its `workflow_id` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Opaque run identifier
    pub workflow_id: String,
    /// Name of the workflow definition this run executes
    pub name: String,
    /// When the initiating event arrived
    pub initiated_at: DateTime<Utc>,
    /// Run status; terminal values are absorbing except for explicit
    /// recovery actions
    pub status: RunStatus,
    /// Step name to recorded step state (includes the initiating pseudo-step)
    pub steps: BTreeMap<String, StepState>,
}
