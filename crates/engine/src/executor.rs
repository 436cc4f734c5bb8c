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

//! The per-run state machine.
//!
//! ## Purpose
//! Drives a single workflow run from its initiating event to a terminal
//! status: dependency resolution, input resolution, execute-topic dispatch,
//! reply correlation, action handlers, terminal detection.
//!
//! ## Reply handling order
//! A reply is processed as: idempotency gate, record the step outcome,
//! tentative terminal detection, advance (if still in progress), action
//! handlers, terminal re-detection, persist. Handlers run after the
//! tentative detection so `skip` can rewrite a Failed run to Success and
//! `retry` can reset it to InProgress; the re-detection then settles the
//! final status before the single persist of the reply (handlers that
//! re-dispatch persist once more themselves).
//!
//! ## Dispatch contract
//! The body published to a step's execute topic is exactly the resolved
//! input mapping as a bare JSON object. The `workflow_id` is NOT embedded;
//! downstream services echo it back in their reply envelope from context
//! they already hold.
//!
//! ## Concurrency
//! The executor assumes the caller serializes all operations per
//! `workflow_id`. It holds no locks of its own.

use crate::actions::{ActionContext, ActionRegistry};
use crate::storage::RunStore;
use crate::template;
use crate::types::{
    EngineError, EngineResult, EventPayload, RunState, RunStatus, StepState, StepStatus,
};
use chrono::Utc;
use plexflow_channel::MessageBus;
use plexflow_definition::{StepDefinition, Topic, TopicKind, WorkflowDefinition};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Executes runs of one workflow definition.
#[derive(Clone)]
pub struct RunExecutor {
    definition: Arc<WorkflowDefinition>,
    store: RunStore,
    bus: Arc<dyn MessageBus>,
    success_actions: Arc<ActionRegistry>,
    failure_actions: Arc<ActionRegistry>,
}

impl RunExecutor {
    /// Create an executor with the built-in action registries.
    pub fn new(definition: Arc<WorkflowDefinition>, store: RunStore, bus: Arc<dyn MessageBus>) -> Self {
        Self::with_registries(
            definition,
            store,
            bus,
            Arc::new(ActionRegistry::success_defaults()),
            Arc::new(ActionRegistry::failure_defaults()),
        )
    }

    /// Create an executor with custom action registries (built-ins plus
    /// handlers registered at startup).
    pub fn with_registries(
        definition: Arc<WorkflowDefinition>,
        store: RunStore,
        bus: Arc<dyn MessageBus>,
        success_actions: Arc<ActionRegistry>,
        failure_actions: Arc<ActionRegistry>,
    ) -> Self {
        Self {
            definition,
            store,
            bus,
            success_actions,
            failure_actions,
        }
    }

    /// The definition this executor serves.
    pub fn definition(&self) -> &WorkflowDefinition {
        &self.definition
    }

    /// Start a new run from an initiating message.
    ///
    /// The raw message body is the initial output object; it is wrapped in a
    /// synthesized success payload and recorded under the initiating
    /// pseudo-step, after which every dependency-free step dispatches.
    ///
    /// ## Errors
    /// - [`EngineError::Payload`]: the body is not a JSON object
    /// - [`EngineError::Template`]: a ready step's inputs did not resolve;
    ///   the run is persisted as Failed
    pub async fn init(&self, initiating_body: &[u8]) -> EngineResult<RunState> {
        let output: serde_json::Map<String, Value> = serde_json::from_slice(initiating_body)
            .map_err(|e| {
                EngineError::Payload(format!("initiating message is not a JSON object: {}", e))
            })?;

        let workflow_id = self.store.new_run_id();
        let now = Utc::now();
        let pseudo = &self.definition.initiating_event.name;
        let payload = EventPayload {
            workflow_id: workflow_id.clone(),
            timestamp: now,
            success: true,
            output,
        };

        let mut run = RunState {
            workflow_id,
            name: self.definition.name.clone(),
            initiated_at: now,
            status: RunStatus::InProgress,
            steps: BTreeMap::from([(
                pseudo.clone(),
                StepState::settled(pseudo.clone(), StepStatus::Success, payload),
            )]),
        };

        tracing::info!(
            workflow_id = %run.workflow_id,
            workflow = %run.name,
            "initiated run"
        );

        if let Err(e) = self.advance(&mut run).await {
            run.status = RunStatus::Failed;
            self.store.save_run(&run).await?;
            return Err(e);
        }
        self.store.save_run(&run).await?;
        Ok(run)
    }

    /// Apply a response-topic delivery to its run.
    ///
    /// ## Returns
    /// - `Ok(Some(run))` when the reply was applied
    /// - `Ok(None)` for delivery anomalies: execute-topic or undisciplined
    ///   deliveries, unknown runs, replies matching no step, and replies for
    ///   steps that are not ongoing (duplicates, reordering). All are logged
    ///   and dropped, never fatal.
    pub async fn continue_run(
        &self,
        topic: &str,
        payload: EventPayload,
    ) -> EngineResult<Option<RunState>> {
        let outcome = match Topic::parse(topic) {
            Ok(t) => match t.kind() {
                TopicKind::Execute => {
                    tracing::debug!(topic, "ignoring delivery on execute topic");
                    return Ok(None);
                }
                TopicKind::Success => StepStatus::Success,
                TopicKind::Failure => StepStatus::Failure,
            },
            Err(reason) => {
                tracing::warn!(topic, %reason, "dropping delivery on undisciplined topic");
                return Ok(None);
            }
        };

        let Some(mut run) = self.store.load_run(&payload.workflow_id).await? else {
            tracing::info!(
                workflow_id = %payload.workflow_id,
                topic,
                "reply for unknown run; not owned by this mediator"
            );
            return Ok(None);
        };
        if run.name != self.definition.name {
            tracing::debug!(
                workflow_id = %run.workflow_id,
                run_workflow = %run.name,
                workflow = %self.definition.name,
                "reply belongs to another workflow"
            );
            return Ok(None);
        }

        let Some(step_def) = self.step_awaiting(topic, outcome) else {
            tracing::warn!(
                workflow_id = %payload.workflow_id,
                topic,
                "reply matches no step of this workflow"
            );
            return Ok(None);
        };

        // Idempotency gate: only an ongoing step accepts a reply. Duplicate
        // and reordered deliveries stop here, keeping step transitions
        // monotone.
        match run.steps.get(&step_def.name) {
            Some(state) if state.status == StepStatus::Ongoing => {}
            Some(state) => {
                tracing::info!(
                    workflow_id = %run.workflow_id,
                    step = %step_def.name,
                    status = ?state.status,
                    "dropping reply for settled step"
                );
                return Ok(None);
            }
            None => {
                tracing::info!(
                    workflow_id = %run.workflow_id,
                    step = %step_def.name,
                    "dropping reply for undispatched step"
                );
                return Ok(None);
            }
        }

        tracing::info!(
            workflow_id = %run.workflow_id,
            step = %step_def.name,
            outcome = ?outcome,
            "recorded step reply"
        );
        run.steps.insert(
            step_def.name.clone(),
            StepState::settled(step_def.name.clone(), outcome, payload),
        );

        // Tentative terminal detection, before handlers get a say.
        run.status = if self.all_steps_succeeded(&run) {
            RunStatus::Success
        } else if outcome == StepStatus::Failure {
            RunStatus::Failed
        } else {
            RunStatus::InProgress
        };

        if run.status == RunStatus::InProgress {
            if let Err(e) = self.advance(&mut run).await {
                run.status = RunStatus::Failed;
                self.store.save_run(&run).await?;
                return Err(e);
            }
        }

        self.run_handlers(&mut run, step_def, outcome).await?;

        // Re-detect after handlers: a retry may have re-opened the failing
        // step, a skip may have rescued the run. Success is recomputed from
        // the steps; anything else stands as the handlers left it.
        if self.all_steps_succeeded(&run) {
            run.status = RunStatus::Success;
        }

        self.store.save_run(&run).await?;
        if run.status != RunStatus::InProgress {
            tracing::info!(
                workflow_id = %run.workflow_id,
                status = ?run.status,
                "run reached terminal status"
            );
        }
        Ok(Some(run))
    }

    /// Dispatch every undispatched step whose dependencies have all
    /// succeeded.
    async fn advance(&self, run: &mut RunState) -> EngineResult<()> {
        let done: HashSet<String> = run
            .steps
            .values()
            .filter(|s| s.status == StepStatus::Success)
            .map(|s| s.name.clone())
            .collect();

        for step in &self.definition.steps {
            if run.steps.contains_key(&step.name) {
                continue;
            }
            if !step.depends_on.iter().all(|d| done.contains(d)) {
                continue;
            }

            let inputs = template::resolve(&step.input, &run.steps)?;
            let body = serde_json::to_vec(&Value::Object(inputs))?;
            self.bus.publish(step.topic.as_str(), body).await?;
            tracing::info!(
                workflow_id = %run.workflow_id,
                step = %step.name,
                topic = %step.topic,
                "dispatched step"
            );
            run.steps
                .insert(step.name.clone(), StepState::ongoing(step.name.clone()));
        }
        Ok(())
    }

    /// Run the settled step's handlers through the registry matching the
    /// outcome: the ordered `on_success` list, or the single `on_failure`
    /// descriptor.
    async fn run_handlers(
        &self,
        run: &mut RunState,
        step_def: &StepDefinition,
        outcome: StepStatus,
    ) -> EngineResult<()> {
        let (registry, specs): (&ActionRegistry, Vec<&plexflow_definition::ActionSpec>) =
            match outcome {
                StepStatus::Success => (
                    self.success_actions.as_ref(),
                    step_def.on_success.iter().collect(),
                ),
                StepStatus::Failure => (
                    self.failure_actions.as_ref(),
                    step_def.on_failure.iter().collect(),
                ),
                StepStatus::Ongoing => return Ok(()),
            };

        for spec in specs {
            let mut ctx = ActionContext::new(
                run,
                &step_def.name,
                &self.definition,
                &self.store,
                self.bus.as_ref(),
                registry,
            );
            ctx.run_handler(&spec.action, &spec.params).await?;
        }
        Ok(())
    }

    fn step_awaiting(&self, topic: &str, outcome: StepStatus) -> Option<&StepDefinition> {
        self.definition.steps.iter().find(|s| {
            let set = match outcome {
                StepStatus::Success => &s.response_topic.success,
                _ => &s.response_topic.failure,
            };
            set.iter().any(|t| t.as_str() == topic)
        })
    }

    /// Invariant: the run is Success iff every declared step succeeded.
    fn all_steps_succeeded(&self, run: &RunState) -> bool {
        self.definition.steps.iter().all(|step| {
            run.steps
                .get(&step.name)
                .map(|s| s.status == StepStatus::Success)
                .unwrap_or(false)
        })
    }
}
