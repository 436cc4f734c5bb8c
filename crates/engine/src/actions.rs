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

//! Success and failure action handlers.
//!
//! ## Purpose
//! When a step settles, its `on_success` list or `on_failure` descriptor
//! names handlers to run. Handlers receive an [`ActionContext`], a
//! capability object rather than an inheritance hook: it exposes the run and
//! step state plus the two operations a handler may need, `retry_step` and
//! `run_handler`.
//!
//! Two registries exist, one per dispatch context:
//!
//! | registry | action       | effect                                        |
//! |----------|--------------|-----------------------------------------------|
//! | success  | `log`        | operator-visible log line (`message` param)   |
//! | success  | `log_output` | log the step's reply payload                  |
//! | failure  | `retry`      | bounded re-dispatch, then a successor action  |
//! | failure  | `skip`       | mark the run Success despite the failure      |
//! | failure  | `abort`      | no-op; the failure stands                     |
//!
//! A name missing from the applicable registry warns and is otherwise a
//! no-op. Custom handlers are registered at startup via
//! [`ActionRegistry::register`].

use crate::storage::RunStore;
use crate::template;
use crate::types::{EngineError, EngineResult, RunState, RunStatus, StepState, StepStatus};
use async_trait::async_trait;
use plexflow_channel::MessageBus;
use plexflow_definition::WorkflowDefinition;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A success or failure action handler.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Run the handler against the current run.
    ///
    /// Handlers may mutate the run through the context; the executor
    /// persists the run after all handlers for a reply have finished.
    async fn execute(
        &self,
        ctx: &mut ActionContext<'_>,
        params: &Map<String, Value>,
    ) -> EngineResult<()>;
}

/// Name-to-handler mapping for one dispatch context (success or failure).
#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in success registry: `log`, `log_output`.
    pub fn success_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("log", Arc::new(LogAction));
        registry.register("log_output", Arc::new(LogOutputAction));
        registry
    }

    /// The built-in failure registry: `retry`, `skip`, `abort`.
    pub fn failure_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("retry", Arc::new(RetryAction));
        registry.register("skip", Arc::new(SkipAction));
        registry.register("abort", Arc::new(AbortAction));
        registry
    }

    /// Register a handler, replacing any previous one under the same name.
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    /// Look up a handler by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(name).cloned()
    }
}

/// Capability set handed to a handler for the duration of one invocation.
pub struct ActionContext<'a> {
    run: &'a mut RunState,
    step_name: &'a str,
    definition: &'a WorkflowDefinition,
    store: &'a RunStore,
    bus: &'a dyn MessageBus,
    registry: &'a ActionRegistry,
}

impl<'a> ActionContext<'a> {
    /// Build a context for one handler dispatch.
    pub fn new(
        run: &'a mut RunState,
        step_name: &'a str,
        definition: &'a WorkflowDefinition,
        store: &'a RunStore,
        bus: &'a dyn MessageBus,
        registry: &'a ActionRegistry,
    ) -> Self {
        Self {
            run,
            step_name,
            definition,
            store,
            bus,
            registry,
        }
    }

    /// The run being mutated.
    pub fn run_mut(&mut self) -> &mut RunState {
        self.run
    }

    /// The run's identifier.
    pub fn workflow_id(&self) -> &str {
        &self.run.workflow_id
    }

    /// Name of the step whose reply triggered this handler.
    pub fn step_name(&self) -> &str {
        self.step_name
    }

    /// State of the triggering step.
    pub fn step(&self) -> Option<&StepState> {
        self.run.steps.get(self.step_name)
    }

    /// Mutable state of the triggering step.
    pub fn step_mut(&mut self) -> Option<&mut StepState> {
        self.run.steps.get_mut(self.step_name)
    }

    /// Retry counter value for the triggering step, incremented and
    /// persisted.
    pub async fn record_attempt(&mut self) -> EngineResult<u64> {
        self.store
            .record_attempt(&self.run.workflow_id, self.step_name)
            .await
    }

    /// Reset the triggering step to `ongoing`, persist the run, and re-emit
    /// its execute message with freshly re-resolved inputs.
    pub async fn retry_step(&mut self) -> EngineResult<()> {
        let step_def = self.definition.step(self.step_name).ok_or_else(|| {
            EngineError::Payload(format!(
                "step '{}' is not part of workflow '{}'",
                self.step_name, self.definition.name
            ))
        })?;

        let inputs = template::resolve(&step_def.input, &self.run.steps)?;

        if let Some(state) = self.run.steps.get_mut(self.step_name) {
            state.status = StepStatus::Ongoing;
            state.payload = None;
        }
        self.run.status = RunStatus::InProgress;
        self.store.save_run(self.run).await?;

        let body = serde_json::to_vec(&Value::Object(inputs))?;
        self.bus.publish(step_def.topic.as_str(), body).await?;
        tracing::info!(
            workflow_id = %self.run.workflow_id,
            step = %self.step_name,
            topic = %step_def.topic,
            "re-dispatched step"
        );
        Ok(())
    }

    /// Invoke another handler from the same registry this dispatch came
    /// from. Unknown names warn and are otherwise a no-op.
    pub async fn run_handler(
        &mut self,
        name: &str,
        params: &Map<String, Value>,
    ) -> EngineResult<()> {
        match self.registry.get(name) {
            Some(handler) => handler.execute(self, params).await,
            None => {
                tracing::warn!(
                    workflow_id = %self.run.workflow_id,
                    step = %self.step_name,
                    action = %name,
                    "no handler registered for action"
                );
                Ok(())
            }
        }
    }
}

// ── Built-in handlers ────────────────────────────────────────────────────

/// `log`: emit the `message` parameter at INFO.
struct LogAction;

#[async_trait]
impl ActionHandler for LogAction {
    async fn execute(
        &self,
        ctx: &mut ActionContext<'_>,
        params: &Map<String, Value>,
    ) -> EngineResult<()> {
        let message = params.get("message").and_then(Value::as_str).unwrap_or("");
        tracing::info!(
            workflow_id = %ctx.workflow_id(),
            step = %ctx.step_name(),
            "{}",
            message
        );
        Ok(())
    }
}

/// `log_output`: emit the step's reply payload at INFO.
struct LogOutputAction;

#[async_trait]
impl ActionHandler for LogOutputAction {
    async fn execute(
        &self,
        ctx: &mut ActionContext<'_>,
        _params: &Map<String, Value>,
    ) -> EngineResult<()> {
        let payload = ctx
            .step()
            .and_then(|s| s.payload.as_ref())
            .map(|p| serde_json::to_string(p).unwrap_or_default())
            .unwrap_or_else(|| "null".to_string());
        tracing::info!(
            workflow_id = %ctx.workflow_id(),
            step = %ctx.step_name(),
            payload = %payload,
            "step output"
        );
        Ok(())
    }
}

/// `retry`: bounded re-dispatch with a successor action once exhausted.
struct RetryAction;

impl RetryAction {
    /// `max_attempts` may be an integer or a numeric string.
    fn max_attempts(params: &Map<String, Value>) -> Option<u64> {
        match params.get("max_attempts")? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[async_trait]
impl ActionHandler for RetryAction {
    async fn execute(
        &self,
        ctx: &mut ActionContext<'_>,
        params: &Map<String, Value>,
    ) -> EngineResult<()> {
        let Some(max_attempts) = Self::max_attempts(params) else {
            tracing::warn!(
                workflow_id = %ctx.workflow_id(),
                step = %ctx.step_name(),
                "retry action without a usable max_attempts; failure stands"
            );
            return Ok(());
        };

        let attempts = ctx.record_attempt().await?;
        if attempts < max_attempts {
            tracing::info!(
                workflow_id = %ctx.workflow_id(),
                step = %ctx.step_name(),
                attempt = attempts,
                max_attempts,
                "retrying step"
            );
            ctx.retry_step().await
        } else {
            let successor = params
                .get("action_after_attempts")
                .and_then(Value::as_str)
                .unwrap_or("abort");
            tracing::warn!(
                workflow_id = %ctx.workflow_id(),
                step = %ctx.step_name(),
                attempts,
                successor = %successor,
                "retry attempts exhausted"
            );
            ctx.run_handler(successor, &Map::new()).await
        }
    }
}

/// `skip`: mark the run Success despite the failure.
struct SkipAction;

#[async_trait]
impl ActionHandler for SkipAction {
    async fn execute(
        &self,
        ctx: &mut ActionContext<'_>,
        _params: &Map<String, Value>,
    ) -> EngineResult<()> {
        tracing::info!(
            workflow_id = %ctx.workflow_id(),
            step = %ctx.step_name(),
            "skipping failed step"
        );
        ctx.run_mut().status = RunStatus::Success;
        Ok(())
    }
}

/// `abort`: the failure stands.
struct AbortAction;

#[async_trait]
impl ActionHandler for AbortAction {
    async fn execute(
        &self,
        _ctx: &mut ActionContext<'_>,
        _params: &Map<String, Value>,
    ) -> EngineResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registries_carry_builtins() {
        let success = ActionRegistry::success_defaults();
        assert!(success.get("log").is_some());
        assert!(success.get("log_output").is_some());
        assert!(success.get("retry").is_none());

        let failure = ActionRegistry::failure_defaults();
        assert!(failure.get("retry").is_some());
        assert!(failure.get("skip").is_some());
        assert!(failure.get("abort").is_some());
        assert!(failure.get("log").is_none());
    }

    #[test]
    fn test_max_attempts_accepts_int_and_numeric_string() {
        let mut params = Map::new();
        params.insert("max_attempts".to_string(), Value::from(3));
        assert_eq!(RetryAction::max_attempts(&params), Some(3));

        params.insert("max_attempts".to_string(), Value::from(" 5 "));
        assert_eq!(RetryAction::max_attempts(&params), Some(5));

        params.insert("max_attempts".to_string(), Value::from("many"));
        assert_eq!(RetryAction::max_attempts(&params), None);

        assert_eq!(RetryAction::max_attempts(&Map::new()), None);
    }

    #[test]
    fn test_register_replaces_handler() {
        struct Nop;
        #[async_trait]
        impl ActionHandler for Nop {
            async fn execute(
                &self,
                _ctx: &mut ActionContext<'_>,
                _params: &Map<String, Value>,
            ) -> EngineResult<()> {
                Ok(())
            }
        }

        let mut registry = ActionRegistry::new();
        registry.register("custom", Arc::new(Nop));
        assert!(registry.get("custom").is_some());
        assert!(registry.get("other").is_none());
    }
}
