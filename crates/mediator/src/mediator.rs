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

//! The bus dispatcher.
//!
//! ## Purpose
//! Indexes loaded definitions by topic, provisions missing topics, runs one
//! consumer per distinct initiating/response topic, and routes every
//! delivery into the run state machine under the run's lock.
//!
//! ## Routing
//! - Initiating-topic messages carry a bare JSON object and start a new run
//! - Response-topic messages must parse as the reply envelope
//!   (`workflow_id`, `timestamp`, `success`, `output`); schema-invalid
//!   messages are logged and dropped
//! - A response topic may be shared by several workflows; each candidate
//!   executor checks run ownership and anomalous deliveries fall through
//!
//! ## Scheduling model
//! Parallel across topics, serial per run: consumers execute concurrently,
//! and [`RunLocks`] serializes all `init`/`continue` work per `workflow_id`.

use crate::config::MediatorConfig;
use crate::error::{MediatorError, MediatorResult};
use futures::StreamExt;
use plexflow_channel::{MessageBus, TopicSpec};
use plexflow_definition::WorkflowDefinition;
use plexflow_engine::{ActionRegistry, EventPayload, RunExecutor, RunStore};
use plexflow_keyvalue::KeyValueStore;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;

/// Per-`workflow_id` mutual exclusion.
///
/// Consumers for different topics may receive replies for the same run
/// concurrently; every state transition acquires the run's lock first, which
/// preserves the step-status monotonicity invariants under reordering and
/// duplication.
#[derive(Clone, Default)]
pub struct RunLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl RunLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one run, creating it on first use.
    pub async fn acquire(&self, workflow_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.inner.lock().await;
            table
                .entry(workflow_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Load every definition in a directory, skipping files that fail to parse
/// or validate.
///
/// ## Errors
/// Only when the directory itself cannot be read; individual bad files are
/// logged and skipped so the remaining workflows still serve.
pub async fn load_definitions(dir: &Path) -> MediatorResult<Vec<WorkflowDefinition>> {
    let results = plexflow_definition::loader::load_dir(dir)
        .await
        .map_err(|e| MediatorError::Configuration(e.to_string()))?;

    let mut definitions = Vec::new();
    for (path, result) in results {
        match result {
            Ok(definition) => {
                tracing::info!(
                    path = %path.display(),
                    workflow = %definition.name,
                    version = %definition.version,
                    "loaded workflow definition"
                );
                definitions.push(definition);
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "skipping definition");
            }
        }
    }
    Ok(definitions)
}

/// The central mediator: owns the consumers and drives the engine.
pub struct Mediator {
    config: MediatorConfig,
    bus: Arc<dyn MessageBus>,
    /// Initiating topic to that workflow's executor
    initiating: HashMap<String, RunExecutor>,
    /// Response topic to candidate executors (usually exactly one)
    responses: HashMap<String, Vec<RunExecutor>>,
    /// Union of every topic referenced by every loaded definition
    referenced_topics: BTreeSet<String>,
    locks: RunLocks,
    consumers: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Mediator {
    /// Build a mediator over loaded definitions with the built-in action
    /// registries.
    ///
    /// ## Errors
    /// [`MediatorError::Configuration`] when two workflows share an
    /// initiating topic, or no definitions were supplied.
    pub fn new(
        config: MediatorConfig,
        definitions: Vec<WorkflowDefinition>,
        bus: Arc<dyn MessageBus>,
        kv: Arc<dyn KeyValueStore>,
    ) -> MediatorResult<Self> {
        Self::with_registries(
            config,
            definitions,
            bus,
            kv,
            Arc::new(ActionRegistry::success_defaults()),
            Arc::new(ActionRegistry::failure_defaults()),
        )
    }

    /// Build a mediator with custom action registries (built-ins plus
    /// handlers registered at startup).
    pub fn with_registries(
        config: MediatorConfig,
        definitions: Vec<WorkflowDefinition>,
        bus: Arc<dyn MessageBus>,
        kv: Arc<dyn KeyValueStore>,
        success_actions: Arc<ActionRegistry>,
        failure_actions: Arc<ActionRegistry>,
    ) -> MediatorResult<Self> {
        if definitions.is_empty() {
            return Err(MediatorError::Configuration(
                "no workflow definitions loaded".to_string(),
            ));
        }

        let store = RunStore::new(kv);
        let mut initiating: HashMap<String, RunExecutor> = HashMap::new();
        let mut responses: HashMap<String, Vec<RunExecutor>> = HashMap::new();
        let mut referenced_topics = BTreeSet::new();

        for definition in definitions {
            let definition = Arc::new(definition);
            referenced_topics.extend(definition.referenced_topics());

            let executor = RunExecutor::with_registries(
                definition.clone(),
                store.clone(),
                bus.clone(),
                success_actions.clone(),
                failure_actions.clone(),
            );

            let topic = definition.initiating_event.topic.clone();
            if let Some(previous) = initiating.insert(topic.clone(), executor.clone()) {
                return Err(MediatorError::Configuration(format!(
                    "workflows '{}' and '{}' share initiating topic '{}'",
                    previous.definition().name,
                    definition.name,
                    topic
                )));
            }

            for step in &definition.steps {
                for response in step
                    .response_topic
                    .success
                    .iter()
                    .chain(step.response_topic.failure.iter())
                {
                    responses
                        .entry(response.as_str().to_string())
                        .or_default()
                        .push(executor.clone());
                }
            }
        }

        Ok(Self {
            config,
            bus,
            initiating,
            responses,
            referenced_topics,
            locks: RunLocks::new(),
            consumers: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// Topics referenced by the loaded definitions.
    pub fn referenced_topics(&self) -> impl Iterator<Item = &str> {
        self.referenced_topics.iter().map(|t| t.as_str())
    }

    /// Create every referenced topic the bus does not already have, with the
    /// configured partition and replication settings.
    pub async fn provision_topics(&self) -> MediatorResult<()> {
        let existing: HashSet<String> = self.bus.list_topics().await?.into_iter().collect();
        let missing: Vec<TopicSpec> = self
            .referenced_topics
            .iter()
            .filter(|name| !existing.contains(*name))
            .map(|name| {
                TopicSpec::new(
                    name.clone(),
                    self.config.bus.partitions,
                    self.config.bus.replication,
                )
            })
            .collect();

        if missing.is_empty() {
            tracing::info!("all referenced topics already exist");
            return Ok(());
        }

        tracing::info!(count = missing.len(), "creating missing topics");
        self.bus.create_topics(&missing).await?;
        Ok(())
    }

    /// Subscribe one consumer per distinct initiating/response topic and
    /// start routing.
    pub async fn start(&self) -> MediatorResult<()> {
        let mut consumers = self.consumers.lock().await;

        for (topic, executor) in &self.initiating {
            let group = self.group_for(topic);
            let stream = self.bus.subscribe(topic, &group).await?;
            let executor = executor.clone();
            let topic = topic.clone();

            consumers.push(tokio::spawn(async move {
                let mut stream = stream;
                tracing::info!(topic = %topic, "consuming initiating topic");
                while let Some(message) = stream.next().await {
                    match executor.init(&message.payload).await {
                        Ok(run) => {
                            tracing::debug!(
                                topic = %topic,
                                workflow_id = %run.workflow_id,
                                "run initiated"
                            );
                        }
                        Err(e) => {
                            tracing::warn!(topic = %topic, error = %e, "failed to initiate run");
                        }
                    }
                }
                tracing::debug!(topic = %topic, "initiating consumer stopped");
            }));
        }

        for (topic, executors) in &self.responses {
            let group = self.group_for(topic);
            let stream = self.bus.subscribe(topic, &group).await?;
            let executors = executors.clone();
            let locks = self.locks.clone();
            let topic = topic.clone();

            consumers.push(tokio::spawn(async move {
                let mut stream = stream;
                tracing::info!(topic = %topic, "consuming response topic");
                while let Some(message) = stream.next().await {
                    let payload: EventPayload = match serde_json::from_slice(&message.payload) {
                        Ok(payload) => payload,
                        Err(e) => {
                            tracing::warn!(
                                topic = %topic,
                                error = %e,
                                "dropping schema-invalid reply"
                            );
                            continue;
                        }
                    };

                    let _guard = locks.acquire(&payload.workflow_id).await;
                    for executor in &executors {
                        match executor.continue_run(&topic, payload.clone()).await {
                            Ok(Some(_)) => break,
                            Ok(None) => continue,
                            Err(e) => {
                                tracing::error!(
                                    topic = %topic,
                                    workflow_id = %payload.workflow_id,
                                    error = %e,
                                    "reply processing failed"
                                );
                                break;
                            }
                        }
                    }
                }
                tracing::debug!(topic = %topic, "response consumer stopped");
            }));
        }

        tracing::info!(consumers = consumers.len(), "mediator started");
        Ok(())
    }

    /// Disconnect all consumers, then release bus resources. Idempotent;
    /// in-flight handler invocations complete before consumers join.
    pub async fn shutdown(&self) -> MediatorResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("shutting down mediator");

        // Closing the bus ends every subscription stream concurrently.
        self.bus.close().await?;

        let consumers = std::mem::take(&mut *self.consumers.lock().await);
        for handle in consumers {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "consumer task aborted");
            }
        }
        tracing::info!("mediator shutdown complete");
        Ok(())
    }

    fn group_for(&self, topic: &str) -> String {
        format!("{}-{}", self.config.consumer_group_prefix, topic)
    }
}
