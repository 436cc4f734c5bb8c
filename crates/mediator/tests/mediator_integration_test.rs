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

//! Full-stack mediator tests over the in-memory bus: message routing,
//! provisioning, duplicate and malformed deliveries, custom actions, and
//! shutdown.

use async_trait::async_trait;
use plexflow_channel::{BusError, InMemoryBus, MessageBus};
use plexflow_engine::{
    ActionContext, ActionHandler, ActionRegistry, EngineResult, RunStatus, RunStore,
};
use plexflow_keyvalue::InMemoryKVStore;
use plexflow_mediator::{load_definitions, Mediator, MediatorConfig, MediatorError};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn two_step_yaml() -> &'static str {
    r#"
name: W
version: 1.0.0
initiating_event:
  name: Init
  topic: t.init
steps:
  - name: S1
    topic: a.execute.x
    response_topic:
      success: [a.success.x]
      failure: [a.failure.x]
  - name: S2
    topic: b.execute.y
    depends_on: [S1]
    input:
      k: "{{S1.v}}"
    response_topic:
      success: [b.success.y]
      failure: [b.failure.y]
"#
}

async fn start_mediator(yamls: &[&str]) -> (Mediator, InMemoryBus, Arc<InMemoryKVStore>) {
    let definitions = yamls
        .iter()
        .map(|y| plexflow_definition::loader::load_str(y).unwrap())
        .collect();
    let bus = InMemoryBus::new();
    let kv = Arc::new(InMemoryKVStore::new());
    let mediator = Mediator::new(
        MediatorConfig::default(),
        definitions,
        Arc::new(bus.clone()),
        kv.clone(),
    )
    .unwrap();
    mediator.provision_topics().await.unwrap();
    mediator.start().await.unwrap();
    (mediator, bus, kv)
}

/// Poll until `topic` has exactly `count` published messages.
async fn wait_for_dispatches(bus: &InMemoryBus, topic: &str, count: usize) {
    for _ in 0..200 {
        if bus.published(topic).await.len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "timed out waiting for {} message(s) on '{}', saw {:?}",
        count,
        topic,
        bus.published(topic).await.len()
    );
}

/// Poll until the run reaches the expected status.
async fn wait_for_status(store: &RunStore, workflow_id: &str, status: RunStatus) {
    for _ in 0..200 {
        if let Some(run) = store.load_run(workflow_id).await.unwrap() {
            if run.status == status {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for run {} to reach {:?}", workflow_id, status);
}

/// The only non-counter key in the store is the run's `workflow_id`. The
/// run is persisted just after the first dispatch, so poll briefly.
async fn run_id(kv: &InMemoryKVStore) -> String {
    for _ in 0..200 {
        if let Some(key) = kv.keys().await.into_iter().find(|k| !k.contains(':')) {
            return key;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no run was persisted");
}

fn reply_json(workflow_id: &str, success: bool, output: Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "workflow_id": workflow_id,
        "timestamp": "2025-06-01T12:00:00Z",
        "success": success,
        "output": output,
    }))
    .unwrap()
}

#[tokio::test]
async fn test_end_to_end_happy_path() {
    let (mediator, bus, kv) = start_mediator(&[two_step_yaml()]).await;

    bus.publish("t.init", br#"{"name": "o"}"#.to_vec())
        .await
        .unwrap();
    wait_for_dispatches(&bus, "a.execute.x", 1).await;
    assert_eq!(
        bus.published("a.execute.x").await,
        vec![serde_json::to_vec(&json!({})).unwrap()]
    );
    let id = run_id(&kv).await;

    bus.publish("a.success.x", reply_json(&id, true, json!({"v": 42})))
        .await
        .unwrap();
    wait_for_dispatches(&bus, "b.execute.y", 1).await;
    assert_eq!(
        bus.published("b.execute.y").await,
        vec![serde_json::to_vec(&json!({"k": 42})).unwrap()]
    );

    bus.publish("b.success.y", reply_json(&id, true, json!({})))
        .await
        .unwrap();
    let store = RunStore::new(kv.clone());
    wait_for_status(&store, &id, RunStatus::Success).await;

    mediator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_duplicate_reply_produces_one_dispatch() {
    let (mediator, bus, kv) = start_mediator(&[two_step_yaml()]).await;

    bus.publish("t.init", b"{}".to_vec()).await.unwrap();
    wait_for_dispatches(&bus, "a.execute.x", 1).await;
    let id = run_id(&kv).await;

    let reply = reply_json(&id, true, json!({"v": 1}));
    bus.publish("a.success.x", reply.clone()).await.unwrap();
    bus.publish("a.success.x", reply).await.unwrap();

    wait_for_dispatches(&bus, "b.execute.y", 1).await;
    // Give the duplicate time to be (wrongly) acted upon before asserting.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(bus.published("b.execute.y").await.len(), 1);

    mediator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_schema_invalid_reply_is_dropped() {
    let (mediator, bus, kv) = start_mediator(&[two_step_yaml()]).await;

    bus.publish("t.init", b"{}".to_vec()).await.unwrap();
    wait_for_dispatches(&bus, "a.execute.x", 1).await;
    let id = run_id(&kv).await;

    // Garbage first, then a valid reply; the consumer keeps serving.
    bus.publish("a.success.x", b"not json".to_vec()).await.unwrap();
    bus.publish("a.success.x", b"{\"success\": true}".to_vec())
        .await
        .unwrap();
    bus.publish("a.success.x", reply_json(&id, true, json!({"v": 7})))
        .await
        .unwrap();

    wait_for_dispatches(&bus, "b.execute.y", 1).await;

    mediator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_provisioning_creates_every_referenced_topic() {
    let (mediator, bus, _kv) = start_mediator(&[two_step_yaml()]).await;

    let topics = bus.list_topics().await.unwrap();
    for expected in [
        "t.init",
        "a.execute.x",
        "a.success.x",
        "a.failure.x",
        "b.execute.y",
        "b.success.y",
        "b.failure.y",
    ] {
        assert!(topics.contains(&expected.to_string()), "missing {}", expected);
    }

    mediator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_duplicate_initiating_topics_are_a_configuration_error() {
    let first = plexflow_definition::loader::load_str(two_step_yaml()).unwrap();
    let second =
        plexflow_definition::loader::load_str(&two_step_yaml().replace("name: W", "name: W2"))
            .unwrap();

    let result = Mediator::new(
        MediatorConfig::default(),
        vec![first, second],
        Arc::new(InMemoryBus::new()),
        Arc::new(InMemoryKVStore::new()),
    );
    assert!(matches!(result, Err(MediatorError::Configuration(_))));
}

#[tokio::test]
async fn test_mediator_requires_at_least_one_definition() {
    let result = Mediator::new(
        MediatorConfig::default(),
        vec![],
        Arc::new(InMemoryBus::new()),
        Arc::new(InMemoryKVStore::new()),
    );
    assert!(matches!(result, Err(MediatorError::Configuration(_))));
}

#[tokio::test]
async fn test_shutdown_is_idempotent_and_stops_intake() {
    let (mediator, bus, _kv) = start_mediator(&[two_step_yaml()]).await;

    mediator.shutdown().await.unwrap();
    mediator.shutdown().await.unwrap();

    assert!(matches!(
        bus.publish("t.init", b"{}".to_vec()).await,
        Err(BusError::BusClosed(_))
    ));
}

#[tokio::test]
async fn test_custom_failure_action_registered_at_startup() {
    struct Rescue;

    #[async_trait]
    impl ActionHandler for Rescue {
        async fn execute(
            &self,
            ctx: &mut ActionContext<'_>,
            _params: &serde_json::Map<String, Value>,
        ) -> EngineResult<()> {
            ctx.run_mut().status = RunStatus::Success;
            Ok(())
        }
    }

    let yaml = two_step_yaml().replace(
        "      failure: [a.failure.x]",
        "      failure: [a.failure.x]\n    on_failure:\n      action: rescue",
    );
    let definitions = vec![plexflow_definition::loader::load_str(&yaml).unwrap()];

    let mut failure_actions = ActionRegistry::failure_defaults();
    failure_actions.register("rescue", Arc::new(Rescue));

    let bus = InMemoryBus::new();
    let kv = Arc::new(InMemoryKVStore::new());
    let mediator = Mediator::with_registries(
        MediatorConfig::default(),
        definitions,
        Arc::new(bus.clone()),
        kv.clone(),
        Arc::new(ActionRegistry::success_defaults()),
        Arc::new(failure_actions),
    )
    .unwrap();
    mediator.provision_topics().await.unwrap();
    mediator.start().await.unwrap();

    bus.publish("t.init", b"{}".to_vec()).await.unwrap();
    wait_for_dispatches(&bus, "a.execute.x", 1).await;
    let id = run_id(&kv).await;

    bus.publish("a.failure.x", reply_json(&id, false, json!({})))
        .await
        .unwrap();

    let store = RunStore::new(kv.clone());
    wait_for_status(&store, &id, RunStatus::Success).await;

    mediator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_fixture_definitions_load_from_directory() {
    let definitions = load_definitions(Path::new("tests/fixtures")).await.unwrap();
    assert_eq!(definitions.len(), 1);

    let order = &definitions[0];
    assert_eq!(order.name, "order-fulfillment");
    assert_eq!(order.steps.len(), 3);
    assert_eq!(order.steps[0].on_failure.as_ref().unwrap().action, "retry");
}
