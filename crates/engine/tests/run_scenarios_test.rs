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

//! End-to-end run scenarios over the in-memory bus and store: happy path,
//! duplicate replies, bounded retry, template failures, and skip rescue.

use chrono::Utc;
use plexflow_channel::InMemoryBus;
use plexflow_engine::{
    EngineError, EventPayload, RunExecutor, RunStatus, RunStore, StepStatus, TemplateError,
};
use plexflow_keyvalue::InMemoryKVStore;
use serde_json::{json, Value};
use std::sync::Arc;

fn two_step_workflow() -> &'static str {
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

fn setup(yaml: &str) -> (RunExecutor, InMemoryBus, RunStore) {
    let definition = Arc::new(plexflow_definition::loader::load_str(yaml).unwrap());
    let store = RunStore::new(Arc::new(InMemoryKVStore::new()));
    let bus = InMemoryBus::new();
    let executor = RunExecutor::new(definition, store.clone(), Arc::new(bus.clone()));
    (executor, bus, store)
}

fn reply(workflow_id: &str, success: bool, output: Value) -> EventPayload {
    let output = match output {
        Value::Object(map) => map,
        _ => panic!("reply output must be an object"),
    };
    EventPayload {
        workflow_id: workflow_id.to_string(),
        timestamp: Utc::now(),
        success,
        output,
    }
}

fn body(value: Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
}

#[tokio::test]
async fn test_happy_path_runs_to_success() {
    let (executor, bus, _store) = setup(two_step_workflow());

    // Initiating message dispatches the dependency-free step with an empty
    // input object.
    let run = executor.init(br#"{"name": "o"}"#).await.unwrap();
    assert_eq!(run.status, RunStatus::InProgress);
    assert_eq!(run.steps["Init"].status, StepStatus::Success);
    assert_eq!(run.steps["S1"].status, StepStatus::Ongoing);
    assert!(!run.steps.contains_key("S2"));
    assert_eq!(bus.published("a.execute.x").await, vec![body(json!({}))]);

    // S1 success resolves and dispatches S2.
    let run = executor
        .continue_run("a.success.x", reply(&run.workflow_id, true, json!({"v": 42})))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.status, RunStatus::InProgress);
    assert_eq!(run.steps["S1"].status, StepStatus::Success);
    assert_eq!(run.steps["S2"].status, StepStatus::Ongoing);
    assert_eq!(bus.published("b.execute.y").await, vec![body(json!({"k": 42}))]);

    // S2 success completes the run.
    let run = executor
        .continue_run("b.success.y", reply(&run.workflow_id, true, json!({})))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.status, RunStatus::Success);
    assert!(run
        .steps
        .values()
        .all(|s| s.status == StepStatus::Success));
}

#[tokio::test]
async fn test_duplicate_success_reply_is_idempotent() {
    let (executor, bus, store) = setup(two_step_workflow());
    let run = executor.init(b"{}").await.unwrap();
    let payload = reply(&run.workflow_id, true, json!({"v": 42}));

    let first = executor
        .continue_run("a.success.x", payload.clone())
        .await
        .unwrap();
    assert!(first.is_some());
    let after_first = store.load_run(&run.workflow_id).await.unwrap().unwrap();

    // Second identical delivery is dropped at the idempotency gate.
    let second = executor
        .continue_run("a.success.x", payload)
        .await
        .unwrap();
    assert!(second.is_none());

    let after_second = store.load_run(&run.workflow_id).await.unwrap().unwrap();
    assert_eq!(after_second, after_first);
    assert_eq!(bus.published("b.execute.y").await.len(), 1);
}

#[tokio::test]
async fn test_reply_for_settled_step_never_regresses_status() {
    let (executor, _bus, store) = setup(two_step_workflow());
    let run = executor.init(b"{}").await.unwrap();

    executor
        .continue_run("a.success.x", reply(&run.workflow_id, true, json!({"v": 1})))
        .await
        .unwrap();

    // A late failure reply for the already-successful step is dropped.
    let result = executor
        .continue_run("a.failure.x", reply(&run.workflow_id, false, json!({})))
        .await
        .unwrap();
    assert!(result.is_none());

    let state = store.load_run(&run.workflow_id).await.unwrap().unwrap();
    assert_eq!(state.steps["S1"].status, StepStatus::Success);
    assert_eq!(state.status, RunStatus::InProgress);
}

fn retry_workflow() -> &'static str {
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
    on_failure:
      action: retry
      max_attempts: 3
      action_after_attempts: abort
  - name: S2
    topic: b.execute.y
    depends_on: [S1]
    response_topic:
      success: [b.success.y]
      failure: [b.failure.y]
"#
}

#[tokio::test]
async fn test_retry_then_recover() {
    let (executor, bus, _store) = setup(retry_workflow());
    let run = executor.init(b"{}").await.unwrap();
    let id = run.workflow_id.clone();

    // Two failures, each re-dispatching S1.
    for _ in 0..2 {
        let state = executor
            .continue_run("a.failure.x", reply(&id, false, json!({})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.status, RunStatus::InProgress);
        assert_eq!(state.steps["S1"].status, StepStatus::Ongoing);
    }
    assert_eq!(bus.published("a.execute.x").await.len(), 3);

    // Third attempt succeeds; the run proceeds and completes.
    executor
        .continue_run("a.success.x", reply(&id, true, json!({})))
        .await
        .unwrap()
        .unwrap();
    let state = executor
        .continue_run("b.success.y", reply(&id, true, json!({})))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.status, RunStatus::Success);
    assert_eq!(bus.published("a.execute.x").await.len(), 3);
}

#[tokio::test]
async fn test_retry_exhausted_leaves_run_failed() {
    let (executor, bus, store) = setup(retry_workflow());
    let run = executor.init(b"{}").await.unwrap();
    let id = run.workflow_id.clone();

    for _ in 0..2 {
        executor
            .continue_run("a.failure.x", reply(&id, false, json!({})))
            .await
            .unwrap();
    }
    let state = executor
        .continue_run("a.failure.x", reply(&id, false, json!({})))
        .await
        .unwrap()
        .unwrap();

    // Initial dispatch plus two retries; the third failure exhausts the
    // bound and the successor action (abort) lets the failure stand.
    assert_eq!(bus.published("a.execute.x").await.len(), 3);
    assert_eq!(state.status, RunStatus::Failed);
    assert_eq!(state.steps["S1"].status, StepStatus::Failure);
    assert_eq!(store.retry_count(&id, "S1").await.unwrap(), 3);

    // Terminal stability: further replies do not mutate the run.
    let late = executor
        .continue_run("a.failure.x", reply(&id, false, json!({})))
        .await
        .unwrap();
    assert!(late.is_none());
    let reloaded = store.load_run(&id).await.unwrap().unwrap();
    assert_eq!(reloaded, state);
}

#[tokio::test]
async fn test_unresolvable_template_fails_the_run() {
    let yaml = two_step_workflow().replace("{{S1.v}}", "{{S1.missing}}");
    let (executor, bus, store) = setup(&yaml);
    let run = executor.init(b"{}").await.unwrap();

    let result = executor
        .continue_run("a.success.x", reply(&run.workflow_id, true, json!({"v": 42})))
        .await;
    assert!(matches!(
        result,
        Err(EngineError::Template(TemplateError::MissingField { .. }))
    ));

    // S2 never entered ongoing; the run is persisted as Failed.
    let state = store.load_run(&run.workflow_id).await.unwrap().unwrap();
    assert_eq!(state.status, RunStatus::Failed);
    assert!(!state.steps.contains_key("S2"));
    assert!(bus.published("b.execute.y").await.is_empty());
}

#[tokio::test]
async fn test_skip_rescues_a_failed_run() {
    let yaml = two_step_workflow().replace(
        "      failure: [a.failure.x]",
        "      failure: [a.failure.x]\n    on_failure:\n      action: skip",
    );
    let (executor, bus, _store) = setup(&yaml);
    let run = executor.init(b"{}").await.unwrap();

    let state = executor
        .continue_run("a.failure.x", reply(&run.workflow_id, false, json!({})))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(state.status, RunStatus::Success);
    assert_eq!(state.steps["S1"].status, StepStatus::Failure);
    assert!(bus.published("b.execute.y").await.is_empty());
}

#[tokio::test]
async fn test_reply_for_unknown_run_is_dropped() {
    let (executor, _bus, _store) = setup(two_step_workflow());
    let result = executor
        .continue_run("a.success.x", reply("no-such-run", true, json!({})))
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_reply_on_unmatched_topic_is_dropped() {
    let (executor, _bus, _store) = setup(two_step_workflow());
    let run = executor.init(b"{}").await.unwrap();
    let result = executor
        .continue_run("z.success.unknown", reply(&run.workflow_id, true, json!({})))
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_initiating_message_must_be_a_json_object() {
    let (executor, _bus, _store) = setup(two_step_workflow());
    assert!(matches!(
        executor.init(b"[1, 2]").await,
        Err(EngineError::Payload(_))
    ));
    assert!(matches!(
        executor.init(b"not json").await,
        Err(EngineError::Payload(_))
    ));
}
