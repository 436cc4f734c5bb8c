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

//! Run persistence over the key-value store.
//!
//! ## Persisted layout
//! - Run state: JSON document at its `workflow_id` key
//! - Retry counters: JSON integer at `"<workflow_id>:<step_name>"`; an
//!   absent key reads as 0
//!
//! Both values are opaque to the store. There are no cross-key transactions;
//! every `put` is its own commit point.

use crate::types::{EngineResult, RunState};
use plexflow_keyvalue::KeyValueStore;
use std::sync::Arc;

/// Typed facade over the key-value store for run state and retry counters.
#[derive(Clone)]
pub struct RunStore {
    kv: Arc<dyn KeyValueStore>,
}

impl RunStore {
    /// Wrap a key-value store.
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Mint a fresh run identifier.
    pub fn new_run_id(&self) -> String {
        self.kv.new_key()
    }

    /// Load a run by `workflow_id`; `None` when this mediator has no record
    /// of it.
    pub async fn load_run(&self, workflow_id: &str) -> EngineResult<Option<RunState>> {
        match self.kv.get(workflow_id).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Persist a run under its `workflow_id` key.
    pub async fn save_run(&self, run: &RunState) -> EngineResult<()> {
        self.kv
            .put(&run.workflow_id, serde_json::to_vec(run)?)
            .await?;
        Ok(())
    }

    fn counter_key(workflow_id: &str, step_name: &str) -> String {
        format!("{}:{}", workflow_id, step_name)
    }

    /// Current retry count for `(workflow_id, step_name)`; absent key is 0.
    pub async fn retry_count(&self, workflow_id: &str, step_name: &str) -> EngineResult<u64> {
        match self.kv.get(&Self::counter_key(workflow_id, step_name)).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(0),
        }
    }

    /// Increment and persist the retry counter, returning the new value.
    pub async fn record_attempt(&self, workflow_id: &str, step_name: &str) -> EngineResult<u64> {
        let next = self.retry_count(workflow_id, step_name).await? + 1;
        self.kv
            .put(
                &Self::counter_key(workflow_id, step_name),
                serde_json::to_vec(&next)?,
            )
            .await?;
        Ok(next)
    }
}
