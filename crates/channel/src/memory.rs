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

//! In-memory message bus.
//!
//! ## Purpose
//! In-process [`MessageBus`] implementation backed by Tokio channels, for
//! tests and local development where a Kafka broker is not available.
//!
//! ## Semantics
//! - One queue per (topic, consumer group): a published message is delivered
//!   once per group (fan-out across groups, not within)
//! - Topics are created on first use; `create_topics` pre-registers them
//! - A full publish log per topic is retained for test inspection
//!
//! ## Limitations
//! - Not persistent, not distributed
//! - Unbounded queues (tests publish small volumes)

use crate::{BusError, BusMessage, BusResult, MessageBus, TopicSpec};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

#[derive(Default)]
struct TopicState {
    /// Consumer-group name to live queue sender
    groups: HashMap<String, mpsc::UnboundedSender<BusMessage>>,
    /// Everything ever published, in order
    log: Vec<Vec<u8>>,
}

/// In-memory bus for tests and local runs.
///
/// ## Example
/// ```rust
/// use futures::StreamExt;
/// use plexflow_channel::{InMemoryBus, MessageBus};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bus = InMemoryBus::new();
/// let mut stream = bus.subscribe("orders", "mediator-orders").await?;
///
/// bus.publish("orders", b"{}".to_vec()).await?;
/// let msg = stream.next().await.unwrap();
/// assert_eq!(msg.topic, "orders");
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBus {
    topics: Arc<RwLock<HashMap<String, TopicState>>>,
    closed: Arc<AtomicBool>,
}

impl InMemoryBus {
    /// Create a new, empty in-memory bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads published to `topic`, in publish order. Test helper.
    pub async fn published(&self, topic: &str) -> Vec<Vec<u8>> {
        self.topics
            .read()
            .await
            .get(topic)
            .map(|state| state.log.clone())
            .unwrap_or_default()
    }

    fn ensure_open(&self) -> BusResult<()> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(BusError::BusClosed("in-memory bus".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn list_topics(&self) -> BusResult<Vec<String>> {
        self.ensure_open()?;
        let mut names: Vec<String> = self.topics.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn create_topics(&self, specs: &[TopicSpec]) -> BusResult<()> {
        self.ensure_open()?;
        let mut topics = self.topics.write().await;
        for spec in specs {
            topics.entry(spec.name.clone()).or_default();
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> BusResult<()> {
        self.ensure_open()?;
        let mut topics = self.topics.write().await;
        let state = topics.entry(topic.to_string()).or_default();
        state.log.push(payload.clone());

        // Drop queues whose subscriber has gone away.
        state.groups.retain(|_, sender| {
            sender
                .send(BusMessage {
                    topic: topic.to_string(),
                    payload: payload.clone(),
                })
                .is_ok()
        });
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
    ) -> BusResult<BoxStream<'static, BusMessage>> {
        self.ensure_open()?;
        let (tx, mut rx) = mpsc::unbounded_channel();
        {
            let mut topics = self.topics.write().await;
            let state = topics.entry(topic.to_string()).or_default();
            state.groups.insert(group.to_string(), tx);
        }

        let stream = async_stream::stream! {
            while let Some(msg) = rx.recv().await {
                yield msg;
            }
        };
        Ok(Box::pin(stream))
    }

    async fn close(&self) -> BusResult<()> {
        self.closed.store(true, Ordering::Relaxed);
        // Dropping the senders ends every subscription stream.
        let mut topics = self.topics.write().await;
        for state in topics.values_mut() {
            state.groups.clear();
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}
