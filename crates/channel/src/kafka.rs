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

//! Kafka backend for the mediator's message bus.
//!
//! ## Purpose
//! Production [`MessageBus`] implementation over Apache Kafka: durable,
//! partitioned, replicated topics with consumer-group load balancing.
//!
//! ## Design Decisions
//! - **rdkafka**: Rust Kafka client library
//! - **Producer**: one shared FutureProducer for all execute-topic dispatch
//! - **Consumers**: one StreamConsumer per subscription, auto-commit
//!   (at-least-once; the engine's idempotency gate absorbs redelivery)
//! - **Admin**: AdminClient for topic enumeration and creation at startup
//! - **Shutdown**: a watch channel terminates every subscription stream

use crate::{BusError, BusMessage, BusResult, MessageBus, TopicSpec};
use async_trait::async_trait;
use futures::stream::BoxStream;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::RDKafkaErrorCode;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::Message as KafkaMessage;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Kafka connection settings.
#[derive(Debug, Clone)]
pub struct KafkaBusConfig {
    /// Bootstrap broker addresses (e.g. `["localhost:9092"]`)
    pub brokers: Vec<String>,
    /// Producer send timeout
    pub send_timeout: Duration,
}

impl Default for KafkaBusConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            send_timeout: Duration::from_secs(5),
        }
    }
}

/// Publish/consume counters, updated with relaxed atomics.
#[derive(Default)]
struct BusStatsData {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    messages_failed: AtomicU64,
}

/// Kafka-backed [`MessageBus`].
///
/// ## Invariants
/// - One topic per logical mailbox; message key unused (partitioning is
///   round-robin, ordering per run is the engine's per-run lock)
/// - Consumer group per subscription, stable across restarts
#[derive(Clone)]
pub struct KafkaBus {
    config: KafkaBusConfig,
    brokers: String,
    producer: Arc<FutureProducer>,
    admin: Arc<AdminClient<DefaultClientContext>>,
    stats: Arc<BusStatsData>,
    closed: Arc<AtomicBool>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl KafkaBus {
    /// Create a new Kafka bus.
    ///
    /// ## Errors
    /// - [`BusError::InvalidConfiguration`]: no brokers configured
    /// - [`BusError::BackendError`]: client construction failed
    pub fn new(config: KafkaBusConfig) -> BusResult<Self> {
        if config.brokers.is_empty() {
            return Err(BusError::InvalidConfiguration(
                "at least one Kafka broker is required".to_string(),
            ));
        }
        let brokers = config.brokers.join(",");

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| BusError::BackendError(format!("failed to create producer: {}", e)))?;

        let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .create()
            .map_err(|e| BusError::BackendError(format!("failed to create admin client: {}", e)))?;

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            brokers,
            producer: Arc::new(producer),
            admin: Arc::new(admin),
            stats: Arc::new(BusStatsData::default()),
            closed: Arc::new(AtomicBool::new(false)),
            shutdown_tx: Arc::new(shutdown_tx),
        })
    }

    fn create_consumer(&self, group: &str) -> BusResult<StreamConsumer> {
        ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", group)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(|e| BusError::BackendError(format!("failed to create consumer: {}", e)))
    }

    fn ensure_open(&self) -> BusResult<()> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(BusError::BusClosed(self.brokers.clone()));
        }
        Ok(())
    }

    /// Messages sent, received, and failed since construction.
    pub fn stats(&self) -> (u64, u64, u64) {
        (
            self.stats.messages_sent.load(Ordering::Relaxed),
            self.stats.messages_received.load(Ordering::Relaxed),
            self.stats.messages_failed.load(Ordering::Relaxed),
        )
    }
}

#[async_trait]
impl MessageBus for KafkaBus {
    async fn list_topics(&self) -> BusResult<Vec<String>> {
        self.ensure_open()?;
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || {
            let metadata = producer
                .client()
                .fetch_metadata(None, Duration::from_secs(10))
                .map_err(|e| BusError::BackendError(format!("metadata fetch failed: {}", e)))?;
            Ok(metadata
                .topics()
                .iter()
                .map(|t| t.name().to_string())
                .collect())
        })
        .await
        .map_err(|e| BusError::BackendError(format!("metadata task failed: {}", e)))?
    }

    async fn create_topics(&self, specs: &[TopicSpec]) -> BusResult<()> {
        self.ensure_open()?;
        if specs.is_empty() {
            return Ok(());
        }

        let new_topics: Vec<NewTopic<'_>> = specs
            .iter()
            .map(|s| NewTopic::new(&s.name, s.partitions, TopicReplication::Fixed(s.replication)))
            .collect();

        let results = self
            .admin
            .create_topics(new_topics.iter(), &AdminOptions::new())
            .await
            .map_err(|e| BusError::BackendError(format!("topic creation failed: {}", e)))?;

        for result in results {
            match result {
                Ok(_) => {}
                Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    tracing::debug!(topic = %name, "topic already exists");
                }
                Err((name, code)) => {
                    return Err(BusError::BackendError(format!(
                        "failed to create topic '{}': {}",
                        name, code
                    )));
                }
            }
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> BusResult<()> {
        self.ensure_open()?;

        let record = FutureRecord::<(), _>::to(topic).payload(&payload);
        self.producer
            .send(record, self.config.send_timeout)
            .await
            .map_err(|(e, _)| {
                self.stats.messages_failed.fetch_add(1, Ordering::Relaxed);
                BusError::BackendError(format!("failed to send to '{}': {}", topic, e))
            })?;

        self.stats.messages_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
    ) -> BusResult<BoxStream<'static, BusMessage>> {
        self.ensure_open()?;

        let consumer = self.create_consumer(group)?;
        consumer
            .subscribe(&[topic])
            .map_err(|e| BusError::BackendError(format!("failed to subscribe: {}", e)))?;

        let topic_name = topic.to_string();
        let stats = self.stats.clone();
        let mut shutdown = self.shutdown_tx.subscribe();

        let stream = async_stream::stream! {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    result = consumer.recv() => match result {
                        Ok(message) => {
                            let payload = message.payload().map(|p| p.to_vec()).unwrap_or_default();
                            stats.messages_received.fetch_add(1, Ordering::Relaxed);
                            yield BusMessage { topic: topic_name.clone(), payload };
                        }
                        Err(e) => {
                            tracing::warn!(topic = %topic_name, error = %e, "consumer error");
                        }
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }

    async fn close(&self) -> BusResult<()> {
        self.closed.store(true, Ordering::Relaxed);
        let _ = self.shutdown_tx.send(true);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}
