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

//! # PlexFlow Channel
//!
//! ## Purpose
//! Message-bus abstraction for the mediator: topic provisioning, publishing,
//! and group-scoped subscription, with pluggable backends.
//!
//! ## Architecture Context
//! The mediator talks to the outside world only through [`MessageBus`]:
//! - enumerate and create topics at startup (provisioning)
//! - publish execute-topic dispatch messages
//! - subscribe one consumer per initiating/response topic in a stable
//!   consumer group
//!
//! Delivery is at-least-once; duplicate and reordered deliveries are the
//! engine's problem (idempotency gate), not the bus's.
//!
//! ## Key Components
//! - [`MessageBus`]: the contract
//! - [`KafkaBus`]: Apache Kafka backend via rdkafka
//! - [`InMemoryBus`]: in-process backend for tests and local development
//! - [`BusError`]: error type for all operations

#![warn(clippy::all)]

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

pub mod kafka;
pub mod memory;

pub use kafka::{KafkaBus, KafkaBusConfig};
pub use memory::InMemoryBus;

/// Result type for bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// Errors that can occur during bus operations.
#[derive(Error, Debug)]
pub enum BusError {
    /// Bus has been closed
    #[error("Bus closed: {0}")]
    BusClosed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Backend-specific error
    #[error("Backend error: {0}")]
    BackendError(String),

    /// Operation timed out
    #[error("Timeout: {0}")]
    Timeout(String),
}

/// A message received from the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Topic the message arrived on
    pub topic: String,
    /// Raw message value
    pub payload: Vec<u8>,
}

/// Topic creation request: name plus partition/replication settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSpec {
    /// Topic name
    pub name: String,
    /// Partition count
    pub partitions: i32,
    /// Replication factor
    pub replication: i32,
}

impl TopicSpec {
    /// Convenience constructor.
    pub fn new(name: impl Into<String>, partitions: i32, replication: i32) -> Self {
        Self {
            name: name.into(),
            partitions,
            replication,
        }
    }
}

/// Message-bus contract consumed by the mediator.
///
/// ## Design Decisions
/// - **Async**: every operation may suspend on network I/O
/// - **At-least-once**: implementations may redeliver; consumers must
///   tolerate duplicates
/// - **Group-scoped subscribe**: one consumer per (topic, group); messages
///   are load-balanced within a group and fanned out across groups
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Enumerate existing topic names.
    async fn list_topics(&self) -> BusResult<Vec<String>>;

    /// Create the given topics. Topics that already exist are left untouched.
    async fn create_topics(&self, specs: &[TopicSpec]) -> BusResult<()>;

    /// Publish a raw value to a topic. Safe for concurrent use.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> BusResult<()>;

    /// Subscribe to a topic in a named consumer group.
    ///
    /// ## Returns
    /// A stream of messages that ends when the bus is closed.
    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
    ) -> BusResult<BoxStream<'static, BusMessage>>;

    /// Close the bus: stop all subscription streams and release resources.
    /// Idempotent.
    async fn close(&self) -> BusResult<()>;

    /// Whether `close` has been called.
    fn is_closed(&self) -> bool;
}
