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

//! # PlexFlow KeyValue Store
//!
//! ## Purpose
//! Provides the narrow key-value storage abstraction the mediator uses for
//! persistent run state and retry counters.
//!
//! ## Architecture Context
//! Every workflow run is persisted under its opaque `workflow_id` key; retry
//! counters live under `"<workflow_id>:<step_name>"` keys. The store treats
//! both as opaque byte values; JSON encoding is the caller's concern.
//!
//! The contract is deliberately small:
//! - `new_key()`: mint a globally unique, opaque run identifier
//! - `get(key)`: non-destructive read, `None` when absent
//! - `put(key, value)`: atomic per-key overwrite
//!
//! No cross-key transactions are promised. Each `put` is the commit point for
//! whatever invariant it establishes; callers must not rely on compound
//! atomicity.
//!
//! ## Key Components
//! - [`KeyValueStore`]: trait defining the contract
//! - [`InMemoryKVStore`]: HashMap-based implementation for tests and local runs
//! - `RedisKVStore`: distributed backend (feature: `redis-backend`)
//! - [`KVError`]: error type for all operations
//!
//! ## Examples
//!
//! ```rust
//! use plexflow_keyvalue::{InMemoryKVStore, KeyValueStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let kv = InMemoryKVStore::new();
//!
//! let run_id = kv.new_key();
//! kv.put(&run_id, b"{\"status\":\"InProgress\"}".to_vec()).await?;
//!
//! let value = kv.get(&run_id).await?;
//! assert!(value.is_some());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use async_trait::async_trait;

pub mod error;
pub mod memory;

#[cfg(feature = "redis-backend")]
pub mod redis;

pub use error::{KVError, KVResult};
pub use memory::InMemoryKVStore;

#[cfg(feature = "redis-backend")]
pub use crate::redis::RedisKVStore;

/// KeyValue store trait defining the state-store contract.
///
/// ## Design Decisions
/// - **Non-destructive reads**: `get()` does not remove the value
/// - **Opaque values**: byte vectors in, byte vectors out; serialization is
///   the caller's concern
/// - **Per-key atomicity only**: `put` overwrites atomically at the key
///   level; there are no multi-key transactions
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Mint a globally unique opaque key.
    ///
    /// ## Returns
    /// A lexicographically sortable ULID string. Uniqueness holds across
    /// processes; no coordination with the backend is required.
    fn new_key(&self) -> String {
        ulid::Ulid::new().to_string()
    }

    /// Get value by key (non-destructive read).
    ///
    /// ## Returns
    /// - `Ok(Some(value))` if the key exists
    /// - `Ok(None)` if the key does not exist
    /// - `Err(...)` on storage failure
    async fn get(&self, key: &str) -> KVResult<Option<Vec<u8>>>;

    /// Put key-value pair, overwriting any existing value.
    ///
    /// ## Behavior
    /// The write is atomic at the per-key level and durable according to the
    /// backend's guarantees.
    async fn put(&self, key: &str, value: Vec<u8>) -> KVResult<()>;
}
