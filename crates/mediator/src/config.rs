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

//! Mediator process configuration.
//!
//! ## Purpose
//! YAML configuration for the mediator: where definitions live, which bus
//! and state-store backends to use, and topic provisioning settings.
//! `${VAR}` and `${VAR:-default}` references are substituted from the
//! environment before parsing, so broker addresses and credentials stay out
//! of the file.
//!
//! ## Example
//! ```yaml
//! definitions_dir: ./definitions
//! consumer_group_prefix: mediator
//! bus:
//!   backend: kafka
//!   brokers: ["${KAFKA_BROKERS:-localhost:9092}"]
//!   partitions: 3
//!   replication: 1
//! store:
//!   backend: memory
//! ```

use crate::error::{MediatorError, MediatorResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn env_var_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").expect("env var pattern is valid")
    })
}

/// Top-level mediator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediatorConfig {
    /// Directory holding `*.yaml` workflow definitions
    #[serde(default = "default_definitions_dir")]
    pub definitions_dir: PathBuf,
    /// Consumer groups are named `"<prefix>-<topic>"`
    #[serde(default = "default_group_prefix")]
    pub consumer_group_prefix: String,
    /// Message-bus settings
    #[serde(default)]
    pub bus: BusSettings,
    /// State-store settings
    #[serde(default)]
    pub store: StoreSettings,
}

impl Default for MediatorConfig {
    fn default() -> Self {
        Self {
            definitions_dir: default_definitions_dir(),
            consumer_group_prefix: default_group_prefix(),
            bus: BusSettings::default(),
            store: StoreSettings::default(),
        }
    }
}

fn default_definitions_dir() -> PathBuf {
    PathBuf::from("definitions")
}

fn default_group_prefix() -> String {
    "mediator".to_string()
}

/// Message-bus backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusBackend {
    /// Apache Kafka (production)
    Kafka,
    /// In-process bus (local development and tests)
    Memory,
}

/// Message-bus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusSettings {
    /// Which backend to use
    #[serde(default = "default_bus_backend")]
    pub backend: BusBackend,
    /// Kafka bootstrap brokers
    #[serde(default = "default_brokers")]
    pub brokers: Vec<String>,
    /// Partition count for provisioned topics
    #[serde(default = "default_partitions")]
    pub partitions: i32,
    /// Replication factor for provisioned topics
    #[serde(default = "default_replication")]
    pub replication: i32,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            backend: default_bus_backend(),
            brokers: default_brokers(),
            partitions: default_partitions(),
            replication: default_replication(),
        }
    }
}

fn default_bus_backend() -> BusBackend {
    BusBackend::Kafka
}

fn default_brokers() -> Vec<String> {
    vec!["localhost:9092".to_string()]
}

fn default_partitions() -> i32 {
    3
}

fn default_replication() -> i32 {
    1
}

/// State-store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process store (local development and tests)
    Memory,
    /// Redis (requires the `redis-backend` feature)
    Redis,
}

/// State-store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Which backend to use
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,
    /// Redis connection URL
    #[serde(default = "default_store_url")]
    pub url: String,
    /// Key namespace prefix
    #[serde(default = "default_store_namespace")]
    pub namespace: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            url: default_store_url(),
            namespace: default_store_namespace(),
        }
    }
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Memory
}

fn default_store_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_store_namespace() -> String {
    "plexflow".to_string()
}

impl MediatorConfig {
    /// Load configuration from a YAML file, substituting `${VAR}` and
    /// `${VAR:-default}` from the environment first.
    ///
    /// ## Errors
    /// - [`MediatorError::Io`]: the file cannot be read
    /// - [`MediatorError::Configuration`]: an env reference has no value and
    ///   no default, or the YAML does not parse
    pub async fn load(path: &Path) -> MediatorResult<Self> {
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| MediatorError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
        let substituted = substitute_env_vars(&content)?;
        serde_yaml::from_str(&substituted).map_err(|e| {
            MediatorError::Configuration(format!("{}: {}", path.display(), e))
        })
    }
}

/// Replace `${VAR}` / `${VAR:-default}` references with environment values.
fn substitute_env_vars(content: &str) -> MediatorResult<String> {
    let mut result = String::with_capacity(content.len());
    let mut last = 0;

    for captures in env_var_regex().captures_iter(content) {
        let whole = captures.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        let name = &captures[1];
        let value = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => match captures.get(2) {
                Some(default) => default.as_str().to_string(),
                None => {
                    return Err(MediatorError::Configuration(format!(
                        "environment variable '{}' is not set and has no default",
                        name
                    )))
                }
            },
        };
        result.push_str(&content[last..whole.0]);
        result.push_str(&value);
        last = whole.1;
    }
    result.push_str(&content[last..]);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MediatorConfig::default();
        assert_eq!(config.consumer_group_prefix, "mediator");
        assert_eq!(config.bus.backend, BusBackend::Kafka);
        assert_eq!(config.bus.partitions, 3);
        assert_eq!(config.store.backend, StoreBackend::Memory);
    }

    #[test]
    fn test_parse_with_defaults_filled_in() {
        let config: MediatorConfig =
            serde_yaml::from_str("bus:\n  backend: memory\n").unwrap();
        assert_eq!(config.bus.backend, BusBackend::Memory);
        assert_eq!(config.bus.replication, 1);
        assert_eq!(config.definitions_dir, PathBuf::from("definitions"));
    }

    #[test]
    fn test_env_substitution_with_default() {
        let substituted =
            substitute_env_vars("brokers: [\"${PLEXFLOW_TEST_UNSET:-broker:9092}\"]").unwrap();
        assert_eq!(substituted, "brokers: [\"broker:9092\"]");
    }

    #[test]
    fn test_env_substitution_missing_without_default_fails() {
        assert!(substitute_env_vars("value: ${PLEXFLOW_TEST_UNSET_NO_DEFAULT}").is_err());
    }

    #[test]
    fn test_env_substitution_reads_environment() {
        std::env::set_var("PLEXFLOW_TEST_SET", "from-env");
        let substituted = substitute_env_vars("value: ${PLEXFLOW_TEST_SET}").unwrap();
        assert_eq!(substituted, "value: from-env");
        std::env::remove_var("PLEXFLOW_TEST_SET");
    }
}
