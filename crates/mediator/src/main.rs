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

//! PlexFlow mediator binary.
//!
//! ## Purpose
//! Process bootstrap: wire the bus, the state store, and the mediator, then
//! run until SIGINT/SIGTERM. Exits 0 on clean shutdown, non-zero on startup
//! failure.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use plexflow_channel::{InMemoryBus, KafkaBus, KafkaBusConfig, MessageBus};
use plexflow_keyvalue::{InMemoryKVStore, KeyValueStore};
use plexflow_mediator::{
    load_definitions, shutdown, BusBackend, Mediator, MediatorConfig, StoreBackend,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "plexflow")]
#[command(about = "PlexFlow workflow mediator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the mediator until a shutdown signal arrives
    Serve {
        /// Path to the mediator configuration file
        #[arg(short, long, default_value = "plexflow.yaml")]
        config: PathBuf,
    },
    /// Validate workflow definition files and exit
    Validate {
        /// Directory holding definition files
        #[arg(short, long, default_value = "definitions")]
        dir: PathBuf,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { config } => serve(config).await,
        Commands::Validate { dir } => validate(dir).await,
    }
}

async fn serve(config_path: PathBuf) -> Result<()> {
    let config = if config_path.exists() {
        MediatorConfig::load(&config_path)
            .await
            .with_context(|| format!("loading {}", config_path.display()))?
    } else {
        tracing::warn!(path = %config_path.display(), "config file not found, using defaults");
        MediatorConfig::default()
    };

    let definitions = load_definitions(&config.definitions_dir)
        .await
        .context("loading workflow definitions")?;
    if definitions.is_empty() {
        bail!(
            "no valid workflow definitions in {}",
            config.definitions_dir.display()
        );
    }

    let bus: Arc<dyn MessageBus> = match config.bus.backend {
        BusBackend::Kafka => Arc::new(
            KafkaBus::new(KafkaBusConfig {
                brokers: config.bus.brokers.clone(),
                ..Default::default()
            })
            .context("connecting to Kafka")?,
        ),
        BusBackend::Memory => {
            tracing::warn!("using the in-memory bus; messages are not durable");
            Arc::new(InMemoryBus::new())
        }
    };

    let kv: Arc<dyn KeyValueStore> = match config.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory state store; runs are not durable");
            Arc::new(InMemoryKVStore::new())
        }
        #[cfg(feature = "redis-backend")]
        StoreBackend::Redis => Arc::new(
            plexflow_keyvalue::RedisKVStore::new(&config.store.url, &config.store.namespace)
                .await
                .context("connecting to Redis")?,
        ),
        #[cfg(not(feature = "redis-backend"))]
        StoreBackend::Redis => {
            bail!("this build does not include the redis-backend feature")
        }
    };

    let mediator = Mediator::new(config, definitions, bus, kv)?;
    mediator.provision_topics().await.context("provisioning topics")?;
    mediator.start().await.context("starting consumers")?;

    let signal = shutdown::listen_for_signals()
        .await
        .context("signal listener ended unexpectedly")?;
    tracing::info!(signal = %signal, "beginning graceful shutdown");

    mediator.shutdown().await?;
    Ok(())
}

async fn validate(dir: PathBuf) -> Result<()> {
    let results = plexflow_definition::loader::load_dir(&dir)
        .await
        .with_context(|| format!("reading {}", dir.display()))?;
    if results.is_empty() {
        bail!("no definition files in {}", dir.display());
    }

    let mut invalid = 0;
    for (path, result) in results {
        match result {
            Ok(definition) => {
                println!(
                    "ok      {} ({} v{}, {} steps)",
                    path.display(),
                    definition.name,
                    definition.version,
                    definition.steps.len()
                );
            }
            Err(e) => {
                invalid += 1;
                println!("invalid {}: {}", path.display(), e);
            }
        }
    }

    if invalid > 0 {
        bail!("{} definition file(s) failed validation", invalid);
    }
    Ok(())
}
