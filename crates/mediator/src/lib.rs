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

//! # PlexFlow Mediator
//!
//! ## Purpose
//! The central mediator process: loads workflow definitions, provisions bus
//! topics, subscribes one consumer per distinct topic, and routes initiating
//! and response messages into the run state machine.
//!
//! ## Architecture Context
//! ```text
//! definition files ──▶ loader ──▶ Mediator
//!                                   │  one consumer per topic
//!                                   ▼
//!   initiating topic ──▶ RunExecutor::init ─────┐
//!   response topics  ──▶ RunExecutor::continue ─┤ per-run lock
//!                                   │           ▼
//!                                   └──▶ execute topics + state store
//! ```
//!
//! ## Concurrency
//! Consumers run concurrently across topics. Per `workflow_id`, every state
//! transition is serialized through [`mediator::RunLocks`].
//!
//! ## Key Components
//! - [`mediator::Mediator`]: load, provision, subscribe, shutdown
//! - [`config::MediatorConfig`]: YAML config with `${VAR}` substitution
//! - [`shutdown`]: SIGINT/SIGTERM listener

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod mediator;
pub mod shutdown;

pub use config::{BusBackend, BusSettings, MediatorConfig, StoreBackend, StoreSettings};
pub use error::{MediatorError, MediatorResult};
pub use mediator::{load_definitions, Mediator, RunLocks};
