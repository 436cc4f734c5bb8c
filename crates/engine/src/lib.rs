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

//! # PlexFlow Engine
//!
//! ## Purpose
//! Per-run workflow orchestration: the state machine that drives a single
//! run from its initiating event to a terminal status.
//!
//! ## Architecture Context
//! The engine sits between the mediator (which owns bus consumers and
//! per-run serialization) and the state store:
//!
//! - [`executor::RunExecutor`]: `init` a run on an initiating event,
//!   `continue_run` on a success/failure reply, dispatch ready steps
//! - [`template`]: resolve `{{Step.field}}` inputs against recorded outputs
//! - [`actions`]: success/failure action registries (`log`, `log_output`,
//!   `retry`, `skip`, `abort`, plus startup-registered extensions)
//! - [`storage::RunStore`]: run state and retry counters over the key-value
//!   store
//!
//! ## Concurrency
//! The executor itself holds no locks. Callers must serialize all
//! `init`/`continue_run` invocations per `workflow_id`; the mediator does
//! this with a per-run mutex. Dispatches for distinct ready steps of one run
//! may still be issued from the single holder of that lock.

#![warn(clippy::all)]

pub mod actions;
pub mod executor;
pub mod storage;
pub mod template;
pub mod types;

pub use actions::{ActionContext, ActionHandler, ActionRegistry};
pub use executor::RunExecutor;
pub use storage::RunStore;
pub use template::TemplateError;
pub use types::{EngineError, EngineResult, EventPayload, RunState, RunStatus, StepState, StepStatus};
