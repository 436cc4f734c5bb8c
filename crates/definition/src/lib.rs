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

//! # PlexFlow Definition
//!
//! ## Purpose
//! Workflow definition model, structural validator, and YAML loader.
//!
//! ## Architecture Context
//! A workflow definition is a directed acyclic graph of steps, each step a
//! request/response exchange over the message bus. Definitions are parsed
//! from YAML into a loosely-typed tree, validated as a whole (all offenses
//! reported at once), and only then converted into the immutable
//! [`WorkflowDefinition`] the engine and mediator operate on.
//!
//! ## Key Components
//! - [`WorkflowDefinition`] / [`StepDefinition`]: the validated model
//! - [`Topic`] / [`TopicKind`]: topic-name discipline
//!   (`<ns>.(execute|success|failure).<action>`)
//! - [`TemplateExpr`]: `{{Step.field}}` input expressions
//! - [`validator`]: structural validation with compound error reporting
//! - [`loader`]: YAML file and directory loading
//!
//! ## Examples
//! ```rust
//! let yaml = r#"
//! name: order-fulfillment
//! version: 1.0.0
//! initiating_event:
//!   name: OrderPlaced
//!   topic: shop.orders.placed
//! steps:
//!   - name: Reserve
//!     topic: inventory.execute.reserve
//!     input:
//!       order: "{{OrderPlaced.order_id}}"
//!     response_topic:
//!       success: [inventory.success.reserve]
//!       failure: [inventory.failure.reserve]
//!   - name: Charge
//!     topic: billing.execute.charge
//!     depends_on: [Reserve]
//!     input:
//!       reservation: "{{Reserve.reservation_id}}"
//!     response_topic:
//!       success: [billing.success.charge]
//!       failure: [billing.failure.charge]
//! "#;
//!
//! let definition = plexflow_definition::loader::load_str(yaml).unwrap();
//! assert_eq!(definition.steps.len(), 2);
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod loader;
pub mod template;
pub mod topic;
pub mod types;
pub mod validator;

pub use error::{DefinitionError, DefinitionResult, ValidationIssue};
pub use template::TemplateExpr;
pub use topic::{Topic, TopicKind};
pub use types::{
    ActionSpec, InitiatingEvent, RawWorkflow, ResponseTopics, StepDefinition, WorkflowDefinition,
};
