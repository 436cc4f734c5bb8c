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

//! Error types for the mediator process.

use thiserror::Error;

/// Result type for mediator operations.
pub type MediatorResult<T> = Result<T, MediatorError>;

/// Errors raised while configuring or running the mediator.
#[derive(Error, Debug)]
pub enum MediatorError {
    /// Invalid mediator configuration (duplicate initiating topics, bad
    /// config file, unsupported backend selection)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Definition directory could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path that failed to read
        path: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Message-bus failure
    #[error(transparent)]
    Bus(#[from] plexflow_channel::BusError),
}
