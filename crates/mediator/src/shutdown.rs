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

//! Graceful-shutdown signal handling.
//!
//! ## Purpose
//! Listens for SIGTERM, SIGINT, and SIGHUP and resolves a oneshot receiver
//! so the main loop can run the shutdown sequence: consumers disconnect
//! first, then external resources. In-flight handler invocations are allowed
//! to complete; no new messages dispatch once disconnect begins.

use std::fmt;
use tokio::sync::oneshot;

/// OS signal that triggered shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM (orchestrator-driven stop)
    Sigterm,
    /// SIGINT (Ctrl+C)
    Sigint,
    /// SIGHUP
    Sighup,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sigterm => "SIGTERM",
            Self::Sigint => "SIGINT",
            Self::Sighup => "SIGHUP",
        };
        write!(f, "{}", s)
    }
}

/// Spawn a background task listening for shutdown signals.
///
/// ## Returns
/// A receiver that completes with the first signal received.
pub fn listen_for_signals() -> oneshot::Receiver<ShutdownSignal> {
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGINT handler");
                return;
            }
        };
        let mut sighup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGHUP handler");
                return;
            }
        };

        let received = tokio::select! {
            _ = sigterm.recv() => ShutdownSignal::Sigterm,
            _ = sigint.recv() => ShutdownSignal::Sigint,
            _ = sighup.recv() => ShutdownSignal::Sighup,
        };

        tracing::info!(signal = %received, "received shutdown signal");
        let _ = tx.send(received);
    });

    rx
}
