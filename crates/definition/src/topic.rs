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

//! Topic-name discipline.
//!
//! ## Purpose
//! Bus topics referenced by workflow steps must follow the form
//! `<ns>.(execute|success|failure).<action>`, where `<ns>` and `<action>`
//! match `[\w\-/:]+`. The middle segment classifies the topic: execute
//! topics are outbound dispatch targets, success/failure topics are the
//! inbound response channels a step awaits.
//!
//! Initiating-event topics are externally owned and are NOT constrained by
//! this discipline; they stay plain strings in the definition model.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Normative topic pattern: `^[\w\-/:]+\.(success|failure|execute)\.[\w\-/:]+$`
fn topic_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[\w\-/:]+\.(success|failure|execute)\.[\w\-/:]+$")
            .expect("topic pattern is valid")
    })
}

/// Classification of a disciplined topic by its middle segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicKind {
    /// Outbound dispatch topic (`<ns>.execute.<action>`)
    Execute,
    /// Inbound success-response topic (`<ns>.success.<action>`)
    Success,
    /// Inbound failure-response topic (`<ns>.failure.<action>`)
    Failure,
}

impl fmt::Display for TopicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Execute => "execute",
            Self::Success => "success",
            Self::Failure => "failure",
        };
        write!(f, "{}", s)
    }
}

/// A validated, classified bus topic.
///
/// Serializes as a plain string; deserialization re-validates the
/// discipline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic {
    name: String,
    kind: TopicKind,
}

impl Topic {
    /// Parse and classify a topic name.
    ///
    /// ## Errors
    /// Returns a description of the offense when the name does not match the
    /// discipline or carries an unknown classification segment.
    pub fn parse(name: &str) -> Result<Self, String> {
        let captures = topic_regex()
            .captures(name)
            .ok_or_else(|| format!("'{}' does not match <ns>.(execute|success|failure).<action>", name))?;

        let kind = match &captures[1] {
            "execute" => TopicKind::Execute,
            "success" => TopicKind::Success,
            "failure" => TopicKind::Failure,
            other => return Err(format!("unknown topic classification '{}'", other)),
        };

        Ok(Self {
            name: name.to_string(),
            kind,
        })
    }

    /// The topic's classification.
    pub fn kind(&self) -> TopicKind {
        self.kind
    }

    /// The full topic name.
    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl TryFrom<String> for Topic {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Topic::parse(&value)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> String {
        topic.name
    }
}
