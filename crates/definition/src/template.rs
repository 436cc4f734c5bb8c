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

//! Template expression syntax for step inputs.
//!
//! Every step input value must be exactly one `{{Step.field}}` expression.
//! Whitespace inside the braces is tolerated; anything else (literals,
//! concatenation, multiple expressions) is rejected at validation time.
//! Resolution against recorded step outputs happens in the engine.

use regex::Regex;
use std::sync::OnceLock;

fn expr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\{\{\s*([\w\-]+)\.([\w\-]+)\s*\}\}$").expect("template pattern is valid")
    })
}

/// A parsed `{{Step.field}}` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateExpr {
    /// Name of the step (or initiating pseudo-step) whose output is read
    pub step: String,
    /// Field looked up in that step's recorded output
    pub field: String,
}

impl TemplateExpr {
    /// Parse a template expression.
    ///
    /// ## Returns
    /// `None` when the value is not exactly one `{{Step.field}}` expression.
    pub fn parse(expr: &str) -> Option<Self> {
        let captures = expr_regex().captures(expr)?;
        Some(Self {
            step: captures[1].to_string(),
            field: captures[2].to_string(),
        })
    }
}
