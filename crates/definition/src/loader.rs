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

//! YAML definition loading.
//!
//! ## Purpose
//! Reads workflow definition files and turns them into validated
//! [`WorkflowDefinition`]s. The on-disk format is an ordered-mapping YAML
//! document; any format yielding an equivalent tree would do, which is why
//! parsing (here) and validation ([`crate::validator`]) are separate stages.
//!
//! A directory load reports per-file results so the mediator can skip a
//! broken definition and still serve the rest.

use crate::error::{DefinitionError, DefinitionResult};
use crate::types::WorkflowDefinition;
use crate::validator;
use std::path::{Path, PathBuf};

/// Parse and validate one YAML document.
pub fn load_str(text: &str) -> DefinitionResult<WorkflowDefinition> {
    validator::validate(serde_yaml::from_str(text)?)
}

/// Read, parse, and validate one definition file.
pub async fn load_file(path: &Path) -> DefinitionResult<WorkflowDefinition> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| DefinitionError::Io {
            path: path.display().to_string(),
            source,
        })?;
    load_str(&text)
}

/// Load every `*.yaml` / `*.yml` file in a directory.
///
/// ## Returns
/// Per-file results in lexicographic path order. A file that fails to parse
/// or validate appears with its error; it does not abort the other loads.
///
/// ## Errors
/// Only when the directory itself cannot be read.
pub async fn load_dir(
    dir: &Path,
) -> DefinitionResult<Vec<(PathBuf, DefinitionResult<WorkflowDefinition>)>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|source| DefinitionError::Io {
            path: dir.display().to_string(),
            source,
        })?;

    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|source| DefinitionError::Io {
            path: dir.display().to_string(),
            source,
        })?
    {
        let path = entry.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);
        if is_yaml {
            paths.push(path);
        }
    }
    paths.sort();

    let mut results = Vec::with_capacity(paths.len());
    for path in paths {
        let result = load_file(&path).await;
        results.push((path, result));
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_str_rejects_malformed_yaml() {
        assert!(matches!(
            load_str(":\n  - ["),
            Err(DefinitionError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_load_dir_skips_broken_files() {
        let dir = std::env::temp_dir().join(format!("plexflow-loader-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();

        let good = r#"
name: w
version: 1.0.0
initiating_event: {name: E, topic: t.init}
steps:
  - name: A
    topic: a.execute.x
    response_topic: {success: [a.success.x], failure: [a.failure.x]}
  - name: B
    topic: b.execute.y
    depends_on: [A]
    response_topic: {success: [b.success.y], failure: [b.failure.y]}
"#;
        tokio::fs::write(dir.join("good.yaml"), good).await.unwrap();
        tokio::fs::write(dir.join("bad.yaml"), "name: only\n").await.unwrap();
        tokio::fs::write(dir.join("ignored.txt"), "not yaml").await.unwrap();

        let results = load_dir(&dir).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().any(|(p, r)| p.ends_with("good.yaml") && r.is_ok()));
        assert!(results.iter().any(|(p, r)| p.ends_with("bad.yaml") && r.is_err()));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
