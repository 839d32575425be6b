// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Input discovery on the host filesystem

use std::path::{Path, PathBuf};
use wax::{Glob, WalkBehavior};

use crate::error::{ReportError, Result};
use diagnostics::*;

/// Expand a glob pattern into the matching regular files, sorted by path.
///
/// The literal directory prefix of the pattern is walked; a prefix that does
/// not exist matches nothing. Entries that cannot be read are logged and
/// skipped.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let (prefix, glob) = Glob::new(pattern)
        .map_err(|e| ReportError::pattern(pattern, e))?
        .partition();

    let root = walk_root(&prefix);
    if !root.exists() {
        log_debug!("Glob prefix {root} does not exist", root: root.display().to_string());
        return Ok(Vec::new());
    }

    // A pattern without wildcards partitions into the full path.
    if root.is_file() {
        return Ok(vec![root]);
    }

    let behavior = WalkBehavior {
        depth: walk_depth(&glob.to_string()),
        ..WalkBehavior::default()
    };
    let mut matches = Vec::new();
    for entry in glob.walk_with_behavior(root, behavior) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log_warn!("Skipping unreadable entry while matching {pattern}: {error}",
                    pattern: pattern, error: e.to_string());
                continue;
            }
        };

        let path = entry.path();
        if path.is_file() {
            matches.push(path.to_path_buf());
        }
    }

    matches.sort();
    log_debug!("Pattern {pattern} matched {count} file(s)", pattern: pattern, count: matches.len());
    Ok(matches)
}

/// Deepest directory level, below the walk root, that `glob` can match.
///
/// Every separator may add a level; `**` matches at any depth.
fn walk_depth(glob: &str) -> usize {
    if glob.contains("**") {
        return usize::MAX;
    }
    glob.split('/').filter(|segment| !segment.is_empty()).count().max(1)
}

fn walk_root(prefix: &Path) -> PathBuf {
    if prefix.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        prefix.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_expand_glob_sorted_files_only() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("summary_b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("summary_a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("other.json"), "{}").unwrap();
        std::fs::create_dir(dir.path().join("summary_dir.json")).unwrap();

        let pattern = format!("{}/summary_*.json", dir.path().display());
        let found = expand_glob(&pattern).unwrap();
        assert_eq!(
            found,
            vec![dir.path().join("summary_a.json"), dir.path().join("summary_b.json")]
        );
    }

    #[test]
    fn test_walk_depth_follows_pattern_segments() {
        assert_eq!(walk_depth("summary_*.json"), 1);
        assert_eq!(walk_depth("runs/*/summary_*.json"), 3);
        assert_eq!(walk_depth("**/summary_*.json"), usize::MAX);
        assert_eq!(walk_depth(""), 1);
    }

    #[test]
    fn test_expand_glob_stays_at_pattern_depth() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("run_1");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(dir.path().join("summary_top.json"), "{}").unwrap();
        std::fs::write(nested.join("summary_nested.json"), "{}").unwrap();

        let shallow = format!("{}/summary_*.json", dir.path().display());
        assert_eq!(expand_glob(&shallow).unwrap(), vec![dir.path().join("summary_top.json")]);

        let one_down = format!("{}/*/summary_*.json", dir.path().display());
        assert_eq!(expand_glob(&one_down).unwrap(), vec![nested.join("summary_nested.json")]);

        let anywhere = format!("{}/**/summary_*.json", dir.path().display());
        assert_eq!(
            expand_glob(&anywhere).unwrap(),
            vec![nested.join("summary_nested.json"), dir.path().join("summary_top.json")]
        );
    }

    #[test]
    fn test_expand_glob_missing_directory_matches_nothing() {
        let dir = tempdir().unwrap();
        let pattern = format!("{}/absent/metrics_*.csv", dir.path().display());
        assert!(expand_glob(&pattern).unwrap().is_empty());
    }
}
