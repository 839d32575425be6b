// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Operation categories used to aggregate latency comparisons

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationCategory {
    Read,
    Write,
    Search,
    Other,
}

impl OperationCategory {
    /// Every category, in report order.
    pub const ALL: [OperationCategory; 4] = [
        OperationCategory::Read,
        OperationCategory::Write,
        OperationCategory::Search,
        OperationCategory::Other,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OperationCategory::Read => "read",
            OperationCategory::Write => "write",
            OperationCategory::Search => "search",
            OperationCategory::Other => "other",
        }
    }
}

impl fmt::Display for OperationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const READ_OPERATIONS: &[&str] = &[
    "get_run",
    "get_experiment",
    "fetch_artifact",
    "list_artifacts",
    "list_workspaces",
];

const WRITE_OPERATIONS: &[&str] = &[
    "create_run",
    "create_experiment",
    "log_metric",
    "log_parameter",
    "log_artifact",
    "update_run_status",
    "create_prompt",
    "create_prompt_version",
];

const SEARCH_OPERATIONS: &[&str] = &["search_runs", "search_experiments", "search_prompts"];

static CATEGORY_TABLE: LazyLock<HashMap<&'static str, OperationCategory>> = LazyLock::new(|| {
    let mut table = HashMap::new();
    for (operations, category) in [
        (READ_OPERATIONS, OperationCategory::Read),
        (WRITE_OPERATIONS, OperationCategory::Write),
        (SEARCH_OPERATIONS, OperationCategory::Search),
    ] {
        for op in operations {
            _ = table.insert(*op, category);
        }
    }
    table
});

/// Category of an operation; exact name match, `Other` otherwise.
#[must_use]
pub fn categorize(operation: &str) -> OperationCategory {
    CATEGORY_TABLE
        .get(operation)
        .copied()
        .unwrap_or(OperationCategory::Other)
}
