// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Report configuration
//!
//! Defaults match the command-line defaults.

use std::path::{Path, PathBuf};

/// Matrix projection holding only `_p95_ms` columns.
pub const P95_LATENCIES_CSV: &str = "report_p95_latencies.csv";
/// Matrix projection holding `_rps` columns and the global request rate.
pub const RPS_CSV: &str = "report_rps.csv";
/// One row per (operation, concurrency) comparison.
pub const LATENCY_BY_TENANTS_CSV: &str = "report_latency_analysis_by_tenants.csv";
/// One row per (category, concurrency) aggregate.
pub const LATENCY_SUMMARY_CSV: &str = "report_latency_analysis_summary.csv";

#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    /// Glob matching run summary JSON files
    pub pattern: String,

    /// Glob matching resource metrics tables
    pub metrics_pattern: String,

    /// Directory receiving every table and chart
    pub output_dir: PathBuf,

    /// File name of the full matrix export
    pub csv_name: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            pattern: "summary_*.json".to_string(),
            metrics_pattern: "metrics_*.csv".to_string(),
            output_dir: PathBuf::from("."),
            csv_name: "report_summary.csv".to_string(),
        }
    }
}

impl ReportConfig {
    /// Path of a named output file under the output directory.
    #[must_use]
    pub fn output_path<P: AsRef<Path>>(&self, name: P) -> PathBuf {
        self.output_dir.join(name)
    }

    #[must_use]
    pub fn summary_csv_path(&self) -> PathBuf {
        self.output_path(&self.csv_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_config_default() {
        let config = ReportConfig::default();
        assert_eq!(config.pattern, "summary_*.json");
        assert_eq!(config.metrics_pattern, "metrics_*.csv");
        assert_eq!(config.output_dir, PathBuf::from("."));
        assert_eq!(config.csv_name, "report_summary.csv");
    }

    #[test]
    fn test_output_paths_under_output_dir() {
        let config = ReportConfig {
            output_dir: PathBuf::from("out"),
            csv_name: "all.csv".to_string(),
            ..ReportConfig::default()
        };
        assert_eq!(config.summary_csv_path(), PathBuf::from("out").join("all.csv"));
        assert_eq!(config.output_path(RPS_CSV), PathBuf::from("out").join("report_rps.csv"));
    }
}
