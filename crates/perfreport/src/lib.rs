// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Performance test reporting
//!
//! Turns k6 run summaries (one JSON document per tenants × concurrency
//! experiment) and optional per-component resource tables into comparison
//! tables and chart data sets.

pub mod analysis;
pub mod category;
pub mod charts;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod inputs;
pub mod matrix;
pub mod metrics_table;
pub mod report;

pub use analysis::{CategorySummary, ComparativeAnalysis, ComparativeRecord, analyze};
pub use category::{OperationCategory, categorize};
pub use charts::{ChartRenderer, ChartSpec, JsonChartRenderer};
pub use config::ReportConfig;
pub use error::{ReportError, Result};
pub use extract::{RunRecord, extract_run_record};
pub use matrix::{ExperimentMatrix, MatrixBuilder};
pub use metrics_table::{MetricRow, MetricsLoad, MetricsTable, load_metrics_tables};
pub use report::{ReportOutcome, SkippedSection, run_report};
