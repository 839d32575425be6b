// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Report pipeline
//!
//! Reads every run summary, builds the experiment matrix, writes the report
//! tables and hands the planned charts to a renderer. Resource metrics are
//! optional: without them the resource charts are skipped.

use arrow_array::RecordBatch;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::analysis::analyze;
use crate::charts::{ChartRenderer, ChartSpec, plan_matrix_charts, plan_resource_charts};
use crate::config::{LATENCY_BY_TENANTS_CSV, LATENCY_SUMMARY_CSV, P95_LATENCIES_CSV, RPS_CSV, ReportConfig};
use crate::error::{ReportError, Result};
use crate::export::{
    category_summary_batch, comparison_batch, matrix_batch, overview_batch, pretty_table,
    projection_batch, write_csv,
};
use crate::extract::extract_run_record;
use crate::inputs::expand_glob;
use crate::matrix::{ExperimentMatrix, MatrixBuilder};
use crate::metrics_table::{MetricsLoad, load_metrics_tables};
use diagnostics::*;

/// A part of the report that was not produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkippedSection {
    /// Fewer than two tenant counts
    LatencyAnalysis,
    /// No metrics table could be loaded
    ResourceCharts,
    /// The renderer failed on one chart
    Chart { name: String, error: String },
}

impl fmt::Display for SkippedSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkippedSection::LatencyAnalysis => write!(f, "latency analysis"),
            SkippedSection::ResourceCharts => write!(f, "resource utilization charts"),
            SkippedSection::Chart { name, error } => write!(f, "chart {name}: {error}"),
        }
    }
}

/// What a report run produced.
#[derive(Debug, Clone, Default)]
pub struct ReportOutcome {
    /// Summary files that parsed, in path order
    pub summaries: Vec<PathBuf>,
    /// Every table and chart written, in write order
    pub written: Vec<PathBuf>,
    pub skipped: Vec<SkippedSection>,
    /// Pretty-printed (tenants, concurrency, http_reqs_total, http_reqs_rate)
    pub overview: String,
}

/// Run the whole report.
pub fn run_report(config: &ReportConfig, renderer: &mut dyn ChartRenderer) -> Result<ReportOutcome> {
    std::fs::create_dir_all(&config.output_dir).map_err(|e| ReportError::io(&config.output_dir, e))?;

    let mut outcome = ReportOutcome::default();
    let matrix = load_matrix(config, &mut outcome)?;
    log_info!("Experiment matrix: {rows} run(s), {columns} column(s)",
        rows: matrix.len(), columns: matrix.columns().len());

    write_table(&matrix_batch(&matrix)?, &config.summary_csv_path(), &mut outcome)?;
    outcome.overview = pretty_table(&overview_batch(&matrix)?)?;
    write_table(
        &projection_batch(&matrix, &matrix.p95_columns())?,
        &config.output_path(P95_LATENCIES_CSV),
        &mut outcome,
    )?;
    write_table(
        &projection_batch(&matrix, &matrix.throughput_columns())?,
        &config.output_path(RPS_CSV),
        &mut outcome,
    )?;

    match analyze(&matrix) {
        Some(analysis) => {
            write_table(
                &comparison_batch(&analysis)?,
                &config.output_path(LATENCY_BY_TENANTS_CSV),
                &mut outcome,
            )?;
            write_table(
                &category_summary_batch(&analysis)?,
                &config.output_path(LATENCY_SUMMARY_CSV),
                &mut outcome,
            )?;
        }
        None => outcome.skipped.push(SkippedSection::LatencyAnalysis),
    }

    render_all(&plan_matrix_charts(&matrix), renderer, &config.output_dir, &mut outcome);

    match load_resource_metrics(&config.metrics_pattern) {
        MetricsLoad::Loaded(table) => {
            render_all(&plan_resource_charts(&table), renderer, &config.output_dir, &mut outcome);
        }
        MetricsLoad::NoData => outcome.skipped.push(SkippedSection::ResourceCharts),
    }

    Ok(outcome)
}

/// Resource metrics are optional: a pattern that cannot be expanded is
/// treated like one that matches nothing.
fn load_resource_metrics(pattern: &str) -> MetricsLoad {
    let paths = match expand_glob(pattern) {
        Ok(paths) => paths,
        Err(e) => {
            log_warn!("Cannot expand metrics pattern: {error}; skipping resource utilization charts",
                error: e.to_string());
            return MetricsLoad::NoData;
        }
    };

    let load = load_metrics_tables(&paths);
    if matches!(load, MetricsLoad::NoData) {
        log_info!("No metrics tables matching {pattern}; skipping resource utilization charts",
            pattern: pattern);
    }
    load
}

fn load_matrix(config: &ReportConfig, outcome: &mut ReportOutcome) -> Result<ExperimentMatrix> {
    let no_summaries = || ReportError::NoSummaries {
        pattern: config.pattern.clone(),
    };

    let paths = expand_glob(&config.pattern)?;
    if paths.is_empty() {
        return Err(no_summaries());
    }

    let mut builder = MatrixBuilder::new();
    for path in paths {
        match read_summary(&path) {
            Ok(summary) => {
                log_info!("Loaded: {path}", path: path.display().to_string());
                builder.push(extract_run_record(&summary));
                outcome.summaries.push(path);
            }
            Err(e) => {
                log_warn!("Skipping summary {path}: {error}",
                    path: path.display().to_string(), error: e.to_string());
            }
        }
    }

    if builder.is_empty() {
        return Err(no_summaries());
    }
    Ok(builder.build())
}

/// Parse one run summary document.
pub fn read_summary(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path).map_err(|e| ReportError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| ReportError::json(path, e))
}

fn write_table(batch: &RecordBatch, path: &Path, outcome: &mut ReportOutcome) -> Result<()> {
    write_csv(batch, path)?;
    outcome.written.push(path.to_path_buf());
    Ok(())
}

fn render_all(
    charts: &[ChartSpec],
    renderer: &mut dyn ChartRenderer,
    output_dir: &Path,
    outcome: &mut ReportOutcome,
) {
    for chart in charts {
        match renderer.render(chart, output_dir) {
            Ok(path) => outcome.written.push(path),
            Err(e) => {
                log_warn!("Could not render {chart}: {error}",
                    chart: chart.name.as_str(), error: e.to_string());
                outcome.skipped.push(SkippedSection::Chart {
                    name: chart.name.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
}
