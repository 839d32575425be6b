// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Command line front end for the performance report.

use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;

use diagnostics::*;
use perfreport::{JsonChartRenderer, ReportConfig, ReportOutcome, run_report};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Generate performance test reports from k6 run summaries", long_about = None)]
#[command(name = "perf-report")]
pub struct Cli {
    /// Glob pattern for run summary JSON files
    #[arg(short, long, default_value = "summary_*.json")]
    pub pattern: String,

    /// Glob pattern for per-component resource metrics tables
    #[arg(short, long, default_value = "metrics_*.csv")]
    pub metrics_pattern: String,

    /// Directory receiving tables and chart data sets
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// File name of the full summary table
    #[arg(short, long, default_value = "report_summary.csv")]
    pub csv_name: String,
}

impl From<Cli> for ReportConfig {
    fn from(cli: Cli) -> Self {
        Self {
            pattern: cli.pattern,
            metrics_pattern: cli.metrics_pattern,
            output_dir: cli.output_dir,
            csv_name: cli.csv_name,
        }
    }
}

/// Generate the report, printing the run overview to `out`.
pub fn run(cli: Cli, out: &mut dyn Write) -> Result<ReportOutcome> {
    let config = ReportConfig::from(cli);
    log_debug!("Report configuration: pattern={pattern} metrics={metrics} output={output}",
        pattern: config.pattern.as_str(),
        metrics: config.metrics_pattern.as_str(),
        output: config.output_dir.display().to_string());

    let outcome = run_report(&config, &mut JsonChartRenderer)?;

    writeln!(out, "Summary:")?;
    writeln!(out, "{}", outcome.overview)?;
    writeln!(
        out,
        "Wrote {count} file(s) to {dir}",
        count = outcome.written.len(),
        dir = config.output_dir.display()
    )?;
    for skipped in &outcome.skipped {
        writeln!(out, "Skipped {skipped}")?;
    }

    Ok(outcome)
}
