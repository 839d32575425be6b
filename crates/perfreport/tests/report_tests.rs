// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use perfreport::charts::{ChartRenderer, ChartSpec, JsonChartRenderer};
use perfreport::config::{LATENCY_BY_TENANTS_CSV, LATENCY_SUMMARY_CSV, P95_LATENCIES_CSV, RPS_CSV};
use perfreport::{ReportConfig, ReportError, SkippedSection, run_report};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};

/// Remembers chart names instead of drawing anything.
#[derive(Default)]
struct RecordingRenderer {
    charts: Vec<ChartSpec>,
}

impl ChartRenderer for RecordingRenderer {
    fn render(&mut self, chart: &ChartSpec, output_dir: &Path) -> perfreport::Result<PathBuf> {
        self.charts.push(chart.clone());
        Ok(output_dir.join(&chart.name))
    }
}

impl RecordingRenderer {
    fn names(&self) -> Vec<&str> {
        self.charts.iter().map(|c| c.name.as_str()).collect()
    }
}

fn summary(tenants: i64, concurrency: i64, p95: f64) -> serde_json::Value {
    json!({
        "tenants": tenants,
        "concurrency": concurrency,
        "mode": "steady",
        "data": {
            "metrics": {
                "get_run_response_time": {
                    "type": "trend",
                    "values": {"avg": p95 / 2.0, "p(90)": p95 - 5.0, "p(95)": p95, "max": p95 * 2.0}
                },
                "get_run_passed": {"type": "counter", "values": {"count": 100, "rate": 10.0}},
                "http_reqs": {"type": "counter", "values": {"count": 120, "rate": 12.0}},
                "http_req_failed": {"type": "rate", "values": {"rate": 0.0, "passes": 0}}
            }
        }
    })
}

fn write_summary(dir: &Path, tenants: i64, concurrency: i64, p95: f64) {
    let path = dir.join(format!("summary_{tenants}_{concurrency}.json"));
    fs::write(path, summary(tenants, concurrency, p95).to_string()).unwrap();
}

fn config(input: &TempDir, output: &Path) -> ReportConfig {
    let root = input.path().display();
    ReportConfig {
        pattern: format!("{root}/summary_*.json"),
        metrics_pattern: format!("{root}/metrics_*.csv"),
        output_dir: output.to_path_buf(),
        ..ReportConfig::default()
    }
}

/// CSV cells as (header, rows).
fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let text = fs::read_to_string(path).unwrap();
    let mut lines = text.lines().map(|l| l.split(',').map(str::to_string).collect::<Vec<_>>());
    let header = lines.next().unwrap();
    (header, lines.collect())
}

fn cell(header: &[String], row: &[String], column: &str) -> String {
    let index = header.iter().position(|h| h == column).unwrap();
    row[index].clone()
}

#[test]
fn test_two_tenant_counts_end_to_end() {
    let input = tempdir().unwrap();
    write_summary(input.path(), 10, 10, 80.0);
    write_summary(input.path(), 1, 10, 50.0);
    let output = input.path().join("out");

    let mut renderer = RecordingRenderer::default();
    let outcome = run_report(&config(&input, &output), &mut renderer).unwrap();

    assert_eq!(outcome.summaries.len(), 2);
    assert_eq!(outcome.skipped, vec![SkippedSection::ResourceCharts]);

    let (header, rows) = read_csv(&output.join("report_summary.csv"));
    assert_eq!(&header[..3], &["tenants", "concurrency", "mode"]);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], "1");
    assert_eq!(rows[1][0], "10");
    assert_eq!(rows[0][2], "steady");

    let (header, rows) = read_csv(&output.join(LATENCY_BY_TENANTS_CSV));
    assert_eq!(rows.len(), 1);
    assert_eq!(cell(&header, &rows[0], "operation"), "get_run");
    assert_eq!(cell(&header, &rows[0], "category"), "read");
    assert_eq!(cell(&header, &rows[0], "concurrency"), "10");
    let change: f64 = cell(&header, &rows[0], "t10_pct_change").parse().unwrap();
    assert_eq!(change, 60.0);

    let (header, rows) = read_csv(&output.join(LATENCY_SUMMARY_CSV));
    assert_eq!(rows.len(), 1);
    assert_eq!(cell(&header, &rows[0], "operations"), "1");
    let avg: f64 = cell(&header, &rows[0], "avg_t10_pct_change").parse().unwrap();
    assert_eq!(avg, 60.0);

    let (header, _) = read_csv(&output.join(P95_LATENCIES_CSV));
    assert_eq!(header, vec!["tenants", "concurrency", "get_run_p95_ms"]);
    let (header, _) = read_csv(&output.join(RPS_CSV));
    assert_eq!(header, vec!["tenants", "concurrency", "get_run_rps", "http_reqs_rate"]);

    assert!(outcome.overview.contains("http_reqs_rate"));
    assert!(renderer.names().contains(&"chart_summary_dashboard"));
    assert!(renderer.names().contains(&"chart_response_times_p95_heatmap"));
}

#[test]
fn test_report_is_idempotent() {
    let input = tempdir().unwrap();
    write_summary(input.path(), 1, 5, 40.0);
    write_summary(input.path(), 4, 5, 44.0);
    write_summary(input.path(), 4, 10, 70.0);

    let first = input.path().join("first");
    let second = input.path().join("second");
    _ = run_report(&config(&input, &first), &mut JsonChartRenderer).unwrap();
    _ = run_report(&config(&input, &second), &mut JsonChartRenderer).unwrap();

    for name in ["report_summary.csv", P95_LATENCIES_CSV, RPS_CSV, LATENCY_BY_TENANTS_CSV, LATENCY_SUMMARY_CSV] {
        assert_eq!(
            fs::read(first.join(name)).unwrap(),
            fs::read(second.join(name)).unwrap(),
            "{name} differs between runs"
        );
    }
    assert!(first.join("chart_throughput_heatmap.json").exists());
}

#[test]
fn test_single_tenant_count_skips_analysis() {
    let input = tempdir().unwrap();
    write_summary(input.path(), 3, 5, 40.0);
    write_summary(input.path(), 3, 10, 60.0);
    let output = input.path().join("out");

    let outcome = run_report(&config(&input, &output), &mut RecordingRenderer::default()).unwrap();

    assert!(outcome.skipped.contains(&SkippedSection::LatencyAnalysis));
    assert!(!output.join(LATENCY_BY_TENANTS_CSV).exists());
    assert!(output.join("report_summary.csv").exists());
}

#[test]
fn test_metrics_tables_feed_resource_charts() {
    let input = tempdir().unwrap();
    write_summary(input.path(), 5, 20, 40.0);
    fs::write(
        input.path().join("metrics_5_concurrency_20.csv"),
        "component,metric,aggregation,unit,value\nmlflow,cpu,avg,cores,0.75\nmlflow,memory,avg,bytes,1048576\n",
    )
    .unwrap();
    fs::write(
        input.path().join("metrics_nightly.csv"),
        "component,metric,aggregation,unit,value\nmlflow,cpu,avg,cores,0.25\n",
    )
    .unwrap();
    let output = input.path().join("out");

    let mut renderer = RecordingRenderer::default();
    let outcome = run_report(&config(&input, &output), &mut renderer).unwrap();
    assert!(!outcome.skipped.contains(&SkippedSection::ResourceCharts));

    let cpu = renderer
        .charts
        .iter()
        .find(|c| c.name == "chart_cpu_utilization")
        .unwrap();
    assert_eq!(cpu.panels[0].x, vec!["5_concurrency_20", "nightly"]);
    assert_eq!(cpu.panels[0].series[0].values, vec![Some(0.75), Some(0.25)]);

    let memory = renderer
        .charts
        .iter()
        .find(|c| c.name == "chart_memory_utilization")
        .unwrap();
    assert_eq!(memory.panels[0].series[0].values, vec![Some(1.0)]);

    // The nightly table has no axes, so it stays out of the axis charts.
    let by_tenants = renderer
        .charts
        .iter()
        .find(|c| c.name == "chart_mlflow_cpu_by_tenants")
        .unwrap();
    assert_eq!(by_tenants.panels.len(), 1);
    assert_eq!(by_tenants.panels[0].x, vec!["5"]);
    assert_eq!(by_tenants.panels[0].series[0].values, vec![Some(0.75)]);
}

#[test]
fn test_unusable_metrics_pattern_only_skips_resource_charts() {
    let input = tempdir().unwrap();
    write_summary(input.path(), 1, 10, 50.0);
    write_summary(input.path(), 10, 10, 80.0);
    let output = input.path().join("out");
    let config = ReportConfig {
        metrics_pattern: format!("{}/results (1)/metrics_*.csv", input.path().display()),
        ..config(&input, &output)
    };

    let outcome = run_report(&config, &mut RecordingRenderer::default()).unwrap();

    assert_eq!(outcome.skipped, vec![SkippedSection::ResourceCharts]);
    assert!(output.join("report_summary.csv").exists());
    assert!(output.join(LATENCY_SUMMARY_CSV).exists());
}

#[test]
fn test_no_matching_summaries() {
    let input = tempdir().unwrap();
    let output = input.path().join("out");

    let err = run_report(&config(&input, &output), &mut RecordingRenderer::default()).unwrap_err();
    assert!(matches!(err, ReportError::NoSummaries { .. }));
}

#[test]
fn test_unparsable_summaries_are_skipped() {
    let input = tempdir().unwrap();
    fs::write(input.path().join("summary_broken.json"), "{").unwrap();
    let output = input.path().join("out");

    let err = run_report(&config(&input, &output), &mut RecordingRenderer::default()).unwrap_err();
    assert!(matches!(err, ReportError::NoSummaries { .. }));

    write_summary(input.path(), 1, 1, 10.0);
    let outcome = run_report(&config(&input, &output), &mut RecordingRenderer::default()).unwrap();
    assert_eq!(outcome.summaries, vec![input.path().join("summary_1_1.json")]);
}
