// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Chart planning
//!
//! Turns the report tables into chart data sets: named, titled panels of
//! labelled series. Drawing them is left to a [`ChartRenderer`]; the bundled
//! [`JsonChartRenderer`] writes each data set as JSON for an external
//! plotting tool.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{ReportError, Result};
use crate::extract::{
    AVG_MS_SUFFIX, HTTP_REQ_FAILED_RATE, HTTP_REQS_RATE, HTTP_REQS_TOTAL, P95_MS_SUFFIX,
    PASSED_SUFFIX, RPS_SUFFIX,
};
use crate::matrix::{Axis, ExperimentMatrix, MatrixRow, mean};
use crate::metrics_table::{MetricRow, MetricsTable};
use diagnostics::*;

const Y_HEADROOM: f64 = 1.1;
const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelKind {
    Line,
    Bar,
    /// Series are heatmap rows, `x` the columns
    Heatmap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    /// One value per entry of the panel's `x`; `None` is drawn as a gap
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Panel {
    pub title: String,
    pub kind: PanelKind,
    pub x_label: String,
    pub y_label: String,
    pub x: Vec<String>,
    pub series: Vec<Series>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_max: Option<f64>,
    /// Decimal places for heatmap cell annotations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation_decimals: Option<u8>,
}

impl Panel {
    fn new(kind: PanelKind, title: String, x_label: &str, y_label: &str, x: Vec<String>) -> Self {
        Self {
            title,
            kind,
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            x,
            series: Vec::new(),
            y_min: None,
            y_max: None,
            annotation_decimals: None,
        }
    }

    fn with_series<S: Into<String>>(mut self, name: S, values: Vec<Option<f64>>) -> Self {
        self.series.push(Series {
            name: name.into(),
            values,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    /// File stem, e.g. `chart_throughput_heatmap`
    pub name: String,
    pub title: String,
    pub panels: Vec<Panel>,
}

/// Draws a chart into the output directory, returning the written file.
pub trait ChartRenderer {
    fn render(&mut self, chart: &ChartSpec, output_dir: &Path) -> Result<PathBuf>;
}

/// Writes `<name>.json` holding the chart data set.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonChartRenderer;

impl ChartRenderer for JsonChartRenderer {
    fn render(&mut self, chart: &ChartSpec, output_dir: &Path) -> Result<PathBuf> {
        let path = output_dir.join(format!("{}.json", chart.name));
        let file = File::create(&path).map_err(|e| ReportError::io(&path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, chart).map_err(|e| ReportError::json(&path, e))?;
        writer.flush().map_err(|e| ReportError::io(&path, e))?;
        log_info!("Chart saved: {path}", path: path.display().to_string());
        Ok(path)
    }
}

fn labels<T: ToString>(values: impl IntoIterator<Item = T>) -> Vec<String> {
    values.into_iter().map(|v| v.to_string()).collect()
}

fn max_value<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    values.into_iter().filter(|v| v.is_finite()).reduce(f64::max)
}

/// Operations owning a `{op}{suffix}` column, with that column name.
fn operation_columns(matrix: &ExperimentMatrix, suffix: &str) -> Vec<(String, String)> {
    matrix
        .operations()
        .into_iter()
        .chain(matrix.p95_operations())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|op| {
            let column = format!("{op}{suffix}");
            (op, column)
        })
        .filter(|(_, column)| matrix.has_column(column))
        .collect()
}

/// Every chart derived from the experiment matrix.
#[must_use]
pub fn plan_matrix_charts(matrix: &ExperimentMatrix) -> Vec<ChartSpec> {
    let p95_title = |axis: Axis, value: i64| match axis {
        Axis::Tenants => format!("P95 Response Times - {value} Tenant(s)"),
        Axis::Concurrency => format!("P95 Response Times - {value} Concurrency"),
    };
    let rps_title = |axis: Axis, value: i64| match axis {
        Axis::Tenants => format!("Operation Throughput - {value} Tenant(s)"),
        Axis::Concurrency => format!("Operation Throughput - {value} Concurrency"),
    };

    [
        summary_dashboard(matrix),
        grouped_lines(
            matrix,
            "chart_response_times_by_concurrency",
            Axis::Tenants,
            P95_MS_SUFFIX,
            "P95 Response Time (ms)",
            &p95_title,
        ),
        grouped_lines(
            matrix,
            "chart_response_times_by_tenants",
            Axis::Concurrency,
            P95_MS_SUFFIX,
            "P95 Response Time (ms)",
            &p95_title,
        ),
        grouped_lines(
            matrix,
            "chart_rps_by_concurrency",
            Axis::Tenants,
            RPS_SUFFIX,
            "Requests/sec",
            &rps_title,
        ),
        grouped_lines(
            matrix,
            "chart_rps_by_tenants",
            Axis::Concurrency,
            RPS_SUFFIX,
            "Requests/sec",
            &rps_title,
        ),
        throughput_heatmap(matrix),
        passed_counts(matrix),
        p95_heatmap(matrix),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn summary_dashboard(matrix: &ExperimentMatrix) -> Option<ChartSpec> {
    let configs = labels(matrix.rows().iter().map(MatrixRow::config_label));
    let column_values = |column: &str, scale: f64| -> Vec<Option<f64>> {
        matrix
            .rows()
            .iter()
            .map(|r| r.get(column).map(|v| v * scale))
            .collect()
    };

    let mut panels = Vec::new();
    if matrix.has_column(HTTP_REQS_RATE) {
        panels.push(
            Panel::new(PanelKind::Bar, "HTTP Request Throughput".into(), "", "Requests/sec", configs.clone())
                .with_series(HTTP_REQS_RATE, column_values(HTTP_REQS_RATE, 1.0)),
        );
    }
    if matrix.has_column(HTTP_REQS_TOTAL) {
        panels.push(
            Panel::new(PanelKind::Bar, "Total HTTP Requests".into(), "", "Total Requests", configs.clone())
                .with_series(HTTP_REQS_TOTAL, column_values(HTTP_REQS_TOTAL, 1.0)),
        );
    }
    if matrix.has_column(HTTP_REQ_FAILED_RATE) {
        panels.push(
            Panel::new(PanelKind::Bar, "HTTP Request Failure Rate".into(), "", "Failure Rate (%)", configs.clone())
                .with_series(HTTP_REQ_FAILED_RATE, column_values(HTTP_REQ_FAILED_RATE, 100.0)),
        );
    }
    let avg_columns = matrix.columns_with_suffix(AVG_MS_SUFFIX);
    if !avg_columns.is_empty() {
        let overall = matrix.rows().iter().map(|r| r.mean_of(&avg_columns)).collect();
        panels.push(
            Panel::new(
                PanelKind::Bar,
                "Overall Average Response Time".into(),
                "",
                "Avg Response Time (ms)",
                configs,
            )
            .with_series("overall_avg_ms", overall),
        );
    }

    (!panels.is_empty()).then(|| ChartSpec {
        name: "chart_summary_dashboard".to_string(),
        title: "Performance Test Summary".to_string(),
        panels,
    })
}

/// One line panel per value of `group_axis`, one series per operation.
fn grouped_lines(
    matrix: &ExperimentMatrix,
    name: &str,
    group_axis: Axis,
    suffix: &str,
    y_label: &str,
    title: &dyn Fn(Axis, i64) -> String,
) -> Option<ChartSpec> {
    let columns = operation_columns(matrix, suffix);
    if columns.is_empty() {
        return None;
    }

    let y_max = max_value(
        matrix
            .rows()
            .iter()
            .flat_map(|r| columns.iter().filter_map(|(_, c)| r.get(c))),
    )
    .map(|max| max * Y_HEADROOM);

    let x_axis = group_axis.other();
    let panels = matrix
        .group_by(group_axis)
        .into_iter()
        .map(|(value, rows)| {
            let x = labels(rows.iter().map(|r| x_axis.of(r)));
            let mut panel = Panel::new(PanelKind::Line, title(group_axis, value), x_axis.label(), y_label, x);
            for (op, column) in &columns {
                panel = panel.with_series(op.clone(), rows.iter().map(|r| r.get(column)).collect());
            }
            panel.y_min = Some(0.0);
            panel.y_max = y_max;
            panel
        })
        .collect();

    Some(ChartSpec {
        name: name.to_string(),
        title: format!("{y_label} by {}", x_axis.label()),
        panels,
    })
}

/// Tenants × concurrency grid; duplicate runs are averaged.
fn heatmap_panel<F>(matrix: &ExperimentMatrix, title: &str, label: &str, decimals: u8, value: F) -> Option<Panel>
where
    F: Fn(&MatrixRow) -> Option<f64>,
{
    let mut cells: BTreeMap<(i64, i64), Vec<f64>> = BTreeMap::new();
    for row in matrix.rows() {
        if let Some(v) = value(row) {
            cells.entry(row.key()).or_default().push(v);
        }
    }
    if cells.is_empty() {
        return None;
    }

    let concurrency_levels = matrix.concurrency_levels();
    let mut panel = Panel::new(
        PanelKind::Heatmap,
        title.to_string(),
        Axis::Concurrency.label(),
        label,
        labels(concurrency_levels.iter()),
    );
    for tenants in matrix.tenant_counts() {
        let values = concurrency_levels
            .iter()
            .map(|&concurrency| {
                cells
                    .get(&(tenants, concurrency))
                    .and_then(|values| mean(values.iter().copied()))
            })
            .collect();
        panel = panel.with_series(tenants.to_string(), values);
    }
    panel.annotation_decimals = Some(decimals);
    Some(panel)
}

fn throughput_heatmap(matrix: &ExperimentMatrix) -> Option<ChartSpec> {
    let panel = heatmap_panel(matrix, "HTTP Request Rate (req/s)", "Requests/sec", 1, |r| {
        r.get(HTTP_REQS_RATE)
    })?;
    Some(ChartSpec {
        name: "chart_throughput_heatmap".to_string(),
        title: panel.title.clone(),
        panels: vec![panel],
    })
}

fn p95_heatmap(matrix: &ExperimentMatrix) -> Option<ChartSpec> {
    let columns: Vec<String> = operation_columns(matrix, P95_MS_SUFFIX)
        .into_iter()
        .map(|(_, column)| column)
        .collect();
    if columns.is_empty() {
        return None;
    }
    let panel = heatmap_panel(
        matrix,
        "Overall P95 Response Time (ms)",
        "P95 Response Time (ms)",
        0,
        |r| r.mean_of(&columns),
    )?;
    Some(ChartSpec {
        name: "chart_response_times_p95_heatmap".to_string(),
        title: panel.title.clone(),
        panels: vec![panel],
    })
}

fn passed_counts(matrix: &ExperimentMatrix) -> Option<ChartSpec> {
    let columns = operation_columns(matrix, PASSED_SUFFIX);
    if columns.is_empty() {
        return None;
    }

    let mut panel = Panel::new(
        PanelKind::Bar,
        "Successful Operations by Configuration".to_string(),
        "Test Configuration (T=Tenants, C=Concurrency)",
        "Passed Count",
        labels(matrix.rows().iter().map(MatrixRow::config_label)),
    );
    for (op, column) in &columns {
        panel = panel.with_series(op.clone(), matrix.rows().iter().map(|r| r.get(column)).collect());
    }

    Some(ChartSpec {
        name: "chart_passed_counts".to_string(),
        title: panel.title.clone(),
        panels: vec![panel],
    })
}

/// Every chart derived from the resource metrics tables.
#[must_use]
pub fn plan_resource_charts(table: &MetricsTable) -> Vec<ChartSpec> {
    [
        resource_utilization(
            table,
            &["cpu"],
            &["cpu", "cpu_utilization"],
            "chart_cpu_utilization",
            "Avg CPU Utilization by Component",
            "CPU (cores)",
            1.0,
        ),
        resource_utilization(
            table,
            &["memory"],
            &[],
            "chart_memory_utilization",
            "Avg Memory Utilization by Component",
            "Memory (MB)",
            1.0 / BYTES_PER_MIB,
        ),
        component_cpu_by(table, Axis::Tenants),
        component_cpu_by(table, Axis::Concurrency),
    ]
    .into_iter()
    .flatten()
    .collect()
}

const AVG_AGGREGATION: &str = "avg";
const SERVER_COMPONENT: &str = "mlflow";

fn resource_utilization(
    table: &MetricsTable,
    metrics: &[&str],
    fallback_metrics: &[&str],
    name: &str,
    title: &str,
    y_label: &str,
    scale: f64,
) -> Option<ChartSpec> {
    // Fallback names only apply when the primary metric is absent entirely.
    let has_primary = table
        .rows()
        .iter()
        .any(|row| metrics.contains(&row.metric.as_str()));
    let selected_metrics = if has_primary || fallback_metrics.is_empty() {
        metrics
    } else {
        fallback_metrics
    };

    let rows: Vec<&MetricRow> = table.select(None, selected_metrics, AVG_AGGREGATION).collect();
    if rows.is_empty() {
        log_info!("No {metric} metrics found", metric: metrics.join(","));
        return None;
    }

    let selected = MetricsTable::new(rows.into_iter().cloned().collect());
    let experiments = selected.experiments();
    let mut panel = Panel::new(
        PanelKind::Bar,
        title.to_string(),
        "Experiment",
        y_label,
        experiments.clone(),
    );
    for component in selected.components() {
        let values = experiments
            .iter()
            .map(|experiment| {
                selected
                    .rows()
                    .iter()
                    .find(|row| row.component == component && &row.experiment == experiment)
                    .and_then(|row| row.value)
                    .map(|v| v * scale)
            })
            .collect();
        panel = panel.with_series(component, values);
    }
    panel.y_min = Some(0.0);

    Some(ChartSpec {
        name: name.to_string(),
        title: title.to_string(),
        panels: vec![panel],
    })
}

/// Server CPU against one axis, one panel per value of the other.
///
/// Rows whose experiment tag carries no axes cannot be placed and are left out.
fn component_cpu_by(table: &MetricsTable, group_axis: Axis) -> Option<ChartSpec> {
    let points: Vec<(i64, i64, Option<f64>)> = table
        .select(Some(SERVER_COMPONENT), &["cpu"], AVG_AGGREGATION)
        .filter_map(|row| row.axes().map(|(t, c)| (t, c, row.value)))
        .collect();
    if points.is_empty() {
        log_info!("No {component} CPU metrics found", component: SERVER_COMPONENT);
        return None;
    }

    let y_max = max_value(points.iter().filter_map(|(_, _, v)| *v)).map(|max| max * Y_HEADROOM);
    let pick = |axis: Axis, (tenants, concurrency): (i64, i64)| match axis {
        Axis::Tenants => tenants,
        Axis::Concurrency => concurrency,
    };
    let x_axis = group_axis.other();

    let mut groups: BTreeMap<i64, Vec<(i64, Option<f64>)>> = BTreeMap::new();
    for &(tenants, concurrency, value) in &points {
        groups
            .entry(pick(group_axis, (tenants, concurrency)))
            .or_default()
            .push((pick(x_axis, (tenants, concurrency)), value));
    }

    let panels = groups
        .into_iter()
        .map(|(group, mut group_points)| {
            group_points.sort_by_key(|(x, _)| *x);
            let title = match group_axis {
                Axis::Tenants => format!("MLflow Avg CPU - {group} Tenant(s)"),
                Axis::Concurrency => format!("MLflow Avg CPU - {group} Concurrency"),
            };
            let mut panel = Panel::new(
                PanelKind::Line,
                title,
                x_axis.label(),
                "CPU (cores)",
                labels(group_points.iter().map(|(x, _)| *x)),
            )
            .with_series("mlflow_cpu", group_points.iter().map(|(_, v)| *v).collect());
            panel.y_min = Some(0.0);
            panel.y_max = y_max;
            panel
        })
        .collect();

    let name = match group_axis {
        Axis::Tenants => "chart_mlflow_cpu_by_concurrency",
        Axis::Concurrency => "chart_mlflow_cpu_by_tenants",
    };
    Some(ChartSpec {
        name: name.to_string(),
        title: format!("MLflow Avg CPU by {}", x_axis.label()),
        panels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::RunRecord;
    use crate::matrix::MatrixBuilder;
    use tempfile::tempdir;

    fn matrix() -> ExperimentMatrix {
        let mut builder = MatrixBuilder::new();
        builder.push(
            RunRecord::new(1, 10)
                .with_field("get_run_avg_ms", 10.0)
                .with_field("get_run_p95_ms", 50.0)
                .with_field("get_run_passed", 7.0)
                .with_field("get_run_rps", 3.5)
                .with_field(HTTP_REQS_RATE, 20.0)
                .with_field(HTTP_REQ_FAILED_RATE, 0.25),
        );
        builder.push(
            RunRecord::new(10, 10)
                .with_field("get_run_avg_ms", 20.0)
                .with_field("get_run_p95_ms", 80.0),
        );
        builder.push(RunRecord::new(10, 10).with_field(HTTP_REQS_RATE, 30.0));
        builder.build()
    }

    fn metric(experiment: &str, component: &str, metric: &str, value: Option<f64>) -> MetricRow {
        let axes = crate::metrics_table::parse_experiment(experiment);
        MetricRow {
            experiment: experiment.to_string(),
            tenants: axes.map(|a| a.0),
            concurrency: axes.map(|a| a.1),
            component: component.to_string(),
            metric: metric.to_string(),
            aggregation: "avg".to_string(),
            unit: String::new(),
            value,
        }
    }

    fn chart<'a>(charts: &'a [ChartSpec], name: &str) -> &'a ChartSpec {
        charts.iter().find(|c| c.name == name).unwrap()
    }

    #[test]
    fn test_matrix_chart_set() {
        let charts = plan_matrix_charts(&matrix());
        let names: Vec<_> = charts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "chart_summary_dashboard",
                "chart_response_times_by_concurrency",
                "chart_response_times_by_tenants",
                "chart_rps_by_concurrency",
                "chart_rps_by_tenants",
                "chart_throughput_heatmap",
                "chart_passed_counts",
                "chart_response_times_p95_heatmap",
            ]
        );
    }

    #[test]
    fn test_dashboard_scales_failure_rate() {
        let charts = plan_matrix_charts(&matrix());
        let dashboard = chart(&charts, "chart_summary_dashboard");
        assert_eq!(dashboard.panels.len(), 3);
        let failure = &dashboard.panels[1];
        assert_eq!(failure.y_label, "Failure Rate (%)");
        assert_eq!(failure.series[0].values, vec![Some(25.0), None, None]);
        assert_eq!(failure.x, vec!["T1_C10", "T10_C10", "T10_C10"]);
    }

    #[test]
    fn test_p95_lines_share_headroom() {
        let charts = plan_matrix_charts(&matrix());
        let by_tenants = chart(&charts, "chart_response_times_by_tenants");
        assert_eq!(by_tenants.panels.len(), 1);
        let panel = &by_tenants.panels[0];
        assert_eq!(panel.title, "P95 Response Times - 10 Concurrency");
        assert_eq!(panel.x, vec!["1", "10", "10"]);
        assert_eq!(panel.series[0].name, "get_run");
        assert_eq!(panel.series[0].values, vec![Some(50.0), Some(80.0), None]);
        assert_eq!(panel.y_max, Some(80.0 * Y_HEADROOM));
    }

    #[test]
    fn test_heatmap_averages_duplicates() {
        let charts = plan_matrix_charts(&matrix());
        let heatmap = &chart(&charts, "chart_throughput_heatmap").panels[0];
        assert_eq!(heatmap.x, vec!["10"]);
        assert_eq!(heatmap.series[0].name, "1");
        assert_eq!(heatmap.series[0].values, vec![Some(20.0)]);
        assert_eq!(heatmap.series[1].values, vec![Some(30.0)]);
    }

    #[test]
    fn test_empty_matrix_plans_nothing() {
        assert!(plan_matrix_charts(&MatrixBuilder::new().build()).is_empty());
    }

    #[test]
    fn test_resource_charts() {
        let table = MetricsTable::new(vec![
            metric("10_concurrency_10", "mlflow", "cpu", Some(1.5)),
            metric("1_concurrency_10", "mlflow", "cpu", Some(0.5)),
            metric("1_concurrency_10", "postgres", "cpu", None),
            metric("nightly", "mlflow", "cpu", Some(9.0)),
            metric("1_concurrency_10", "mlflow", "memory", Some(2.0 * BYTES_PER_MIB)),
        ]);
        let charts = plan_resource_charts(&table);

        let cpu = &chart(&charts, "chart_cpu_utilization").panels[0];
        assert_eq!(cpu.x, vec!["1_concurrency_10", "10_concurrency_10", "nightly"]);
        assert_eq!(cpu.series[0].name, "mlflow");
        assert_eq!(cpu.series[0].values, vec![Some(0.5), Some(1.5), Some(9.0)]);
        assert_eq!(cpu.series[1].values, vec![None, None, None]);

        let memory = &chart(&charts, "chart_memory_utilization").panels[0];
        assert_eq!(memory.series[0].values, vec![Some(2.0)]);

        let by_tenants = chart(&charts, "chart_mlflow_cpu_by_tenants");
        assert_eq!(by_tenants.panels.len(), 1);
        assert_eq!(by_tenants.panels[0].x, vec!["1", "10"]);
        assert_eq!(by_tenants.panels[0].y_max, Some(1.5 * Y_HEADROOM));

        let by_concurrency = chart(&charts, "chart_mlflow_cpu_by_concurrency");
        assert_eq!(by_concurrency.panels.len(), 2);
    }

    #[test]
    fn test_cpu_falls_back_to_utilization_metric() {
        let table = MetricsTable::new(vec![metric("1_concurrency_1", "api", "cpu_utilization", Some(40.0))]);
        let charts = plan_resource_charts(&table);
        let names: Vec<_> = charts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["chart_cpu_utilization"]);
    }

    #[test]
    fn test_json_renderer_writes_file() {
        let dir = tempdir().unwrap();
        let charts = plan_matrix_charts(&matrix());
        let mut renderer = JsonChartRenderer;
        let path = renderer.render(&charts[0], dir.path()).unwrap();
        assert_eq!(path, dir.path().join("chart_summary_dashboard.json"));

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["name"], "chart_summary_dashboard");
        assert_eq!(value["panels"][0]["kind"], "bar");
    }
}
