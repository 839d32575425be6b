// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Resource metrics tables
//!
//! Each experiment exports one CSV of resource usage per component, named
//! `metrics_{experiment}.csv`. The experiment tag usually encodes both axes
//! as `{tenants}_concurrency_{concurrency}`; tags that do not are still
//! loaded, but carry no axis values.
//!
//! Expected layout (comment lines start with `#`):
//!
//! ```text
//! # collected by the metrics exporter
//! component,metric,aggregation,unit,value
//! mlflow,cpu,avg,cores,0.42
//! postgres,memory,max,bytes,104857600
//! ```

use arrow_array::{Array, RecordBatch, StringArray};
use arrow_csv::ReaderBuilder;
use arrow_csv::reader::Format;
use arrow_schema::{DataType, Field, Schema};
use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Seek};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use crate::error::{ReportError, Result};
use diagnostics::*;

static FILE_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^metrics_(.+)\.(csv|log)").expect("valid file name pattern"));

static EXPERIMENT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)_concurrency_(\d+)").expect("valid experiment pattern"));

/// Columns every metrics table must carry, looked up by header name.
pub const REQUIRED_COLUMNS: [&str; 5] = ["component", "metric", "aggregation", "unit", "value"];

const COMMENT_PREFIX: u8 = b'#';

/// One line of a metrics table, tagged with its experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub experiment: String,
    /// `None` when the experiment tag does not encode the axes
    pub tenants: Option<i64>,
    /// `None` when the experiment tag does not encode the axes
    pub concurrency: Option<i64>,
    pub component: String,
    pub metric: String,
    pub aggregation: String,
    pub unit: String,
    /// `None` for cells that are not numbers (e.g. `N/A`)
    pub value: Option<f64>,
}

impl MetricRow {
    /// Both axes, when the experiment tag encodes them.
    #[must_use]
    pub fn axes(&self) -> Option<(i64, i64)> {
        self.tenants.zip(self.concurrency)
    }
}

/// Experiment tag of a metrics file, e.g. `metrics_1_concurrency_10.csv`
/// becomes `1_concurrency_10`. Names that do not follow the convention are
/// used whole.
#[must_use]
pub fn experiment_tag(file_name: &str) -> String {
    FILE_NAME_PATTERN
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .map_or_else(|| file_name.to_string(), |m| m.as_str().to_string())
}

/// Parse `(tenants, concurrency)` out of an experiment tag.
#[must_use]
pub fn parse_experiment(tag: &str) -> Option<(i64, i64)> {
    let caps = EXPERIMENT_PATTERN.captures(tag)?;
    let tenants = caps.get(1)?.as_str().parse().ok()?;
    let concurrency = caps.get(2)?.as_str().parse().ok()?;
    Some((tenants, concurrency))
}

/// Orders experiment tags numerically by their axes; tags without axes go
/// last, ties fall back to the tag itself.
#[must_use]
pub fn compare_experiments(a: &str, b: &str) -> Ordering {
    match (parse_experiment(a), parse_experiment(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Result of loading metrics tables.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricsLoad {
    Loaded(MetricsTable),
    /// Nothing matched or nothing could be read; resource charts are skipped
    NoData,
}

impl MetricsLoad {
    #[must_use]
    pub fn table(&self) -> Option<&MetricsTable> {
        match self {
            MetricsLoad::Loaded(table) => Some(table),
            MetricsLoad::NoData => None,
        }
    }
}

/// All metric rows of all loaded experiments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsTable {
    rows: Vec<MetricRow>,
}

impl MetricsTable {
    #[must_use]
    pub fn new(rows: Vec<MetricRow>) -> Self {
        Self { rows }
    }

    #[must_use]
    pub fn rows(&self) -> &[MetricRow] {
        &self.rows
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct experiment tags in numeric axis order.
    #[must_use]
    pub fn experiments(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .rows
            .iter()
            .map(|row| row.experiment.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        tags.sort_by(|a, b| compare_experiments(a, b));
        tags
    }

    /// Distinct component names, sorted.
    #[must_use]
    pub fn components(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| row.component.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Rows for any of `metrics` at `aggregation`, optionally limited to one
    /// component. Rows without axes are included.
    pub fn select<'a>(
        &'a self,
        component: Option<&'a str>,
        metrics: &'a [&'a str],
        aggregation: &'a str,
    ) -> impl Iterator<Item = &'a MetricRow> + 'a {
        self.rows.iter().filter(move |row| {
            component.is_none_or(|c| row.component == c)
                && metrics.contains(&row.metric.as_str())
                && row.aggregation == aggregation
        })
    }
}

/// Read one metrics table, tagging rows from its file name.
pub fn read_metrics_file(path: &Path) -> Result<Vec<MetricRow>> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let experiment = experiment_tag(&file_name);
    let axes = parse_experiment(&experiment);

    let mut file = File::open(path).map_err(|e| ReportError::io(path, e))?;

    // Short rows are kept; their missing trailing cells read as null.
    let format = Format::default()
        .with_header(true)
        .with_comment(COMMENT_PREFIX)
        .with_truncated_rows(true);
    let (inferred, _) = format.infer_schema(BufReader::new(&mut file), None)?;
    file.rewind().map_err(|e| ReportError::io(path, e))?;

    // Read every column as text; values are converted after the fact so a
    // stray `N/A` does not fail the file.
    let fields: Vec<Field> = inferred
        .fields()
        .iter()
        .map(|f| Field::new(f.name().trim(), DataType::Utf8, true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    for required in REQUIRED_COLUMNS {
        if schema.index_of(required).is_err() {
            return Err(ReportError::metrics_format(
                path,
                format!("missing required column '{required}'"),
            ));
        }
    }

    let reader = ReaderBuilder::new(schema)
        .with_header(true)
        .with_comment(COMMENT_PREFIX)
        .with_truncated_rows(true)
        .build(BufReader::new(file))?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch?;
        append_rows(&batch, &experiment, axes, path, &mut rows)?;
    }

    log_debug!("Read {count} metric rows from {path}", count: rows.len(), path: path.display().to_string());
    Ok(rows)
}

fn append_rows(
    batch: &RecordBatch,
    experiment: &str,
    axes: Option<(i64, i64)>,
    path: &Path,
    rows: &mut Vec<MetricRow>,
) -> Result<()> {
    let column = |name: &str| -> Result<&StringArray> {
        batch
            .column_by_name(name)
            .and_then(|col| col.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| ReportError::metrics_format(path, format!("column '{name}' is not text")))
    };

    let components = column("component")?;
    let metrics = column("metric")?;
    let aggregations = column("aggregation")?;
    let units = column("unit")?;
    let values = column("value")?;

    for i in 0..batch.num_rows() {
        rows.push(MetricRow {
            experiment: experiment.to_string(),
            tenants: axes.map(|(tenants, _)| tenants),
            concurrency: axes.map(|(_, concurrency)| concurrency),
            component: text(components, i),
            metric: text(metrics, i),
            aggregation: text(aggregations, i),
            unit: text(units, i),
            value: numeric(values, i),
        });
    }
    Ok(())
}

fn text(array: &StringArray, i: usize) -> String {
    if array.is_null(i) {
        String::new()
    } else {
        array.value(i).to_string()
    }
}

fn numeric(array: &StringArray, i: usize) -> Option<f64> {
    if array.is_null(i) {
        return None;
    }
    array
        .value(i)
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| !v.is_nan())
}

/// Load every metrics table, skipping (and logging) files that fail to parse.
#[must_use]
pub fn load_metrics_tables(paths: &[PathBuf]) -> MetricsLoad {
    if paths.is_empty() {
        return MetricsLoad::NoData;
    }

    let mut rows = Vec::new();
    let mut loaded = 0usize;
    for path in paths {
        match read_metrics_file(path) {
            Ok(file_rows) => {
                log_info!("Loaded metrics: {path}", path: path.display().to_string());
                rows.extend(file_rows);
                loaded += 1;
            }
            Err(e) => {
                log_warn!("Could not load {path}: {error}",
                    path: path.display().to_string(), error: e.to_string());
            }
        }
    }

    if loaded == 0 {
        return MetricsLoad::NoData;
    }
    MetricsLoad::Loaded(MetricsTable::new(rows))
}
