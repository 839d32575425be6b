// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Table export
//!
//! Every report table becomes an Arrow record batch: axis columns are
//! `Int64`, labels `Utf8`, and metrics nullable `Float64`, so an absent
//! value is written as an empty CSV cell while an extracted zero stays `0.0`.

use arrow_array::{ArrayRef, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow_cast::pretty::pretty_format_batches;
use arrow_csv::WriterBuilder;
use arrow_schema::{DataType, Field, Schema};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use crate::analysis::ComparativeAnalysis;
use crate::error::{ReportError, Result};
use crate::extract::{HTTP_REQS_RATE, HTTP_REQS_TOTAL};
use crate::matrix::{CONCURRENCY_COLUMN, ExperimentMatrix, MODE_COLUMN, TENANTS_COLUMN};
use diagnostics::*;

/// Column name for the P95 of one tenant count in the comparison table.
#[must_use]
pub fn p95_column(tenants: i64) -> String {
    format!("t{tenants}_p95_ms")
}

/// Column name for the change of one tenant count in the comparison table.
#[must_use]
pub fn pct_change_column(tenants: i64) -> String {
    format!("t{tenants}_pct_change")
}

/// Incrementally assembled schema and columns.
#[derive(Default)]
struct BatchBuilder {
    fields: Vec<Field>,
    columns: Vec<ArrayRef>,
}

impl BatchBuilder {
    fn int(mut self, name: &str, values: Vec<i64>) -> Self {
        self.fields.push(Field::new(name, DataType::Int64, false));
        self.columns.push(Arc::new(Int64Array::from(values)));
        self
    }

    fn text(mut self, name: &str, values: Vec<String>) -> Self {
        self.fields.push(Field::new(name, DataType::Utf8, false));
        self.columns.push(Arc::new(StringArray::from(values)));
        self
    }

    fn float(mut self, name: &str, values: Vec<Option<f64>>) -> Self {
        self.fields.push(Field::new(name, DataType::Float64, true));
        self.columns.push(Arc::new(Float64Array::from(values)));
        self
    }

    fn finish(self) -> Result<RecordBatch> {
        Ok(RecordBatch::try_new(
            Arc::new(Schema::new(self.fields)),
            self.columns,
        )?)
    }
}

fn identity(matrix: &ExperimentMatrix) -> BatchBuilder {
    BatchBuilder::default()
        .int(TENANTS_COLUMN, matrix.rows().iter().map(|r| r.tenants).collect())
        .int(CONCURRENCY_COLUMN, matrix.rows().iter().map(|r| r.concurrency).collect())
}

fn with_metric_columns(
    mut builder: BatchBuilder,
    matrix: &ExperimentMatrix,
    columns: &[String],
) -> BatchBuilder {
    for column in columns {
        builder = builder.float(column, matrix.rows().iter().map(|r| r.get(column)).collect());
    }
    builder
}

/// The full matrix: identity, mode, then every metric column.
pub fn matrix_batch(matrix: &ExperimentMatrix) -> Result<RecordBatch> {
    let builder = identity(matrix).text(
        MODE_COLUMN,
        matrix.rows().iter().map(|r| r.mode.clone()).collect(),
    );
    with_metric_columns(builder, matrix, matrix.columns()).finish()
}

/// Identity columns plus the chosen metric columns.
pub fn projection_batch(matrix: &ExperimentMatrix, columns: &[String]) -> Result<RecordBatch> {
    with_metric_columns(identity(matrix), matrix, columns).finish()
}

/// Compact per-run overview used for console output.
pub fn overview_batch(matrix: &ExperimentMatrix) -> Result<RecordBatch> {
    let columns: Vec<String> = [HTTP_REQS_TOTAL, HTTP_REQS_RATE]
        .into_iter()
        .filter(|c| matrix.has_column(c))
        .map(str::to_string)
        .collect();
    projection_batch(matrix, &columns)
}

/// Render a batch as an ASCII table.
pub fn pretty_table(batch: &RecordBatch) -> Result<String> {
    Ok(pretty_format_batches(std::slice::from_ref(batch))?.to_string())
}

fn tenant_values(map: &BTreeMap<i64, f64>, tenants: i64) -> Option<f64> {
    map.get(&tenants).copied()
}

/// One row per (operation, concurrency).
pub fn comparison_batch(analysis: &ComparativeAnalysis) -> Result<RecordBatch> {
    let records = &analysis.records;
    let mut builder = BatchBuilder::default()
        .text("operation", records.iter().map(|r| r.operation.clone()).collect())
        .text("category", records.iter().map(|r| r.category.to_string()).collect())
        .int(CONCURRENCY_COLUMN, records.iter().map(|r| r.concurrency).collect());

    for &tenants in &analysis.tenant_counts {
        builder = builder.float(
            &p95_column(tenants),
            records.iter().map(|r| tenant_values(&r.p95_ms, tenants)).collect(),
        );
    }
    for tenants in analysis.compared_tenants() {
        builder = builder.float(
            &pct_change_column(tenants),
            records.iter().map(|r| tenant_values(&r.pct_change, tenants)).collect(),
        );
    }
    builder.finish()
}

/// One row per (category, concurrency).
pub fn category_summary_batch(analysis: &ComparativeAnalysis) -> Result<RecordBatch> {
    let summaries = &analysis.summaries;
    let mut builder = BatchBuilder::default()
        .text("category", summaries.iter().map(|s| s.category.to_string()).collect())
        .int(CONCURRENCY_COLUMN, summaries.iter().map(|s| s.concurrency).collect())
        .int("operations", summaries.iter().map(|s| s.operations as i64).collect());

    for &tenants in &analysis.tenant_counts {
        builder = builder.float(
            &format!("avg_{}", p95_column(tenants)),
            summaries.iter().map(|s| tenant_values(&s.avg_p95_ms, tenants)).collect(),
        );
    }
    for tenants in analysis.compared_tenants() {
        builder = builder.float(
            &format!("avg_{}", pct_change_column(tenants)),
            summaries.iter().map(|s| tenant_values(&s.avg_pct_change, tenants)).collect(),
        );
    }
    builder.finish()
}

/// Write a batch as CSV with a header row, replacing any existing file.
pub fn write_csv(batch: &RecordBatch, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| ReportError::io(path, e))?;
    let mut writer = WriterBuilder::new()
        .with_header(true)
        .build(BufWriter::new(file));
    writer.write(batch)?;
    writer
        .into_inner()
        .flush()
        .map_err(|e| ReportError::io(path, e))?;

    log_info!("CSV report saved to: {path} ({rows} rows)",
        path: path.display().to_string(), rows: batch.num_rows());
    Ok(())
}
