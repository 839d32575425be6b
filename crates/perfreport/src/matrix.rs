// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Experiment matrix
//!
//! Joins the flattened runs into one table keyed by (tenants, concurrency).
//! Columns are the union of every field seen in any run; a run lacking a
//! field has no value for it, which is not the same as an extracted zero.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::extract::{
    AVG_MS_SUFFIX, HTTP_REQS_RATE, P95_MS_SUFFIX, PASSED_SUFFIX, RPS_SUFFIX, RunRecord,
};
use diagnostics::*;

pub const TENANTS_COLUMN: &str = "tenants";
pub const CONCURRENCY_COLUMN: &str = "concurrency";
pub const MODE_COLUMN: &str = "mode";

/// One run in the matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixRow {
    pub tenants: i64,
    pub concurrency: i64,
    pub mode: String,
    values: BTreeMap<String, f64>,
}

impl MatrixRow {
    #[must_use]
    pub fn key(&self) -> (i64, i64) {
        (self.tenants, self.concurrency)
    }

    /// Value of a metric column, `None` when this run never produced it.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied()
    }

    /// Short configuration label, e.g. `T10_C50`.
    #[must_use]
    pub fn config_label(&self) -> String {
        format!("T{}_C{}", self.tenants, self.concurrency)
    }

    /// Mean of the present values among `columns`.
    #[must_use]
    pub fn mean_of(&self, columns: &[String]) -> Option<f64> {
        mean(columns.iter().filter_map(|c| self.get(c)))
    }
}

/// Mean of an iterator of values, `None` when empty.
#[must_use]
pub fn mean<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Accumulates run records; consumed once to produce the matrix.
#[derive(Debug, Default)]
pub struct MatrixBuilder {
    records: Vec<RunRecord>,
}

impl MatrixBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: RunRecord) {
        self.records.push(record);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Freeze into a matrix sorted by (tenants, concurrency).
    ///
    /// Duplicate axis pairs keep their input order; key lookups on the
    /// matrix then resolve to the last of them.
    #[must_use]
    pub fn build(self) -> ExperimentMatrix {
        let mut columns = Vec::new();
        let mut seen = HashSet::new();
        for record in &self.records {
            for name in record.fields.keys() {
                if seen.insert(name.as_str()) {
                    columns.push(name.clone());
                }
            }
        }

        let mut keys = HashSet::new();
        for record in &self.records {
            if !keys.insert((record.tenants, record.concurrency)) {
                log_warn!(
                    "Duplicate run for tenants={tenants} concurrency={concurrency}; the later one wins in comparisons",
                    tenants: record.tenants,
                    concurrency: record.concurrency
                );
            }
        }

        let mut rows: Vec<MatrixRow> = self
            .records
            .into_iter()
            .map(|record| MatrixRow {
                tenants: record.tenants,
                concurrency: record.concurrency,
                mode: record.mode,
                values: record.fields,
            })
            .collect();
        rows.sort_by_key(MatrixRow::key);

        log_debug!("Built matrix with {rows} rows and {columns} metric columns",
            rows: rows.len(), columns: columns.len());

        ExperimentMatrix { columns, rows }
    }
}

impl Extend<RunRecord> for MatrixBuilder {
    fn extend<T: IntoIterator<Item = RunRecord>>(&mut self, iter: T) {
        self.records.extend(iter);
    }
}

/// All runs, one row each, sorted by (tenants, concurrency).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperimentMatrix {
    columns: Vec<String>,
    rows: Vec<MatrixRow>,
}

impl ExperimentMatrix {
    /// Metric columns in first-appearance order (identity columns excluded).
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[MatrixRow] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Metric columns ending with `suffix`, in column order.
    #[must_use]
    pub fn columns_with_suffix(&self, suffix: &str) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.ends_with(suffix))
            .cloned()
            .collect()
    }

    /// Operation names, taken from `_avg_ms` and `_passed` columns, sorted.
    #[must_use]
    pub fn operations(&self) -> Vec<String> {
        let mut ops = BTreeSet::new();
        for column in &self.columns {
            if let Some(op) = column.strip_suffix(AVG_MS_SUFFIX) {
                _ = ops.insert(op.to_string());
            } else if let Some(op) = column.strip_suffix(PASSED_SUFFIX) {
                _ = ops.insert(op.to_string());
            }
        }
        ops.into_iter().collect()
    }

    /// Operations that have a P95 latency column, sorted.
    #[must_use]
    pub fn p95_operations(&self) -> Vec<String> {
        let ops: BTreeSet<String> = self
            .columns
            .iter()
            .filter_map(|c| c.strip_suffix(P95_MS_SUFFIX))
            .map(str::to_string)
            .collect();
        ops.into_iter().collect()
    }

    /// Distinct tenant counts, ascending.
    #[must_use]
    pub fn tenant_counts(&self) -> Vec<i64> {
        let set: BTreeSet<i64> = self.rows.iter().map(|r| r.tenants).collect();
        set.into_iter().collect()
    }

    /// Distinct concurrency levels, ascending.
    #[must_use]
    pub fn concurrency_levels(&self) -> Vec<i64> {
        let set: BTreeSet<i64> = self.rows.iter().map(|r| r.concurrency).collect();
        set.into_iter().collect()
    }

    /// Row for an axis pair; the last duplicate wins.
    #[must_use]
    pub fn row(&self, tenants: i64, concurrency: i64) -> Option<&MatrixRow> {
        self.rows
            .iter()
            .rev()
            .find(|r| r.tenants == tenants && r.concurrency == concurrency)
    }

    /// Columns of the P95 latency projection, sorted by name.
    #[must_use]
    pub fn p95_columns(&self) -> Vec<String> {
        let mut columns = self.columns_with_suffix(P95_MS_SUFFIX);
        columns.sort();
        columns
    }

    /// Columns of the throughput projection: every `_rps` column plus the
    /// global request rate, sorted by name.
    #[must_use]
    pub fn throughput_columns(&self) -> Vec<String> {
        let mut columns = self.columns_with_suffix(RPS_SUFFIX);
        if self.has_column(HTTP_REQS_RATE) {
            columns.push(HTTP_REQS_RATE.to_string());
        }
        columns.sort();
        columns
    }

    /// Rows grouped by one axis value, ascending; rows inside a group are
    /// ordered by the other axis.
    #[must_use]
    pub fn group_by(&self, axis: Axis) -> Vec<(i64, Vec<&MatrixRow>)> {
        let mut groups: BTreeMap<i64, Vec<&MatrixRow>> = BTreeMap::new();
        for row in &self.rows {
            groups.entry(axis.of(row)).or_default().push(row);
        }
        groups
            .into_iter()
            .map(|(value, mut rows)| {
                rows.sort_by_key(|r| axis.other().of(r));
                (value, rows)
            })
            .collect()
    }
}

/// One of the two experiment axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Tenants,
    Concurrency,
}

impl Axis {
    #[must_use]
    pub fn of(self, row: &MatrixRow) -> i64 {
        match self {
            Axis::Tenants => row.tenants,
            Axis::Concurrency => row.concurrency,
        }
    }

    #[must_use]
    pub fn other(self) -> Axis {
        match self {
            Axis::Tenants => Axis::Concurrency,
            Axis::Concurrency => Axis::Tenants,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Axis::Tenants => "Tenants",
            Axis::Concurrency => "Concurrency",
        }
    }
}
