// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Comparative latency analysis
//!
//! Answers "how does P95 latency move as tenants are added?". The smallest
//! tenant count in the matrix is the baseline; for every operation and
//! concurrency level, each other tenant count is expressed as a percentage
//! change from the baseline's P95. Changes are then averaged per operation
//! category.
//!
//! Missing data stays missing: a tenant count without a run at some
//! concurrency has no P95 there, and a baseline of zero or no baseline at
//! all leaves the change undefined.

use std::collections::BTreeMap;

use crate::category::{OperationCategory, categorize};
use crate::extract::P95_MS_SUFFIX;
use crate::matrix::{ExperimentMatrix, mean};
use diagnostics::*;

/// P95 comparison of one operation at one concurrency level.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparativeRecord {
    pub operation: String,
    pub category: OperationCategory,
    pub concurrency: i64,
    /// P95 latency (ms) per tenant count that has a value
    pub p95_ms: BTreeMap<i64, f64>,
    /// Change from the baseline (%) per non-baseline tenant count, when defined
    pub pct_change: BTreeMap<i64, f64>,
}

/// Category averages at one concurrency level.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySummary {
    pub category: OperationCategory,
    pub concurrency: i64,
    /// Number of comparative records averaged
    pub operations: usize,
    pub avg_p95_ms: BTreeMap<i64, f64>,
    pub avg_pct_change: BTreeMap<i64, f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparativeAnalysis {
    pub baseline_tenants: i64,
    /// Every tenant count in the matrix, ascending; the first is the baseline
    pub tenant_counts: Vec<i64>,
    pub records: Vec<ComparativeRecord>,
    pub summaries: Vec<CategorySummary>,
}

impl ComparativeAnalysis {
    /// Tenant counts compared against the baseline.
    pub fn compared_tenants(&self) -> impl Iterator<Item = i64> + '_ {
        self.tenant_counts
            .iter()
            .copied()
            .filter(move |t| *t != self.baseline_tenants)
    }
}

/// Round half away from zero to `decimals` places.
#[must_use]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// `((value - baseline) / baseline) * 100`, rounded to one decimal.
///
/// Undefined when either side is missing or the baseline is zero.
#[must_use]
pub fn percent_change(baseline: Option<f64>, value: Option<f64>) -> Option<f64> {
    let baseline = baseline?;
    let value = value?;
    if baseline == 0.0 {
        return None;
    }
    let change = round_to((value - baseline) / baseline * 100.0, 1);
    change.is_finite().then_some(change)
}

/// Compare P95 latencies across tenant counts.
///
/// Returns `None` when the matrix holds fewer than two tenant counts.
#[must_use]
pub fn analyze(matrix: &ExperimentMatrix) -> Option<ComparativeAnalysis> {
    let tenant_counts = matrix.tenant_counts();
    if tenant_counts.len() < 2 {
        log_info!("Need at least two tenant counts for comparison, found {count}; skipping latency analysis",
            count: tenant_counts.len());
        return None;
    }
    let baseline_tenants = tenant_counts[0];

    let mut records = Vec::new();
    for operation in matrix.p95_operations() {
        let column = format!("{operation}{P95_MS_SUFFIX}");
        let category = categorize(&operation);

        for concurrency in matrix.concurrency_levels() {
            let p95_ms: BTreeMap<i64, f64> = tenant_counts
                .iter()
                .filter_map(|&tenants| {
                    matrix
                        .row(tenants, concurrency)
                        .and_then(|row| row.get(&column))
                        .map(|value| (tenants, value))
                })
                .collect();

            let baseline = p95_ms.get(&baseline_tenants).copied();
            let pct_change: BTreeMap<i64, f64> = tenant_counts
                .iter()
                .filter(|&&tenants| tenants != baseline_tenants)
                .filter_map(|&tenants| {
                    percent_change(baseline, p95_ms.get(&tenants).copied())
                        .map(|change| (tenants, change))
                })
                .collect();

            records.push(ComparativeRecord {
                operation: operation.clone(),
                category,
                concurrency,
                p95_ms,
                pct_change,
            });
        }
    }

    let summaries = summarize_by_category(&records);

    log_info!("Compared {records} operation/concurrency pairs against baseline of {baseline} tenant(s)",
        records: records.len(), baseline: baseline_tenants);

    Some(ComparativeAnalysis {
        baseline_tenants,
        tenant_counts,
        records,
        summaries,
    })
}

/// Average comparative records per (category, concurrency).
///
/// Each tenant count is averaged over the records that have a value for it;
/// a tenant count with no values is left out of the summary.
#[must_use]
pub fn summarize_by_category(records: &[ComparativeRecord]) -> Vec<CategorySummary> {
    let mut groups: BTreeMap<(OperationCategory, i64), Vec<&ComparativeRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry((record.category, record.concurrency))
            .or_default()
            .push(record);
    }

    groups
        .into_iter()
        .map(|((category, concurrency), group)| CategorySummary {
            category,
            concurrency,
            operations: group.len(),
            avg_p95_ms: average_per_tenant(&group, |r| &r.p95_ms, None),
            avg_pct_change: average_per_tenant(&group, |r| &r.pct_change, Some(1)),
        })
        .collect()
}

fn average_per_tenant<F>(
    group: &[&ComparativeRecord],
    field: F,
    decimals: Option<i32>,
) -> BTreeMap<i64, f64>
where
    F: Fn(&ComparativeRecord) -> &BTreeMap<i64, f64>,
{
    let mut collected: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
    for record in group {
        for (&tenants, &value) in field(*record) {
            collected.entry(tenants).or_default().push(value);
        }
    }

    collected
        .into_iter()
        .filter_map(|(tenants, values)| {
            mean(values).map(|avg| (tenants, decimals.map_or(avg, |d| round_to(avg, d))))
        })
        .collect()
}
