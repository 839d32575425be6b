// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Record extraction
//!
//! Flattens one load-test run summary into a [`RunRecord`]: the two experiment
//! axes plus one numeric field per derived metric. Extraction never fails; a
//! document without `data.metrics` yields a record holding only its identity.
//!
//! Field naming, for a metric whose name carries an operation prefix `op`:
//!
//! | source metric             | type      | emitted fields                                  |
//! |---------------------------|-----------|-------------------------------------------------|
//! | `op_response_time`        | `trend`   | `op_avg_ms`, `op_p90_ms`, `op_p95_ms`, `op_max_ms` |
//! | `op_passed`               | `counter` | `op_passed` (count), `op_rps` (rate)            |
//! | `op_failed`               | `counter` | `op_failed` (count)                             |
//! | `http_reqs`               | any       | `http_reqs_total`, `http_reqs_rate`             |
//! | `http_req_failed`         | any       | `http_req_failed_rate`, `http_req_failed_count` |
//!
//! Values missing from a matched metric are emitted as 0.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use diagnostics::*;

pub const RESPONSE_TIME_SUFFIX: &str = "_response_time";
pub const PASSED_SUFFIX: &str = "_passed";
pub const FAILED_SUFFIX: &str = "_failed";

pub const AVG_MS_SUFFIX: &str = "_avg_ms";
pub const P90_MS_SUFFIX: &str = "_p90_ms";
pub const P95_MS_SUFFIX: &str = "_p95_ms";
pub const MAX_MS_SUFFIX: &str = "_max_ms";
pub const RPS_SUFFIX: &str = "_rps";

pub const HTTP_REQS_TOTAL: &str = "http_reqs_total";
pub const HTTP_REQS_RATE: &str = "http_reqs_rate";
pub const HTTP_REQ_FAILED_RATE: &str = "http_req_failed_rate";
pub const HTTP_REQ_FAILED_COUNT: &str = "http_req_failed_count";

/// Metric type discriminator as written by the load-test tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetricKind {
    Trend,
    Counter,
    Other,
}

impl MetricKind {
    fn of(metric: &Map<String, Value>) -> Self {
        match metric.get("type").and_then(Value::as_str) {
            Some("trend") => MetricKind::Trend,
            Some("counter") => MetricKind::Counter,
            _ => MetricKind::Other,
        }
    }
}

/// One flattened run: identity plus named metric fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunRecord {
    pub tenants: i64,
    pub concurrency: i64,
    /// Free-form run mode label, empty when the summary carries none
    pub mode: String,
    /// Metric fields, keyed by derived column name
    pub fields: BTreeMap<String, f64>,
}

impl RunRecord {
    #[must_use]
    pub fn new(tenants: i64, concurrency: i64) -> Self {
        Self {
            tenants,
            concurrency,
            ..Self::default()
        }
    }

    /// Builder-style helper, mostly for assembling fixtures.
    #[must_use]
    pub fn with_field<S: Into<String>>(mut self, name: S, value: f64) -> Self {
        _ = self.fields.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.fields.get(name).copied()
    }

    fn set(&mut self, name: String, value: f64) {
        _ = self.fields.insert(name, value);
    }
}

/// Flatten one run summary document.
#[must_use]
pub fn extract_run_record(summary: &Value) -> RunRecord {
    let mut record = RunRecord {
        tenants: root_integer(summary, "tenants"),
        concurrency: root_integer(summary, "concurrency"),
        mode: summary
            .get("mode")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        fields: BTreeMap::new(),
    };

    let Some(metrics) = summary
        .get("data")
        .and_then(|data| data.get("metrics"))
        .and_then(Value::as_object)
    else {
        log_debug!(
            "Summary for tenants={tenants} concurrency={concurrency} has no metrics",
            tenants: record.tenants,
            concurrency: record.concurrency
        );
        return record;
    };

    for (name, metric) in metrics {
        let Some(metric) = metric.as_object() else {
            continue;
        };
        let values = metric_values(metric);

        match MetricKind::of(metric) {
            MetricKind::Trend => {
                if let Some(base) = name.strip_suffix(RESPONSE_TIME_SUFFIX) {
                    record.set(format!("{base}{AVG_MS_SUFFIX}"), value_or_zero(values, "avg"));
                    record.set(format!("{base}{P90_MS_SUFFIX}"), value_or_zero(values, "p(90)"));
                    record.set(format!("{base}{P95_MS_SUFFIX}"), value_or_zero(values, "p(95)"));
                    record.set(format!("{base}{MAX_MS_SUFFIX}"), value_or_zero(values, "max"));
                }
            }
            MetricKind::Counter => {
                if let Some(base) = name.strip_suffix(PASSED_SUFFIX) {
                    record.set(format!("{base}{PASSED_SUFFIX}"), value_or_zero(values, "count"));
                    record.set(format!("{base}{RPS_SUFFIX}"), value_or_zero(values, "rate"));
                } else if let Some(base) = name.strip_suffix(FAILED_SUFFIX) {
                    record.set(format!("{base}{FAILED_SUFFIX}"), value_or_zero(values, "count"));
                }
            }
            MetricKind::Other => {}
        }
    }

    if let Some(http_reqs) = metrics.get("http_reqs") {
        let values = http_reqs.as_object().and_then(metric_values);
        record.set(HTTP_REQS_TOTAL.to_string(), value_or_zero(values, "count"));
        record.set(HTTP_REQS_RATE.to_string(), value_or_zero(values, "rate"));
    }

    if let Some(http_failed) = metrics.get("http_req_failed") {
        let values = http_failed.as_object().and_then(metric_values);
        record.set(HTTP_REQ_FAILED_RATE.to_string(), value_or_zero(values, "rate"));
        // The upstream tool reports this count under `passes`.
        record.set(HTTP_REQ_FAILED_COUNT.to_string(), value_or_zero(values, "passes"));
    }

    log_debug!(
        "Extracted {count} fields for tenants={tenants} concurrency={concurrency}",
        count: record.fields.len(),
        tenants: record.tenants,
        concurrency: record.concurrency
    );

    record
}

/// Identity field as an integer; numeric strings are accepted. Absent or
/// non-numeric values read as 0.
fn root_integer(summary: &Value, key: &str) -> i64 {
    let Some(value) = summary.get(key) else {
        return 0;
    };
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        log_debug!("Summary field {key} is not numeric ({value}); using 0",
            key: key, value: value.to_string());
        0
    })
}

fn metric_values(metric: &Map<String, Value>) -> Option<&Map<String, Value>> {
    metric.get("values").and_then(Value::as_object)
}

fn value_or_zero(values: Option<&Map<String, Value>>, key: &str) -> f64 {
    values
        .and_then(|values| values.get(key))
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}
