// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Diagnostics for the perf-report workspace
//!
//! Thin layer over `emit` so every crate logs the same way.
//!
//! Usage:
//! - Set PERF_REPORT_LOG=off (default) - no logs
//! - Set PERF_REPORT_LOG=info - progress logs (files loaded, tables written)
//! - Set PERF_REPORT_LOG=debug - per-metric and per-row details

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

/// Environment variable holding the minimum log level.
pub const LOG_ENV_VAR: &str = "PERF_REPORT_LOG";

static INIT: Once = Once::new();

/// Map a `PERF_REPORT_LOG` value to a minimum level.
///
/// `Ok(None)` means logging is off. Unknown values come back as `Err` with
/// the fallback level so the caller can report them.
pub fn parse_level(value: &str) -> Result<Option<emit::Level>, emit::Level> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "off" => Ok(None),
        "debug" => Ok(Some(emit::Level::Debug)),
        "info" => Ok(Some(emit::Level::Info)),
        "warn" => Ok(Some(emit::Level::Warn)),
        "error" => Ok(Some(emit::Level::Error)),
        _ => Err(emit::Level::Info),
    }
}

/// Initialize diagnostics based on the PERF_REPORT_LOG environment variable
///
/// Call once at startup. Later calls are ignored.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let raw = std::env::var(LOG_ENV_VAR).unwrap_or_else(|_| "off".to_string());

        let (level, unknown) = match parse_level(&raw) {
            Ok(Some(level)) => (level, false),
            Ok(None) => return,
            Err(fallback) => (fallback, true),
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(level))
            .init();

        if unknown {
            emit::warn!("Unknown {var} value '{value}', using 'info'", var: LOG_ENV_VAR, value: raw);
        }

        // The runtime must outlive every emitting call site
        std::mem::forget(rt);
    });
}

/// Log progress a user running the report wants to see.
///
/// Examples: "Loaded summary", "Wrote report_summary.csv"
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log per-record details, useful when a report looks wrong.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log recoverable problems (a skipped input file, a duplicated experiment).
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log failures that end the run.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}
