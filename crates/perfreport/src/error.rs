// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

// Error types for report generation
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, ReportError>;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("No files found matching pattern: {pattern}")]
    NoSummaries { pattern: String },

    #[error("Invalid glob pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("Malformed metrics table {path}: {message}")]
    MetricsFormat { path: PathBuf, message: String },
}

impl ReportError {
    pub fn io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        ReportError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json<P: Into<PathBuf>>(path: P, source: serde_json::Error) -> Self {
        ReportError::Json {
            path: path.into(),
            source,
        }
    }

    pub fn metrics_format<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        ReportError::MetricsFormat {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn pattern<S: Into<String>, M: std::fmt::Display>(pattern: S, message: M) -> Self {
        ReportError::Pattern {
            pattern: pattern.into(),
            message: message.to_string(),
        }
    }
}
