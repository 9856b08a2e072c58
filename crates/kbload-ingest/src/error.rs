//! Error types for the load pipeline
//!
//! Only structural failures live here. Record-level problems never become
//! errors; they are classified into report buckets instead.

use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LoadError>;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{file} not in correct format: {reason}")]
    Format { file: String, reason: String },

    #[error("{file} has less than the configured minimum records: {minimum}, number of records: {actual}")]
    BelowMinimum {
        file: String,
        minimum: usize,
        actual: usize,
    },

    #[error("Unresolved grouping key(s), load aborted: {}", .0.join(", "))]
    UnresolvedGrouping(Vec<String>),

    #[error("Reference snapshot query failed: {0}")]
    Snapshot(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bulk load of {table} failed: {reason}")]
    BulkLoad { table: String, reason: String },

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl LoadError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        LoadError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn format(file: impl Into<String>, reason: impl Into<String>) -> Self {
        LoadError::Format {
            file: file.into(),
            reason: reason.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        LoadError::Config(msg.into())
    }

    pub fn bulk_load(table: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        LoadError::BulkLoad {
            table: table.into(),
            reason: reason.to_string(),
        }
    }

    /// Process exit status: 2 when the bulk-load step failed, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::BulkLoad { .. } => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(LoadError::bulk_load("MGI_Relationship", "copy failed").exit_code(), 2);
        assert_eq!(LoadError::format("uberon.obo", "bad header").exit_code(), 1);
        assert_eq!(LoadError::UnresolvedGrouping(vec!["CAST".into()]).exit_code(), 1);
    }

    #[test]
    fn test_below_minimum_message() {
        let err = LoadError::BelowMinimum {
            file: "emapa.obo".into(),
            minimum: 500,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "emapa.obo has less than the configured minimum records: 500, number of records: 3"
        );
    }
}
