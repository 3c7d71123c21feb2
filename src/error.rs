//! Error handling for configuration exchange operations.
//!
//! Provides the error taxonomy shared by the tabular codec, the exporter,
//! the importer and the validation pipeline. Pipeline-level failures are
//! captured as stage outcomes and never propagate past the pipeline
//! boundary; these errors surface only inside stage processing.

use crate::app::models::RecordKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid path: {reason}: {path}")]
    Path { path: PathBuf, reason: String },

    #[error("No field mappings registered for record kind: {kind}")]
    Schema { kind: RecordKind },

    #[error("Time series row {row_id} not found")]
    ReferenceNotFound { row_id: i64 },

    #[error("Unknown {table} code: '{code}'")]
    UnknownCode { table: String, code: String },

    #[error("Malformed table file: {path} - {reason}")]
    Table { path: PathBuf, reason: String },

    #[error("Field '{field}' rejected value: {reason}")]
    Coercion { field: String, reason: String },
}

impl ExchangeError {
    /// Create a path error with context
    pub fn path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Path {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed-table error for a file
    pub fn table(path: &Path, reason: impl Into<String>) -> Self {
        Self::Table {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create a coercion error for a named field
    pub fn coercion(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Coercion {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown-code error for an enumerated code table
    pub fn unknown_code(table: impl Into<String>, code: impl Into<String>) -> Self {
        Self::UnknownCode {
            table: table.into(),
            code: code.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExchangeError>;
