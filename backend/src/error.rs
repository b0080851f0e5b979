//! Error types surfaced by the record store and the report exporter.
//!
//! Neither layer retries. Failures go straight back to the caller, which decides
//! how to present them.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid search criteria: {0}")]
    InvalidCriteria(String),

    #[error("unexpected value {value:?} in column {column}")]
    Decode { column: &'static str, value: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to read records for export: {0}")]
    Storage(#[from] StorageError),

    #[error("report path {0:?} must be a relative path inside the export directory")]
    InvalidPath(String),

    #[error("failed to render workbook: {0}")]
    Render(#[from] rust_xlsxwriter::XlsxError),

    #[error("failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("report writer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
pub type ExportResult<T> = std::result::Result<T, ExportError>;
