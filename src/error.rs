use std::path::PathBuf;

use thiserror::Error;

/// Convenience result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Error type shared across the ingestion pipeline.
///
/// Per-file failures carry enough context to log and move on; only setup
/// failures (source folder unreadable, bad config) abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Underlying I/O error (e.g. source folder unreadable, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "excel")]
    /// Excel read error (feature-gated behind `excel`).
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// Config file could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    /// The file extension maps to no supported source format.
    #[error("unsupported file format: {}", .path.display())]
    UnsupportedFormat { path: PathBuf },

    /// A column the pipeline requires is absent from the source file.
    #[error("missing required column '{column}' in {}", .path.display())]
    MissingColumn { column: String, path: PathBuf },

    /// The destination rejected the load because a column's type conflicts
    /// with the type already registered for that name.
    #[error("schema conflict on table {table}: {message}")]
    SchemaConflict { table: String, message: String },

    /// The destination rejected the load for any other reason.
    #[error("append to table {table} failed: {message}")]
    AppendFailed { table: String, message: String },

    /// A processed file could not be relocated into the archive tree.
    #[error("failed to move {} to {}: {message}", .from.display(), .to.display())]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        message: String,
    },
}

/// Errors surfaced by a [`crate::warehouse::Warehouse`] implementation.
///
/// These stay behind the store seam: the watermark layer maps them into
/// [`PipelineError`] variants (or degrades them into the sentinel watermark
/// for lookups, which never fail).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WarehouseError {
    /// The destination table does not exist.
    #[error("table not found")]
    TableNotFound,

    /// Transient connectivity or query failure.
    #[error("warehouse unavailable: {0}")]
    Unavailable(String),

    /// An incoming column's type conflicts with the registered type.
    #[error("schema conflict: {0}")]
    SchemaConflict(String),

    /// Any other destination-side rejection of a load.
    #[error("load rejected: {0}")]
    Rejected(String),
}
