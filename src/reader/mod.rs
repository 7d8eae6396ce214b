//! Source-file reading.
//!
//! [`read_rowset`] dispatches on the file extension and reads a CSV or Excel
//! file into an in-memory [`crate::types::RowSet`], skipping a configurable
//! number of leading rows. The header row defines the discovered schema;
//! header labels are taken verbatim (normalization happens at append time).

use std::path::Path;

use crate::error::{PipelineError, PipelineResult};
use crate::types::RowSet;

pub mod csv;
#[cfg(feature = "excel")]
pub mod excel;

/// Supported source-file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Comma-separated values.
    Csv,
    /// Spreadsheet/workbook formats (feature-gated behind `excel`).
    Excel,
}

impl SourceFormat {
    /// Parse a source format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "xlsx" | "xls" => Some(Self::Excel),
            _ => None,
        }
    }

    /// Detect the format of a path by its extension, if recognized.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|s| s.to_str())
            .and_then(Self::from_extension)
    }
}

/// Read a source file into a [`RowSet`], skipping `skip_rows` leading rows.
///
/// The format is chosen by file extension; any other extension (or none)
/// fails with [`PipelineError::UnsupportedFormat`]. The source file is never
/// mutated.
pub fn read_rowset(path: impl AsRef<Path>, skip_rows: usize) -> PipelineResult<RowSet> {
    let path = path.as_ref();
    let format = SourceFormat::from_path(path).ok_or_else(|| PipelineError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;

    match format {
        SourceFormat::Csv => csv::read_csv_rowset(path, skip_rows),
        SourceFormat::Excel => read_excel_dispatch(path, skip_rows),
    }
}

fn read_excel_dispatch(path: &Path, skip_rows: usize) -> PipelineResult<RowSet> {
    // Avoid unused warnings when the feature is off.
    let _ = skip_rows;

    #[cfg(feature = "excel")]
    {
        excel::read_excel_rowset(path, skip_rows)
    }

    #[cfg(not(feature = "excel"))]
    {
        Err(PipelineError::UnsupportedFormat {
            path: path.to_path_buf(),
        })
    }
}
