//! The per-run ingestion pipeline.
//!
//! One [`IngestionPipeline`] execution runs two top-level phases:
//!
//! 1. **Ingest**: enumerate candidate files in the source folder and, for
//!    each in turn: read, tag with provenance, parse date columns, route by
//!    filename prefix, fetch the destination's watermark, filter
//!    already-seen rows, append. Strictly sequential; the watermark is
//!    re-read for every file so two files hitting the same table within one
//!    run see each other's committed rows.
//! 2. **Archive**: move every successfully-appended file into the
//!    `YEAR/MONTH/` archive tree for the run date.
//!
//! Per-file failures are isolated: a file that cannot be read or appended is
//! logged, left in the source folder (a retry run reprocesses it), and the
//! run continues. Only a failure to enumerate the source folder is
//! run-fatal.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use crate::archive::archive_file;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::observe::{FileContext, FileStats, PipelineObserver, Severity};
use crate::reader::{read_rowset, SourceFormat};
use crate::route::{route, TableId};
use crate::types::{DataType, Field, RowSet, Value};
use crate::warehouse::Warehouse;
use crate::watermark::WatermarkStore;

/// Columns holding date values, recognized by exact source-file name.
pub const DATE_COLUMNS: &[&str] = &["Call Date", "Lead Creation"];

/// The source column the watermark filter compares, before normalization.
const CALL_DATE_COLUMN: &str = "Call Date";

/// Options controlling pipeline observability.
///
/// Use [`Default`] for an unobserved run.
#[derive(Clone)]
pub struct PipelineOptions {
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn PipelineObserver>>,
    /// Severity threshold at which `on_alert` is invoked for file failures.
    pub alert_at_or_above: Severity,
}

impl fmt::Debug for PipelineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineOptions")
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            observer: None,
            alert_at_or_above: Severity::Critical,
        }
    }
}

/// Aggregate outcome of one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Candidate files found in the source folder.
    pub files_seen: usize,
    /// Files whose rows were appended.
    pub files_ingested: usize,
    /// Files skipped because of a per-file failure.
    pub files_skipped: usize,
    /// Rows appended across all files.
    pub rows_appended: usize,
    /// Rows excluded by the watermark filter across all files.
    pub rows_filtered: usize,
    /// Watermark lookups that degraded to the epoch sentinel.
    pub degraded_watermarks: usize,
    /// Files moved into the archive tree.
    pub files_archived: usize,
    /// Archive moves that failed (files stay in the source folder).
    pub archive_failures: usize,
}

/// Orchestrates one run over a source folder and a warehouse connection.
pub struct IngestionPipeline<'a> {
    config: &'a PipelineConfig,
    warehouse: &'a dyn Warehouse,
    options: PipelineOptions,
}

impl<'a> IngestionPipeline<'a> {
    /// Create a pipeline over a config and warehouse connection.
    pub fn new(
        config: &'a PipelineConfig,
        warehouse: &'a dyn Warehouse,
        options: PipelineOptions,
    ) -> Self {
        Self {
            config,
            warehouse,
            options,
        }
    }

    /// Execute the run: ingest phase, then archive phase.
    ///
    /// The run date is fixed once here and shared by every file, even if the
    /// run spans a day boundary.
    pub fn run(&self) -> PipelineResult<RunSummary> {
        let run_date = self.config.run_date();
        let store = WatermarkStore::new(self.warehouse);
        let mut summary = RunSummary::default();
        let mut archive_queue: Vec<PathBuf> = Vec::new();

        for path in self.enumerate_candidates()? {
            summary.files_seen += 1;

            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let table = self.config.table_for(route(&filename));
            let ctx = FileContext {
                path: path.clone(),
                table: Some(table.clone()),
            };

            match self.process_file(&store, &ctx, &table, &filename, run_date, &mut summary) {
                Ok(stats) => {
                    summary.files_ingested += 1;
                    summary.rows_appended += stats.rows_appended;
                    summary.rows_filtered += stats.rows_filtered;
                    if let Some(obs) = self.options.observer.as_ref() {
                        obs.on_file_success(&ctx, stats);
                    }
                    archive_queue.push(path);
                }
                Err(err) => {
                    summary.files_skipped += 1;
                    if let Some(obs) = self.options.observer.as_ref() {
                        let sev = severity_for_error(&err);
                        obs.on_file_failure(&ctx, sev, &err);
                        if sev >= self.options.alert_at_or_above {
                            obs.on_alert(&ctx, sev, &err);
                        }
                    }
                }
            }
        }

        // Second sweep: archiving runs only after every append completed.
        for path in archive_queue {
            match archive_file(&self.config.archive_root, &path, run_date) {
                Ok(dest) => {
                    summary.files_archived += 1;
                    if let Some(obs) = self.options.observer.as_ref() {
                        obs.on_file_archived(&path, &dest);
                    }
                }
                Err(err) => {
                    summary.archive_failures += 1;
                    if let Some(obs) = self.options.observer.as_ref() {
                        obs.on_archive_failure(&path, &err);
                    }
                }
            }
        }

        Ok(summary)
    }

    /// List candidate files in the source folder.
    ///
    /// Only entries with a recognized extension qualify; everything else is
    /// silently skipped. Sorted by name so runs are deterministic. A failure
    /// to read the folder itself is run-fatal.
    fn enumerate_candidates(&self) -> PipelineResult<Vec<PathBuf>> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(&self.config.source_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() && SourceFormat::from_path(&path).is_some() {
                candidates.push(path);
            }
        }
        candidates.sort();
        Ok(candidates)
    }

    fn process_file(
        &self,
        store: &WatermarkStore<'_>,
        ctx: &FileContext,
        table: &TableId,
        filename: &str,
        run_date: NaiveDate,
        summary: &mut RunSummary,
    ) -> PipelineResult<FileStats> {
        let mut batch = read_rowset(&ctx.path, self.config.skip_rows)?;
        let rows_read = batch.row_count();

        // Provenance tagging; both labels normalize to the destination names.
        batch.add_column(
            Field::new("filename", DataType::Utf8),
            Value::Utf8(filename.to_string()),
        );
        batch.add_column(
            Field::new("date_uploaded", DataType::Date),
            Value::Date(run_date),
        );

        for column in DATE_COLUMNS {
            if let Some(idx) = batch.schema.index_of(column) {
                if let Err(reason) = parse_date_column(&mut batch, idx) {
                    if let Some(obs) = self.options.observer.as_ref() {
                        obs.on_date_parse_skipped(ctx, column, &reason);
                    }
                }
            }
        }

        let call_idx =
            batch
                .schema
                .index_of(CALL_DATE_COLUMN)
                .ok_or_else(|| PipelineError::MissingColumn {
                    column: CALL_DATE_COLUMN.to_string(),
                    path: ctx.path.clone(),
                })?;

        // Fresh watermark per file, never cached across files.
        let watermark = store.max_partition_value(table);
        if let Some(reason) = watermark.degraded.as_deref() {
            summary.degraded_watermarks += 1;
            if let Some(obs) = self.options.observer.as_ref() {
                obs.on_watermark_degraded(table, reason);
            }
        }

        // Strict greater-than: rows at the watermark are already ingested.
        // Null/unparsed call dates compare as not-greater and are dropped.
        let filtered = batch.filter_rows(|row| {
            row.get(call_idx)
                .and_then(Value::as_timestamp)
                .is_some_and(|ts| ts > watermark.value)
        });
        let rows_filtered = rows_read - filtered.row_count();

        let rows_appended = store.append(table, filtered)?;

        Ok(FileStats {
            rows_read,
            rows_filtered,
            rows_appended,
        })
    }
}

/// Parse a textual date column into timestamps, column-atomically.
///
/// Either every non-null cell parses (or already is a timestamp) and the
/// column is rewritten, or the column is left untouched and the first
/// offending cell is reported. No row is ever dropped here.
fn parse_date_column(batch: &mut RowSet, idx: usize) -> Result<(), String> {
    let mut parsed: Vec<Value> = Vec::with_capacity(batch.row_count());
    for (row_no, row) in batch.rows.iter().enumerate() {
        let cell = row.get(idx).unwrap_or(&Value::Null);
        match cell {
            Value::Null => parsed.push(Value::Null),
            Value::Timestamp(ts) => parsed.push(Value::Timestamp(*ts)),
            Value::Date(d) => parsed.push(Value::Timestamp(midnight(*d))),
            Value::Utf8(s) => match parse_timestamp(s) {
                Some(ts) => parsed.push(Value::Timestamp(ts)),
                None => return Err(format!("row {}: unparseable date '{s}'", row_no + 1)),
            },
            other => return Err(format!("row {}: non-date cell {other:?}", row_no + 1)),
        }
    }

    for (row, value) in batch.rows.iter_mut().zip(parsed) {
        if let Some(cell) = row.get_mut(idx) {
            *cell = value;
        }
    }
    if let Some(field) = batch.schema.fields.get_mut(idx) {
        field.data_type = DataType::Timestamp;
    }
    Ok(())
}

/// Parse a timestamp from the formats the export files are known to use.
/// Date-only forms resolve to midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%m/%d/%Y %H:%M:%S", "%m/%d/%Y %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(ts);
        }
    }
    for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(midnight(d));
        }
    }
    None
}

fn midnight(d: NaiveDate) -> NaiveDateTime {
    d.and_time(chrono::NaiveTime::MIN)
}

fn severity_for_error(e: &PipelineError) -> Severity {
    match e {
        PipelineError::Io(_) => Severity::Critical,
        PipelineError::Csv(err) => match err.kind() {
            ::csv::ErrorKind::Io(_) => Severity::Critical,
            _ => Severity::Error,
        },
        #[cfg(feature = "excel")]
        PipelineError::Excel(_) => Severity::Error,
        PipelineError::Config(_) => Severity::Critical,
        PipelineError::UnsupportedFormat { .. } => Severity::Error,
        PipelineError::MissingColumn { .. } => Severity::Error,
        PipelineError::SchemaConflict { .. } => Severity::Error,
        PipelineError::AppendFailed { .. } => Severity::Error,
        PipelineError::MoveFailed { .. } => Severity::Warning,
    }
}
