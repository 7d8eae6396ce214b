//! Run observability.
//!
//! The pipeline reports per-file outcomes, degraded watermark lookups, and
//! archive results through the [`PipelineObserver`] trait. Implementors can
//! record logs or metrics or trigger alerts; [`StdErrObserver`] and
//! [`FileObserver`] cover the common cases.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::PipelineError;
use crate::route::TableId;

/// Severity classification used for observer callbacks and alert thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal, e.g. a degraded watermark).
    Warning,
    /// Error-level event (one file failed).
    Error,
    /// Critical error (typically I/O or other infrastructure failures).
    Critical,
}

/// Context about one file's trip through the pipeline.
#[derive(Debug, Clone)]
pub struct FileContext {
    /// Source path of the file.
    pub path: PathBuf,
    /// Destination table the file routed to, when known.
    pub table: Option<TableId>,
}

/// Stats reported when a file is ingested successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStats {
    /// Rows read from the file.
    pub rows_read: usize,
    /// Rows excluded by the watermark filter.
    pub rows_filtered: usize,
    /// Rows appended to the destination.
    pub rows_appended: usize,
}

/// Observer interface for pipeline outcomes.
pub trait PipelineObserver: Send + Sync {
    /// Called when a file's rows are appended.
    fn on_file_success(&self, _ctx: &FileContext, _stats: FileStats) {}

    /// Called when a file is skipped (read, routing, or append failure).
    fn on_file_failure(&self, _ctx: &FileContext, _severity: Severity, _error: &PipelineError) {}

    /// Called when a file failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_file_failure`].
    fn on_alert(&self, ctx: &FileContext, severity: Severity, error: &PipelineError) {
        self.on_file_failure(ctx, severity, error)
    }

    /// Called when a watermark lookup degraded to the epoch sentinel.
    fn on_watermark_degraded(&self, _table: &TableId, _reason: &str) {}

    /// Called when a date column could not be parsed and was left as-is.
    fn on_date_parse_skipped(&self, _ctx: &FileContext, _column: &str, _reason: &str) {}

    /// Called when a processed file is archived.
    fn on_file_archived(&self, _from: &Path, _to: &Path) {}

    /// Called when the archive move fails; the run continues.
    fn on_archive_failure(&self, _path: &Path, _error: &PipelineError) {}
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn PipelineObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn PipelineObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl PipelineObserver for CompositeObserver {
    fn on_file_success(&self, ctx: &FileContext, stats: FileStats) {
        for o in &self.observers {
            o.on_file_success(ctx, stats);
        }
    }

    fn on_file_failure(&self, ctx: &FileContext, severity: Severity, error: &PipelineError) {
        for o in &self.observers {
            o.on_file_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &FileContext, severity: Severity, error: &PipelineError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }

    fn on_watermark_degraded(&self, table: &TableId, reason: &str) {
        for o in &self.observers {
            o.on_watermark_degraded(table, reason);
        }
    }

    fn on_date_parse_skipped(&self, ctx: &FileContext, column: &str, reason: &str) {
        for o in &self.observers {
            o.on_date_parse_skipped(ctx, column, reason);
        }
    }

    fn on_file_archived(&self, from: &Path, to: &Path) {
        for o in &self.observers {
            o.on_file_archived(from, to);
        }
    }

    fn on_archive_failure(&self, path: &Path, error: &PipelineError) {
        for o in &self.observers {
            o.on_archive_failure(path, error);
        }
    }
}

/// Logs pipeline events to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

fn table_label(ctx: &FileContext) -> String {
    ctx.table
        .as_ref()
        .map_or_else(|| "-".to_string(), |t| t.to_string())
}

impl PipelineObserver for StdErrObserver {
    fn on_file_success(&self, ctx: &FileContext, stats: FileStats) {
        eprintln!(
            "[pipeline][ok] path={} table={} read={} filtered={} appended={}",
            ctx.path.display(),
            table_label(ctx),
            stats.rows_read,
            stats.rows_filtered,
            stats.rows_appended
        );
    }

    fn on_file_failure(&self, ctx: &FileContext, severity: Severity, error: &PipelineError) {
        eprintln!(
            "[pipeline][{severity:?}] path={} table={} err={error}",
            ctx.path.display(),
            table_label(ctx)
        );
    }

    fn on_alert(&self, ctx: &FileContext, severity: Severity, error: &PipelineError) {
        eprintln!(
            "[ALERT][pipeline][{severity:?}] path={} table={} err={error}",
            ctx.path.display(),
            table_label(ctx)
        );
    }

    fn on_watermark_degraded(&self, table: &TableId, reason: &str) {
        eprintln!("[pipeline][degraded-watermark] table={table} reason={reason}");
    }

    fn on_date_parse_skipped(&self, ctx: &FileContext, column: &str, reason: &str) {
        eprintln!(
            "[pipeline][date-parse-skipped] path={} column={column} reason={reason}",
            ctx.path.display()
        );
    }

    fn on_file_archived(&self, from: &Path, to: &Path) {
        eprintln!(
            "[pipeline][archived] from={} to={}",
            from.display(),
            to.display()
        );
    }

    fn on_archive_failure(&self, path: &Path, error: &PipelineError) {
        eprintln!(
            "[pipeline][archive-failed] path={} err={error}",
            path.display()
        );
    }
}

/// Appends pipeline events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl PipelineObserver for FileObserver {
    fn on_file_success(&self, ctx: &FileContext, stats: FileStats) {
        self.append_line(&format!(
            "{} ok path={} table={} read={} filtered={} appended={}",
            unix_ts(),
            ctx.path.display(),
            table_label(ctx),
            stats.rows_read,
            stats.rows_filtered,
            stats.rows_appended
        ));
    }

    fn on_file_failure(&self, ctx: &FileContext, severity: Severity, error: &PipelineError) {
        self.append_line(&format!(
            "{} fail severity={severity:?} path={} table={} err={error}",
            unix_ts(),
            ctx.path.display(),
            table_label(ctx)
        ));
    }

    fn on_alert(&self, ctx: &FileContext, severity: Severity, error: &PipelineError) {
        self.append_line(&format!(
            "{} ALERT severity={severity:?} path={} table={} err={error}",
            unix_ts(),
            ctx.path.display(),
            table_label(ctx)
        ));
    }

    fn on_watermark_degraded(&self, table: &TableId, reason: &str) {
        self.append_line(&format!(
            "{} degraded-watermark table={table} reason={reason}",
            unix_ts()
        ));
    }

    fn on_file_archived(&self, from: &Path, to: &Path) {
        self.append_line(&format!(
            "{} archived from={} to={}",
            unix_ts(),
            from.display(),
            to.display()
        ));
    }

    fn on_archive_failure(&self, path: &Path, error: &PipelineError) {
        self.append_line(&format!(
            "{} archive-failed path={} err={error}",
            unix_ts(),
            path.display()
        ));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
