//! `sheetfeed` incrementally ingests tabular export files (CSV/Excel)
//! dropped into a shared folder, deduplicates against previously-ingested
//! rows using a per-table watermark timestamp, normalizes their schema, and
//! appends them to one of two day-partitioned destination tables. Processed
//! files are archived into a `YEAR/MONTH/` directory tree.
//!
//! The primary entrypoint is [`pipeline::IngestionPipeline`], driven by a
//! [`config::PipelineConfig`] and a [`warehouse::Warehouse`] connection:
//!
//! ```no_run
//! use sheetfeed::config::PipelineConfig;
//! use sheetfeed::pipeline::{IngestionPipeline, PipelineOptions};
//! use sheetfeed::warehouse::MemoryWarehouse;
//!
//! # fn main() -> Result<(), sheetfeed::PipelineError> {
//! let config = PipelineConfig::from_json_path("pipeline.json")?;
//! let warehouse = MemoryWarehouse::new();
//!
//! let pipeline = IngestionPipeline::new(&config, &warehouse, PipelineOptions::default());
//! let summary = pipeline.run()?;
//! println!(
//!     "ingested {} of {} files ({} rows)",
//!     summary.files_ingested, summary.files_seen, summary.rows_appended
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## How a run works
//!
//! For each candidate file, in order: read (skipping the configured leading
//! rows) → tag every row with `filename` and `date_uploaded` → parse known
//! date columns → route by filename prefix (`MA_` → secondary table,
//! everything else → primary) → fetch the destination's watermark → keep
//! only rows whose call date is strictly newer → append with additive-only
//! schema evolution (unknown columns become STRING). Files that appended
//! successfully are moved into `archive_root/<year>/<month>/` in a second
//! sweep after all appends complete.
//!
//! Per-file failures are isolated and logged through an
//! [`observe::PipelineObserver`]; a failed file stays in the source folder
//! so the next run retries it. A failed watermark lookup never blocks
//! ingestion: it degrades to the epoch-start sentinel and is surfaced in the
//! [`pipeline::RunSummary`].
//!
//! ## Modules
//!
//! - [`pipeline`]: the per-run orchestrator and run summary
//! - [`reader`]: CSV/Excel file reading into a [`types::RowSet`]
//! - [`watermark`]: watermark lookup and schema-normalizing appends
//! - [`warehouse`]: the destination-store trait and in-memory implementation
//! - [`route`]: filename-prefix routing to a destination table
//! - [`normalize`]: column-label normalization
//! - [`archive`]: year/month archiving of processed files
//! - [`config`]: per-run configuration
//! - [`observe`]: observer-based logging/alerting
//! - [`types`]: schema + in-memory batch types
//! - [`error`]: error types used across the pipeline

pub mod archive;
pub mod config;
pub mod error;
pub mod normalize;
pub mod observe;
pub mod pipeline;
pub mod reader;
pub mod route;
pub mod types;
pub mod warehouse;
pub mod watermark;

pub use error::{PipelineError, PipelineResult, WarehouseError};
