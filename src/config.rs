//! Per-run pipeline configuration.
//!
//! One [`PipelineConfig`] is constructed (or loaded from JSON) once per run
//! and passed by reference to every component; there is no ambient/static
//! configuration state.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, NaiveDate, Utc};
use serde::Deserialize;

use crate::error::PipelineResult;
use crate::route::{Destination, TableId};

/// Configuration for one pipeline run.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Warehouse project id.
    pub project_id: String,
    /// Dataset holding both destination tables.
    pub dataset_id: String,
    /// Table name for [`Destination::Primary`] files.
    pub primary_table: String,
    /// Table name for [`Destination::Secondary`] files.
    pub secondary_table: String,
    /// Folder watched for dropped export files.
    pub source_dir: PathBuf,
    /// Root of the `YEAR/MONTH/` archive tree.
    pub archive_root: PathBuf,
    /// Number of leading rows to skip in every source file.
    #[serde(default)]
    pub skip_rows: usize,
    /// Logical date for this run; fixed once, shared by every file even if
    /// the run crosses a day boundary. Defaults to "today" in
    /// [`Self::utc_offset_hours`].
    #[serde(default)]
    pub run_date: Option<NaiveDate>,
    /// Fixed UTC offset, in hours, used to default [`Self::run_date`].
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    /// Optional credentials file handed to the warehouse connector.
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,
}

// The original deployment pinned US/Eastern.
fn default_utc_offset_hours() -> i32 {
    -5
}

impl PipelineConfig {
    /// Load configuration from a JSON file.
    pub fn from_json_path(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// The concrete table id for a routed destination.
    pub fn table_for(&self, destination: Destination) -> TableId {
        let table = match destination {
            Destination::Primary => &self.primary_table,
            Destination::Secondary => &self.secondary_table,
        };
        TableId::new(&self.project_id, &self.dataset_id, table)
    }

    /// The run date: explicit if configured, otherwise today's date in the
    /// configured fixed offset.
    pub fn run_date(&self) -> NaiveDate {
        match self.run_date {
            Some(d) => d,
            None => match FixedOffset::east_opt(self.utc_offset_hours * 3600) {
                Some(offset) => Utc::now().with_timezone(&offset).date_naive(),
                // Out-of-range offset falls back to UTC.
                None => Utc::now().date_naive(),
            },
        }
    }
}
