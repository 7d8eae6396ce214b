//! Filename-prefix routing to a destination table.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Filename prefix that routes a file to the secondary table.
pub const SECONDARY_PREFIX: &str = "MA_";

/// Fully-qualified destination table identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableId {
    /// Warehouse project id.
    pub project: String,
    /// Dataset id within the project.
    pub dataset: String,
    /// Table name within the dataset.
    pub table: String,
}

impl TableId {
    /// Create a table id.
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// Which of the two configured destination tables a file routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// The default table for every file without a recognized prefix.
    Primary,
    /// The table for files carrying the [`SECONDARY_PREFIX`].
    Secondary,
}

/// Route a filename to a destination by prefix convention.
///
/// Case-insensitive: `MA_report.csv` and `ma_report.csv` both route to
/// [`Destination::Secondary`]; everything else (including no recognized
/// prefix at all) routes to [`Destination::Primary`]. Pure, total.
pub fn route(filename: &str) -> Destination {
    let prefix_len = SECONDARY_PREFIX.len();
    let head = filename.get(..prefix_len).unwrap_or("");
    if head.eq_ignore_ascii_case(SECONDARY_PREFIX) {
        Destination::Secondary
    } else {
        Destination::Primary
    }
}
