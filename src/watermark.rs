//! Watermark reads and schema-normalizing appends.
//!
//! [`WatermarkStore`] is the pipeline's view of a destination table: "what is
//! the maximum ingested call date" and "append this batch, evolving the
//! schema additively". It owns the fixed destination schema and the STRING
//! coercion rule; the actual storage sits behind the
//! [`crate::warehouse::Warehouse`] trait.

use chrono::NaiveDateTime;

use crate::error::{PipelineError, PipelineResult, WarehouseError};
use crate::normalize::normalize_column;
use crate::route::TableId;
use crate::types::{DataType, RowSet, Value};
use crate::warehouse::{
    LoadJob, PartitionGranularity, TimePartitioning, Warehouse, WriteDisposition,
};

/// The partition column every destination table is organized by.
pub const PARTITION_COLUMN: &str = "call_date";

/// Sentinel watermark used when a table is missing, empty, or unqueryable:
/// every row compares as new against it.
pub const EPOCH_START: NaiveDateTime = NaiveDateTime::UNIX_EPOCH;

/// Fixed schema every destination table starts with. Any other observed
/// column is registered as STRING the first time it is seen.
const FIXED_SCHEMA: &[(&str, DataType)] = &[
    ("date_uploaded", DataType::Date),
    ("call_date", DataType::Timestamp),
    ("lead_creation", DataType::Timestamp),
    ("call_duration", DataType::Int64),
];

/// Result of a watermark lookup.
///
/// A lookup never fails: transient query errors degrade to [`EPOCH_START`]
/// with the cause recorded, so a broken lookup cannot block ingestion (at
/// the documented risk of re-ingesting rows on that run).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    /// Maximum ingested partition value, or [`EPOCH_START`].
    pub value: NaiveDateTime,
    /// Why the lookup degraded to the sentinel, if it did.
    pub degraded: Option<String>,
}

impl Watermark {
    fn sentinel() -> Self {
        Self {
            value: EPOCH_START,
            degraded: None,
        }
    }
}

/// Watermark queries and schema-normalizing appends against one warehouse.
pub struct WatermarkStore<'a> {
    warehouse: &'a dyn Warehouse,
}

impl<'a> WatermarkStore<'a> {
    /// Create a store over a warehouse connection.
    pub fn new(warehouse: &'a dyn Warehouse) -> Self {
        Self { warehouse }
    }

    /// Maximum ingested value of the partition column for `table`.
    ///
    /// Queries the destination fresh on every call; the pipeline relies on
    /// this (never cache across files). Missing table and empty table both
    /// yield the plain sentinel; a failed query yields the sentinel with
    /// [`Watermark::degraded`] set.
    pub fn max_partition_value(&self, table: &TableId) -> Watermark {
        match self.warehouse.query_max_partition(table, PARTITION_COLUMN) {
            Ok(Some(value)) => Watermark {
                value,
                degraded: None,
            },
            Ok(None) | Err(WarehouseError::TableNotFound) => Watermark::sentinel(),
            Err(err) => Watermark {
                value: EPOCH_START,
                degraded: Some(err.to_string()),
            },
        }
    }

    /// Append `batch` to `table`, returning the number of rows appended.
    ///
    /// Column labels are normalized; columns in the fixed schema keep their
    /// declared types (with `call_duration` parsed from text where needed);
    /// every other column is coerced to text and registered as STRING. The
    /// load is append-only, day-partitioned on `call_date`, and blocks until
    /// the destination confirms the write.
    pub fn append(&self, table: &TableId, mut batch: RowSet) -> PipelineResult<usize> {
        for idx in 0..batch.schema.fields.len() {
            let normalized = normalize_column(&batch.schema.fields[idx].name);
            batch.schema.fields[idx].name = normalized;

            match fixed_type_of(&batch.schema.fields[idx].name) {
                Some(DataType::Int64) => {
                    batch.schema.fields[idx].data_type = DataType::Int64;
                    batch.map_column(idx, coerce_int64);
                }
                Some(declared) => {
                    batch.schema.fields[idx].data_type = declared;
                }
                None => {
                    batch.coerce_column_to_utf8(idx);
                }
            }
        }

        let job = LoadJob {
            schema: batch.schema.clone(),
            write: WriteDisposition::Append,
            partitioning: TimePartitioning {
                column: PARTITION_COLUMN.to_string(),
                granularity: PartitionGranularity::Day,
            },
        };

        match self.warehouse.load(table, &batch, &job) {
            Ok(()) => Ok(batch.row_count()),
            Err(WarehouseError::SchemaConflict(message)) => Err(PipelineError::SchemaConflict {
                table: table.to_string(),
                message,
            }),
            Err(err) => Err(PipelineError::AppendFailed {
                table: table.to_string(),
                message: err.to_string(),
            }),
        }
    }
}

fn fixed_type_of(column: &str) -> Option<DataType> {
    FIXED_SCHEMA
        .iter()
        .find(|(name, _)| *name == column)
        .map(|(_, dt)| *dt)
}

// The original relied on dataframe dtype inference for call_duration; here
// text cells are parsed, and unparseable ones load as nulls rather than
// failing the batch.
fn coerce_int64(cell: &Value) -> Value {
    match cell {
        Value::Int64(v) => Value::Int64(*v),
        Value::Utf8(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int64)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}
