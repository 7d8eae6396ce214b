//! The destination-store seam.
//!
//! The remote warehouse is an external collaborator: an opaque, append-only,
//! schema-validating store reachable through two operations. The pipeline
//! talks to it exclusively through the [`Warehouse`] trait so tests (and the
//! end-to-end scenario) run against the in-process [`MemoryWarehouse`].

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::NaiveDateTime;

use crate::error::WarehouseError;
use crate::route::TableId;
use crate::types::{DataType, RowSet, Schema, Value};

/// How a load writes into the destination table.
///
/// The pipeline only ever appends; the variant exists so a load job reads
/// like the wire configuration it mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDisposition {
    /// Append rows; never truncate or overwrite.
    Append,
}

/// Partitioning granularity of the destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionGranularity {
    /// One partition per calendar day.
    Day,
}

/// Time-partitioning configuration for a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimePartitioning {
    /// The column the table is physically organized by.
    pub column: String,
    /// Partition granularity.
    pub granularity: PartitionGranularity,
}

/// Configuration for one load into a destination table.
#[derive(Debug, Clone)]
pub struct LoadJob {
    /// Explicit schema the destination validates the batch against.
    pub schema: Schema,
    /// Write semantics; always [`WriteDisposition::Append`] here.
    pub write: WriteDisposition,
    /// Day partitioning on the partition column.
    pub partitioning: TimePartitioning,
}

/// Query/load interface onto the destination warehouse.
pub trait Warehouse: Send + Sync {
    /// Maximum value of `column` currently stored in `table`.
    ///
    /// `Ok(None)` when the table exists but holds no rows;
    /// `Err(TableNotFound)` when it does not exist;
    /// `Err(Unavailable)` for transient query/connectivity failures.
    fn query_max_partition(
        &self,
        table: &TableId,
        column: &str,
    ) -> Result<Option<NaiveDateTime>, WarehouseError>;

    /// Append `batch` to `table`, evolving the table's schema additively.
    ///
    /// Blocks until the destination confirms durability. A column whose type
    /// conflicts with the type already registered under the same name fails
    /// the whole load with [`WarehouseError::SchemaConflict`]; nothing is
    /// written in that case.
    fn load(&self, table: &TableId, batch: &RowSet, job: &LoadJob) -> Result<(), WarehouseError>;
}

#[derive(Debug, Default)]
struct TableState {
    /// Registered column types; additive-only.
    columns: HashMap<String, DataType>,
    /// Stored rows, each keyed by column name.
    rows: Vec<BTreeMap<String, Value>>,
}

/// In-process [`Warehouse`] implementation.
///
/// Tables are created on first load. Schema registration is additive-only:
/// new columns are accepted, re-typing an existing column is rejected with
/// [`WarehouseError::SchemaConflict`] and nothing is written. A fault toggle
/// lets tests exercise the degraded-watermark path.
#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    tables: Mutex<HashMap<String, TableState>>,
    queries_unavailable: AtomicBool,
}

impl MemoryWarehouse {
    /// Create an empty warehouse.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `query_max_partition` fail with
    /// [`WarehouseError::Unavailable`]. Loads are unaffected.
    pub fn set_queries_unavailable(&self, unavailable: bool) {
        self.queries_unavailable
            .store(unavailable, Ordering::SeqCst);
    }

    /// Number of rows stored for `table` (0 if the table does not exist).
    pub fn row_count(&self, table: &TableId) -> usize {
        let tables = self.tables.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        tables.get(&table.to_string()).map_or(0, |t| t.rows.len())
    }

    /// The registered type for a column of `table`, if the table and the
    /// column exist.
    pub fn column_type(&self, table: &TableId, column: &str) -> Option<DataType> {
        let tables = self.tables.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        tables
            .get(&table.to_string())
            .and_then(|t| t.columns.get(column).copied())
    }

    /// Snapshot of one stored column's values, in insertion order.
    ///
    /// Rows without the column yield [`Value::Null`].
    pub fn column_values(&self, table: &TableId, column: &str) -> Vec<Value> {
        let tables = self.tables.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        tables.get(&table.to_string()).map_or(Vec::new(), |t| {
            t.rows
                .iter()
                .map(|row| row.get(column).cloned().unwrap_or(Value::Null))
                .collect()
        })
    }
}

impl Warehouse for MemoryWarehouse {
    fn query_max_partition(
        &self,
        table: &TableId,
        column: &str,
    ) -> Result<Option<NaiveDateTime>, WarehouseError> {
        if self.queries_unavailable.load(Ordering::SeqCst) {
            return Err(WarehouseError::Unavailable(
                "query endpoint offline".to_string(),
            ));
        }

        let tables = self.tables.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let state = tables
            .get(&table.to_string())
            .ok_or(WarehouseError::TableNotFound)?;

        let max = state
            .rows
            .iter()
            .filter_map(|row| row.get(column).and_then(Value::as_timestamp))
            .max();
        Ok(max)
    }

    fn load(&self, table: &TableId, batch: &RowSet, job: &LoadJob) -> Result<(), WarehouseError> {
        let WriteDisposition::Append = job.write;

        if job.schema.fields.len() != batch.schema.fields.len() {
            return Err(WarehouseError::Rejected(format!(
                "load schema has {} fields but batch has {}",
                job.schema.fields.len(),
                batch.schema.fields.len()
            )));
        }

        let mut tables = self.tables.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let state = tables.entry(table.to_string()).or_default();

        // Validate the whole schema before writing anything.
        for field in &job.schema.fields {
            if let Some(registered) = state.columns.get(&field.name) {
                if *registered != field.data_type {
                    return Err(WarehouseError::SchemaConflict(format!(
                        "column '{}' is {:?} but load declares {:?}",
                        field.name, registered, field.data_type
                    )));
                }
            }
        }
        for field in &job.schema.fields {
            state
                .columns
                .entry(field.name.clone())
                .or_insert(field.data_type);
        }

        for row in &batch.rows {
            let mut stored = BTreeMap::new();
            for (field, cell) in job.schema.fields.iter().zip(row.iter()) {
                stored.insert(field.name.clone(), cell.clone());
            }
            state.rows.push(stored);
        }

        Ok(())
    }
}
