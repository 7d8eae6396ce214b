//! Core data model types for the ingestion pipeline.
//!
//! Source files arrive with arbitrary, partially-unknown columns, so unlike a
//! schema-first reader the [`Schema`] here is *discovered* from the file's
//! header row and then mutated along the pipeline: provenance columns are
//! appended, date columns are re-typed in place, and everything outside the
//! destination's fixed schema is coerced to text at append time.

use chrono::{NaiveDate, NaiveDateTime};

/// Logical data type for a schema field.
///
/// These are the only types the destination tables use; every column not in a
/// table's fixed schema ends up as [`DataType::Utf8`] (STRING) per the
/// additive-only evolution rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// Calendar date (no time of day).
    Date,
    /// Date and time, second precision.
    Timestamp,
    /// 64-bit signed integer.
    Int64,
    /// UTF-8 string.
    Utf8,
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// An ordered list of fields describing the shape of a [`RowSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Append a field to the end of the schema.
    pub fn push_field(&mut self, field: Field) {
        self.fields.push(field);
    }
}

/// A single typed cell value in a [`RowSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// UTF-8 string.
    Utf8(String),
    /// Calendar date.
    Date(NaiveDate),
    /// Date and time, second precision.
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Render the value as text for STRING coercion.
    ///
    /// `Null` stays `Null`; everything else becomes its display form. This is
    /// what additive schema evolution applies to every column outside the
    /// destination's fixed schema.
    pub fn to_utf8(&self) -> Value {
        match self {
            Value::Null => Value::Null,
            Value::Utf8(s) => Value::Utf8(s.clone()),
            Value::Int64(v) => Value::Utf8(v.to_string()),
            Value::Date(d) => Value::Utf8(d.format("%Y-%m-%d").to_string()),
            Value::Timestamp(ts) => Value::Utf8(ts.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }

    /// The timestamp payload, if this cell holds one.
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

/// In-memory tabular batch read from one source file.
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as the [`Schema`]
/// fields. One `RowSet` lives for exactly one file's trip through the
/// pipeline and is discarded after append.
#[derive(Debug, Clone, PartialEq)]
pub struct RowSet {
    /// Schema describing row shape.
    pub schema: Schema,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    /// Create a row set from schema and rows.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Create a new row set containing only rows that match `predicate`.
    ///
    /// The returned row set preserves the schema.
    pub fn filter_rows<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&[Value]) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .filter(|row| predicate(row.as_slice()))
            .cloned()
            .collect();
        Self {
            schema: self.schema.clone(),
            rows,
        }
    }

    /// Append a column with the same `fill` value in every row.
    ///
    /// Used for provenance tagging (`filename`, `date_uploaded`).
    pub fn add_column(&mut self, field: Field, fill: Value) {
        self.schema.push_field(field);
        for row in &mut self.rows {
            row.push(fill.clone());
        }
    }

    /// Rewrite one column in place, applying `f` to every cell.
    pub fn map_column<F>(&mut self, idx: usize, mut f: F)
    where
        F: FnMut(&Value) -> Value,
    {
        for row in &mut self.rows {
            if let Some(cell) = row.get_mut(idx) {
                *cell = f(cell);
            }
        }
    }

    /// Coerce one column to text and re-type its field as [`DataType::Utf8`].
    pub fn coerce_column_to_utf8(&mut self, idx: usize) {
        if let Some(field) = self.schema.fields.get_mut(idx) {
            field.data_type = DataType::Utf8;
        }
        self.map_column(idx, Value::to_utf8);
    }
}
