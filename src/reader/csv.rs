//! CSV reading implementation.

use std::path::Path;

use crate::error::PipelineResult;
use crate::types::{DataType, Field, RowSet, Schema, Value};

/// Read a CSV file into an in-memory [`RowSet`].
///
/// Rules:
///
/// - the first `skip_rows` records are discarded before anything else
/// - the next record is the header row; its labels become the schema,
///   verbatim and typed [`DataType::Utf8`]
/// - every data cell is read as text; empty cells become [`Value::Null`]
/// - ragged rows are padded with nulls / truncated to the header width
pub fn read_csv_rowset(path: impl AsRef<Path>, skip_rows: usize) -> PipelineResult<RowSet> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    read_csv_rowset_from_reader(&mut rdr, skip_rows)
}

/// Read CSV data from an existing CSV reader.
///
/// The reader must be configured with `has_headers(false)`; header handling
/// (including the leading skip) happens here.
pub fn read_csv_rowset_from_reader<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
    skip_rows: usize,
) -> PipelineResult<RowSet> {
    let mut records = rdr.records();

    for _ in 0..skip_rows {
        match records.next() {
            Some(result) => {
                result?;
            }
            None => return Ok(RowSet::new(Schema::new(Vec::new()), Vec::new())),
        }
    }

    let header = match records.next() {
        Some(result) => result?,
        None => return Ok(RowSet::new(Schema::new(Vec::new()), Vec::new())),
    };

    let fields: Vec<Field> = header
        .iter()
        .map(|label| Field::new(label.trim(), DataType::Utf8))
        .collect();
    let width = fields.len();

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for result in records {
        let record = result?;
        let mut row: Vec<Value> = Vec::with_capacity(width);
        for idx in 0..width {
            row.push(parse_cell(record.get(idx).unwrap_or("")));
        }
        rows.push(row);
    }

    Ok(RowSet::new(Schema::new(fields), rows))
}

fn parse_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Value::Null
    } else {
        Value::Utf8(trimmed.to_owned())
    }
}
