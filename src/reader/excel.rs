#![cfg(feature = "excel")]

//! Excel reading implementation.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::error::PipelineResult;
use crate::types::{DataType, Field, RowSet, Schema, Value};

/// Read the first sheet of a workbook (`.xlsx`, `.xls`) into a [`RowSet`].
///
/// Behavior:
/// - discards the first `skip_rows` rows of the sheet
/// - the next non-empty row is the header row; its cells become the schema
/// - remaining rows are converted cell-by-cell into typed [`Value`]s
///   (integers stay integers, datetime cells become timestamps, everything
///   else is text)
pub fn read_excel_rowset(path: impl AsRef<Path>, skip_rows: usize) -> PipelineResult<RowSet> {
    let path = path.as_ref();
    let mut workbook = open_workbook_auto(path)?;

    // A workbook without sheets reads as an empty batch; the pipeline will
    // skip the file when it finds no call-date column.
    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        return Ok(RowSet::new(Schema::new(Vec::new()), Vec::new()));
    };
    let range = workbook.worksheet_range(&sheet)?;

    read_sheet_range(&range, skip_rows)
}

fn read_sheet_range(range: &calamine::Range<Data>, skip_rows: usize) -> PipelineResult<RowSet> {
    let mut remaining = range.rows().skip(skip_rows);

    // First non-empty row after the skip is the header.
    let header = remaining.find(|row| row.iter().any(|c| !matches!(c, Data::Empty)));
    let Some(header) = header else {
        return Ok(RowSet::new(Schema::new(Vec::new()), Vec::new()));
    };

    let fields: Vec<Field> = header
        .iter()
        .map(|cell| Field::new(cell_to_header_string(cell).trim(), DataType::Utf8))
        .collect();
    let width = fields.len();

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for row in remaining {
        let mut out_row: Vec<Value> = Vec::with_capacity(width);
        for idx in 0..width {
            out_row.push(convert_cell(row.get(idx).unwrap_or(&Data::Empty)));
        }
        rows.push(out_row);
    }

    Ok(RowSet::new(Schema::new(fields), rows))
}

fn cell_to_header_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{e:?}"),
        Data::Empty => "".to_string(),
    }
}

fn convert_cell(c: &Data) -> Value {
    match c {
        Data::Empty => Value::Null,
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Value::Null
            } else {
                Value::Utf8(trimmed.to_owned())
            }
        }
        Data::Int(i) => Value::Int64(*i),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                Value::Int64(*f as i64)
            } else {
                Value::Utf8(f.to_string())
            }
        }
        Data::Bool(b) => Value::Utf8(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ts) => Value::Timestamp(ts),
            None => Value::Utf8(dt.as_f64().to_string()),
        },
        Data::DateTimeIso(s) => Value::Utf8(s.clone()),
        Data::DurationIso(s) => Value::Utf8(s.clone()),
        Data::Error(_) => Value::Null,
    }
}
