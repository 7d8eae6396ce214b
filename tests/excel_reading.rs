#![cfg(feature = "excel_test_writer")]

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::NaiveDate;

use sheetfeed::pipeline::{IngestionPipeline, PipelineOptions};
use sheetfeed::reader::read_rowset;
use sheetfeed::route::TableId;
use sheetfeed::types::Value;
use sheetfeed::warehouse::MemoryWarehouse;

fn tmp_dir(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("sheetfeed-excel-{tag}-{nanos}"));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_report_xlsx(path: &PathBuf, leading_noise_rows: u32) {
    use rust_xlsxwriter::Workbook;

    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.set_name("Sheet1").unwrap();

    for r in 0..leading_noise_rows {
        ws.write_string(r, 0, "export metadata").unwrap();
    }
    let header = leading_noise_rows;

    ws.write_string(header, 0, "Call Date").unwrap();
    ws.write_string(header, 1, "Agent Name").unwrap();
    ws.write_string(header, 2, "Call Duration").unwrap();

    ws.write_string(header + 1, 0, "2024-01-15 09:30:00").unwrap();
    ws.write_string(header + 1, 1, "Ada").unwrap();
    ws.write_number(header + 1, 2, 120.0).unwrap();

    ws.write_string(header + 2, 0, "2024-02-20 14:00:00").unwrap();
    ws.write_string(header + 2, 1, "Grace").unwrap();
    ws.write_number(header + 2, 2, 45.0).unwrap();

    wb.save(path).unwrap();
}

#[test]
fn reads_first_sheet_with_typed_cells() {
    let dir = tmp_dir("read");
    let path = dir.join("MA_report.xlsx");
    write_report_xlsx(&path, 0);

    let rs = read_rowset(&path, 0).unwrap();
    assert_eq!(
        rs.schema.field_names().collect::<Vec<_>>(),
        vec!["Call Date", "Agent Name", "Call Duration"]
    );
    assert_eq!(rs.row_count(), 2);
    assert_eq!(rs.rows[0][1], Value::Utf8("Ada".to_string()));
    // Whole numbers come back as integers.
    assert_eq!(rs.rows[0][2], Value::Int64(120));
}

#[test]
fn skip_rows_applies_before_header_detection() {
    let dir = tmp_dir("skip");
    let path = dir.join("MA_report.xlsx");
    write_report_xlsx(&path, 2);

    let rs = read_rowset(&path, 2).unwrap();
    assert_eq!(
        rs.schema.field_names().collect::<Vec<_>>(),
        vec!["Call Date", "Agent Name", "Call Duration"]
    );
    assert_eq!(rs.row_count(), 2);
}

#[test]
fn xlsx_file_routes_to_secondary_table_end_to_end() {
    let source = tmp_dir("e2e");
    write_report_xlsx(&source.join("MA_report.xlsx"), 0);

    let cfg: sheetfeed::config::PipelineConfig = serde_json::from_str(&format!(
        r#"{{
            "project_id": "proj",
            "dataset_id": "ds",
            "primary_table": "calls_a",
            "secondary_table": "calls_b",
            "source_dir": {src},
            "archive_root": {src},
            "run_date": "2024-07-03"
        }}"#,
        src = serde_json::to_string(&source).unwrap(),
    ))
    .unwrap();

    let wh = MemoryWarehouse::new();
    let pipeline = IngestionPipeline::new(&cfg, &wh, PipelineOptions::default());
    let summary = pipeline.run().unwrap();

    let secondary = TableId::new("proj", "ds", "calls_b");
    assert_eq!(summary.files_ingested, 1);
    assert_eq!(summary.rows_appended, 2);
    assert_eq!(wh.row_count(&secondary), 2);
    assert_eq!(
        wh.column_values(&secondary, "call_date"),
        vec![
            Value::Timestamp(
                NaiveDate::from_ymd_opt(2024, 1, 15)
                    .unwrap()
                    .and_hms_opt(9, 30, 0)
                    .unwrap()
            ),
            Value::Timestamp(
                NaiveDate::from_ymd_opt(2024, 2, 20)
                    .unwrap()
                    .and_hms_opt(14, 0, 0)
                    .unwrap()
            ),
        ]
    );
    assert!(source.join("2024").join("7").join("MA_report.xlsx").exists());
}
