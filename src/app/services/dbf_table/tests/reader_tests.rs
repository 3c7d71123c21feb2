//! Tests for the table reader: schema parsing, lazy iteration and deleted
//! record handling.

use super::sample_columns;
use crate::app::services::dbf_table::{
    DbfReader, DbfWriter, FileType, FileValue, RECORD_DELETED, RECORD_LIVE,
};
use chrono::NaiveDate;
use tempfile::TempDir;

fn write_sample_table(path: &std::path::Path, rows: usize) {
    let mut writer = DbfWriter::create(path, sample_columns()).unwrap();
    for i in 0..rows {
        writer
            .write_record(&[
                Some(FileValue::Character(format!("GAF{:02}", i))),
                Some(FileValue::Numeric(100.0 + i as f64)),
                Some(FileValue::Date(NaiveDate::from_ymd_opt(2011, 4, 1).unwrap())),
                Some(FileValue::Logical(i % 2 == 0)),
            ])
            .unwrap();
    }
    writer.close().unwrap();
}

#[test]
fn test_schema_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("table.dbf");
    write_sample_table(&path, 1);

    let reader = DbfReader::open(&path).unwrap();
    let columns = reader.columns();

    assert_eq!(columns.len(), 4);
    assert_eq!(columns[0].name, "GAFIDENT");
    assert_eq!(columns[0].file_type, FileType::Character);
    assert_eq!(columns[0].length, 24);
    assert_eq!(columns[1].name, "OPPERVL");
    assert_eq!(columns[1].decimals, 1);
}

#[test]
fn test_row_values_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("table.dbf");
    write_sample_table(&path, 3);

    let reader = DbfReader::open(&path).unwrap();
    let rows: Vec<_> = reader.map(|r| r.unwrap()).collect();

    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows[0].get("GAFIDENT"),
        Some(&FileValue::Character("GAF00".to_string()))
    );
    assert_eq!(rows[1].get("OPPERVL"), Some(&FileValue::Numeric(101.0)));
    assert_eq!(
        rows[2].get("STARTDATUM"),
        Some(&FileValue::Date(NaiveDate::from_ymd_opt(2011, 4, 1).unwrap()))
    );
    assert_eq!(rows[0].get("KWELBEREK"), Some(&FileValue::Logical(true)));
    assert_eq!(rows[1].get("KWELBEREK"), Some(&FileValue::Logical(false)));
}

#[test]
fn test_blank_fields_read_as_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("table.dbf");

    let mut writer = DbfWriter::create(&path, sample_columns()).unwrap();
    writer.write_record(&[None, None, None, None]).unwrap();
    writer.close().unwrap();

    let reader = DbfReader::open(&path).unwrap();
    let row = reader.map(|r| r.unwrap()).next().unwrap();

    assert_eq!(row.get("GAFIDENT"), Some(&FileValue::Empty));
    assert_eq!(row.get("OPPERVL"), Some(&FileValue::Empty));
    assert_eq!(row.get("KWELBEREK"), Some(&FileValue::Empty));
}

#[test]
fn test_deleted_records_are_skipped() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("table.dbf");
    write_sample_table(&path, 3);

    // Flip the middle record's deletion flag in place
    let mut bytes = std::fs::read(&path).unwrap();
    let header_length = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
    let record_length = u16::from_le_bytes([bytes[10], bytes[11]]) as usize;
    let second = header_length + record_length;
    assert_eq!(bytes[second], RECORD_LIVE);
    bytes[second] = RECORD_DELETED;
    std::fs::write(&path, &bytes).unwrap();

    let reader = DbfReader::open(&path).unwrap();
    let idents: Vec<_> = reader
        .map(|r| r.unwrap())
        .map(|row| match row.get("GAFIDENT") {
            Some(FileValue::Character(s)) => s.clone(),
            other => panic!("unexpected ident value: {:?}", other),
        })
        .collect();

    assert_eq!(idents, vec!["GAF00", "GAF02"]);
}

#[test]
fn test_unparseable_numeric_survives_as_character() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("table.dbf");
    write_sample_table(&path, 1);

    // Corrupt the numeric payload; the reader must hand the raw text to the
    // coercer instead of dropping the row
    let mut bytes = std::fs::read(&path).unwrap();
    let header_length = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
    let numeric_start = header_length + 1 + 24;
    bytes[numeric_start..numeric_start + 12].copy_from_slice(b"   not.a.num");
    std::fs::write(&path, &bytes).unwrap();

    let reader = DbfReader::open(&path).unwrap();
    let row = reader.map(|r| r.unwrap()).next().unwrap();
    assert_eq!(
        row.get("OPPERVL"),
        Some(&FileValue::Character("not.a.num".to_string()))
    );
}

#[test]
fn test_missing_file_is_a_path_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nope.dbf");
    assert!(DbfReader::open(&path).is_err());
}

#[test]
fn test_garbage_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("garbage.dbf");
    std::fs::write(&path, b"definitely not a table").unwrap();
    assert!(DbfReader::open(&path).is_err());
}

#[test]
fn test_truncated_file_yields_row_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("table.dbf");
    write_sample_table(&path, 2);

    // Chop the file in the middle of the second record
    let bytes = std::fs::read(&path).unwrap();
    let header_length = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
    let record_length = u16::from_le_bytes([bytes[10], bytes[11]]) as usize;
    std::fs::write(&path, &bytes[..header_length + record_length + 10]).unwrap();

    let mut reader = DbfReader::open(&path).unwrap();
    assert!(reader.next().unwrap().is_ok());
    assert!(reader.next().unwrap().is_err());
    assert!(reader.next().is_none());
}
