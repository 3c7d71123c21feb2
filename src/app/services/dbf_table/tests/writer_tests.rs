//! Tests for the table writer: header layout, field encodings and the
//! atomic replace contract.

use super::sample_columns;
use crate::app::services::dbf_table::{
    ColumnSpec, DbfWriter, FileType, FileValue, DBF_VERSION, FIELD_DESCRIPTOR_SIZE,
    FILE_TERMINATOR, HEADER_SIZE, HEADER_TERMINATOR,
};
use chrono::NaiveDate;
use tempfile::TempDir;

fn sample_record() -> Vec<Option<FileValue>> {
    vec![
        Some(FileValue::Character("GAF42".to_string())),
        Some(FileValue::Numeric(1250.5)),
        Some(FileValue::Date(NaiveDate::from_ymd_opt(2011, 4, 1).unwrap())),
        Some(FileValue::Logical(true)),
    ]
}

#[test]
fn test_header_layout() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("table.dbf");

    let mut writer = DbfWriter::create(&path, sample_columns()).unwrap();
    writer.write_record(&sample_record()).unwrap();
    writer.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes[0], DBF_VERSION);

    // Record count patched on close
    assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), 1);

    let header_length = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
    assert_eq!(header_length, HEADER_SIZE + 4 * FIELD_DESCRIPTOR_SIZE + 1);
    assert_eq!(bytes[header_length - 1], HEADER_TERMINATOR);

    // Record length: deletion flag + declared widths
    let record_length = u16::from_le_bytes([bytes[10], bytes[11]]) as usize;
    assert_eq!(record_length, 1 + 24 + 12 + 8 + 1);

    assert_eq!(*bytes.last().unwrap(), FILE_TERMINATOR);
}

#[test]
fn test_field_descriptor_layout() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("table.dbf");

    let writer = DbfWriter::create(&path, sample_columns()).unwrap();
    writer.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let descriptor = &bytes[HEADER_SIZE..HEADER_SIZE + FIELD_DESCRIPTOR_SIZE];

    // 11-byte NUL-padded name, then type byte, length and decimal count
    assert_eq!(&descriptor[..8], b"GAFIDENT");
    assert_eq!(descriptor[8], 0);
    assert_eq!(descriptor[11], b'C');
    assert_eq!(descriptor[16], 24);
    assert_eq!(descriptor[17], 0);

    let numeric = &bytes[HEADER_SIZE + FIELD_DESCRIPTOR_SIZE..HEADER_SIZE + 2 * FIELD_DESCRIPTOR_SIZE];
    assert_eq!(numeric[11], b'N');
    assert_eq!(numeric[16], 12);
    assert_eq!(numeric[17], 1);
}

#[test]
fn test_record_encoding() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("table.dbf");

    let mut writer = DbfWriter::create(&path, sample_columns()).unwrap();
    writer.write_record(&sample_record()).unwrap();
    writer.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let header_length = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
    let record = &bytes[header_length..header_length + 46];

    assert_eq!(record[0], 0x20); // Live record flag

    // Character: left justified, space padded to 24
    assert_eq!(&record[1..6], b"GAF42");
    assert!(record[6..25].iter().all(|&b| b == b' '));

    // Numeric: right justified with one decimal
    assert_eq!(&record[25..37], b"      1250.5");

    // Date: YYYYMMDD
    assert_eq!(&record[37..45], b"20110401");

    // Logical
    assert_eq!(record[45], b'T');
}

#[test]
fn test_absent_values_use_file_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("table.dbf");

    let mut writer = DbfWriter::create(&path, sample_columns()).unwrap();
    writer.write_record(&[None, None, None, None]).unwrap();
    writer.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let header_length = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
    let record = &bytes[header_length..header_length + 46];

    assert!(record[1..45].iter().all(|&b| b == b' '));
    assert_eq!(record[45], b'?'); // Unknown logical
}

#[test]
fn test_numeric_overflow_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("table.dbf");

    let columns = vec![ColumnSpec::new("N", FileType::Numeric, 4, 1)];
    let mut writer = DbfWriter::create(&path, columns).unwrap();
    let result = writer.write_record(&[Some(FileValue::Numeric(12345.6))]);
    assert!(result.is_err());
}

#[test]
fn test_type_mismatch_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("table.dbf");

    let mut writer = DbfWriter::create(&path, sample_columns()).unwrap();
    let mut record = sample_record();
    record[1] = Some(FileValue::Character("not a number".to_string()));
    assert!(writer.write_record(&record).is_err());
}

#[test]
fn test_dropped_writer_leaves_no_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("table.dbf");

    {
        let mut writer = DbfWriter::create(&path, sample_columns()).unwrap();
        writer.write_record(&sample_record()).unwrap();
        // Dropped without close
    }

    assert!(!path.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_close_replaces_existing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("table.dbf");
    std::fs::write(&path, b"stale contents").unwrap();

    let mut writer = DbfWriter::create(&path, sample_columns()).unwrap();
    writer.write_record(&sample_record()).unwrap();
    writer.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes[0], DBF_VERSION);
}

#[test]
fn test_invalid_column_layouts_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("table.dbf");

    // Name too long for the descriptor
    let columns = vec![ColumnSpec::new("TOOLONGNAME1", FileType::Character, 8, 0)];
    assert!(DbfWriter::create(&path, columns).is_err());

    // Date columns are fixed width
    let columns = vec![ColumnSpec::new("DATUM", FileType::Date, 10, 0)];
    assert!(DbfWriter::create(&path, columns).is_err());

    // No columns at all
    assert!(DbfWriter::create(&path, vec![]).is_err());
}
