//! Table reader producing a lazy row sequence
//!
//! Parses the header and field descriptors eagerly, then yields one raw
//! field-name → scalar map per live record. The sequence is finite and can
//! only be restarted by reopening the file.

use super::{
    ColumnSpec, FileType, FileValue, FIELD_DESCRIPTOR_SIZE, HEADER_SIZE, HEADER_TERMINATOR,
    RECORD_DELETED,
};
use crate::error::{ExchangeError, Result};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One raw table row: file field name → scalar
pub type RawRow = HashMap<String, FileValue>;

/// Read-only cursor over one table file
pub struct DbfReader {
    reader: BufReader<File>,
    path: PathBuf,
    columns: Vec<ColumnSpec>,
    record_length: usize,
    remaining: u32,
}

impl DbfReader {
    /// Open a table and parse its schema
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ExchangeError::path(path, "table file does not exist"));
        }
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut header = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header).map_err(|_| {
            ExchangeError::table(path, "file too short for a table header")
        })?;

        // Low nibble 3 covers dBase III with and without memo flag bits
        if header[0] & 0x07 != 0x03 {
            return Err(ExchangeError::table(
                path,
                format!("unsupported table version byte 0x{:02X}", header[0]),
            ));
        }

        let record_count = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let header_length = u16::from_le_bytes([header[8], header[9]]) as usize;
        let record_length = u16::from_le_bytes([header[10], header[11]]) as usize;

        let descriptor_bytes = header_length
            .checked_sub(HEADER_SIZE + 1)
            .ok_or_else(|| ExchangeError::table(path, "header length too small"))?;
        if descriptor_bytes % FIELD_DESCRIPTOR_SIZE != 0 {
            return Err(ExchangeError::table(path, "misaligned field descriptors"));
        }

        let mut columns = Vec::with_capacity(descriptor_bytes / FIELD_DESCRIPTOR_SIZE);
        for _ in 0..descriptor_bytes / FIELD_DESCRIPTOR_SIZE {
            let mut descriptor = [0u8; FIELD_DESCRIPTOR_SIZE];
            reader.read_exact(&mut descriptor)?;
            columns.push(parse_descriptor(path, &descriptor)?);
        }

        let mut terminator = [0u8; 1];
        reader.read_exact(&mut terminator)?;
        if terminator[0] != HEADER_TERMINATOR {
            return Err(ExchangeError::table(path, "missing header terminator"));
        }

        let expected = 1 + columns.iter().map(|c| c.length as usize).sum::<usize>();
        if expected != record_length {
            return Err(ExchangeError::table(
                path,
                format!(
                    "declared record length {} does not match columns ({})",
                    record_length, expected
                ),
            ));
        }

        reader.seek(SeekFrom::Start(header_length as u64))?;
        debug!(
            "Opened table {}: {} column(s), {} record(s)",
            path.display(),
            columns.len(),
            record_count
        );

        Ok(Self {
            reader,
            path: path.to_path_buf(),
            columns,
            record_length,
            remaining: record_count,
        })
    }

    /// Declared column layout, in file order
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    fn parse_record(&self, bytes: &[u8]) -> RawRow {
        let mut row = HashMap::with_capacity(self.columns.len());
        let mut offset = 1; // Skip the deletion flag
        for column in &self.columns {
            let field = &bytes[offset..offset + column.length as usize];
            row.insert(column.name.clone(), parse_field(column, field));
            offset += column.length as usize;
        }
        row
    }
}

impl Iterator for DbfReader {
    type Item = Result<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut record = vec![0u8; self.record_length];
        while self.remaining > 0 {
            self.remaining -= 1;
            if let Err(e) = self.reader.read_exact(&mut record) {
                self.remaining = 0;
                return Some(Err(ExchangeError::table(
                    &self.path,
                    format!("truncated record: {}", e),
                )));
            }
            if record[0] == RECORD_DELETED {
                continue;
            }
            return Some(Ok(self.parse_record(&record)));
        }
        None
    }
}

fn parse_descriptor(path: &Path, descriptor: &[u8; FIELD_DESCRIPTOR_SIZE]) -> Result<ColumnSpec> {
    let name_end = descriptor[..11]
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(11);
    let name = String::from_utf8_lossy(&descriptor[..name_end])
        .trim()
        .to_string();
    if name.is_empty() {
        return Err(ExchangeError::table(path, "field descriptor without a name"));
    }

    let file_type = FileType::from_code(descriptor[11]).ok_or_else(|| {
        ExchangeError::table(
            path,
            format!("unknown field type '{}'", descriptor[11] as char),
        )
    })?;

    Ok(ColumnSpec::new(name, file_type, descriptor[16], descriptor[17]))
}

/// Parse one fixed-width field into a raw scalar
///
/// Unparseable numeric and date payloads are preserved as character values
/// so the coercer can reject them per field instead of losing the row.
fn parse_field(column: &ColumnSpec, bytes: &[u8]) -> FileValue {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim_matches(|c: char| c == ' ' || c == '\0');

    if trimmed.is_empty() {
        return FileValue::Empty;
    }

    match column.file_type {
        FileType::Character => FileValue::Character(trimmed.to_string()),
        FileType::Numeric => match trimmed.parse::<f64>() {
            Ok(n) => FileValue::Numeric(n),
            Err(_) => FileValue::Character(trimmed.to_string()),
        },
        FileType::Date => match NaiveDate::parse_from_str(trimmed, "%Y%m%d") {
            Ok(d) => FileValue::Date(d),
            Err(_) => FileValue::Character(trimmed.to_string()),
        },
        FileType::Logical => match trimmed.as_bytes()[0] {
            b'T' | b't' | b'Y' | b'y' => FileValue::Logical(true),
            b'F' | b'f' | b'N' | b'n' => FileValue::Logical(false),
            _ => FileValue::Empty,
        },
    }
}
