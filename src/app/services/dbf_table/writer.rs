//! Table writer with atomic replace semantics
//!
//! Writes a complete table into a temporary file next to the destination
//! and only renames it into place when the writer is closed successfully.
//! A writer dropped mid-way leaves no partial file behind.

use super::{
    ColumnSpec, FileType, FileValue, DBF_VERSION, FILE_TERMINATOR, HEADER_SIZE, HEADER_TERMINATOR,
    FIELD_DESCRIPTOR_SIZE, RECORD_LIVE,
};
use crate::error::{ExchangeError, Result};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Incremental writer for one table file
///
/// Lifecycle: `create` defines the schema and writes the header,
/// `write_record` appends rows, `close` patches the record count and
/// atomically persists the file at its destination.
pub struct DbfWriter {
    temp: NamedTempFile,
    destination: PathBuf,
    columns: Vec<ColumnSpec>,
    record_count: u32,
}

impl DbfWriter {
    /// Create a new table at `destination` with the given column layout
    pub fn create(destination: &Path, columns: Vec<ColumnSpec>) -> Result<Self> {
        if columns.is_empty() {
            return Err(ExchangeError::path(destination, "table has no columns"));
        }
        for column in &columns {
            column.validate()?;
        }

        let parent = destination.parent().filter(|p| !p.as_os_str().is_empty());
        let parent = parent.ok_or_else(|| {
            ExchangeError::path(destination, "destination has no parent directory")
        })?;
        let mut temp = NamedTempFile::new_in(parent)?;

        write_header(temp.as_file_mut(), &columns)?;
        debug!(
            "Created table writer for {} with {} columns",
            destination.display(),
            columns.len()
        );

        Ok(Self {
            temp,
            destination: destination.to_path_buf(),
            columns,
            record_count: 0,
        })
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Append one record; `None` leaves the field at its file default
    pub fn write_record(&mut self, values: &[Option<FileValue>]) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(ExchangeError::table(
                &self.destination,
                format!(
                    "record has {} values for {} columns",
                    values.len(),
                    self.columns.len()
                ),
            ));
        }

        let mut record = Vec::with_capacity(record_length(&self.columns));
        record.push(RECORD_LIVE);
        for (column, value) in self.columns.iter().zip(values) {
            encode_field(column, value.as_ref(), &mut record)?;
        }

        self.temp.as_file_mut().write_all(&record)?;
        self.record_count += 1;
        Ok(())
    }

    /// Finish the table: patch the record count, flush, and atomically move
    /// the file to its destination
    pub fn close(mut self) -> Result<()> {
        let file = self.temp.as_file_mut();
        file.write_all(&[FILE_TERMINATOR])?;
        file.seek(SeekFrom::Start(4))?;
        file.write_all(&self.record_count.to_le_bytes())?;
        file.flush()?;

        self.temp
            .persist(&self.destination)
            .map_err(|e| ExchangeError::Io(e.error))?;
        debug!(
            "Closed table {} with {} record(s)",
            self.destination.display(),
            self.record_count
        );
        Ok(())
    }
}

/// Total on-disk length of one record, including the deletion flag
fn record_length(columns: &[ColumnSpec]) -> usize {
    1 + columns.iter().map(|c| c.length as usize).sum::<usize>()
}

fn write_header(file: &mut std::fs::File, columns: &[ColumnSpec]) -> Result<()> {
    use chrono::Datelike;

    let header_length = HEADER_SIZE + columns.len() * FIELD_DESCRIPTOR_SIZE + 1;
    let today = chrono::Local::now().date_naive();

    let mut header = [0u8; HEADER_SIZE];
    header[0] = DBF_VERSION;
    header[1] = (today.year() - 1900).clamp(0, 255) as u8;
    header[2] = today.month() as u8;
    header[3] = today.day() as u8;
    // Bytes 4..8: record count, patched on close
    header[8..10].copy_from_slice(&(header_length as u16).to_le_bytes());
    header[10..12].copy_from_slice(&(record_length(columns) as u16).to_le_bytes());
    file.write_all(&header)?;

    for column in columns {
        let mut descriptor = [0u8; FIELD_DESCRIPTOR_SIZE];
        let name = column.name.as_bytes();
        descriptor[..name.len()].copy_from_slice(name);
        descriptor[11] = column.file_type.code();
        descriptor[16] = column.length;
        descriptor[17] = column.decimals;
        file.write_all(&descriptor)?;
    }

    file.write_all(&[HEADER_TERMINATOR])?;
    Ok(())
}

/// Encode one field value into its fixed-width byte representation
fn encode_field(
    column: &ColumnSpec,
    value: Option<&FileValue>,
    out: &mut Vec<u8>,
) -> Result<()> {
    let width = column.length as usize;

    let value = match value {
        None | Some(FileValue::Empty) => {
            // File default: spaces, or '?' for logical columns
            let fill = if column.file_type == FileType::Logical {
                b'?'
            } else {
                b' '
            };
            out.extend(std::iter::repeat(fill).take(width));
            return Ok(());
        }
        Some(value) => value,
    };

    match (column.file_type, value) {
        (FileType::Character, FileValue::Character(s)) => {
            let bytes = truncate_at_char_boundary(s, width);
            out.extend_from_slice(bytes);
            out.extend(std::iter::repeat(b' ').take(width - bytes.len()));
        }
        (FileType::Numeric, FileValue::Numeric(n)) => {
            let formatted = if column.decimals == 0 {
                format!("{:>width$}", n.round() as i64, width = width)
            } else {
                format!(
                    "{:>width$.prec$}",
                    n,
                    width = width,
                    prec = column.decimals as usize
                )
            };
            if formatted.len() > width {
                return Err(ExchangeError::coercion(
                    &column.name,
                    format!("value {} does not fit in {} bytes", n, width),
                ));
            }
            out.extend_from_slice(formatted.as_bytes());
        }
        (FileType::Date, FileValue::Date(d)) => {
            out.extend_from_slice(d.format("%Y%m%d").to_string().as_bytes());
        }
        (FileType::Logical, FileValue::Logical(b)) => {
            out.push(if *b { b'T' } else { b'F' });
        }
        (declared, actual) => {
            return Err(ExchangeError::coercion(
                &column.name,
                format!("{:?} value in a {:?} column", actual, declared),
            ));
        }
    }
    Ok(())
}

/// Longest prefix of `s` that fits in `width` bytes without splitting a
/// character
fn truncate_at_char_boundary(s: &str, width: usize) -> &[u8] {
    if s.len() <= width {
        return s.as_bytes();
    }
    let mut end = width;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].as_bytes()
}
