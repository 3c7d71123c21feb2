//! Legacy fixed-schema table layer (dBase III DBF)
//!
//! This module implements the binary table format the external modeling
//! tool exchanges: a 32-byte header, one 32-byte descriptor per column, and
//! fixed-width records prefixed by a deletion flag. Column order, names and
//! widths come verbatim from the field mapping registry, so the files stay
//! byte-compatible with the legacy tool.

use crate::error::{ExchangeError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub mod reader;
pub mod writer;

#[cfg(test)]
pub mod tests;

pub use reader::DbfReader;
pub use writer::DbfWriter;

// =============================================================================
// Format Constants
// =============================================================================

/// Version byte of a plain dBase III table without memo file
pub const DBF_VERSION: u8 = 0x03;

/// Size of the fixed file header in bytes
pub const HEADER_SIZE: usize = 32;

/// Size of one field descriptor in bytes
pub const FIELD_DESCRIPTOR_SIZE: usize = 32;

/// Byte terminating the descriptor block
pub const HEADER_TERMINATOR: u8 = 0x0D;

/// Deletion flag values prefixing each record
pub const RECORD_LIVE: u8 = 0x20;
pub const RECORD_DELETED: u8 = 0x2A;

/// End-of-file marker
pub const FILE_TERMINATOR: u8 = 0x1A;

/// Maximum length of a column name (excluding the NUL padding byte)
pub const MAX_COLUMN_NAME_LEN: usize = 10;

/// Width of a date column (YYYYMMDD)
pub const DATE_FIELD_LEN: u8 = 8;

/// Width of a logical column
pub const LOGICAL_FIELD_LEN: u8 = 1;

// =============================================================================
// Column Types
// =============================================================================

/// Column type of a table field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    /// Space-padded text, left justified
    Character,
    /// Space-padded decimal text, right justified
    Numeric,
    /// YYYYMMDD
    Date,
    /// T / F / ? (unknown)
    Logical,
}

impl FileType {
    /// Type byte written into the field descriptor
    pub fn code(&self) -> u8 {
        match self {
            FileType::Character => b'C',
            FileType::Numeric => b'N',
            FileType::Date => b'D',
            FileType::Logical => b'L',
        }
    }

    /// Resolve a descriptor type byte
    pub fn from_code(code: u8) -> Option<FileType> {
        match code {
            b'C' => Some(FileType::Character),
            b'N' | b'F' => Some(FileType::Numeric),
            b'D' => Some(FileType::Date),
            b'L' => Some(FileType::Logical),
            _ => None,
        }
    }
}

/// Declared layout of one table column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub file_type: FileType,
    pub length: u8,
    pub decimals: u8,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, file_type: FileType, length: u8, decimals: u8) -> Self {
        Self {
            name: name.into(),
            file_type,
            length,
            decimals,
        }
    }

    /// Validate that the declared layout is representable
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.len() > MAX_COLUMN_NAME_LEN {
            return Err(ExchangeError::coercion(
                &self.name,
                format!("column name must be 1..={} bytes", MAX_COLUMN_NAME_LEN),
            ));
        }
        if self.length == 0 {
            return Err(ExchangeError::coercion(&self.name, "column length is zero"));
        }
        match self.file_type {
            FileType::Date if self.length != DATE_FIELD_LEN => Err(ExchangeError::coercion(
                &self.name,
                format!("date columns are {} bytes wide", DATE_FIELD_LEN),
            )),
            FileType::Logical if self.length != LOGICAL_FIELD_LEN => Err(ExchangeError::coercion(
                &self.name,
                "logical columns are 1 byte wide",
            )),
            FileType::Numeric if self.decimals > 0 && self.decimals + 2 > self.length => {
                // Room for at least one integer digit and the decimal point
                Err(ExchangeError::coercion(
                    &self.name,
                    format!(
                        "{} decimals do not fit in {} bytes",
                        self.decimals, self.length
                    ),
                ))
            }
            _ => Ok(()),
        }
    }
}

// =============================================================================
// Scalar Values
// =============================================================================

/// Raw scalar carried by one table field
///
/// `Empty` stands for a field left at its file default; the coercer treats
/// it as "no update" on read.
#[derive(Debug, Clone, PartialEq)]
pub enum FileValue {
    Character(String),
    Numeric(f64),
    Date(NaiveDate),
    Logical(bool),
    Empty,
}

impl FileValue {
    /// Whether this value carries no information
    pub fn is_empty(&self) -> bool {
        match self {
            FileValue::Empty => true,
            FileValue::Character(s) => s.is_empty(),
            _ => false,
        }
    }
}
