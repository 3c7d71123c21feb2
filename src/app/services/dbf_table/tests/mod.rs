//! Test utilities for the table layer
//!
//! Shared column layouts and fixture helpers used by the writer and reader
//! test modules.

use super::{ColumnSpec, FileType};

mod reader_tests;
mod writer_tests;

/// Column layout shared by the writer/reader round-trip tests
pub fn sample_columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::new("GAFIDENT", FileType::Character, 24, 0),
        ColumnSpec::new("OPPERVL", FileType::Numeric, 12, 1),
        ColumnSpec::new("STARTDATUM", FileType::Date, 8, 0),
        ColumnSpec::new("KWELBEREK", FileType::Logical, 1, 0),
    ]
}
