//! Bidirectional value coercion between domain values and table scalars
//!
//! One domain value in, one file-representable scalar out, and back. All
//! behavior is driven by the mapping row and the field descriptor; the
//! functions themselves are stateless. Encoding needs a reprojection
//! capability (polygons leave as reprojected centroids), decoding needs a
//! reference-resolution capability (time series and code tables are looked
//! up in the store).

use crate::app::adapters::reprojection::Reprojector;
use crate::app::adapters::repository::ReferenceResolver;
use crate::app::models::{Geometry, TimeseriesRef};
use crate::app::services::dbf_table::{FileType, FileValue};
use crate::app::services::field_mapping::{CodeTable, FieldDescriptor, FieldMapping};
use crate::constants::{GEOMETRY_X_FIELD, GEOMETRY_Y_FIELD, NO_VALUE_LITERAL, TARGET_SRID};
use crate::error::{ExchangeError, Result};
use chrono::NaiveDate;

// =============================================================================
// Domain Values
// =============================================================================

/// Typed value carried between a record field and the coercer
#[derive(Debug, Clone, PartialEq)]
pub enum DomainValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Flag(bool),
    Geometry(Geometry),
    Timeseries(TimeseriesRef),
    /// Enumerated code-table reference, by short code
    Code(String),
    /// Owning organization, by display name
    Organization(String),
}

impl DomainValue {
    pub fn into_text(self, field: &str) -> Result<String> {
        match self {
            DomainValue::Text(s) => Ok(s),
            other => Err(shape_error(field, "text", &other)),
        }
    }

    pub fn into_number(self, field: &str) -> Result<f64> {
        match self {
            DomainValue::Number(n) => Ok(n),
            other => Err(shape_error(field, "number", &other)),
        }
    }

    pub fn into_date(self, field: &str) -> Result<NaiveDate> {
        match self {
            DomainValue::Date(d) => Ok(d),
            other => Err(shape_error(field, "date", &other)),
        }
    }

    pub fn into_flag(self, field: &str) -> Result<bool> {
        match self {
            DomainValue::Flag(b) => Ok(b),
            other => Err(shape_error(field, "flag", &other)),
        }
    }

    pub fn into_geometry(self, field: &str) -> Result<Geometry> {
        match self {
            DomainValue::Geometry(g) => Ok(g),
            other => Err(shape_error(field, "geometry", &other)),
        }
    }

    pub fn into_timeseries(self, field: &str) -> Result<TimeseriesRef> {
        match self {
            DomainValue::Timeseries(ts) => Ok(ts),
            other => Err(shape_error(field, "time series reference", &other)),
        }
    }

    pub fn into_code(self, field: &str) -> Result<String> {
        match self {
            DomainValue::Code(c) => Ok(c),
            other => Err(shape_error(field, "code", &other)),
        }
    }

    pub fn into_organization(self, field: &str) -> Result<String> {
        match self {
            DomainValue::Organization(o) => Ok(o),
            other => Err(shape_error(field, "organization", &other)),
        }
    }
}

fn shape_error(field: &str, expected: &str, got: &DomainValue) -> ExchangeError {
    ExchangeError::coercion(field, format!("expected {}, got {:?}", expected, got))
}

// =============================================================================
// Encoding (domain → file)
// =============================================================================

/// Encode one domain value for the column described by `mapping`
///
/// Returns `None` when the field must be skipped (the column stays at its
/// file default).
pub fn encode(
    value: &DomainValue,
    mapping: &FieldMapping,
    reprojector: &dyn Reprojector,
) -> Result<Option<FileValue>> {
    match value {
        DomainValue::Text(s) | DomainValue::Organization(s) | DomainValue::Code(s) => {
            if s.is_empty() {
                Ok(None)
            } else {
                Ok(Some(FileValue::Character(s.clone())))
            }
        }
        DomainValue::Number(n) => Ok(Some(FileValue::Numeric(*n))),
        DomainValue::Date(d) => Ok(Some(FileValue::Date(*d))),
        DomainValue::Flag(b) => Ok(Some(encode_flag(*b, mapping.file_type))),
        DomainValue::Timeseries(ts) => Ok(Some(FileValue::Character(format!(
            "{},{},{}",
            ts.location_id, ts.parameter_id, ts.row_id
        )))),
        DomainValue::Geometry(geometry) => {
            encode_geometry(geometry, mapping, reprojector).map(Some)
        }
    }
}

/// Booleans travel as 1/0 unless the mapping declares a logical column
fn encode_flag(value: bool, file_type: FileType) -> FileValue {
    match file_type {
        FileType::Logical => FileValue::Logical(value),
        FileType::Character => {
            FileValue::Character(if value { "1" } else { "0" }.to_string())
        }
        _ => FileValue::Numeric(if value { 1.0 } else { 0.0 }),
    }
}

/// Reduce a geometry to one centroid component in the target system
fn encode_geometry(
    geometry: &Geometry,
    mapping: &FieldMapping,
    reprojector: &dyn Reprojector,
) -> Result<FileValue> {
    let projected;
    let geometry = if geometry.srid() == TARGET_SRID {
        geometry
    } else {
        projected = reprojector.reproject(geometry, TARGET_SRID)?;
        &projected
    };

    let (x, y) = geometry.centroid();
    if mapping.file_field == GEOMETRY_X_FIELD {
        Ok(FileValue::Numeric(x))
    } else if mapping.file_field == GEOMETRY_Y_FIELD {
        Ok(FileValue::Numeric(y))
    } else {
        Err(ExchangeError::coercion(
            &mapping.file_field,
            "geometry maps only onto the X/Y columns",
        ))
    }
}

// =============================================================================
// Decoding (file → domain)
// =============================================================================

/// Decode one raw scalar for a field with the given descriptor
///
/// Returns `None` for "no update": blank fields and the literal `"None"`
/// leave the domain field untouched.
pub fn decode(
    raw: &FileValue,
    field: &str,
    descriptor: FieldDescriptor,
    resolver: &dyn ReferenceResolver,
) -> Result<Option<DomainValue>> {
    if raw.is_empty() {
        return Ok(None);
    }
    if let FileValue::Character(s) = raw {
        if s == NO_VALUE_LITERAL {
            return Ok(None);
        }
    }

    let value = match descriptor {
        FieldDescriptor::Text | FieldDescriptor::ConfigurationRef => {
            DomainValue::Text(decode_text(raw, field)?)
        }
        FieldDescriptor::Number => DomainValue::Number(decode_number(raw, field)?),
        FieldDescriptor::Date => DomainValue::Date(decode_date(raw, field)?),
        FieldDescriptor::Flag => DomainValue::Flag(decode_flag(raw, field)?),
        FieldDescriptor::Organization => DomainValue::Organization(decode_text(raw, field)?),
        FieldDescriptor::Timeseries => {
            DomainValue::Timeseries(decode_timeseries(raw, field, resolver)?)
        }
        FieldDescriptor::Code(table) => {
            DomainValue::Code(decode_code(raw, field, table, resolver)?)
        }
        // Geometry components decode as plain numbers; the importer pairs
        // the X/Y columns back into a point
        FieldDescriptor::Geometry => DomainValue::Number(decode_number(raw, field)?),
    };
    Ok(Some(value))
}

fn decode_text(raw: &FileValue, field: &str) -> Result<String> {
    match raw {
        FileValue::Character(s) => Ok(s.clone()),
        FileValue::Numeric(n) => Ok(n.to_string()),
        other => Err(ExchangeError::coercion(
            field,
            format!("cannot read text from {:?}", other),
        )),
    }
}

fn decode_number(raw: &FileValue, field: &str) -> Result<f64> {
    match raw {
        FileValue::Numeric(n) => Ok(*n),
        FileValue::Character(s) => s.trim().parse::<f64>().map_err(|_| {
            ExchangeError::coercion(field, format!("'{}' is not a number", s))
        }),
        other => Err(ExchangeError::coercion(
            field,
            format!("cannot read a number from {:?}", other),
        )),
    }
}

fn decode_date(raw: &FileValue, field: &str) -> Result<NaiveDate> {
    match raw {
        FileValue::Date(d) => Ok(*d),
        FileValue::Character(s) => NaiveDate::parse_from_str(s.trim(), "%Y%m%d").map_err(|_| {
            ExchangeError::coercion(field, format!("'{}' is not a YYYYMMDD date", s))
        }),
        other => Err(ExchangeError::coercion(
            field,
            format!("cannot read a date from {:?}", other),
        )),
    }
}

fn decode_flag(raw: &FileValue, field: &str) -> Result<bool> {
    match raw {
        FileValue::Logical(b) => Ok(*b),
        FileValue::Numeric(n) if *n == 1.0 => Ok(true),
        FileValue::Numeric(n) if *n == 0.0 => Ok(false),
        FileValue::Character(s) => match s.trim() {
            "1" | "T" | "t" | "Y" | "y" => Ok(true),
            "0" | "F" | "f" | "N" | "n" => Ok(false),
            other => Err(ExchangeError::coercion(
                field,
                format!("'{}' is not a flag", other),
            )),
        },
        other => Err(ExchangeError::coercion(
            field,
            format!("cannot read a flag from {:?}", other),
        )),
    }
}

/// Re-resolve a composite `"<location>,<parameter>,<row-id>"` reference
///
/// Only the row id is looked up; the encoded location and parameter
/// components are not checked against the resolved record.
fn decode_timeseries(
    raw: &FileValue,
    field: &str,
    resolver: &dyn ReferenceResolver,
) -> Result<TimeseriesRef> {
    let text = decode_text(raw, field)?;
    let parts: Vec<&str> = text.split(',').collect();
    if parts.len() < 3 {
        return Err(ExchangeError::coercion(
            field,
            format!("'{}' is not a <location>,<parameter>,<row-id> reference", text),
        ));
    }

    let row_id = parts[2].trim().parse::<i64>().map_err(|_| {
        ExchangeError::coercion(field, format!("'{}' has no numeric row id", text))
    })?;

    resolver
        .resolve_timeseries(row_id)
        .ok_or(ExchangeError::ReferenceNotFound { row_id })
}

/// Re-resolve an enumerated code by exact match
fn decode_code(
    raw: &FileValue,
    field: &str,
    table: CodeTable,
    resolver: &dyn ReferenceResolver,
) -> Result<String> {
    let code = match raw {
        FileValue::Character(s) => s.trim().to_string(),
        // Some producers write integer codes into numeric columns
        FileValue::Numeric(n) => (n.round() as i64).to_string(),
        other => {
            return Err(ExchangeError::coercion(
                field,
                format!("cannot read a code from {:?}", other),
            ));
        }
    };

    let resolved = match table {
        CodeTable::BucketType => resolver.resolve_bucket_type(&code).map(|row| row.code),
        CodeTable::FlowDirection => resolver.resolve_flow_direction(&code).map(|row| row.code),
    };
    resolved.ok_or_else(|| ExchangeError::unknown_code(table.name(), code))
}
