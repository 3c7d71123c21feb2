//! Field mapping registry and typed field access
//!
//! The mapping table is the single source of truth for codec behavior: one
//! row per exported column, binding a domain field to a file field with its
//! declared type, width and ordinal. The registry is pure data, built and
//! validated once at startup.
//!
//! Dynamic by-name attribute access is replaced by a fixed enumeration of
//! getter/setter pairs per record kind (`FieldAccessor`), indexed by the
//! mapping's declared domain-field name. No runtime reflection.

use crate::app::models::{Area, AreaConfiguration, Bucket, RecordKind, Structure};
use crate::app::services::dbf_table::{ColumnSpec, FileType};
use crate::app::services::value_coercer::DomainValue;
use crate::error::{ExchangeError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Legal file column names: uppercase, at most 10 bytes
const COLUMN_NAME_PATTERN: &str = r"^[A-Z][A-Z0-9_]{0,9}$";

fn column_name_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(COLUMN_NAME_PATTERN).expect("static column name pattern"))
}

// =============================================================================
// Mapping Rows
// =============================================================================

/// One row of the field mapping table
///
/// Immutable once loaded; `ordinal` defines the column order in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    pub kind: RecordKind,
    pub domain_field: String,
    pub file_field: String,
    pub file_type: FileType,
    pub length: u8,
    pub decimals: u8,
    pub ordinal: u16,
}

impl FieldMapping {
    fn column_spec(&self) -> ColumnSpec {
        ColumnSpec::new(self.file_field.clone(), self.file_type, self.length, self.decimals)
    }
}

// =============================================================================
// Field Descriptors and Accessors
// =============================================================================

/// Code tables an enumerated reference can resolve against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeTable {
    BucketType,
    FlowDirection,
}

impl CodeTable {
    pub fn name(&self) -> &'static str {
        match self {
            CodeTable::BucketType => "bucket type",
            CodeTable::FlowDirection => "flow direction",
        }
    }
}

/// Domain-side type of a mapped field, driving decode behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDescriptor {
    /// Plain text, passed through
    Text,
    /// Plain number, passed through
    Number,
    /// Calendar date
    Date,
    /// Boolean, 1/0 in the file
    Flag,
    /// Owning organization, encoded as its display name
    Organization,
    /// Time-series reference, encoded as a composite string
    Timeseries,
    /// Enumerated code-table reference
    Code(CodeTable),
    /// Point or polygon, split over the X/Y columns
    Geometry,
    /// Reference to the owning area configuration, encoded as its ident
    ConfigurationRef,
}

/// Getter/setter pair for one mapped domain field
///
/// The getter returns `None` when the field carries no value (skipped on
/// write); the setter rejects values of the wrong shape.
pub struct FieldAccessor<R> {
    pub domain_field: &'static str,
    pub descriptor: FieldDescriptor,
    pub get: fn(&R) -> Option<DomainValue>,
    pub set: fn(&mut R, DomainValue) -> Result<()>,
}

/// Record kinds participating in mapped file exchange
pub trait MappedRecord: Sized {
    const KIND: RecordKind;

    /// Fixed accessor table, resolved once at startup
    fn accessors() -> &'static [FieldAccessor<Self>];

    /// Look up the accessor for a mapping's declared domain field
    fn accessor(domain_field: &str) -> Option<&'static FieldAccessor<Self>> {
        Self::accessors()
            .iter()
            .find(|a| a.domain_field == domain_field)
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Validated, ordered mapping table for all record kinds
#[derive(Debug, Clone)]
pub struct MappingRegistry {
    by_kind: HashMap<RecordKind, Vec<FieldMapping>>,
}

impl MappingRegistry {
    /// Build a registry from mapping rows, validating the invariants:
    /// unique file-field names per kind, legal column names, representable
    /// widths.
    pub fn new(entries: Vec<FieldMapping>) -> Result<Self> {
        let mut by_kind: HashMap<RecordKind, Vec<FieldMapping>> = HashMap::new();
        for entry in entries {
            if !column_name_regex().is_match(&entry.file_field) {
                return Err(ExchangeError::coercion(
                    &entry.file_field,
                    "illegal file field name",
                ));
            }
            entry.column_spec().validate()?;
            by_kind.entry(entry.kind).or_default().push(entry);
        }

        for (kind, mappings) in by_kind.iter_mut() {
            mappings.sort_by_key(|m| m.ordinal);
            let mut seen = std::collections::HashSet::new();
            for mapping in mappings.iter() {
                if !seen.insert(mapping.file_field.clone()) {
                    return Err(ExchangeError::coercion(
                        &mapping.file_field,
                        format!("duplicate file field for kind {}", kind),
                    ));
                }
            }
        }

        Ok(Self { by_kind })
    }

    /// The standard water balance mapping table
    pub fn standard() -> Self {
        Self::new(standard_mappings()).expect("static mapping table is valid")
    }

    /// Mapping rows for a record kind, in column order
    pub fn mappings_for(&self, kind: RecordKind) -> Result<&[FieldMapping]> {
        self.by_kind
            .get(&kind)
            .map(|v| v.as_slice())
            .ok_or(ExchangeError::Schema { kind })
    }

    /// Column layout for a record kind, in column order
    pub fn columns_for(&self, kind: RecordKind) -> Result<Vec<ColumnSpec>> {
        Ok(self
            .mappings_for(kind)?
            .iter()
            .map(FieldMapping::column_spec)
            .collect())
    }

    /// File field bound to a domain field, if mapped
    pub fn file_field_for(&self, kind: RecordKind, domain_field: &str) -> Option<&str> {
        self.by_kind.get(&kind).and_then(|mappings| {
            mappings
                .iter()
                .find(|m| m.domain_field == domain_field)
                .map(|m| m.file_field.as_str())
        })
    }
}

/// Shorthand for building the standard table
fn mapping(
    kind: RecordKind,
    domain_field: &str,
    file_field: &str,
    file_type: FileType,
    length: u8,
    decimals: u8,
    ordinal: u16,
) -> FieldMapping {
    FieldMapping {
        kind,
        domain_field: domain_field.to_string(),
        file_field: file_field.to_string(),
        file_type,
        length,
        decimals,
        ordinal,
    }
}

/// The complete standard mapping table, one block per record kind
fn standard_mappings() -> Vec<FieldMapping> {
    use FileType::{Character, Date, Logical, Numeric};
    use RecordKind::{Area, AreaConfiguration, Bucket, Structure};

    let mut rows = Vec::new();

    // Geo info export: ident, name and the reprojected centroid
    rows.extend([
        mapping(Area, "ident", "GAFIDENT", Character, 24, 0, 0),
        mapping(Area, "name", "GAFNAAM", Character, 100, 0, 1),
        mapping(Area, "geometry", "X", Numeric, 12, 3, 2),
        mapping(Area, "geometry", "Y", Numeric, 12, 3, 3),
    ]);

    rows.extend([
        mapping(AreaConfiguration, "ident", "GAFIDENT", Character, 24, 0, 0),
        mapping(AreaConfiguration, "name", "GAFNAAM", Character, 100, 0, 1),
        mapping(AreaConfiguration, "organization", "OWNER", Character, 40, 0, 2),
        mapping(AreaConfiguration, "start_date", "STARTDATUM", Date, 8, 0, 3),
        mapping(AreaConfiguration, "initial_level", "INIPEIL", Numeric, 12, 2, 4),
        mapping(AreaConfiguration, "minimum_level", "MINPEIL", Numeric, 12, 2, 5),
        mapping(AreaConfiguration, "maximum_level", "MAXPEIL", Numeric, 12, 2, 6),
        mapping(AreaConfiguration, "chloride_precipitation", "CLNEERSLG", Numeric, 12, 5, 7),
        mapping(AreaConfiguration, "chloride_seepage", "CLKWEL", Numeric, 12, 5, 8),
        mapping(AreaConfiguration, "computed_seepage", "KWELBEREK", Logical, 1, 0, 9),
        mapping(AreaConfiguration, "precipitation", "NEERSLAG", Character, 30, 0, 10),
        mapping(AreaConfiguration, "evaporation", "VERDAMPING", Character, 30, 0, 11),
        mapping(AreaConfiguration, "seepage", "KWEL", Character, 30, 0, 12),
        mapping(AreaConfiguration, "infiltration", "WEGZIJGING", Character, 30, 0, 13),
    ]);

    rows.extend([
        mapping(Bucket, "configuration", "GAFIDENT", Character, 24, 0, 0),
        mapping(Bucket, "code", "GIDENT", Character, 24, 0, 1),
        mapping(Bucket, "name", "GNAAM", Character, 100, 0, 2),
        mapping(Bucket, "bucket_type", "GTYPE", Character, 12, 0, 3),
        mapping(Bucket, "surface", "OPPERVL", Numeric, 12, 1, 4),
        mapping(Bucket, "drainage_fraction", "DRAINFRAC", Numeric, 6, 3, 5),
        mapping(Bucket, "seepage", "KWELSTROOM", Character, 30, 0, 6),
    ]);

    rows.extend([
        mapping(Structure, "configuration", "GAFIDENT", Character, 24, 0, 0),
        mapping(Structure, "code", "KWKIDENT", Character, 24, 0, 1),
        mapping(Structure, "name", "KWKNAAM", Character, 100, 0, 2),
        mapping(Structure, "direction", "INUIT", Character, 4, 0, 3),
        mapping(Structure, "capacity", "KWKCAPAC", Numeric, 12, 2, 4),
        mapping(Structure, "fraction", "KWKFRAC", Numeric, 6, 3, 5),
        mapping(Structure, "pump_series", "POMPREEKS", Character, 30, 0, 6),
        mapping(Structure, "is_computed", "BEREKEND", Logical, 1, 0, 7),
    ]);

    rows
}

// =============================================================================
// Accessor Tables
// =============================================================================

const AREA_ACCESSORS: &[FieldAccessor<Area>] = &[
    FieldAccessor {
        domain_field: "ident",
        descriptor: FieldDescriptor::Text,
        get: |a| Some(DomainValue::Text(a.ident.clone())),
        set: |a, v| {
            a.ident = v.into_text("ident")?;
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "name",
        descriptor: FieldDescriptor::Text,
        get: |a| Some(DomainValue::Text(a.name.clone())),
        set: |a, v| {
            a.name = v.into_text("name")?;
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "geometry",
        descriptor: FieldDescriptor::Geometry,
        get: |a| a.geometry.clone().map(DomainValue::Geometry),
        set: |a, v| {
            a.geometry = Some(v.into_geometry("geometry")?);
            Ok(())
        },
    },
];

impl MappedRecord for Area {
    const KIND: RecordKind = RecordKind::Area;

    fn accessors() -> &'static [FieldAccessor<Self>] {
        AREA_ACCESSORS
    }
}

const AREA_CONFIGURATION_ACCESSORS: &[FieldAccessor<AreaConfiguration>] = &[
    FieldAccessor {
        domain_field: "ident",
        descriptor: FieldDescriptor::Text,
        get: |c| Some(DomainValue::Text(c.ident.clone())),
        set: |c, v| {
            c.ident = v.into_text("ident")?;
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "name",
        descriptor: FieldDescriptor::Text,
        get: |c| Some(DomainValue::Text(c.name.clone())),
        set: |c, v| {
            c.name = v.into_text("name")?;
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "organization",
        descriptor: FieldDescriptor::Organization,
        get: |c| Some(DomainValue::Organization(c.organization.clone())),
        set: |c, v| {
            c.organization = v.into_organization("organization")?;
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "start_date",
        descriptor: FieldDescriptor::Date,
        get: |c| c.start_date.map(DomainValue::Date),
        set: |c, v| {
            c.start_date = Some(v.into_date("start_date")?);
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "initial_level",
        descriptor: FieldDescriptor::Number,
        get: |c| c.initial_level.map(DomainValue::Number),
        set: |c, v| {
            c.initial_level = Some(v.into_number("initial_level")?);
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "minimum_level",
        descriptor: FieldDescriptor::Number,
        get: |c| c.minimum_level.map(DomainValue::Number),
        set: |c, v| {
            c.minimum_level = Some(v.into_number("minimum_level")?);
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "maximum_level",
        descriptor: FieldDescriptor::Number,
        get: |c| c.maximum_level.map(DomainValue::Number),
        set: |c, v| {
            c.maximum_level = Some(v.into_number("maximum_level")?);
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "chloride_precipitation",
        descriptor: FieldDescriptor::Number,
        get: |c| c.chloride_precipitation.map(DomainValue::Number),
        set: |c, v| {
            c.chloride_precipitation = Some(v.into_number("chloride_precipitation")?);
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "chloride_seepage",
        descriptor: FieldDescriptor::Number,
        get: |c| c.chloride_seepage.map(DomainValue::Number),
        set: |c, v| {
            c.chloride_seepage = Some(v.into_number("chloride_seepage")?);
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "computed_seepage",
        descriptor: FieldDescriptor::Flag,
        get: |c| c.computed_seepage.map(DomainValue::Flag),
        set: |c, v| {
            c.computed_seepage = Some(v.into_flag("computed_seepage")?);
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "precipitation",
        descriptor: FieldDescriptor::Timeseries,
        get: |c| c.precipitation.clone().map(DomainValue::Timeseries),
        set: |c, v| {
            c.precipitation = Some(v.into_timeseries("precipitation")?);
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "evaporation",
        descriptor: FieldDescriptor::Timeseries,
        get: |c| c.evaporation.clone().map(DomainValue::Timeseries),
        set: |c, v| {
            c.evaporation = Some(v.into_timeseries("evaporation")?);
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "seepage",
        descriptor: FieldDescriptor::Timeseries,
        get: |c| c.seepage.clone().map(DomainValue::Timeseries),
        set: |c, v| {
            c.seepage = Some(v.into_timeseries("seepage")?);
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "infiltration",
        descriptor: FieldDescriptor::Timeseries,
        get: |c| c.infiltration.clone().map(DomainValue::Timeseries),
        set: |c, v| {
            c.infiltration = Some(v.into_timeseries("infiltration")?);
            Ok(())
        },
    },
];

impl MappedRecord for AreaConfiguration {
    const KIND: RecordKind = RecordKind::AreaConfiguration;

    fn accessors() -> &'static [FieldAccessor<Self>] {
        AREA_CONFIGURATION_ACCESSORS
    }
}

const BUCKET_ACCESSORS: &[FieldAccessor<Bucket>] = &[
    FieldAccessor {
        domain_field: "configuration",
        descriptor: FieldDescriptor::ConfigurationRef,
        get: |b| Some(DomainValue::Text(b.configuration.clone())),
        set: |b, v| {
            b.configuration = v.into_text("configuration")?;
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "code",
        descriptor: FieldDescriptor::Text,
        get: |b| Some(DomainValue::Text(b.code.clone())),
        set: |b, v| {
            b.code = v.into_text("code")?;
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "name",
        descriptor: FieldDescriptor::Text,
        get: |b| Some(DomainValue::Text(b.name.clone())),
        set: |b, v| {
            b.name = v.into_text("name")?;
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "bucket_type",
        descriptor: FieldDescriptor::Code(CodeTable::BucketType),
        get: |b| b.bucket_type.clone().map(DomainValue::Code),
        set: |b, v| {
            b.bucket_type = Some(v.into_code("bucket_type")?);
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "surface",
        descriptor: FieldDescriptor::Number,
        get: |b| b.surface.map(DomainValue::Number),
        set: |b, v| {
            b.surface = Some(v.into_number("surface")?);
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "drainage_fraction",
        descriptor: FieldDescriptor::Number,
        get: |b| b.drainage_fraction.map(DomainValue::Number),
        set: |b, v| {
            b.drainage_fraction = Some(v.into_number("drainage_fraction")?);
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "seepage",
        descriptor: FieldDescriptor::Timeseries,
        get: |b| b.seepage.clone().map(DomainValue::Timeseries),
        set: |b, v| {
            b.seepage = Some(v.into_timeseries("seepage")?);
            Ok(())
        },
    },
];

impl MappedRecord for Bucket {
    const KIND: RecordKind = RecordKind::Bucket;

    fn accessors() -> &'static [FieldAccessor<Self>] {
        BUCKET_ACCESSORS
    }
}

const STRUCTURE_ACCESSORS: &[FieldAccessor<Structure>] = &[
    FieldAccessor {
        domain_field: "configuration",
        descriptor: FieldDescriptor::ConfigurationRef,
        get: |s| Some(DomainValue::Text(s.configuration.clone())),
        set: |s, v| {
            s.configuration = v.into_text("configuration")?;
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "code",
        descriptor: FieldDescriptor::Text,
        get: |s| Some(DomainValue::Text(s.code.clone())),
        set: |s, v| {
            s.code = v.into_text("code")?;
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "name",
        descriptor: FieldDescriptor::Text,
        get: |s| Some(DomainValue::Text(s.name.clone())),
        set: |s, v| {
            s.name = v.into_text("name")?;
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "direction",
        descriptor: FieldDescriptor::Code(CodeTable::FlowDirection),
        get: |s| s.direction.clone().map(DomainValue::Code),
        set: |s, v| {
            s.direction = Some(v.into_code("direction")?);
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "capacity",
        descriptor: FieldDescriptor::Number,
        get: |s| s.capacity.map(DomainValue::Number),
        set: |s, v| {
            s.capacity = Some(v.into_number("capacity")?);
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "fraction",
        descriptor: FieldDescriptor::Number,
        get: |s| s.fraction.map(DomainValue::Number),
        set: |s, v| {
            s.fraction = Some(v.into_number("fraction")?);
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "pump_series",
        descriptor: FieldDescriptor::Timeseries,
        get: |s| s.pump_series.clone().map(DomainValue::Timeseries),
        set: |s, v| {
            s.pump_series = Some(v.into_timeseries("pump_series")?);
            Ok(())
        },
    },
    FieldAccessor {
        domain_field: "is_computed",
        descriptor: FieldDescriptor::Flag,
        get: |s| Some(DomainValue::Flag(s.is_computed)),
        set: |s, v| {
            s.is_computed = v.into_flag("is_computed")?;
            Ok(())
        },
    },
];

impl MappedRecord for Structure {
    const KIND: RecordKind = RecordKind::Structure;

    fn accessors() -> &'static [FieldAccessor<Self>] {
        STRUCTURE_ACCESSORS
    }
}
