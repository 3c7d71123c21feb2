//! Data models for the water balance configuration exchange
//!
//! This module contains the domain records participating in file exchange
//! (areas, area configurations, buckets and structures), the geometry and
//! time-series reference value types they carry, and the submission entry
//! tracked by the validation pipeline.

use crate::constants::{self, flow_directions};
use crate::error::{ExchangeError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

// =============================================================================
// Record Kinds
// =============================================================================

/// Domain entity classes participating in file exchange
///
/// Each kind maps to one tabular file with its own fixed schema derived
/// from the field mapping registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    /// Geographic area (geo info export only)
    Area,
    /// Water balance configuration of one area
    AreaConfiguration,
    /// Groundwater bucket owned by a configuration
    Bucket,
    /// Inlet/outlet structure owned by a configuration
    Structure,
}

impl RecordKind {
    /// All kinds in referential order: an area configuration must exist
    /// before its buckets and structures can be resolved.
    pub fn all() -> [RecordKind; 4] {
        [
            RecordKind::Area,
            RecordKind::AreaConfiguration,
            RecordKind::Bucket,
            RecordKind::Structure,
        ]
    }

    /// Deterministic file stem used when exporting this kind
    pub fn file_stem(&self) -> &'static str {
        match self {
            RecordKind::Area => constants::file_stems::AREA,
            RecordKind::AreaConfiguration => constants::file_stems::AREA_CONFIGURATION,
            RecordKind::Bucket => constants::file_stems::BUCKET,
            RecordKind::Structure => constants::file_stems::STRUCTURE,
        }
    }

    /// Default table filename for this kind
    pub fn table_filename(&self) -> String {
        constants::table_filename(self.file_stem())
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecordKind::Area => "Area",
            RecordKind::AreaConfiguration => "AreaConfiguration",
            RecordKind::Bucket => "Bucket",
            RecordKind::Structure => "Structure",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for RecordKind {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "Area" => Ok(RecordKind::Area),
            "AreaConfiguration" => Ok(RecordKind::AreaConfiguration),
            "Bucket" => Ok(RecordKind::Bucket),
            "Structure" => Ok(RecordKind::Structure),
            other => Err(ExchangeError::coercion(
                "record_kind",
                format!("unknown record kind '{}'", other),
            )),
        }
    }
}

// =============================================================================
// Geometry
// =============================================================================

/// Planar geometry carried by an area
///
/// The exchange format cannot represent shapes, so any geometry is reduced
/// to a point before writing: a polygon contributes its centroid after
/// reprojection to the target reference system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Point {
        x: f64,
        y: f64,
        srid: u32,
    },
    Polygon {
        /// Closed exterior ring; the last vertex does not repeat the first
        exterior: Vec<(f64, f64)>,
        srid: u32,
    },
}

impl Geometry {
    /// Spatial reference system identifier of this geometry
    pub fn srid(&self) -> u32 {
        match self {
            Geometry::Point { srid, .. } => *srid,
            Geometry::Polygon { srid, .. } => *srid,
        }
    }

    /// Centroid of the geometry as an (x, y) pair
    ///
    /// For polygons this is the area centroid; degenerate rings (fewer than
    /// three vertices, or zero signed area) fall back to the vertex mean.
    pub fn centroid(&self) -> (f64, f64) {
        match self {
            Geometry::Point { x, y, .. } => (*x, *y),
            Geometry::Polygon { exterior, .. } => polygon_centroid(exterior),
        }
    }
}

/// Area centroid of a simple polygon ring (shoelace formula)
fn polygon_centroid(exterior: &[(f64, f64)]) -> (f64, f64) {
    if exterior.is_empty() {
        return (0.0, 0.0);
    }
    if exterior.len() < 3 {
        return vertex_mean(exterior);
    }

    let mut doubled_area = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..exterior.len() {
        let (x0, y0) = exterior[i];
        let (x1, y1) = exterior[(i + 1) % exterior.len()];
        let cross = x0 * y1 - x1 * y0;
        doubled_area += cross;
        cx += (x0 + x1) * cross;
        cy += (y0 + y1) * cross;
    }

    if doubled_area.abs() < f64::EPSILON {
        return vertex_mean(exterior);
    }

    let factor = 1.0 / (3.0 * doubled_area);
    (cx * factor, cy * factor)
}

fn vertex_mean(vertices: &[(f64, f64)]) -> (f64, f64) {
    let n = vertices.len() as f64;
    let (sx, sy) = vertices
        .iter()
        .fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
    (sx / n, sy / n)
}

// =============================================================================
// Time Series Reference
// =============================================================================

/// Reference to one row of the external time-series administration
///
/// Encoded in the exchange format as the composite string
/// `"<location-id>,<parameter-id>,<series-row-id>"`. Only the row id is
/// authoritative: decoding resolves the row by id and does not check the
/// other two components against the resolved record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesRef {
    pub location_id: String,
    pub parameter_id: String,
    pub row_id: i64,
}

impl TimeseriesRef {
    pub fn new(
        location_id: impl Into<String>,
        parameter_id: impl Into<String>,
        row_id: i64,
    ) -> Self {
        Self {
            location_id: location_id.into(),
            parameter_id: parameter_id.into(),
            row_id,
        }
    }
}

// =============================================================================
// Code Tables
// =============================================================================

/// Row of the bucket type code table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketTypeCode {
    /// Short code written into the exchange file
    pub code: String,
    pub description: String,
}

/// Row of the flow direction code table (in/out)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDirectionCode {
    /// Short code written into the exchange file
    pub code: String,
    /// Presentation order in the external tool
    pub index: i32,
    pub description: String,
}

// =============================================================================
// Area
// =============================================================================

/// Geographic class of an area
///
/// KRW water bodies share the area administration but are never exported to
/// the modeling tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AreaClass {
    /// Supply/drainage area participating in the water balance
    DrainageBasin,
    /// Reserved class excluded from exchange
    KrwWaterBody,
}

/// Geographic area owning at most one water balance configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    /// Stable external identifier
    pub ident: String,

    /// Human-readable area name
    pub name: String,

    /// Display name of the owning organization
    pub organization: String,

    /// Geographic class; the reserved class is never exported
    pub area_class: AreaClass,

    /// Area geometry, reduced to a reprojected centroid on export
    pub geometry: Option<Geometry>,

    /// Soft-delete flag
    pub deleted: bool,
}

impl Area {
    pub fn new(
        ident: impl Into<String>,
        name: impl Into<String>,
        organization: impl Into<String>,
    ) -> Self {
        Self {
            ident: ident.into(),
            name: name.into(),
            organization: organization.into(),
            area_class: AreaClass::DrainageBasin,
            geometry: None,
            deleted: false,
        }
    }

    /// Validate identity fields
    pub fn validate(&self) -> Result<()> {
        if self.ident.trim().is_empty() {
            return Err(ExchangeError::coercion("ident", "area ident cannot be empty"));
        }
        Ok(())
    }
}

// =============================================================================
// Area Configuration
// =============================================================================

/// Water balance configuration of one area
///
/// Carries the hydrological parameters and the time-series references the
/// modeling tool consumes. Owns a set of buckets and structures; those are
/// linked back by the configuration ident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaConfiguration {
    /// Stable external identifier, shared with the owning area
    pub ident: String,

    /// Human-readable configuration name
    pub name: String,

    /// Display name of the owning organization
    pub organization: String,

    /// First day covered by the balance
    pub start_date: Option<NaiveDate>,

    /// Initial water level (m NAP)
    pub initial_level: Option<f64>,

    /// Minimum water level (m NAP)
    pub minimum_level: Option<f64>,

    /// Maximum water level (m NAP)
    pub maximum_level: Option<f64>,

    /// Chloride concentration of precipitation (mg/l)
    pub chloride_precipitation: Option<f64>,

    /// Chloride concentration of seepage (mg/l)
    pub chloride_seepage: Option<f64>,

    /// Whether seepage is computed rather than measured
    pub computed_seepage: Option<bool>,

    /// Precipitation series
    pub precipitation: Option<TimeseriesRef>,

    /// Evaporation series
    pub evaporation: Option<TimeseriesRef>,

    /// Seepage series
    pub seepage: Option<TimeseriesRef>,

    /// Infiltration series
    pub infiltration: Option<TimeseriesRef>,

    /// Provenance stamp of the last import that touched this record
    pub meta_info: Option<String>,

    /// Soft-delete flag
    pub deleted: bool,
}

impl AreaConfiguration {
    pub fn new(
        ident: impl Into<String>,
        name: impl Into<String>,
        organization: impl Into<String>,
    ) -> Self {
        Self {
            ident: ident.into(),
            name: name.into(),
            organization: organization.into(),
            start_date: None,
            initial_level: None,
            minimum_level: None,
            maximum_level: None,
            chloride_precipitation: None,
            chloride_seepage: None,
            computed_seepage: None,
            precipitation: None,
            evaporation: None,
            seepage: None,
            infiltration: None,
            meta_info: None,
            deleted: false,
        }
    }

    /// Validate identity and level ordering
    pub fn validate(&self) -> Result<()> {
        if self.ident.trim().is_empty() {
            return Err(ExchangeError::coercion(
                "ident",
                "configuration ident cannot be empty",
            ));
        }
        if let (Some(min), Some(max)) = (self.minimum_level, self.maximum_level) {
            if min > max {
                return Err(ExchangeError::coercion(
                    "minimum_level",
                    format!("minimum level {} above maximum level {}", min, max),
                ));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Bucket
// =============================================================================

/// Groundwater bucket owned by an area configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    /// Generated code, stable across imports
    pub code: String,

    /// Human-readable bucket name
    pub name: String,

    /// Ident of the owning area configuration
    pub configuration: String,

    /// Bucket type code (code table reference)
    pub bucket_type: Option<String>,

    /// Surface area (m2)
    pub surface: Option<f64>,

    /// Fraction of the surface that is drained, in [0, 1]
    pub drainage_fraction: Option<f64>,

    /// Seepage series for this bucket
    pub seepage: Option<TimeseriesRef>,

    /// Soft-delete flag
    pub deleted: bool,
}

impl Bucket {
    pub fn new(code: impl Into<String>, configuration: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: String::new(),
            configuration: configuration.into(),
            bucket_type: None,
            surface: None,
            drainage_fraction: None,
            seepage: None,
            deleted: false,
        }
    }

    /// Validate identity and fraction range
    pub fn validate(&self) -> Result<()> {
        if self.code.trim().is_empty() {
            return Err(ExchangeError::coercion("code", "bucket code cannot be empty"));
        }
        if let Some(fraction) = self.drainage_fraction {
            if !(0.0..=1.0).contains(&fraction) {
                return Err(ExchangeError::coercion(
                    "drainage_fraction",
                    format!("fraction {} outside [0, 1]", fraction),
                ));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Structure
// =============================================================================

/// Inlet/outlet structure owned by an area configuration
///
/// Every configuration carries two computed defaults (one per flow
/// direction) marking the balance terms the tool derives itself. Those are
/// protected: bulk deactivation never touches them and imported rows can
/// update their parameters but never their identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    /// Generated code, stable across imports
    pub code: String,

    /// Human-readable structure name
    pub name: String,

    /// Ident of the owning area configuration
    pub configuration: String,

    /// Flow direction code (code table reference)
    pub direction: Option<String>,

    /// Pump capacity (m3/day)
    pub capacity: Option<f64>,

    /// Fraction of the flow attributed to this structure, in [0, 1]
    pub fraction: Option<f64>,

    /// Pumped-volume series
    pub pump_series: Option<TimeseriesRef>,

    /// Protected system-generated record
    pub is_computed: bool,

    /// Soft-delete flag
    pub deleted: bool,
}

impl Structure {
    pub fn new(code: impl Into<String>, configuration: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: String::new(),
            configuration: configuration.into(),
            direction: None,
            capacity: None,
            fraction: None,
            pump_series: None,
            is_computed: false,
            deleted: false,
        }
    }

    /// Computed default for one flow direction
    pub fn computed_default(configuration: &str, direction: &str) -> Self {
        let label = if direction == flow_directions::IN {
            "Inlaat (berekend)"
        } else {
            "Uitlaat (berekend)"
        };
        Self {
            code: format!("{}_{}", configuration, direction),
            name: label.to_string(),
            configuration: configuration.to_string(),
            direction: Some(direction.to_string()),
            capacity: None,
            fraction: None,
            pump_series: None,
            is_computed: true,
            deleted: false,
        }
    }

    /// Validate identity and fraction range
    pub fn validate(&self) -> Result<()> {
        if self.code.trim().is_empty() {
            return Err(ExchangeError::coercion(
                "code",
                "structure code cannot be empty",
            ));
        }
        if let Some(fraction) = self.fraction {
            if !(0.0..=1.0).contains(&fraction) {
                return Err(ExchangeError::coercion(
                    "fraction",
                    format!("fraction {} outside [0, 1]", fraction),
                ));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Submission
// =============================================================================

/// Lifecycle state of a submission in the validation queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubmissionStatus {
    /// Pending: picked up by the next pipeline cycle
    Validate,
    /// Failed at least one import stage; retried next cycle
    Keep,
    /// Marked for unconditional removal before any import attempt
    Reject,
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SubmissionStatus::Validate => "VALIDATE",
            SubmissionStatus::Keep => "KEEP",
            SubmissionStatus::Reject => "REJECT",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for SubmissionStatus {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "VALIDATE" => Ok(SubmissionStatus::Validate),
            "KEEP" => Ok(SubmissionStatus::Keep),
            "REJECT" => Ok(SubmissionStatus::Reject),
            other => Err(ExchangeError::coercion(
                "status",
                format!("unknown submission status '{}'", other),
            )),
        }
    }
}

/// Externally-supplied candidate configuration awaiting validation
///
/// Created by the delivery channel, mutated by the pipeline (status
/// transitions and audit text), deleted by the pipeline on full success or
/// during the REJECT cleanup pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Queue-assigned identifier
    pub id: u64,

    /// Display name of the submitting organization
    pub organization: String,

    /// Configuration type tag, filtering which pipeline picks this up
    pub config_type: String,

    /// Provenance stamp forwarded to imported records
    pub meta_info: Option<String>,

    /// Path of the area-configuration table
    pub area_path: Option<PathBuf>,

    /// Path of the buckets table
    pub buckets_path: Option<PathBuf>,

    /// Path of the structures table
    pub structures_path: Option<PathBuf>,

    /// Lifecycle state
    pub status: SubmissionStatus,

    /// Bounded audit text describing the last failure
    pub action_log: String,
}

impl Submission {
    pub fn new(
        id: u64,
        organization: impl Into<String>,
        config_type: impl Into<String>,
    ) -> Self {
        Self {
            id,
            organization: organization.into(),
            config_type: config_type.into(),
            meta_info: None,
            area_path: None,
            buckets_path: None,
            structures_path: None,
            status: SubmissionStatus::Validate,
            action_log: String::new(),
        }
    }

    /// Whether all three exchange files were delivered
    pub fn has_files(&self) -> bool {
        self.area_path.is_some() && self.buckets_path.is_some() && self.structures_path.is_some()
    }

    /// Transition to KEEP with a bounded audit message
    pub fn record_failure(&mut self, message: &str) {
        self.status = SubmissionStatus::Keep;
        self.action_log = if message.is_empty() {
            "Error during validation".to_string()
        } else {
            constants::bound_action_log(message)
        };
    }
}
