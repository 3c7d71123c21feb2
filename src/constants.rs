//! Application constants for the water balance configuration exchange.
//!
//! This module contains the domain limits, reserved code values and file
//! naming conventions shared between the codec, the exporter, the importer
//! and the validation pipeline.

// =============================================================================
// Geometry
// =============================================================================

/// Target spatial reference system for exported geometry (RD New /
/// Rijksdriehoek, the Dutch national grid). Geometry in any other system is
/// reprojected before its centroid is written out.
pub const TARGET_SRID: u32 = 28992;

/// File field names receiving the two components of a point geometry
pub const GEOMETRY_X_FIELD: &str = "X";
pub const GEOMETRY_Y_FIELD: &str = "Y";

// =============================================================================
// Import Limits
// =============================================================================

/// Maximum number of live buckets accepted per area configuration.
/// Rows beyond the cap are dropped without failing the import stage.
pub const MAX_BUCKETS_PER_CONFIGURATION: usize = 10;

/// Maximum number of live structures accepted per area configuration,
/// counting the two computed defaults.
pub const MAX_STRUCTURES_PER_CONFIGURATION: usize = 10;

/// Upper bound on the persisted per-submission audit message
pub const ACTION_LOG_MAX_LEN: usize = 256;

/// Configuration type tag carried by water balance submissions
pub const DEFAULT_CONFIG_TYPE: &str = "waterbalans";

// =============================================================================
// File Naming
// =============================================================================

/// Extension of the legacy exchange tables
pub const TABLE_FILE_EXTENSION: &str = "dbf";

/// Deterministic file stems per record kind, matching what the external
/// modeling tool expects to find in an exchange directory.
pub mod file_stems {
    pub const AREA: &str = "aanafvoergebieden";
    pub const AREA_CONFIGURATION: &str = "aanafvoer_waterbalans";
    pub const BUCKET: &str = "grondwatergebieden";
    pub const STRUCTURE: &str = "pumpingstations";
}

/// Literal written by older producers into character columns that carry no
/// value; treated as "no update" when read back.
pub const NO_VALUE_LITERAL: &str = "None";

// =============================================================================
// Code Tables
// =============================================================================

/// Flow direction codes for structures
pub mod flow_directions {
    /// Water flowing into the area
    pub const IN: &str = "in";

    /// Water flowing out of the area
    pub const OUT: &str = "uit";

    pub const ALL: &[&str] = &[IN, OUT];
}

/// Bucket type codes
pub mod bucket_types {
    /// Paved surface
    pub const PAVED: &str = "verhard";

    /// Unpaved surface
    pub const UNPAVED: &str = "onverhard";

    /// Drained surface
    pub const DRAINED: &str = "gedraineerd";

    /// Urban surface
    pub const URBAN: &str = "stedelijk";

    pub const ALL: &[&str] = &[PAVED, UNPAVED, DRAINED, URBAN];
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get the expected table filename for a record kind file stem
pub fn table_filename(stem: &str) -> String {
    format!("{}.{}", stem, TABLE_FILE_EXTENSION)
}

/// Truncate an audit message to the persisted bound, respecting character
/// boundaries
pub fn bound_action_log(message: &str) -> String {
    message.chars().take(ACTION_LOG_MAX_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_filename() {
        assert_eq!(
            table_filename(file_stems::AREA_CONFIGURATION),
            "aanafvoer_waterbalans.dbf"
        );
        assert_eq!(table_filename(file_stems::BUCKET), "grondwatergebieden.dbf");
    }

    #[test]
    fn test_bound_action_log() {
        let short = "stage failed";
        assert_eq!(bound_action_log(short), short);

        let long = "x".repeat(400);
        assert_eq!(bound_action_log(&long).len(), ACTION_LOG_MAX_LEN);
    }

    #[test]
    fn test_bound_action_log_multibyte() {
        // Truncation counts characters, not bytes
        let long = "é".repeat(300);
        let bounded = bound_action_log(&long);
        assert_eq!(bounded.chars().count(), ACTION_LOG_MAX_LEN);
    }

    #[test]
    fn test_code_tables_are_disjoint() {
        for code in flow_directions::ALL {
            assert!(!bucket_types::ALL.contains(code));
        }
    }
}
