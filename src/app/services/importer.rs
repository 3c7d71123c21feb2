//! Three-stage configuration importer
//!
//! Stage 1 resolves or creates the area configuration named by the file,
//! stage 2 rebuilds its buckets, stage 3 its structures. The stages are
//! ordered: buckets and structures need the configuration resolved by
//! stage 1. Every stage reports a bounded outcome message suitable for the
//! persisted audit log; decode problems skip the offending field or row and
//! are accumulated into the success flag instead of aborting the file.

use crate::app::adapters::reprojection::PassthroughReprojector;
use crate::app::adapters::repository::{
    all_records, get_record, put_record, resolve_or_create, ReferenceResolver, Repository,
};
use crate::app::models::{AreaConfiguration, Bucket, Geometry, RecordKind, Structure};
use crate::app::services::dbf_table::{FileValue, reader::RawRow};
use crate::app::services::field_mapping::{
    FieldDescriptor, FieldMapping, MappedRecord, MappingRegistry,
};
use crate::app::services::table_codec::TableCodec;
use crate::app::services::value_coercer::{self, DomainValue};
use crate::constants::{
    bound_action_log, flow_directions, GEOMETRY_X_FIELD, GEOMETRY_Y_FIELD,
    MAX_BUCKETS_PER_CONFIGURATION, MAX_STRUCTURES_PER_CONFIGURATION, TARGET_SRID,
};
use crate::error::Result;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

// =============================================================================
// Stage Outcomes
// =============================================================================

/// Result of one import stage
///
/// The message is already bounded for the audit log; failure never
/// propagates as an error past the stage boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
    pub success: bool,
    pub message: String,
}

impl StageOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: bound_action_log(&message.into()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: bound_action_log(&message.into()),
        }
    }
}

/// Running tally of one stage's row processing
#[derive(Debug, Default)]
struct StageTally {
    imported: usize,
    skipped_rows: usize,
    rejected_fields: usize,
}

impl StageTally {
    fn clean(&self) -> bool {
        self.skipped_rows == 0 && self.rejected_fields == 0
    }

    fn describe(&self, what: &str) -> String {
        if self.clean() {
            format!("Imported {} {}(s)", self.imported, what)
        } else {
            format!(
                "Imported {} {}(s); {} row(s) skipped, {} field(s) rejected",
                self.imported, what, self.skipped_rows, self.rejected_fields
            )
        }
    }
}

// =============================================================================
// Importer
// =============================================================================

/// Importer for one submission or one ad-hoc file set
pub struct ConfigurationImporter<'a> {
    registry: &'a MappingRegistry,
    organization: Option<String>,
    meta_info: Option<String>,
    resolved_configuration: Option<String>,
}

impl<'a> ConfigurationImporter<'a> {
    pub fn new(registry: &'a MappingRegistry) -> Self {
        Self {
            registry,
            organization: None,
            meta_info: None,
            resolved_configuration: None,
        }
    }

    /// Organization stamped on configurations created by stage 1
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// Provenance stamp forwarded to imported configurations
    pub fn with_meta_info(mut self, meta_info: Option<String>) -> Self {
        self.meta_info = meta_info;
        self
    }

    /// Configuration ident resolved by the last stage-1 run
    pub fn resolved_configuration(&self) -> Option<&str> {
        self.resolved_configuration.as_deref()
    }

    /// Stage 1: resolve or create the area configuration and apply its
    /// field values
    pub fn import_area_configuration<S: Repository>(
        &mut self,
        repo: &mut S,
        path: &Path,
    ) -> StageOutcome {
        let kind = RecordKind::AreaConfiguration;
        let (mappings, rows) = match self.open(kind, path) {
            Ok(opened) => opened,
            Err(e) => return StageOutcome::failed(format!("Area configuration import: {}", e)),
        };
        let ident_field = match self.registry.file_field_for(kind, "ident") {
            Some(field) => field.to_string(),
            None => return StageOutcome::failed("Area configuration import: ident not mapped"),
        };

        let mut tally = StageTally::default();
        for row_result in rows {
            let row = match row_result {
                Ok(row) => row,
                Err(e) => {
                    warn!("Skipping unreadable configuration row: {}", e);
                    tally.skipped_rows += 1;
                    continue;
                }
            };
            let Some(ident) = row_key(&row, &ident_field) else {
                warn!("Skipping configuration row without ident");
                tally.skipped_rows += 1;
                continue;
            };

            let organization = self.organization.clone().unwrap_or_default();
            let mut config = resolve_or_create(repo, &ident, || {
                AreaConfiguration::new(ident.clone(), ident.clone(), organization)
            });
            if !apply_row(&mut config, &row, &mappings, &*repo) {
                tally.rejected_fields += 1;
            }
            config.deleted = false;
            if self.meta_info.is_some() {
                config.meta_info = self.meta_info.clone();
            }
            put_record(repo, config);
            ensure_default_structures(repo, &ident);

            if self.resolved_configuration.is_none() {
                self.resolved_configuration = Some(ident.clone());
            }
            tally.imported += 1;
            debug!("Imported area configuration '{}'", ident);
        }

        if tally.imported == 0 {
            return StageOutcome::failed(format!(
                "Area configuration import: no usable rows in {}",
                path.display()
            ));
        }
        if tally.clean() {
            StageOutcome::ok(tally.describe("area configuration"))
        } else {
            StageOutcome::failed(tally.describe("area configuration"))
        }
    }

    /// Stage 2: rebuild the configuration's buckets, capped at ten live
    /// records
    pub fn import_buckets<S: Repository>(
        &self,
        repo: &mut S,
        path: &Path,
        configuration: &str,
    ) -> StageOutcome {
        let kind = RecordKind::Bucket;
        if get_record::<AreaConfiguration, _>(repo, configuration).is_none() {
            return StageOutcome::failed(format!(
                "Bucket import: unknown area configuration '{}'",
                configuration
            ));
        }
        let (mappings, rows) = match self.open(kind, path) {
            Ok(opened) => opened,
            Err(e) => return StageOutcome::failed(format!("Bucket import: {}", e)),
        };
        let code_field = match self.registry.file_field_for(kind, "code") {
            Some(field) => field.to_string(),
            None => return StageOutcome::failed("Bucket import: code not mapped"),
        };

        // Bulk deactivation: the delivered file is the complete bucket set
        for mut bucket in all_records::<Bucket, _>(repo)
            .into_iter()
            .filter(|b| b.configuration == configuration && !b.deleted)
        {
            bucket.deleted = true;
            put_record(repo, bucket);
        }

        let mut tally = StageTally::default();
        let mut live = 0usize;
        let mut cap_reached = false;
        for row_result in rows {
            let row = match row_result {
                Ok(row) => row,
                Err(e) => {
                    warn!("Skipping unreadable bucket row: {}", e);
                    tally.skipped_rows += 1;
                    continue;
                }
            };
            let Some(code) = row_key(&row, &code_field) else {
                warn!("Skipping bucket row without code");
                tally.skipped_rows += 1;
                continue;
            };
            if live >= MAX_BUCKETS_PER_CONFIGURATION {
                // Soft cap: excess rows are dropped, the stage still counts
                // as a success
                if !cap_reached {
                    warn!(
                        "Bucket cap of {} reached for '{}'; dropping further rows",
                        MAX_BUCKETS_PER_CONFIGURATION, configuration
                    );
                    cap_reached = true;
                }
                continue;
            }

            let mut bucket = resolve_or_create(repo, &code, || {
                Bucket::new(code.clone(), configuration.to_string())
            });
            if !apply_row(&mut bucket, &row, &mappings, &*repo) {
                tally.rejected_fields += 1;
            }
            // The stage-1 configuration wins over whatever the row carries
            bucket.configuration = configuration.to_string();
            bucket.deleted = false;
            put_record(repo, bucket);
            live += 1;
            tally.imported += 1;
        }

        if tally.clean() {
            StageOutcome::ok(tally.describe("bucket"))
        } else {
            StageOutcome::failed(tally.describe("bucket"))
        }
    }

    /// Stage 3: rebuild the configuration's structures, preserving the two
    /// computed defaults
    pub fn import_structures<S: Repository>(
        &self,
        repo: &mut S,
        path: &Path,
        configuration: &str,
    ) -> StageOutcome {
        let kind = RecordKind::Structure;
        if get_record::<AreaConfiguration, _>(repo, configuration).is_none() {
            return StageOutcome::failed(format!(
                "Structure import: unknown area configuration '{}'",
                configuration
            ));
        }
        let (mappings, rows) = match self.open(kind, path) {
            Ok(opened) => opened,
            Err(e) => return StageOutcome::failed(format!("Structure import: {}", e)),
        };
        let code_field = match self.registry.file_field_for(kind, "code") {
            Some(field) => field.to_string(),
            None => return StageOutcome::failed("Structure import: code not mapped"),
        };

        // Bulk deactivation never touches the computed defaults
        let mut protected = HashSet::new();
        for mut structure in all_records::<Structure, _>(repo)
            .into_iter()
            .filter(|s| s.configuration == configuration && !s.deleted)
        {
            if structure.is_computed {
                protected.insert(structure.code.clone());
                continue;
            }
            structure.deleted = true;
            put_record(repo, structure);
        }

        let mut tally = StageTally::default();
        let mut live = protected.len();
        let mut cap_reached = false;
        for row_result in rows {
            let row = match row_result {
                Ok(row) => row,
                Err(e) => {
                    warn!("Skipping unreadable structure row: {}", e);
                    tally.skipped_rows += 1;
                    continue;
                }
            };
            let Some(code) = row_key(&row, &code_field) else {
                warn!("Skipping structure row without code");
                tally.skipped_rows += 1;
                continue;
            };

            if protected.contains(&code) {
                // Row explicitly targets a computed default: parameters may
                // change, identity and liveness may not
                let Some(original) = get_record::<Structure, _>(repo, &code) else {
                    tally.skipped_rows += 1;
                    continue;
                };
                let mut structure = original.clone();
                if !apply_row(&mut structure, &row, &mappings, &*repo) {
                    tally.rejected_fields += 1;
                }
                structure.code = original.code;
                structure.configuration = original.configuration;
                structure.direction = original.direction;
                structure.is_computed = true;
                structure.deleted = false;
                put_record(repo, structure);
                tally.imported += 1;
                continue;
            }

            if live >= MAX_STRUCTURES_PER_CONFIGURATION {
                if !cap_reached {
                    warn!(
                        "Structure cap of {} reached for '{}'; dropping further rows",
                        MAX_STRUCTURES_PER_CONFIGURATION, configuration
                    );
                    cap_reached = true;
                }
                continue;
            }

            let mut structure = resolve_or_create(repo, &code, || {
                Structure::new(code.clone(), configuration.to_string())
            });
            if !apply_row(&mut structure, &row, &mappings, &*repo) {
                tally.rejected_fields += 1;
            }
            structure.configuration = configuration.to_string();
            structure.deleted = false;
            put_record(repo, structure);
            live += 1;
            tally.imported += 1;
        }

        if tally.clean() {
            StageOutcome::ok(tally.describe("structure"))
        } else {
            StageOutcome::failed(tally.describe("structure"))
        }
    }

    /// Open a table for one kind and clone the mapping rows the row loop
    /// needs
    fn open(
        &self,
        kind: RecordKind,
        path: &Path,
    ) -> Result<(Vec<FieldMapping>, crate::app::services::dbf_table::DbfReader)> {
        // Reading never reprojects; the passthrough stand-in is inert here
        let codec = TableCodec::new(self.registry, &PassthroughReprojector);
        let reader = codec.read(kind, path)?;
        let mappings = self.registry.mappings_for(kind)?.to_vec();
        Ok((mappings, reader))
    }
}

/// Ensure the two computed default structures (one per flow direction)
/// exist for a configuration. Safe to call repeatedly.
pub fn ensure_default_structures<S: Repository>(repo: &mut S, configuration: &str) {
    for direction in flow_directions::ALL {
        let code = format!("{}_{}", configuration, direction);
        resolve_or_create(repo, &code, || {
            Structure::computed_default(configuration, direction)
        });
    }
}

// =============================================================================
// Row Application
// =============================================================================

/// Extract a non-empty key column from a raw row
fn row_key(row: &RawRow, field: &str) -> Option<String> {
    match row.get(field) {
        Some(FileValue::Character(s)) if !s.is_empty() && s != crate::constants::NO_VALUE_LITERAL => {
            Some(s.clone())
        }
        _ => None,
    }
}

/// Apply a raw row onto a record through its accessor table
///
/// Returns `false` when at least one field had to be skipped; the record is
/// still updated with everything that decoded cleanly.
fn apply_row<R: MappedRecord + 'static>(
    record: &mut R,
    row: &RawRow,
    mappings: &[FieldMapping],
    resolver: &dyn ReferenceResolver,
) -> bool {
    let mut ok = true;
    let mut geometry_done = false;

    for mapping in mappings {
        let Some(accessor) = R::accessor(&mapping.domain_field) else {
            warn!("No accessor for mapped field '{}'", mapping.domain_field);
            ok = false;
            continue;
        };

        if accessor.descriptor == FieldDescriptor::Geometry {
            // The X/Y columns decode as one point; handle the pair once
            if geometry_done {
                continue;
            }
            geometry_done = true;
            match decode_geometry_pair(row, resolver) {
                Ok(Some(point)) => {
                    if let Err(e) = (accessor.set)(record, DomainValue::Geometry(point)) {
                        warn!("Skipping field '{}': {}", mapping.domain_field, e);
                        ok = false;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Skipping field '{}': {}", mapping.domain_field, e);
                    ok = false;
                }
            }
            continue;
        }

        let Some(raw) = row.get(mapping.file_field.as_str()) else {
            continue; // Column absent from the delivered file
        };
        match value_coercer::decode(raw, &mapping.domain_field, accessor.descriptor, resolver) {
            Ok(Some(value)) => {
                if let Err(e) = (accessor.set)(record, value) {
                    warn!("Skipping field '{}': {}", mapping.domain_field, e);
                    ok = false;
                }
            }
            Ok(None) => {} // Blank or "None": leave the field untouched
            Err(e) => {
                warn!("Skipping field '{}': {}", mapping.domain_field, e);
                ok = false;
            }
        }
    }
    ok
}

/// Reassemble the X/Y component columns into a point in the target system
fn decode_geometry_pair(row: &RawRow, resolver: &dyn ReferenceResolver) -> Result<Option<Geometry>> {
    let component = |field: &str| -> Result<Option<f64>> {
        match row.get(field) {
            None => Ok(None),
            Some(raw) => {
                match value_coercer::decode(raw, field, FieldDescriptor::Geometry, resolver)? {
                    Some(DomainValue::Number(n)) => Ok(Some(n)),
                    _ => Ok(None),
                }
            }
        }
    };

    match (component(GEOMETRY_X_FIELD)?, component(GEOMETRY_Y_FIELD)?) {
        (Some(x), Some(y)) => Ok(Some(Geometry::Point {
            x,
            y,
            srid: TARGET_SRID,
        })),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::adapters::repository::MemoryRepository;
    use tempfile::TempDir;

    fn write_configuration_file(dir: &Path, registry: &MappingRegistry) -> std::path::PathBuf {
        let codec = TableCodec::new(registry, &PassthroughReprojector);
        let mut config = AreaConfiguration::new("GAF42", "Polder test", "Waternet");
        config.minimum_level = Some(-2.4);
        let path = dir.join("aanafvoer_waterbalans.dbf");
        assert!(codec.write(&[config], dir, "aanafvoer_waterbalans.dbf"));
        path
    }

    #[test]
    fn test_stage_one_creates_configuration_and_defaults() {
        let dir = TempDir::new().unwrap();
        let registry = MappingRegistry::standard();
        let mut repo = MemoryRepository::with_default_codes();
        let path = write_configuration_file(dir.path(), &registry);

        let mut importer =
            ConfigurationImporter::new(&registry).with_meta_info(Some("MARK".to_string()));
        let outcome = importer.import_area_configuration(&mut repo, &path);

        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(importer.resolved_configuration(), Some("GAF42"));

        let config = get_record::<AreaConfiguration, _>(&repo, "GAF42").unwrap();
        assert_eq!(config.minimum_level, Some(-2.4));
        assert_eq!(config.meta_info.as_deref(), Some("MARK"));

        // Two computed defaults, one per direction
        let computed: Vec<Structure> = all_records::<Structure, _>(&repo)
            .into_iter()
            .filter(|s| s.is_computed)
            .collect();
        assert_eq!(computed.len(), 2);
    }

    #[test]
    fn test_stage_one_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let registry = MappingRegistry::standard();
        let mut repo = MemoryRepository::with_default_codes();
        let path = write_configuration_file(dir.path(), &registry);

        let mut importer = ConfigurationImporter::new(&registry);
        assert!(importer.import_area_configuration(&mut repo, &path).success);
        assert!(importer.import_area_configuration(&mut repo, &path).success);

        // Same external identifier: updated, not duplicated
        assert_eq!(all_records::<AreaConfiguration, _>(&repo).len(), 1);
        assert_eq!(
            all_records::<Structure, _>(&repo)
                .iter()
                .filter(|s| s.is_computed)
                .count(),
            2
        );
    }

    #[test]
    fn test_stage_one_missing_file_fails_with_message() {
        let registry = MappingRegistry::standard();
        let mut repo = MemoryRepository::with_default_codes();

        let mut importer = ConfigurationImporter::new(&registry);
        let outcome =
            importer.import_area_configuration(&mut repo, Path::new("/nonexistent/area.dbf"));

        assert!(!outcome.success);
        assert!(!outcome.message.is_empty());
        assert!(outcome.message.len() <= crate::constants::ACTION_LOG_MAX_LEN);
    }

    #[test]
    fn test_buckets_require_known_configuration() {
        let dir = TempDir::new().unwrap();
        let registry = MappingRegistry::standard();
        let mut repo = MemoryRepository::with_default_codes();

        let codec = TableCodec::new(&registry, &PassthroughReprojector);
        let bucket = Bucket::new("b1", "GAF99");
        assert!(codec.write(&[bucket], dir.path(), "grondwatergebieden.dbf"));

        let importer = ConfigurationImporter::new(&registry);
        let outcome = importer.import_buckets(
            &mut repo,
            &dir.path().join("grondwatergebieden.dbf"),
            "GAF99",
        );
        assert!(!outcome.success);
        assert!(outcome.message.contains("GAF99"));
    }

    #[test]
    fn test_bucket_import_replaces_previous_set() {
        let dir = TempDir::new().unwrap();
        let registry = MappingRegistry::standard();
        let mut repo = MemoryRepository::with_default_codes();
        put_record(
            &mut repo,
            AreaConfiguration::new("GAF42", "Polder", "Waternet"),
        );
        // A bucket from an earlier delivery, absent from the new file
        put_record(&mut repo, Bucket::new("stale", "GAF42"));

        let codec = TableCodec::new(&registry, &PassthroughReprojector);
        let mut fresh = Bucket::new("fresh", "GAF42");
        fresh.surface = Some(100.0);
        assert!(codec.write(&[fresh], dir.path(), "grondwatergebieden.dbf"));

        let importer = ConfigurationImporter::new(&registry);
        let outcome = importer.import_buckets(
            &mut repo,
            &dir.path().join("grondwatergebieden.dbf"),
            "GAF42",
        );
        assert!(outcome.success, "{}", outcome.message);

        let stale = get_record::<Bucket, _>(&repo, "stale").unwrap();
        assert!(stale.deleted);
        let fresh = get_record::<Bucket, _>(&repo, "fresh").unwrap();
        assert!(!fresh.deleted);
        assert_eq!(fresh.surface, Some(100.0));
    }

    #[test]
    fn test_unresolvable_reference_marks_stage_failed_but_continues() {
        let dir = TempDir::new().unwrap();
        let registry = MappingRegistry::standard();
        let mut repo = MemoryRepository::with_default_codes();
        put_record(
            &mut repo,
            AreaConfiguration::new("GAF42", "Polder", "Waternet"),
        );

        // The exporting store knows series 101; the importing store does not
        let mut exporting = MemoryRepository::with_default_codes();
        exporting.insert_timeseries(crate::app::models::TimeseriesRef::new("LOC1", "P", 101));
        let codec = TableCodec::new(&registry, &PassthroughReprojector);
        let mut bucket = Bucket::new("b1", "GAF42");
        bucket.surface = Some(12.5);
        bucket.seepage = Some(crate::app::models::TimeseriesRef::new("LOC1", "P", 101));
        assert!(codec.write(&[bucket], dir.path(), "grondwatergebieden.dbf"));

        let importer = ConfigurationImporter::new(&registry);
        let outcome = importer.import_buckets(
            &mut repo,
            &dir.path().join("grondwatergebieden.dbf"),
            "GAF42",
        );

        // Partial success is explicit: the row landed minus the bad field
        assert!(!outcome.success);
        let imported = get_record::<Bucket, _>(&repo, "b1").unwrap();
        assert_eq!(imported.surface, Some(12.5));
        assert_eq!(imported.seepage, None);
    }

    #[test]
    fn test_ensure_default_structures_is_reentrant() {
        let mut repo = MemoryRepository::with_default_codes();
        ensure_default_structures(&mut repo, "GAF42");
        ensure_default_structures(&mut repo, "GAF42");
        assert_eq!(all_records::<Structure, _>(&repo).len(), 2);
    }

    #[test]
    fn test_stage_outcomes_are_bounded() {
        let outcome = StageOutcome::failed("x".repeat(1000));
        assert_eq!(outcome.message.len(), crate::constants::ACTION_LOG_MAX_LEN);
    }
}
