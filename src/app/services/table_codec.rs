//! Mapping-driven codec between domain records and table files
//!
//! Serialization walks the mapping rows in ordinal order, pulls each domain
//! value through its typed accessor and the value coercer, and writes one
//! table row per record. The write contract is deliberately blunt: any
//! error during the whole operation aborts the file and reports `false`;
//! missing directories, empty filenames and empty record sets are logged
//! failures, never panics surfaced to callers.

use crate::app::adapters::reprojection::Reprojector;
use crate::app::models::RecordKind;
use crate::app::services::dbf_table::{DbfReader, DbfWriter};
use crate::app::services::field_mapping::{MappedRecord, MappingRegistry};
use crate::app::services::value_coercer;
use crate::error::{ExchangeError, Result};
use std::path::Path;
use tracing::{debug, error, warn};

/// Codec over one mapping registry and one reprojection capability
pub struct TableCodec<'a> {
    registry: &'a MappingRegistry,
    reprojector: &'a dyn Reprojector,
}

impl<'a> TableCodec<'a> {
    pub fn new(registry: &'a MappingRegistry, reprojector: &'a dyn Reprojector) -> Self {
        Self {
            registry,
            reprojector,
        }
    }

    pub fn registry(&self) -> &MappingRegistry {
        self.registry
    }

    /// Write all records of one kind into `directory/filename`
    ///
    /// Returns `true` only when the complete file was written and moved
    /// into place. No partial file survives a failure.
    pub fn write<R: MappedRecord>(&self, records: &[R], directory: &Path, filename: &str) -> bool {
        match self.try_write(records, directory, filename) {
            Ok(count) => {
                debug!(
                    "Wrote {} {} record(s) to {}",
                    count,
                    R::KIND,
                    directory.join(filename).display()
                );
                true
            }
            Err(e) => {
                error!(
                    "Export of {} to {} failed: {}",
                    R::KIND,
                    directory.join(filename).display(),
                    e
                );
                false
            }
        }
    }

    fn try_write<R: MappedRecord + 'static>(
        &self,
        records: &[R],
        directory: &Path,
        filename: &str,
    ) -> Result<usize> {
        if !directory.is_dir() {
            return Err(ExchangeError::path(directory, "destination directory missing"));
        }
        if filename.trim().is_empty() {
            return Err(ExchangeError::path(directory, "empty filename"));
        }
        if records.is_empty() {
            return Err(ExchangeError::path(
                directory.join(filename),
                format!("no {} records to write", R::KIND),
            ));
        }

        let mappings = self.registry.mappings_for(R::KIND)?;
        let columns = self.registry.columns_for(R::KIND)?;
        let mut writer = DbfWriter::create(&directory.join(filename), columns)?;

        for record in records {
            let mut row = Vec::with_capacity(mappings.len());
            for mapping in mappings {
                let accessor = R::accessor(&mapping.domain_field).ok_or_else(|| {
                    ExchangeError::coercion(
                        &mapping.domain_field,
                        format!("no accessor registered for kind {}", R::KIND),
                    )
                })?;
                let encoded = match (accessor.get)(record) {
                    Some(value) => value_coercer::encode(&value, mapping, self.reprojector)?,
                    None => None,
                };
                row.push(encoded);
            }
            writer.write_record(&row)?;
        }

        writer.close()?;
        Ok(records.len())
    }

    /// Open a table of one kind for reading
    ///
    /// The row sequence is lazy and finite; reopen the file to restart it.
    /// A schema that disagrees with the mapping table is reported but not
    /// refused — the importer skips unknown fields per row anyway.
    pub fn read(&self, kind: RecordKind, path: &Path) -> Result<DbfReader> {
        let mappings = self.registry.mappings_for(kind)?;
        let reader = DbfReader::open(path)?;

        let expected: Vec<&str> = mappings.iter().map(|m| m.file_field.as_str()).collect();
        let actual: Vec<&str> = reader.columns().iter().map(|c| c.name.as_str()).collect();
        if expected != actual {
            warn!(
                "Schema mismatch in {}: expected columns {:?}, found {:?}",
                path.display(),
                expected,
                actual
            );
        }

        Ok(reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::adapters::reprojection::PassthroughReprojector;
    use crate::app::models::{Area, AreaConfiguration, Geometry};
    use crate::app::services::dbf_table::FileValue;
    use tempfile::TempDir;

    fn sample_configuration() -> AreaConfiguration {
        let mut config = AreaConfiguration::new("GAF42", "Polder test", "Waternet");
        config.minimum_level = Some(-2.4);
        config.maximum_level = Some(-2.1);
        config
    }

    #[test]
    fn test_write_then_read_row_count() {
        let dir = TempDir::new().unwrap();
        let registry = MappingRegistry::standard();
        let codec = TableCodec::new(&registry, &PassthroughReprojector);

        let records = vec![sample_configuration()];
        assert!(codec.write(&records, dir.path(), "aanafvoer_waterbalans.dbf"));

        let reader = codec
            .read(
                RecordKind::AreaConfiguration,
                &dir.path().join("aanafvoer_waterbalans.dbf"),
            )
            .unwrap();
        let rows: Vec<_> = reader.map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].get("GAFIDENT"),
            Some(&FileValue::Character("GAF42".to_string()))
        );
        assert_eq!(rows[0].get("MINPEIL"), Some(&FileValue::Numeric(-2.4)));
        // Unset fields stay at the file default
        assert_eq!(rows[0].get("INIPEIL"), Some(&FileValue::Empty));
    }

    #[test]
    fn test_write_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let registry = MappingRegistry::standard();
        let codec = TableCodec::new(&registry, &PassthroughReprojector);

        let missing = dir.path().join("nope");
        assert!(!codec.write(&[sample_configuration()], &missing, "out.dbf"));
    }

    #[test]
    fn test_write_empty_filename_fails() {
        let dir = TempDir::new().unwrap();
        let registry = MappingRegistry::standard();
        let codec = TableCodec::new(&registry, &PassthroughReprojector);

        assert!(!codec.write(&[sample_configuration()], dir.path(), "  "));
    }

    #[test]
    fn test_write_empty_record_set_fails() {
        let dir = TempDir::new().unwrap();
        let registry = MappingRegistry::standard();
        let codec = TableCodec::new(&registry, &PassthroughReprojector);

        let none: Vec<AreaConfiguration> = Vec::new();
        assert!(!codec.write(&none, dir.path(), "out.dbf"));
        assert!(!dir.path().join("out.dbf").exists());
    }

    #[test]
    fn test_failed_write_leaves_no_partial_file() {
        let dir = TempDir::new().unwrap();
        let registry = MappingRegistry::standard();
        let codec = TableCodec::new(&registry, &PassthroughReprojector);

        // Foreign srid with a passthrough reprojector fails mid-write
        let mut area = Area::new("A1", "Polder", "Waternet");
        area.geometry = Some(Geometry::Point {
            x: 4.9,
            y: 52.4,
            srid: 4326,
        });

        assert!(!codec.write(&[area], dir.path(), "areas.dbf"));
        assert!(!dir.path().join("areas.dbf").exists());
    }

    #[test]
    fn test_read_tolerates_schema_mismatch() {
        let dir = TempDir::new().unwrap();
        let registry = MappingRegistry::standard();
        let codec = TableCodec::new(&registry, &PassthroughReprojector);

        // A bucket table read as structures: columns differ, reading works
        let mut bucket = crate::app::models::Bucket::new("b1", "GAF42");
        bucket.surface = Some(10.0);
        assert!(codec.write(&[bucket], dir.path(), "table.dbf"));

        let reader = codec
            .read(RecordKind::Structure, &dir.path().join("table.dbf"))
            .unwrap();
        assert_eq!(reader.count(), 1);
    }
}
