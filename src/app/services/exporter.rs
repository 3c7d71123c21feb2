//! Configuration exporter
//!
//! Selects the records of one owning organization (or all organizations)
//! and drives the codec, one target file per record kind. Kinds export
//! independently: a failing kind never blocks the others, and the overall
//! result is the logical AND of the per-kind results.

use crate::app::adapters::reprojection::Reprojector;
use crate::app::adapters::repository::{all_records, get_record, Repository};
use crate::app::models::{Area, AreaClass, AreaConfiguration, Bucket, RecordKind, Structure};
use crate::app::services::field_mapping::MappingRegistry;
use crate::app::services::table_codec::TableCodec;
use crate::config::ExportTarget;
use std::collections::HashSet;
use std::path::Path;
use tracing::{error, info};

/// Per-target tallies of one export run
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExportStats {
    pub targets: usize,
    pub failed: usize,
}

impl ExportStats {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Exporter over one repository, mapping registry and reprojection service
pub struct ConfigurationExporter<'a, S> {
    repo: &'a S,
    codec: TableCodec<'a>,
}

impl<'a, S: Repository> ConfigurationExporter<'a, S> {
    pub fn new(
        repo: &'a S,
        registry: &'a MappingRegistry,
        reprojector: &'a dyn Reprojector,
    ) -> Self {
        Self {
            repo,
            codec: TableCodec::new(registry, reprojector),
        }
    }

    /// Export the geo info of all exportable areas
    ///
    /// The reserved geographic class (KRW water bodies) is never written.
    pub fn export_areas(
        &self,
        organization: Option<&str>,
        directory: &Path,
        filename: &str,
    ) -> bool {
        let areas: Vec<Area> = all_records::<Area, _>(self.repo)
            .into_iter()
            .filter(|a| !a.deleted)
            .filter(|a| a.area_class != AreaClass::KrwWaterBody)
            .filter(|a| matches_organization(&a.organization, organization))
            .collect();
        self.codec.write(&areas, directory, filename)
    }

    /// Export the area configurations of one organization
    pub fn export_area_configurations(
        &self,
        organization: Option<&str>,
        directory: &Path,
        filename: &str,
    ) -> bool {
        let configurations: Vec<AreaConfiguration> =
            all_records::<AreaConfiguration, _>(self.repo)
                .into_iter()
                .filter(|c| !c.deleted)
                .filter(|c| matches_organization(&c.organization, organization))
                .collect();
        self.codec.write(&configurations, directory, filename)
    }

    /// Export the non-deleted buckets of one organization
    pub fn export_buckets(
        &self,
        organization: Option<&str>,
        directory: &Path,
        filename: &str,
    ) -> bool {
        let scope = self.configuration_scope(organization);
        let buckets: Vec<Bucket> = all_records::<Bucket, _>(self.repo)
            .into_iter()
            .filter(|b| !b.deleted)
            .filter(|b| scope.contains(&b.configuration))
            .collect();
        self.codec.write(&buckets, directory, filename)
    }

    /// Export the non-deleted structures of one organization
    pub fn export_structures(
        &self,
        organization: Option<&str>,
        directory: &Path,
        filename: &str,
    ) -> bool {
        let scope = self.configuration_scope(organization);
        let structures: Vec<Structure> = all_records::<Structure, _>(self.repo)
            .into_iter()
            .filter(|s| !s.deleted)
            .filter(|s| scope.contains(&s.configuration))
            .collect();
        self.codec.write(&structures, directory, filename)
    }

    /// Export one configuration by external identifier: three files named
    /// deterministically from the record kinds
    pub fn export_configuration(&self, ident: &str, directory: &Path) -> bool {
        let Some(configuration) = get_record::<AreaConfiguration, _>(self.repo, ident) else {
            error!("No area configuration with ident '{}'", ident);
            return false;
        };

        let buckets: Vec<Bucket> = all_records::<Bucket, _>(self.repo)
            .into_iter()
            .filter(|b| !b.deleted && b.configuration == ident)
            .collect();
        let structures: Vec<Structure> = all_records::<Structure, _>(self.repo)
            .into_iter()
            .filter(|s| !s.deleted && s.configuration == ident)
            .collect();

        // Independent per-kind results, combined after the fact
        let configuration_ok = self.codec.write(
            &[configuration],
            directory,
            &RecordKind::AreaConfiguration.table_filename(),
        );
        let buckets_ok =
            self.codec
                .write(&buckets, directory, &RecordKind::Bucket.table_filename());
        let structures_ok = self.codec.write(
            &structures,
            directory,
            &RecordKind::Structure.table_filename(),
        );

        configuration_ok && buckets_ok && structures_ok
    }

    /// Run every configured export target
    pub fn export_targets(&self, targets: &[ExportTarget]) -> ExportStats {
        let mut stats = ExportStats::default();
        for target in targets {
            let organization = target.organization.as_deref();
            info!(
                "Start export of {} for '{}'",
                target.kind,
                organization.unwrap_or("all organizations")
            );
            let ok = match target.kind {
                RecordKind::Area => {
                    self.export_areas(organization, &target.directory, &target.filename)
                }
                RecordKind::AreaConfiguration => self.export_area_configurations(
                    organization,
                    &target.directory,
                    &target.filename,
                ),
                RecordKind::Bucket => {
                    self.export_buckets(organization, &target.directory, &target.filename)
                }
                RecordKind::Structure => {
                    self.export_structures(organization, &target.directory, &target.filename)
                }
            };
            stats.targets += 1;
            if !ok {
                stats.failed += 1;
            }
        }
        info!(
            "End export: {} target(s), {} failed",
            stats.targets, stats.failed
        );
        stats
    }

    /// Idents of the configurations in scope for an organization
    fn configuration_scope(&self, organization: Option<&str>) -> HashSet<String> {
        all_records::<AreaConfiguration, _>(self.repo)
            .into_iter()
            .filter(|c| matches_organization(&c.organization, organization))
            .map(|c| c.ident)
            .collect()
    }
}

fn matches_organization(owner: &str, filter: Option<&str>) -> bool {
    filter
        .map(|wanted| owner.eq_ignore_ascii_case(wanted))
        .unwrap_or(true)
}
