//! Configuration management and validation.
//!
//! Provides the serde-backed configuration consumed by the CLI: where the
//! store snapshot lives, which config type the pipeline handles, and the
//! declared export targets (one table file per record kind and
//! organization).

use crate::app::models::RecordKind;
use crate::constants::DEFAULT_CONFIG_TYPE;
use crate::error::{ExchangeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One declared export: a record kind written to a fixed file for one
/// organization (or all organizations when unset)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportTarget {
    pub kind: RecordKind,

    /// Owning organization scope; `None` exports all organizations
    #[serde(default)]
    pub organization: Option<String>,

    /// Destination directory; must exist at export time
    pub directory: PathBuf,

    /// Destination filename within the directory
    pub filename: String,
}

/// Top-level configuration of the exchange tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Location of the repository snapshot
    pub store_path: PathBuf,

    /// Config type tag the validation pipeline handles
    pub config_type: String,

    /// Declared export targets
    pub export_targets: Vec<ExportTarget>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            config_type: DEFAULT_CONFIG_TYPE.to_string(),
            export_targets: Vec::new(),
        }
    }
}

impl ExchangeConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ExchangeError::path(path, format!("cannot read config: {}", e)))?;
        let config: ExchangeConfig = serde_json::from_str(&contents)
            .map_err(|e| ExchangeError::path(path, format!("invalid config: {}", e)))?;
        config.validate()?;
        debug!(
            "Loaded config from {}: {} export target(s)",
            path.display(),
            config.export_targets.len()
        );
        Ok(config)
    }

    /// Validate configuration consistency
    pub fn validate(&self) -> Result<()> {
        if self.config_type.trim().is_empty() {
            return Err(ExchangeError::coercion("config_type", "must not be empty"));
        }
        for target in &self.export_targets {
            if target.filename.trim().is_empty() {
                return Err(ExchangeError::coercion(
                    "filename",
                    format!("empty filename for {} export target", target.kind),
                ));
            }
        }
        Ok(())
    }

    /// The conventional target set for one organization and directory: the
    /// three configuration tables, plus the geo info table when requested
    pub fn default_targets(
        organization: Option<&str>,
        directory: &Path,
        include_areas: bool,
    ) -> Vec<ExportTarget> {
        let mut kinds = vec![
            RecordKind::AreaConfiguration,
            RecordKind::Bucket,
            RecordKind::Structure,
        ];
        if include_areas {
            kinds.insert(0, RecordKind::Area);
        }
        kinds
            .into_iter()
            .map(|kind| ExportTarget {
                kind,
                organization: organization.map(str::to_string),
                directory: directory.to_path_buf(),
                filename: kind.table_filename(),
            })
            .collect()
    }
}

/// Default location of the store snapshot
pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wbconfig-processor")
        .join("store.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = ExchangeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.config_type, "waterbalans");
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = ExchangeConfig::default();
        config.export_targets = ExchangeConfig::default_targets(Some("Waternet"), dir.path(), true);
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = ExchangeConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.export_targets.len(), 4);
    }

    #[test]
    fn test_default_targets_use_conventional_filenames() {
        let targets = ExchangeConfig::default_targets(None, Path::new("/tmp"), false);
        let filenames: Vec<_> = targets.iter().map(|t| t.filename.as_str()).collect();
        assert_eq!(
            filenames,
            vec![
                "aanafvoer_waterbalans.dbf",
                "grondwatergebieden.dbf",
                "pumpingstations.dbf"
            ]
        );
    }

    #[test]
    fn test_empty_config_type_rejected() {
        let mut config = ExchangeConfig::default();
        config.config_type = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
