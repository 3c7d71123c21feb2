//! Command-line argument definitions for the configuration processor
//!
//! This module defines the CLI interface using the clap derive API. Every
//! subcommand that touches the store accepts `--store` to override the
//! default snapshot location.

use crate::config::default_store_path;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for the water balance configuration processor
///
/// Exchanges water balance configurations with external hydrological
/// modeling tools through their legacy DBF tables.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "wbconfig-processor",
    version,
    about = "Exchange water balance configurations with hydrological modeling tools via DBF tables",
    long_about = "Exports water balance configurations (areas, buckets, structures) to the \
                  legacy DBF tables consumed by external hydrological modeling tools, imports \
                  externally-supplied tables back into the store, and validates queued \
                  configuration submissions through the three-stage import pipeline."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Increase logging verbosity (-v: debug, -vv: trace)
    #[arg(short = 'v', long = "verbose", global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Export configurations to DBF tables
    Export(ExportArgs),
    /// Import one configuration from DBF tables
    Import(ImportArgs),
    /// Run one validation cycle over the submission queue
    Validate(ValidateArgs),
    /// Report store and queue contents
    Status(StatusArgs),
}

/// Arguments for the export command
#[derive(Debug, Clone, Parser)]
pub struct ExportArgs {
    /// Store snapshot to read
    ///
    /// Defaults to the per-user data directory.
    #[arg(long = "store", value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Output directory for the generated tables; must exist
    #[arg(short = 'o', long = "output", value_name = "PATH", default_value = ".")]
    pub output: PathBuf,

    /// Restrict the export to one owning organization
    #[arg(long = "organization", value_name = "NAME")]
    pub organization: Option<String>,

    /// Export a single configuration by external identifier
    ///
    /// Produces the three conventional files for exactly this
    /// configuration instead of the organization-wide tables.
    #[arg(long = "ident", value_name = "IDENT")]
    pub ident: Option<String>,

    /// Also export the geo info table (areas with their centroids)
    #[arg(long = "areas")]
    pub areas: bool,

    /// Export targets config file; overrides the conventional target set
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Arguments for the import command
#[derive(Debug, Clone, Parser)]
pub struct ImportArgs {
    /// Store snapshot to read and update
    #[arg(long = "store", value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Area configuration table (stage 1)
    #[arg(long = "area", value_name = "PATH")]
    pub area: PathBuf,

    /// Buckets table (stage 2); skipped when absent
    #[arg(long = "buckets", value_name = "PATH")]
    pub buckets: Option<PathBuf>,

    /// Structures table (stage 3); skipped when absent
    #[arg(long = "structures", value_name = "PATH")]
    pub structures: Option<PathBuf>,

    /// Provenance stamp recorded on the imported configuration
    #[arg(long = "meta-info", value_name = "TEXT")]
    pub meta_info: Option<String>,

    /// Organization stamped on newly created configurations
    #[arg(long = "organization", value_name = "NAME")]
    pub organization: Option<String>,
}

/// Arguments for the validate command
#[derive(Debug, Clone, Parser)]
pub struct ValidateArgs {
    /// Store snapshot to read and update
    #[arg(long = "store", value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Restrict the cycle to one submitting organization
    #[arg(long = "organization", value_name = "NAME")]
    pub organization: Option<String>,

    /// Config type tag of the submissions to process
    #[arg(long = "config-type", value_name = "TAG", default_value = crate::constants::DEFAULT_CONFIG_TYPE)]
    pub config_type: String,
}

/// Arguments for the status command
#[derive(Debug, Clone, Parser)]
pub struct StatusArgs {
    /// Store snapshot to inspect
    #[arg(long = "store", value_name = "PATH")]
    pub store: Option<PathBuf>,
}

/// Resolve an optional `--store` override against the default location
pub fn store_path(explicit: Option<&PathBuf>) -> PathBuf {
    explicit.cloned().unwrap_or_else(default_store_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_args_parse() {
        let args = Args::parse_from([
            "wbconfig-processor",
            "export",
            "--organization",
            "Waternet",
            "-o",
            "/tmp/out",
            "--areas",
        ]);
        match args.command {
            Some(Commands::Export(export)) => {
                assert_eq!(export.organization.as_deref(), Some("Waternet"));
                assert_eq!(export.output, PathBuf::from("/tmp/out"));
                assert!(export.areas);
                assert!(export.ident.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_validate_args_default_config_type() {
        let args = Args::parse_from(["wbconfig-processor", "validate"]);
        match args.command {
            Some(Commands::Validate(validate)) => {
                assert_eq!(validate.config_type, "waterbalans");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_verbosity_is_counted() {
        let args = Args::parse_from(["wbconfig-processor", "-vv", "status"]);
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_store_path_override() {
        let explicit = PathBuf::from("/tmp/store.json");
        assert_eq!(store_path(Some(&explicit)), explicit);
        assert!(store_path(None).ends_with("store.json"));
    }
}
