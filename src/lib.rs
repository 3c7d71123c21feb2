//! Water Balance Configuration Processor Library
//!
//! A Rust library for exchanging water balance configurations (areas,
//! buckets and structures) with external hydrological modeling tools
//! through their legacy fixed-schema DBF tables.
//!
//! This library provides tools for:
//! - A field-mapping-driven codec between typed domain records and table rows
//! - Type coercion for geometry, time-series references, code tables and flags
//! - Byte-compatible reading and writing of the legacy table format
//! - Organization-scoped configuration export, one file per record kind
//! - A three-stage import (configuration, buckets, structures) with caps and
//!   protected system structures
//! - A restartable validation pipeline over externally-supplied submissions

pub mod config;
pub mod constants;
pub mod error;

// Core application modules
pub mod app {
    pub mod models;
    pub mod services {
        pub mod dbf_table;
        pub mod exporter;
        pub mod field_mapping;
        pub mod importer;
        pub mod pipeline;
        pub mod table_codec;
        pub mod value_coercer;
    }
    pub mod adapters {
        pub mod reprojection;
        pub mod repository;
    }
}

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use app::adapters::reprojection::{PassthroughReprojector, Reprojector};
pub use app::adapters::repository::{MemoryRepository, Repository};
pub use app::models::{
    Area, AreaConfiguration, Bucket, RecordKind, Structure, Submission, SubmissionStatus,
};
pub use app::services::exporter::ConfigurationExporter;
pub use app::services::field_mapping::MappingRegistry;
pub use app::services::importer::{ConfigurationImporter, StageOutcome};
pub use app::services::pipeline::{CycleStats, ValidationPipeline};
pub use config::ExchangeConfig;
pub use error::{ExchangeError, Result};
