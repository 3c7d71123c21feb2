//! Abstract record store and the in-memory implementation
//!
//! The persistent relational store is an external collaborator; the core
//! only sees the traits in this module. Each call is assumed transactional
//! on its own — the core never spans a transaction over multiple records.
//!
//! `MemoryRepository` is the reference implementation used by the CLI and
//! the tests: plain indexed maps with a JSON snapshot on disk.

use crate::app::models::{
    Area, AreaConfiguration, Bucket, BucketTypeCode, FlowDirectionCode, RecordKind, Structure,
    Submission, SubmissionStatus, TimeseriesRef,
};
use crate::constants::{bucket_types, flow_directions};
use crate::error::{ExchangeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

// =============================================================================
// Store Traits
// =============================================================================

/// Record types addressable by a stable external key
pub trait ExternalKeyed: Clone {
    const KIND: RecordKind;

    /// The ident (areas, configurations) or generated code (buckets,
    /// structures) identifying this record across imports
    fn external_key(&self) -> &str;
}

impl ExternalKeyed for Area {
    const KIND: RecordKind = RecordKind::Area;

    fn external_key(&self) -> &str {
        &self.ident
    }
}

impl ExternalKeyed for AreaConfiguration {
    const KIND: RecordKind = RecordKind::AreaConfiguration;

    fn external_key(&self) -> &str {
        &self.ident
    }
}

impl ExternalKeyed for Bucket {
    const KIND: RecordKind = RecordKind::Bucket;

    fn external_key(&self) -> &str {
        &self.code
    }
}

impl ExternalKeyed for Structure {
    const KIND: RecordKind = RecordKind::Structure;

    fn external_key(&self) -> &str {
        &self.code
    }
}

/// Keyed access to one record kind
pub trait RecordStore<R: ExternalKeyed> {
    fn get(&self, key: &str) -> Option<R>;
    fn put(&mut self, record: R);
    /// All records of this kind, ordered by external key
    fn all(&self) -> Vec<R>;
    fn remove(&mut self, key: &str) -> bool;
}

/// Access to the validation queue
pub trait SubmissionStore {
    /// Submissions matching the organization (if given), config type and
    /// status, in queue order
    fn submissions(
        &self,
        organization: Option<&str>,
        config_type: &str,
        status: SubmissionStatus,
    ) -> Vec<Submission>;

    fn save_submission(&mut self, submission: Submission);

    fn delete_submission(&mut self, id: u64) -> bool;
}

/// Reference data lookups needed while decoding
pub trait ReferenceResolver {
    fn resolve_timeseries(&self, row_id: i64) -> Option<TimeseriesRef>;
    fn resolve_bucket_type(&self, code: &str) -> Option<BucketTypeCode>;
    fn resolve_flow_direction(&self, code: &str) -> Option<FlowDirectionCode>;
}

/// The full store surface required by the exchange core
pub trait Repository:
    RecordStore<Area>
    + RecordStore<AreaConfiguration>
    + RecordStore<Bucket>
    + RecordStore<Structure>
    + SubmissionStore
    + ReferenceResolver
{
}

// =============================================================================
// Generic Helpers
// =============================================================================

/// Resolve a record by external key, creating and persisting it when absent.
///
/// This is the single upsert-by-key implementation shared by every record
/// kind; import stages never duplicate it.
pub fn resolve_or_create<R, S, F>(store: &mut S, key: &str, create: F) -> R
where
    R: ExternalKeyed,
    S: RecordStore<R> + ?Sized,
    F: FnOnce() -> R,
{
    if let Some(existing) = store.get(key) {
        existing
    } else {
        let record = create();
        store.put(record.clone());
        record
    }
}

/// Typed convenience wrappers avoiding fully-qualified trait calls at the
/// call sites
pub fn get_record<R, S>(store: &S, key: &str) -> Option<R>
where
    R: ExternalKeyed,
    S: RecordStore<R> + ?Sized,
{
    store.get(key)
}

pub fn put_record<R, S>(store: &mut S, record: R)
where
    R: ExternalKeyed,
    S: RecordStore<R> + ?Sized,
{
    store.put(record)
}

pub fn all_records<R, S>(store: &S) -> Vec<R>
where
    R: ExternalKeyed,
    S: RecordStore<R> + ?Sized,
{
    store.all()
}

// =============================================================================
// In-Memory Implementation
// =============================================================================

/// Indexed in-memory store with a JSON snapshot on disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryRepository {
    areas: BTreeMap<String, Area>,
    configurations: BTreeMap<String, AreaConfiguration>,
    buckets: BTreeMap<String, Bucket>,
    structures: BTreeMap<String, Structure>,
    submissions: BTreeMap<u64, Submission>,
    timeseries: HashMap<i64, TimeseriesRef>,
    bucket_type_codes: HashMap<String, BucketTypeCode>,
    flow_direction_codes: HashMap<String, FlowDirectionCode>,
    next_submission_id: u64,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store pre-seeded with the standard code tables
    pub fn with_default_codes() -> Self {
        let mut repo = Self::new();
        for (index, code) in flow_directions::ALL.iter().enumerate() {
            repo.insert_flow_direction(FlowDirectionCode {
                code: code.to_string(),
                index: index as i32,
                description: format!("{} default", code),
            });
        }
        for code in bucket_types::ALL {
            repo.insert_bucket_type(BucketTypeCode {
                code: code.to_string(),
                description: code.to_string(),
            });
        }
        repo
    }

    /// Load a snapshot, or start empty when none exists yet
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No store snapshot at {}, starting empty", path.display());
            return Ok(Self::with_default_codes());
        }
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| ExchangeError::path(path, format!("unreadable store snapshot: {}", e)))
    }

    /// Persist a snapshot of the whole store
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ExchangeError::path(path, format!("unwritable store snapshot: {}", e)))?;
        std::fs::write(path, contents)?;
        debug!("Saved store snapshot to {}", path.display());
        Ok(())
    }

    /// Enqueue a submission, assigning its queue id
    pub fn add_submission(&mut self, mut submission: Submission) -> u64 {
        self.next_submission_id += 1;
        submission.id = self.next_submission_id;
        self.submissions.insert(submission.id, submission);
        self.next_submission_id
    }

    pub fn submission(&self, id: u64) -> Option<&Submission> {
        self.submissions.get(&id)
    }

    pub fn submission_count(&self, status: SubmissionStatus) -> usize {
        self.submissions
            .values()
            .filter(|s| s.status == status)
            .count()
    }

    pub fn insert_timeseries(&mut self, series: TimeseriesRef) {
        self.timeseries.insert(series.row_id, series);
    }

    pub fn insert_bucket_type(&mut self, row: BucketTypeCode) {
        self.bucket_type_codes.insert(row.code.clone(), row);
    }

    pub fn insert_flow_direction(&mut self, row: FlowDirectionCode) {
        self.flow_direction_codes.insert(row.code.clone(), row);
    }

    /// Record counts per kind, for status reporting
    pub fn record_counts(&self) -> Vec<(RecordKind, usize)> {
        vec![
            (RecordKind::Area, self.areas.len()),
            (RecordKind::AreaConfiguration, self.configurations.len()),
            (RecordKind::Bucket, self.buckets.len()),
            (RecordKind::Structure, self.structures.len()),
        ]
    }
}

macro_rules! impl_record_store {
    ($record:ty, $field:ident) => {
        impl RecordStore<$record> for MemoryRepository {
            fn get(&self, key: &str) -> Option<$record> {
                self.$field.get(key).cloned()
            }

            fn put(&mut self, record: $record) {
                self.$field
                    .insert(record.external_key().to_string(), record);
            }

            fn all(&self) -> Vec<$record> {
                self.$field.values().cloned().collect()
            }

            fn remove(&mut self, key: &str) -> bool {
                self.$field.remove(key).is_some()
            }
        }
    };
}

impl_record_store!(Area, areas);
impl_record_store!(AreaConfiguration, configurations);
impl_record_store!(Bucket, buckets);
impl_record_store!(Structure, structures);

impl SubmissionStore for MemoryRepository {
    fn submissions(
        &self,
        organization: Option<&str>,
        config_type: &str,
        status: SubmissionStatus,
    ) -> Vec<Submission> {
        self.submissions
            .values()
            .filter(|s| s.status == status)
            .filter(|s| s.config_type == config_type)
            .filter(|s| {
                organization
                    .map(|org| s.organization.eq_ignore_ascii_case(org))
                    .unwrap_or(true)
            })
            .cloned()
            .collect()
    }

    fn save_submission(&mut self, submission: Submission) {
        self.submissions.insert(submission.id, submission);
    }

    fn delete_submission(&mut self, id: u64) -> bool {
        self.submissions.remove(&id).is_some()
    }
}

impl ReferenceResolver for MemoryRepository {
    fn resolve_timeseries(&self, row_id: i64) -> Option<TimeseriesRef> {
        self.timeseries.get(&row_id).cloned()
    }

    fn resolve_bucket_type(&self, code: &str) -> Option<BucketTypeCode> {
        self.bucket_type_codes.get(code).cloned()
    }

    fn resolve_flow_direction(&self, code: &str) -> Option<FlowDirectionCode> {
        self.flow_direction_codes.get(code).cloned()
    }
}

impl Repository for MemoryRepository {}
