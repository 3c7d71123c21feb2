//! Validation pipeline over the submission queue
//!
//! One cycle: delete every REJECT submission unconditionally, then drive
//! the three import stages for each pending submission in queue order. A
//! stage failure transitions the submission to KEEP with its bounded audit
//! message; full success deletes it. No submission error ever aborts the
//! cycle — one bad delivery must not block the others.

use crate::app::adapters::repository::Repository;
use crate::app::models::{Submission, SubmissionStatus};
use crate::app::services::field_mapping::MappingRegistry;
use crate::app::services::importer::{ConfigurationImporter, StageOutcome};
use tracing::{debug, info, info_span};

/// Aggregate counters of one pipeline cycle
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CycleStats {
    /// Submissions fully imported and removed from the queue
    pub validated: usize,
    /// Submissions transitioned to KEEP this cycle
    pub failed: usize,
    /// REJECT submissions removed by the cleanup pass
    pub rejected_removed: usize,
}

/// Sequential, synchronous validation pipeline
///
/// Submissions are processed strictly one after another: stages 2 and 3
/// depend on the configuration row stage 1 just persisted. Concurrency
/// control, if any, is the caller's problem.
pub struct ValidationPipeline<'a> {
    registry: &'a MappingRegistry,
}

impl<'a> ValidationPipeline<'a> {
    pub fn new(registry: &'a MappingRegistry) -> Self {
        Self { registry }
    }

    /// Run one full cycle for an organization (or all) and config type
    pub fn run_cycle<S: Repository>(
        &self,
        repo: &mut S,
        organization: Option<&str>,
        config_type: &str,
    ) -> CycleStats {
        let span = info_span!(
            "validation_cycle",
            organization = organization.unwrap_or("all"),
            config_type
        );
        let _guard = span.enter();
        info!(
            "Start validation of configurations for '{}'",
            organization.unwrap_or("all")
        );

        let mut stats = CycleStats {
            rejected_removed: self.remove_rejected(repo, organization, config_type),
            ..CycleStats::default()
        };

        // Pending submissions plus last cycle's KEEPs (at-least-once
        // retries, no backoff); deliveries without their three files are
        // not eligible
        let mut pending: Vec<Submission> =
            repo.submissions(organization, config_type, SubmissionStatus::Validate);
        pending.extend(repo.submissions(organization, config_type, SubmissionStatus::Keep));
        let pending: Vec<Submission> = pending
            .into_iter()
            .filter(Submission::has_files)
            .collect();
        info!("{} submission(s) to validate", pending.len());

        for mut submission in pending {
            debug!(
                "Start validation of submission {} from '{}'",
                submission.id, submission.organization
            );
            let outcome = self.process(repo, &submission);
            if outcome.success {
                repo.delete_submission(submission.id);
                stats.validated += 1;
                debug!("Submission {} validated with success", submission.id);
            } else {
                submission.record_failure(&outcome.message);
                repo.save_submission(submission);
                stats.failed += 1;
            }
        }

        info!("Succeed={}, Failed={}", stats.validated, stats.failed);
        info!("End validation");
        stats
    }

    /// Drive the three stages for one submission; the first failure wins
    fn process<S: Repository>(&self, repo: &mut S, submission: &Submission) -> StageOutcome {
        let (Some(area_path), Some(buckets_path), Some(structures_path)) = (
            submission.area_path.as_ref(),
            submission.buckets_path.as_ref(),
            submission.structures_path.as_ref(),
        ) else {
            return StageOutcome::failed("Submission is missing exchange files");
        };

        let mut importer = ConfigurationImporter::new(self.registry)
            .with_organization(submission.organization.clone())
            .with_meta_info(submission.meta_info.clone());

        let outcome = importer.import_area_configuration(repo, area_path);
        if !outcome.success {
            return outcome;
        }
        let Some(configuration) = importer.resolved_configuration().map(str::to_string) else {
            return StageOutcome::failed("Stage 1 resolved no configuration");
        };

        let outcome = importer.import_buckets(repo, buckets_path, &configuration);
        if !outcome.success {
            return outcome;
        }

        importer.import_structures(repo, structures_path, &configuration)
    }

    /// Cleanup pass: rejected submissions are removed before any import
    /// attempt, regardless of file validity
    fn remove_rejected<S: Repository>(
        &self,
        repo: &mut S,
        organization: Option<&str>,
        config_type: &str,
    ) -> usize {
        let rejected = repo.submissions(organization, config_type, SubmissionStatus::Reject);
        let count = rejected.len();
        info!("{} rejected configuration(s) to delete", count);
        for submission in rejected {
            repo.delete_submission(submission.id);
        }
        if count > 0 {
            info!("{} configuration(s) deleted", count);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::adapters::repository::MemoryRepository;
    use std::path::PathBuf;

    fn submission_with_files(organization: &str) -> Submission {
        let mut submission = Submission::new(0, organization, "waterbalans");
        submission.area_path = Some(PathBuf::from("/nonexistent/area.dbf"));
        submission.buckets_path = Some(PathBuf::from("/nonexistent/buckets.dbf"));
        submission.structures_path = Some(PathBuf::from("/nonexistent/structures.dbf"));
        submission
    }

    #[test]
    fn test_rejected_submissions_removed_before_import() {
        let registry = MappingRegistry::standard();
        let mut repo = MemoryRepository::with_default_codes();

        // Rejected submission with unreadable files: removal must not
        // depend on file validity
        let mut rejected = submission_with_files("Waternet");
        rejected.status = SubmissionStatus::Reject;
        let id = repo.add_submission(rejected);

        let pipeline = ValidationPipeline::new(&registry);
        let stats = pipeline.run_cycle(&mut repo, Some("Waternet"), "waterbalans");

        assert_eq!(stats.rejected_removed, 1);
        assert_eq!(stats.validated, 0);
        assert!(repo.submission(id).is_none());
    }

    #[test]
    fn test_submissions_without_files_are_skipped() {
        let registry = MappingRegistry::standard();
        let mut repo = MemoryRepository::with_default_codes();
        let id = repo.add_submission(Submission::new(0, "Waternet", "waterbalans"));

        let pipeline = ValidationPipeline::new(&registry);
        let stats = pipeline.run_cycle(&mut repo, None, "waterbalans");

        assert_eq!(stats.validated + stats.failed, 0);
        // Still pending, untouched
        assert_eq!(
            repo.submission(id).unwrap().status,
            SubmissionStatus::Validate
        );
    }

    #[test]
    fn test_unreadable_files_transition_to_keep() {
        let registry = MappingRegistry::standard();
        let mut repo = MemoryRepository::with_default_codes();
        let id = repo.add_submission(submission_with_files("Waternet"));

        let pipeline = ValidationPipeline::new(&registry);
        let stats = pipeline.run_cycle(&mut repo, None, "waterbalans");

        assert_eq!(stats.failed, 1);
        let kept = repo.submission(id).unwrap();
        assert_eq!(kept.status, SubmissionStatus::Keep);
        assert!(!kept.action_log.is_empty());
    }

    #[test]
    fn test_kept_submissions_retry_next_cycle() {
        let registry = MappingRegistry::standard();
        let mut repo = MemoryRepository::with_default_codes();
        let id = repo.add_submission(submission_with_files("Waternet"));

        let pipeline = ValidationPipeline::new(&registry);
        pipeline.run_cycle(&mut repo, None, "waterbalans");
        assert_eq!(repo.submission(id).unwrap().status, SubmissionStatus::Keep);

        // KEEP is terminal for the cycle, not for the queue: the next cycle
        // retries it (at-least-once, no backoff, no retry cap)
        let stats = pipeline.run_cycle(&mut repo, None, "waterbalans");
        assert_eq!(stats.failed, 1);
        assert_eq!(repo.submission(id).unwrap().status, SubmissionStatus::Keep);
    }
}
