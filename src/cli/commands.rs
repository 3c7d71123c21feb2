//! Command implementations for the configuration processor CLI
//!
//! This module contains the command execution logic, logging setup,
//! progress reporting and the colored summaries printed after each run.

use crate::app::adapters::reprojection::PassthroughReprojector;
use crate::app::adapters::repository::MemoryRepository;
use crate::app::models::SubmissionStatus;
use crate::app::services::exporter::ConfigurationExporter;
use crate::app::services::field_mapping::MappingRegistry;
use crate::app::services::importer::ConfigurationImporter;
use crate::app::services::pipeline::ValidationPipeline;
use crate::cli::args::{store_path, Args, Commands, ExportArgs, ImportArgs, StatusArgs, ValidateArgs};
use crate::config::ExchangeConfig;
use anyhow::{bail, Context};
use colored::Colorize;
use indicatif::{HumanDuration, ProgressBar};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Main command runner
///
/// 1. Set up logging
/// 2. Load the store snapshot
/// 3. Run the requested command
/// 4. Persist the snapshot when the command mutated the store
pub fn run(args: Args) -> anyhow::Result<()> {
    setup_logging(args.verbose);

    let Some(command) = args.command else {
        bail!("no command given");
    };
    debug!("Running command: {:?}", command);

    match command {
        Commands::Export(export_args) => run_export(export_args),
        Commands::Import(import_args) => run_import(import_args),
        Commands::Validate(validate_args) => run_validate(validate_args),
        Commands::Status(status_args) => run_status(status_args),
    }
}

/// Install the tracing subscriber with an env-filter; the RUST_LOG
/// environment variable overrides the verbosity flag
fn setup_logging(verbose: u8) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("wbconfig_processor={}", default_level)));

    // A subscriber may already be installed when running under a test
    // harness; that is fine
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init();
}

fn run_export(args: ExportArgs) -> anyhow::Result<()> {
    let start = Instant::now();
    let store = store_path(args.store.as_ref());
    let repo = MemoryRepository::load_or_default(&store)
        .with_context(|| format!("loading store snapshot {}", store.display()))?;
    let registry = MappingRegistry::standard();
    let exporter = ConfigurationExporter::new(&repo, &registry, &PassthroughReprojector);

    if let Some(ident) = &args.ident {
        info!("Exporting configuration '{}' to {}", ident, args.output.display());
        if exporter.export_configuration(ident, &args.output) {
            println!(
                "{} configuration '{}' exported in {}",
                "OK".green().bold(),
                ident,
                HumanDuration(start.elapsed())
            );
            return Ok(());
        }
        bail!("export of configuration '{}' failed", ident);
    }

    let targets = match &args.config {
        Some(path) => {
            ExchangeConfig::load(path)
                .with_context(|| format!("loading export config {}", path.display()))?
                .export_targets
        }
        None => ExchangeConfig::default_targets(
            args.organization.as_deref(),
            &args.output,
            args.areas,
        ),
    };
    if targets.is_empty() {
        bail!("nothing to export: no targets configured");
    }

    let stats = exporter.export_targets(&targets);
    let status = if stats.success() {
        "OK".green().bold()
    } else {
        "FAILED".red().bold()
    };
    println!(
        "{} {} target(s) written, {} failed, in {}",
        status,
        stats.targets - stats.failed,
        stats.failed,
        HumanDuration(start.elapsed())
    );
    if !stats.success() {
        bail!("{} export target(s) failed", stats.failed);
    }
    Ok(())
}

fn run_import(args: ImportArgs) -> anyhow::Result<()> {
    let store = store_path(args.store.as_ref());
    let mut repo = MemoryRepository::load_or_default(&store)
        .with_context(|| format!("loading store snapshot {}", store.display()))?;
    let registry = MappingRegistry::standard();

    let mut importer = ConfigurationImporter::new(&registry).with_meta_info(args.meta_info.clone());
    if let Some(organization) = &args.organization {
        importer = importer.with_organization(organization.clone());
    }

    let outcome = importer.import_area_configuration(&mut repo, &args.area);
    print_stage("area configuration", &outcome);
    let mut all_ok = outcome.success;

    if let Some(configuration) = importer.resolved_configuration().map(str::to_string) {
        if all_ok {
            if let Some(buckets) = &args.buckets {
                let outcome = importer.import_buckets(&mut repo, buckets, &configuration);
                print_stage("buckets", &outcome);
                all_ok &= outcome.success;
            }
            if all_ok {
                if let Some(structures) = &args.structures {
                    let outcome = importer.import_structures(&mut repo, structures, &configuration);
                    print_stage("structures", &outcome);
                    all_ok &= outcome.success;
                }
            }
        }
    }

    // Partial imports are persisted too; the stages already reported what
    // landed
    if let Some(parent) = store.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    repo.save(&store)
        .with_context(|| format!("saving store snapshot {}", store.display()))?;

    if !all_ok {
        bail!("import finished with errors");
    }
    Ok(())
}

fn run_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let start = Instant::now();
    let store = store_path(args.store.as_ref());
    let mut repo = MemoryRepository::load_or_default(&store)
        .with_context(|| format!("loading store snapshot {}", store.display()))?;
    let registry = MappingRegistry::standard();
    let pipeline = ValidationPipeline::new(&registry);

    let spinner = ProgressBar::new_spinner();
    spinner.set_message("Validating submissions...");
    spinner.enable_steady_tick(Duration::from_millis(120));

    let stats = pipeline.run_cycle(&mut repo, args.organization.as_deref(), &args.config_type);

    spinner.finish_and_clear();

    if let Some(parent) = store.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    repo.save(&store)
        .with_context(|| format!("saving store snapshot {}", store.display()))?;

    println!(
        "{} validated, {} kept for retry, {} rejected removed, in {}",
        stats.validated.to_string().green().bold(),
        stats.failed.to_string().yellow().bold(),
        stats.rejected_removed,
        HumanDuration(start.elapsed())
    );
    Ok(())
}

fn run_status(args: StatusArgs) -> anyhow::Result<()> {
    let store = store_path(args.store.as_ref());
    let repo = MemoryRepository::load_or_default(&store)
        .with_context(|| format!("loading store snapshot {}", store.display()))?;

    println!("{}", "Store".bold());
    for (kind, count) in repo.record_counts() {
        println!("  {:<20} {}", kind.to_string(), count);
    }

    println!("{}", "Submission queue".bold());
    for status in [
        SubmissionStatus::Validate,
        SubmissionStatus::Keep,
        SubmissionStatus::Reject,
    ] {
        let count = repo.submission_count(status);
        let label = match status {
            SubmissionStatus::Validate => status.to_string().normal(),
            SubmissionStatus::Keep => status.to_string().yellow(),
            SubmissionStatus::Reject => status.to_string().red(),
        };
        println!("  {:<20} {}", label, count);
    }
    Ok(())
}

fn print_stage(stage: &str, outcome: &crate::app::services::importer::StageOutcome) {
    let status = if outcome.success {
        "OK".green().bold()
    } else {
        "FAILED".red().bold()
    };
    println!("{} {}: {}", status, stage, outcome.message);
}
