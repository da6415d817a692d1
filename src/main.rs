//! Binary entry point for timeline-harvest.
//!
//! Syncs configured timelines into the local store and exports labeled
//! train/validation datasets from it.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow unnecessary_wraps for consistent command function signatures
#![allow(clippy::unnecessary_wraps)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use timeline_harvest::config::CONFIG_PATH_ENV;
use timeline_harvest::observability::{self, LoggingConfig};
use timeline_harvest::services::{CategoryExport, EntityOutcome};
use timeline_harvest::{
    CursorResolver, HarvestConfig, HttpTimelineSource, Pipeline, PipelineOutcome, RecordStore,
    SqliteRecordStore, SyncReport,
};

/// Timeline Harvest - incremental timeline sync and dataset export.
#[derive(Parser)]
#[command(name = "timeline-harvest")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Fetch new records for configured entities into the store.
    Sync {
        /// Only entities of this category.
        #[arg(short = 'C', long)]
        category: Option<String>,

        /// Explicit entity handles (repeatable); overrides --category.
        #[arg(short, long = "entity")]
        entities: Vec<String>,
    },

    /// Write train/validation splits from the stored records.
    Export {
        /// Only this category.
        #[arg(short = 'C', long)]
        category: Option<String>,
    },

    /// Sync every entity, then export when anything new was stored.
    Run,

    /// Save a category to the label-partitioned Parquet feature dataset.
    #[cfg(feature = "parquet-export")]
    Features {
        /// Category to save.
        #[arg(short = 'C', long)]
        category: String,
    },

    /// Show where the next fetch for an entity starts.
    Cursor {
        /// Entity handle.
        entity: String,
    },

    /// Show stored record counts per entity.
    Status,
}

/// Main entry point.
fn main() -> ExitCode {
    // A missing .env file is the normal case.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Err(e) = observability::init(LoggingConfig::from_env(cli.verbose)) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli.command, &config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(command: Commands, config: &HarvestConfig) -> timeline_harvest::Result<ExitCode> {
    let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::new(&config.store.path)?);

    match command {
        Commands::Sync { category, entities } => {
            let pipeline = build_pipeline(config, store);
            let report = pipeline.sync(category.as_deref(), &entities)?;
            print_sync_report(&report);
            Ok(exit_code(report.failed() == 0))
        },
        Commands::Export { category } => {
            let pipeline = build_pipeline(config, store);
            let exports = pipeline.export(category.as_deref())?;
            Ok(exit_code(print_exports(&exports)))
        },
        Commands::Run => {
            let pipeline = build_pipeline(config, store);
            match pipeline.run() {
                PipelineOutcome::DoneEmpty { sync } => {
                    print_sync_report(&sync);
                    println!("No new records; export skipped.");
                    Ok(exit_code(sync.failed() == 0))
                },
                PipelineOutcome::Done { sync, exports } => {
                    print_sync_report(&sync);
                    let exported = print_exports(&exports);
                    Ok(exit_code(exported && sync.failed() == 0))
                },
            }
        },
        #[cfg(feature = "parquet-export")]
        Commands::Features { category } => {
            let pipeline = build_pipeline(config, store);
            for path in pipeline.save_features(&category)? {
                println!("{}", path.display());
            }
            Ok(ExitCode::SUCCESS)
        },
        Commands::Cursor { entity } => {
            match CursorResolver::new(store).resolve(&entity)? {
                Some(cursor) => println!("{cursor}"),
                None => println!("none"),
            }
            Ok(ExitCode::SUCCESS)
        },
        Commands::Status => cmd_status(config, store.as_ref()),
    }
}

/// Loads configuration: `--config`, then the env path, then the platform
/// default. Environment overrides apply last.
fn load_config(path: Option<&Path>) -> timeline_harvest::Result<HarvestConfig> {
    let config = if let Some(config_path) = path {
        HarvestConfig::load_from_file(config_path)?
    } else if let Some(config_path) = std::env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|p| !p.trim().is_empty())
    {
        HarvestConfig::load_from_file(Path::new(&config_path))?
    } else {
        HarvestConfig::load_default()?
    };
    Ok(config.with_env_overrides())
}

fn build_pipeline(config: &HarvestConfig, store: Arc<dyn RecordStore>) -> Pipeline {
    let source = Arc::new(HttpTimelineSource::new(&config.source));
    Pipeline::new(config, source, store)
}

const fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_sync_report(report: &SyncReport) {
    for entry in &report.entities {
        match &entry.outcome {
            EntityOutcome::Synced { cursor, fetched, stats } => println!(
                "{:<24} fetched {fetched:>5}  new {:>5}  replaced {:>5}  since {}",
                entry.entity,
                stats.inserted,
                stats.replaced,
                cursor.as_ref().map_or_else(|| "beginning".to_string(), ToString::to_string),
            ),
            EntityOutcome::Skipped => println!("{:<24} skipped (not found)", entry.entity),
            EntityOutcome::Failed { error } => println!("{:<24} failed: {error}", entry.entity),
        }
    }
    println!(
        "Synced {} entities: {} fetched, {} upserted, {} skipped, {} failed",
        report.entities.len(),
        report.fetched(),
        report.upserted(),
        report.skipped(),
        report.failed()
    );
}

/// Prints export results; returns false if any category failed.
fn print_exports(exports: &[CategoryExport]) -> bool {
    let mut ok = true;
    for export in exports {
        match &export.result {
            Ok(result) => println!(
                "{:<8} train {:>6}  validation {:>6}  -> {}",
                export.category,
                result.train_rows,
                result.validation_rows,
                result
                    .paths
                    .first()
                    .and_then(|p| p.parent())
                    .map_or_else(String::new, |dir| dir.display().to_string()),
            ),
            Err(e) => {
                ok = false;
                println!("{:<8} export failed: {e}", export.category);
            },
        }
    }
    ok
}

fn cmd_status(config: &HarvestConfig, store: &dyn RecordStore) -> timeline_harvest::Result<ExitCode> {
    println!("Timeline Harvest Status");
    println!("=======================");
    println!();
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!("Store:   {}", config.store.path.display());
    println!("Output:  {}", config.export.output_dir.display());
    println!();

    for (category, entities) in &config.categories {
        println!("[{category}]");
        for entity in entities {
            println!("  {entity:<24} {:>8}", store.count(entity)?);
        }
    }

    let configured = config.all_entities();
    let untracked: Vec<String> = store
        .collections()?
        .into_iter()
        .filter(|c| !configured.contains(c))
        .collect();
    if !untracked.is_empty() {
        println!("[not configured]");
        for collection in untracked {
            println!("  {collection:<24} {:>8}", store.count(&collection)?);
        }
    }
    Ok(ExitCode::SUCCESS)
}
