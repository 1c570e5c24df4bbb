//! tariffwatch CLI
//!
//! Local execution entry point for the tariff document change monitor.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tariffwatch::{
    error::Result,
    models::{Config, DocumentStatus, SourceList},
    pipeline::{render_report, run_monitor},
    services::{ChangeDetector, Fingerprinter, HtmlCandidateResolver, KeywordSelector},
    storage::SqliteStore,
    utils::http,
};

/// tariffwatch - Utility Tariff Document Change Monitor
#[derive(Parser, Debug)]
#[command(
    name = "tariffwatch",
    version,
    about = "Monitors utility tariff documents for content changes"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "tariffwatch.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run change detection over a source list and write the report
    Run {
        /// Path to the source-list TOML file
        #[arg(short, long)]
        sources: PathBuf,

        /// Probe remote metadata before downloading full documents
        #[arg(long)]
        quick: bool,

        /// Create the store schema if absent
        #[arg(long)]
        init: bool,

        /// Directory the report is written to (defaults to config)
        #[arg(long)]
        report_dir: Option<PathBuf>,

        /// Also dump the raw run record as JSON
        #[arg(long)]
        json_out: Option<PathBuf>,
    },

    /// Create the document store schema
    Init,

    /// Validate the configuration and, optionally, a source list
    Validate {
        /// Source-list file to validate alongside the config
        #[arg(short, long)]
        sources: Option<PathBuf>,
    },

    /// Show document store statistics
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("tariffwatch starting...");

    let config = Config::load_or_default(&cli.config);

    match cli.command {
        Command::Run {
            sources,
            quick,
            init,
            report_dir,
            json_out,
        } => {
            config.validate()?;
            let source_list = SourceList::load(&sources)?;
            let list_name = sources
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| sources.display().to_string());

            let store = SqliteStore::open(&config.store.db_path, init)?;
            let client = http::create_async_client(&config.fetch)?;
            let resolver = HtmlCandidateResolver::new(client.clone());
            let selector = KeywordSelector::new(&config.selection);
            let detector = ChangeDetector::new(Fingerprinter::new(client, &config.fetch), quick);

            if quick {
                log::info!("Quick mode: probing remote metadata before downloading");
            }

            let record = run_monitor(
                &config,
                &list_name,
                &source_list.sources,
                &store,
                &resolver,
                &selector,
                &detector,
            )
            .await?;

            let report_dir =
                report_dir.unwrap_or_else(|| PathBuf::from(&config.report.output_dir));
            std::fs::create_dir_all(&report_dir)?;
            let stem = sources
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "run".to_string());
            let report_path = report_dir.join(format!("{stem}.md"));
            std::fs::write(
                &report_path,
                render_report(&record, config.report.rationale_width),
            )?;
            log::info!("Report written to {}", report_path.display());

            if let Some(path) = json_out {
                std::fs::write(&path, serde_json::to_string_pretty(&record)?)?;
                log::info!("Run record written to {}", path.display());
            }

            log::info!(
                "Run complete: {} added, {} updated, {} errors",
                record.total_added(),
                record.total_updated(),
                record.total_errors()
            );
            if record.has_errors() {
                log::warn!("Some sources reported errors; see the report for details.");
            }
        }

        Command::Init => {
            SqliteStore::open(&config.store.db_path, true)?;
            log::info!("Document store ready at {}", config.store.db_path);
        }

        Command::Validate { sources } => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");

            if let Some(path) = sources {
                let list = SourceList::load(&path)?;
                log::info!("✓ Source list OK ({} sources)", list.sources.len());
            }

            log::info!("All validations passed!");
        }

        Command::Info => {
            log::info!("Store: {}", config.store.db_path);
            match SqliteStore::open(&config.store.db_path, false) {
                Ok(store) => {
                    log::info!(
                        "Active documents: {}",
                        store.count_by_status(DocumentStatus::Active)?
                    );
                    log::info!(
                        "Obsolete documents: {}",
                        store.count_by_status(DocumentStatus::Obsolete)?
                    );
                }
                Err(e) => log::info!("Store not initialized yet ({e})"),
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
