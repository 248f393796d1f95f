//! rvsync: reconcile the R2R cruise registry into the cruise catalog.
//!
//! `rvsync sync` fetches every configured vessel's cruises plus the port,
//! person and organization vocabularies, then inserts whatever the catalog
//! is missing. `rvsync check` runs the same matching and only reports.

mod console;
mod logging;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use rvsync_core::{
    defaults, parse_vessels, AlwaysBundle, ConflictResolver, MatchReport, ReadFailurePolicy,
    ReconciliationPipeline, SyncConfig,
};
use rvsync_db::{log_pool_metrics, Database, PoolConfig};
use rvsync_registry::{acquire, RegistryClient};
use rvsync_core::logging::subsystem;

use crate::console::ConsolePrompt;

#[derive(Parser)]
#[command(name = "rvsync")]
#[command(author, version, about = "Reconcile R2R cruises into the cruise catalog")]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Catalog database URL
    #[arg(long, env = "DATABASE_URL", default_value = defaults::DATABASE_URL, global = true)]
    database_url: String,

    /// Vessel table as `Short=Canonical;Short=Canonical` (overrides RVSYNC_VESSELS)
    #[arg(long, global = true)]
    vessels: Option<String>,

    /// Registry API base URL (overrides RVSYNC_REGISTRY_URL)
    #[arg(long, global = true)]
    registry_url: Option<String>,

    /// Attempts per registry request (overrides RVSYNC_MAX_RETRIES)
    #[arg(long, global = true)]
    max_retries: Option<u32>,

    /// Concurrent registry fetches (overrides RVSYNC_WORKERS)
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// What to do when a catalog read fails: `propagate` or `empty`
    /// (overrides RVSYNC_READ_FAILURE)
    #[arg(long, global = true)]
    read_failure: Option<ReadFailurePolicy>,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert missing cruises, PIs and ports into the catalog
    Sync {
        /// Bundle every ambiguous PI with the existing entry instead of asking
        #[arg(long)]
        non_interactive: bool,
    },

    /// Report what is missing without writing to the catalog
    Check,
}

impl GlobalArgs {
    /// Environment configuration with command-line overrides applied.
    fn sync_config(&self) -> anyhow::Result<SyncConfig> {
        let mut config = SyncConfig::from_env().context("invalid RVSYNC_* environment")?;

        if let Some(table) = &self.vessels {
            config.vessels = parse_vessels(table)?;
        }
        if let Some(url) = &self.registry_url {
            config.registry_url = url.trim_end_matches('/').to_string();
        }
        if let Some(n) = self.max_retries {
            config.retry.max_attempts = n;
        }
        if let Some(n) = self.workers {
            config.worker_pool_size = n;
        }
        if let Some(policy) = self.read_failure {
            config.read_failure = policy;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = logging::init();

    let cli = Cli::parse();
    let start = Instant::now();
    let config = cli.global.sync_config()?;

    info!(
        subsystem = subsystem::CLI,
        vessels = config.vessels.len(),
        registry_url = %config.registry_url,
        read_failure = %config.read_failure,
        "Configuration loaded"
    );

    println!("Phase 1: Fetching R2R data in parallel...");
    let client = RegistryClient::from_config(&config)?;
    let upstream = acquire(&client, &config).await;
    println!("✓ Fetched {} cruises from R2R", upstream.cruises.len());

    if upstream.cruises.is_empty() {
        println!("No cruises fetched from R2R - nothing to reconcile");
        return Ok(());
    }

    println!("\nPhase 2: Database operations...");
    let pool_config = PoolConfig::from_env().context("invalid RVSYNC_DB_* environment")?;
    let db = Database::connect(&cli.global.database_url, &pool_config)
        .await
        .context("failed to connect to the catalog database")?;

    let resolver: Arc<dyn ConflictResolver> = match cli.command {
        Commands::Sync {
            non_interactive: true,
        }
        | Commands::Check => Arc::new(AlwaysBundle),
        Commands::Sync {
            non_interactive: false,
        } => Arc::new(ConsolePrompt),
    };
    let pipeline = ReconciliationPipeline::new(config, Arc::new(db.catalog.clone()), resolver);

    match cli.command {
        Commands::Check => {
            let report = pipeline.preview(&upstream).await?;
            print_report(&report);
        }
        Commands::Sync { .. } => {
            let summary = pipeline.run(&upstream).await?;
            println!(
                "Found: {} missing cruises, {} missing PIs, {} missing ports",
                summary.missing_cruises, summary.missing_pis, summary.missing_ports
            );
            if summary.missing_cruises == 0 {
                println!("No missing cruises to insert");
            } else {
                println!(
                    "\n✓ Inserted: {} PIs, {} Ports, {} Cruises ({:.2}s)",
                    summary.inserted_pis,
                    summary.inserted_ports,
                    summary.inserted_cruises,
                    start.elapsed().as_secs_f64()
                );
            }
        }
    }

    log_pool_metrics(&db.pool);
    Ok(())
}

fn print_report(report: &MatchReport) {
    println!(
        "Found: {} missing cruises, {} missing PIs, {} missing ports",
        report.missing_cruises.len(),
        report.missing_pis.len(),
        report.missing_ports.len()
    );
    for cruise in &report.missing_cruises {
        println!("  cruise {} ({})", cruise.cruise_id, cruise.vessel);
    }
    for (name, pi) in &report.missing_pis {
        println!("  PI     {} [{}]", name, pi.institution);
    }
    for name in report.missing_ports.keys() {
        println!("  port   {}", name);
    }
}
