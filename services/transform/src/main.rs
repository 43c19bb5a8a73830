//! Transform Service - Curates raw energy facts into dimension and KPI tables
//!
//! Responsibilities:
//! - Load the plant capacity reference file
//! - Read raw energy, heating and CO2 facts from the table store
//! - Build DimDate / DimPlant, curated facts and the KPI fact tables
//! - Overwrite every output table (or, with --dry-run, only report them)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tablestore::postgres::DEFAULT_BATCH_ROWS;
use tablestore::{DryRunStore, PgTableStore};
use tracing::Instrument;
use tracing_subscriber::EnvFilter;
use transform::reference::DEFAULT_REFERENCE_PATH;
use transform::{load_reference, run, PipelineOptions, RunSummary};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "transform", about = "Curates raw energy facts into dimension and KPI tables")]
struct Args {
    /// Plant capacity reference file (overrides PLANT_CAPACITY_PATH)
    #[arg(long)]
    reference: Option<PathBuf>,

    /// Dry run - build every table but don't write to the database
    #[arg(long, default_value = "false")]
    dry_run: bool,

    /// Fail when factco2daily repeats a (plant_id, date) key
    #[arg(long, default_value = "false")]
    strict_co2_keys: bool,
}

#[derive(Debug)]
struct Config {
    db_url: String,
    reference_path: PathBuf,
    batch_rows: usize,
    strict_co2_keys: bool,
}

impl Config {
    fn from_env() -> Result<Self> {
        Ok(Self {
            db_url: std::env::var("DB_URL").context("DB_URL env var missing")?,
            reference_path: PathBuf::from(
                std::env::var("PLANT_CAPACITY_PATH")
                    .unwrap_or_else(|_| DEFAULT_REFERENCE_PATH.to_string()),
            ),
            batch_rows: std::env::var("INSERT_BATCH_ROWS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_BATCH_ROWS),
            strict_co2_keys: std::env::var("STRICT_CO2_KEYS")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }
}

fn print_summary(summary: &RunSummary) {
    println!("\n=== Summary ===");
    println!("Energy facts: {}", summary.energy_rows);
    println!("Heating facts: {}", summary.heating_rows);
    println!("CO2 facts: {}", summary.co2_rows);
    println!("Reference rows: {}", summary.reference_rows);
    if summary.duplicate_co2_keys > 0 {
        println!("Duplicate CO2 keys: {}", summary.duplicate_co2_keys);
    }
    if !summary.conflicting_plants.is_empty() {
        println!(
            "Plants with conflicting attributes: {}",
            summary.conflicting_plants.join(", ")
        );
    }
    for table in &summary.published {
        println!("  {} {} rows ({:?})", table.table, table.rows, table.mode);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;
    let dry_run = args.dry_run;
    let reference_path = args.reference.unwrap_or(config.reference_path);
    let options = PipelineOptions {
        strict_co2_keys: args.strict_co2_keys || config.strict_co2_keys,
    };
    let (db_url, batch_rows) = (config.db_url, config.batch_rows);
    let run_id = Uuid::new_v4();

    println!("=== Energy KPI Transform ===");
    println!("Run ID: {}", run_id);
    println!("Reference: {}", reference_path.display());
    println!("Mode: {}", if dry_run { "dry-run" } else { "live" });

    let span = tracing::info_span!("transform", %run_id, dry_run);
    async move {
        let reference = load_reference(&reference_path)
            .with_context(|| format!("Failed to load reference {}", reference_path.display()))?;

        let store = PgTableStore::connect(&db_url, 5)
            .await
            .context("Failed to connect to database")?
            .with_batch_rows(batch_rows);

        if dry_run {
            let dry = DryRunStore::new(store);
            let summary = run(&dry, &reference, options)
                .await
                .context("Transform run failed")?;
            print_summary(&summary);

            println!("\nDry run - nothing written. Tables that would be overwritten:");
            for (name, table) in dry.pending_writes() {
                println!("  {} ({} rows): {}", name, table.len(), table.schema().describe());
            }
        } else {
            let summary = run(&store, &reference, options)
                .await
                .context("Transform run failed")?;
            print_summary(&summary);
            let json = serde_json::to_string(&summary)?;
            tracing::debug!(summary = %json, "run summary");
        }

        println!("\n✓ Transform complete");
        Ok::<(), anyhow::Error>(())
    }
    .instrument(span)
    .await
}
