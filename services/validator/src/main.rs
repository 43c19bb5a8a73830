//! Validator Service - Quality gate over the curated tables
//!
//! Responsibilities:
//! - Count rows of every curated table
//! - Report each empty, missing or unreadable table
//! - Exit non-zero when any table fails

use anyhow::{Context, Result};
use clap::Parser;
use tablestore::catalog::CURATED_TABLES;
use tablestore::PgTableStore;
use tracing_subscriber::EnvFilter;
use validator::validate_tables;

#[derive(Parser, Debug)]
#[command(name = "validator", about = "Checks that every curated table exists and has rows")]
struct Args {
    /// Table to check (repeatable); defaults to every curated table
    #[arg(long = "table")]
    tables: Vec<String>,

    /// Print the report as JSON
    #[arg(long, default_value = "false")]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    let db_url = std::env::var("DB_URL").context("DB_URL env var missing")?;

    let tables = if args.tables.is_empty() {
        CURATED_TABLES.iter().map(|t| t.to_string()).collect()
    } else {
        args.tables
    };

    let store = PgTableStore::connect(&db_url, 2)
        .await
        .context("Failed to connect to database")?;

    let report = validate_tables(&store, &tables[..]).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("=== Curated Table Validation ===");
        for check in report.checks.iter().filter(|c| c.passed()) {
            if let validator::TableStatus::Ok { rows } = check.status {
                println!("✓ {}: {} rows", check.table, rows);
            }
        }
    }

    let failures = report.failures();
    if !failures.is_empty() {
        eprintln!("\nValidation errors:");
        for failure in &failures {
            eprintln!(" - {}", failure);
        }
        anyhow::bail!("Curated data validation failed.");
    }

    if !args.json {
        println!("\nAll curated tables passed validation.");
    }
    Ok(())
}
