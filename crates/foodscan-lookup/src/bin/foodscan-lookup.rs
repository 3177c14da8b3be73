//! # foodscan-lookup
//!
//! Developer tool that runs barcodes through the real pipeline (SQLite
//! cache, rate limiter, Open Food Facts) and prints each outcome as JSON.
//!
//! ```text
//! foodscan-lookup 3017620422003 036000291452
//! foodscan-lookup --locale fr-FR 3017620422003
//! foodscan-lookup --evict 30
//! foodscan-lookup --evict          # uses cache.evict_after_days
//! RUST_LOG=foodscan=debug foodscan-lookup --clear-cache 96385074
//! ```
//!
//! Logs go to stderr so stdout stays valid JSON.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use foodscan_db::{Database, DbConfig};
use foodscan_lookup::{LookupConfig, LookupError, ResolutionOutcome, ResolutionPipeline};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "foodscan-lookup", version, about = "Resolve barcodes through the FoodScan pipeline")]
struct Args {
    /// Barcodes to resolve, in order
    barcodes: Vec<String>,

    /// Config file (default: platform config directory)
    #[arg(long, env = "FOODSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Preferred locale for product text, e.g. "fr" or "pt-BR"
    #[arg(long)]
    locale: Option<String>,

    /// Delete every cached product first
    #[arg(long)]
    clear_cache: bool,

    /// Delete cached products older than DAYS first (default from config)
    #[arg(long, value_name = "DAYS", num_args = 0..=1)]
    evict: Option<Option<u32>>,
}

/// `RUST_LOG` wins; otherwise info for FoodScan crates, warn for the rest.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,foodscan=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();

    let mut config = LookupConfig::load(args.config)?;
    if let Some(locale) = args.locale {
        config.pipeline.preferred_locale = locale;
        config.validate()?;
    }

    let db_path = config
        .database_path()
        .ok_or_else(|| LookupError::InvalidConfig("no data directory for the database".into()))?;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db = Database::new(DbConfig::new(db_path.clone())).await?;
    info!(path = %db_path.display(), "Opened database");

    let pipeline =
        ResolutionPipeline::from_config(&config, Arc::new(db.store()), Arc::new(db.history()))?;

    if args.clear_cache {
        let removed = pipeline.clear_cache().await?;
        info!(removed, "Cleared product cache");
    }

    if let Some(requested) = args.evict {
        let days = config.eviction_days(requested);
        let removed = pipeline.evict_expired_cache(days).await?;
        info!(removed, days, "Evicted expired cache entries");
    }

    for raw in &args.barcodes {
        let outcome = pipeline.resolve(raw).await;
        println!("{}", serde_json::to_string_pretty(&render(raw, outcome))?);
    }

    db.close().await;
    Ok(())
}

fn render(raw: &str, outcome: Option<ResolutionOutcome>) -> Value {
    match outcome {
        Some(ResolutionOutcome::Found { product, source }) => json!({
            "input": raw,
            "outcome": "found",
            "source": source,
            "product": product,
        }),
        Some(ResolutionOutcome::NotFound { barcode }) => json!({
            "input": raw,
            "outcome": "not_found",
            "barcode": barcode.code(),
        }),
        Some(ResolutionOutcome::Failed(err)) => json!({
            "input": raw,
            "outcome": "failed",
            "error": err.to_string(),
            "retryable": err.is_retryable(),
        }),
        None => json!({
            "input": raw,
            "outcome": "cancelled",
        }),
    }
}
