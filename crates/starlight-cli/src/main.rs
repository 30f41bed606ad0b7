// ============================================================================
// starlight-catalog — CLI for the Starlight item catalog
// ============================================================================
// Usage:
//   starlight-catalog query [--category C] [--search S] [--filter F=V]...
//   starlight-catalog options --field Class [--class-priority A,B]
//   starlight-catalog cache stats           Show cached categories
//   starlight-catalog cache clear [--category C]
// ============================================================================

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::debug;

use starlight_core::cache::{CacheStore, NoopCacheStore};
use starlight_core::query::derive_filter_options;
use starlight_core::{
    CatalogConfig, CatalogQuery, CategoryCache, FilterSelection, Item, ItemSource,
    JsonCatalogSource, RarityOrder, RedbCacheStore, ALL_CATEGORY, NAME_FIELD, PRICE_FIELD,
    RARITY_FIELD, TYPE_FIELD,
};

/// Starlight item catalog tool
#[derive(Parser)]
#[command(name = "starlight-catalog", version, about = "Query the Starlight item catalog")]
struct Cli {
    /// Path to the cache database (default: ~/.starlight/catalog.redb)
    #[arg(long, global = true)]
    db_path: Option<String>,

    /// JSON catalog export used as the upstream item store
    #[arg(long, global = true)]
    catalog: Option<String>,

    /// Bypass the category cache entirely
    #[arg(long, global = true)]
    no_cache: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search, filter, and sort items in a category
    Query {
        /// Category to load (default: All)
        #[arg(long, default_value = ALL_CATEGORY)]
        category: String,

        /// Case-insensitive substring of the item name
        #[arg(long, default_value = "")]
        search: String,

        /// Field filter as Field=Value (repeatable)
        #[arg(long = "filter")]
        filters: Vec<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List selector options for a field
    Options {
        /// Field name, e.g. Class, Rarity, "Special / Notes"
        #[arg(long)]
        field: String,

        /// Category to load (default: All)
        #[arg(long, default_value = ALL_CATEGORY)]
        category: String,

        /// Classes listed first, in this order (comma-separated)
        #[arg(long, value_delimiter = ',')]
        class_priority: Vec<String>,
    },

    /// Inspect or clear the category cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show cached categories and their freshness
    Stats,

    /// Remove one category, or everything
    Clear {
        #[arg(long)]
        category: Option<String>,
    },
}

fn parse_filter(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((field, value)) if !field.trim().is_empty() => {
            Ok((field.trim().to_string(), value.trim().to_string()))
        }
        _ => anyhow::bail!("Invalid filter '{}'. Expected Field=Value", raw),
    }
}

fn format_timestamp(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("(invalid: {})", ms))
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("starlight_core=info")),
        )
        .init();
}

fn open_cache(cli: &Cli, config: &CatalogConfig) -> Result<CategoryCache> {
    let store: Arc<dyn CacheStore> = if cli.no_cache {
        debug!("Cache disabled");
        Arc::new(NoopCacheStore)
    } else {
        let db_path = cli.db_path.as_deref().or(config.db_path.as_deref());
        Arc::new(RedbCacheStore::open(db_path)?)
    };

    let catalog_path = cli.catalog.as_deref().or(config.catalog_path.as_deref());
    let source: Arc<dyn ItemSource> = match catalog_path {
        Some(path) => Arc::new(JsonCatalogSource::load(path)?),
        // Cache-only commands never reach upstream
        None => Arc::new(JsonCatalogSource::from_items(Vec::new())),
    };

    Ok(CategoryCache::with_config(store, source, config.cache_config()))
}

fn require_catalog(cli: &Cli, config: &CatalogConfig) -> Result<()> {
    if cli.catalog.is_none() && config.catalog_path.is_none() {
        anyhow::bail!("No catalog configured. Pass --catalog FILE or set STARLIGHT_CATALOG_PATH");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();
    let config = CatalogConfig::load().context("Failed to read configuration")?;

    match &cli.command {
        Commands::Query {
            category,
            search,
            filters,
            json,
        } => {
            require_catalog(&cli, &config)?;
            let cache = open_cache(&cli, &config)?;
            cmd_query(&cache, category, search, filters, *json).await
        }
        Commands::Options {
            field,
            category,
            class_priority,
        } => {
            require_catalog(&cli, &config)?;
            let cache = open_cache(&cli, &config)?;
            cmd_options(&cache, field, category, class_priority).await
        }
        Commands::Cache { action } => {
            let cache = open_cache(&cli, &config)?;
            match action {
                CacheAction::Stats => cmd_cache_stats(&cache).await,
                CacheAction::Clear { category } => cmd_cache_clear(&cache, category.as_deref()).await,
            }
        }
    }
}

async fn cmd_query(
    cache: &CategoryCache,
    category: &str,
    search: &str,
    raw_filters: &[String],
    json: bool,
) -> Result<()> {
    let mut filters = FilterSelection::new();
    for raw in raw_filters {
        let (field, value) = parse_filter(raw)?;
        filters.set(field, value);
    }

    let items = cache.fetch(category).await?;
    let query = CatalogQuery::new(search, filters);
    let shown = query.run(&items, &RarityOrder::default());

    if json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    if shown.is_empty() {
        println!("No items found.");
        return Ok(());
    }

    println!("{:<32}  {:<18}  {:<12}  {:>8}", "NAME", "TYPE", "RARITY", "PRICE");
    println!("{}", "-".repeat(76));

    for item in &shown {
        println!(
            "{:<32}  {:<18}  {:<12}  {:>8}",
            truncate(item, NAME_FIELD, 32),
            truncate(item, TYPE_FIELD, 18),
            truncate(item, RARITY_FIELD, 12),
            item.field_text(PRICE_FIELD).unwrap_or_else(|| "-".into())
        );
    }

    println!("\nShowing {} of {} items", shown.len(), items.len());
    Ok(())
}

fn truncate(item: &Item, field: &str, width: usize) -> String {
    item.field_text(field)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "-".into())
        .chars()
        .take(width)
        .collect()
}

async fn cmd_options(
    cache: &CategoryCache,
    field: &str,
    category: &str,
    class_priority: &[String],
) -> Result<()> {
    let items = cache.fetch(category).await?;
    let options = derive_filter_options(&items, field, class_priority);

    for option in &options {
        println!("{}", option.label());
    }
    Ok(())
}

async fn cmd_cache_stats(cache: &CategoryCache) -> Result<()> {
    let stats = cache.stats().await?;
    let ttl_hours = cache.config().ttl_ms as f64 / 3_600_000.0;

    println!("=== Starlight Category Cache ===");
    println!("TTL:      {:.1}h", ttl_hours);
    println!("Entries:  {} ({} fresh, {} corrupted)", stats.total, stats.fresh, stats.corrupted);

    if stats.entries.is_empty() {
        return Ok(());
    }

    println!();
    println!("{:<24}  {:>6}  {:<24}  {}", "CATEGORY", "ITEMS", "FETCHED AT", "STATE");
    println!("{}", "-".repeat(70));
    for entry in &stats.entries {
        println!(
            "{:<24}  {:>6}  {:<24}  {}",
            entry.category,
            entry.item_count,
            format_timestamp(entry.fetched_at),
            if entry.fresh { "fresh" } else { "stale" }
        );
    }
    Ok(())
}

async fn cmd_cache_clear(cache: &CategoryCache, category: Option<&str>) -> Result<()> {
    match category {
        Some(category) => {
            if cache.invalidate(category).await? {
                println!("Cleared cached category {}", category);
            } else {
                println!("Category {} was not cached", category);
            }
        }
        None => {
            let count = cache.clear().await?;
            println!("Cleared {} cached categories", count);
        }
    }
    Ok(())
}
