//! # stocklens CLI
//!
//! The `stocklens` binary is the primary interface for the stock browser.
//! It provides commands for database initialization, feed sync, terminal
//! search, CSV export, and running the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! stocklens --config ./config/stocklens.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `stocklens init` | Create the SQLite database and schema |
//! | `stocklens sync` | Run one full refresh from the feed |
//! | `stocklens search "<query>"` | Query the store from the terminal |
//! | `stocklens export` | Write the store as CSV |
//! | `stocklens serve` | Refresh periodically and serve the HTTP API |

mod canon;
mod config;
mod db;
mod export;
mod feed;
mod ingest;
mod migrate;
mod models;
mod query;
mod server;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::query::{SortOrder, StockQuery};

/// Stock browser CLI — sync a spreadsheet feed into SQLite and query it.
#[derive(Parser)]
#[command(
    name = "stocklens",
    about = "Inventory browsing service: periodic CSV feed sync with canonicalized substring search",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/stocklens.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the stock table. Idempotent —
    /// running it multiple times is safe.
    Init,

    /// Run one full refresh from the feed.
    ///
    /// Fetches the CSV, maps and normalizes every row, and atomically
    /// replaces the store contents. A failed refresh leaves the previous
    /// snapshot in place.
    Sync {
        /// Fetch and map without writing to the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// Search the store from the terminal.
    ///
    /// The query is matched as a contiguous substring against the
    /// canonicalized item description; facet flags restrict raw values
    /// exactly and may repeat.
    Search {
        /// Free-text query (may be empty to list everything).
        #[arg(default_value = "")]
        query: String,

        /// Restrict to a city (repeatable).
        #[arg(long = "city")]
        cities: Vec<String>,

        /// Restrict to a brand (repeatable).
        #[arg(long = "brand")]
        brands: Vec<String>,

        /// Restrict to a product (repeatable).
        #[arg(long = "product")]
        products: Vec<String>,

        /// Restrict to a segment (repeatable).
        #[arg(long = "segment")]
        segments: Vec<String>,

        /// Restrict to a rim/AH code (repeatable).
        #[arg(long = "rim-ah")]
        rim_ahs: Vec<String>,

        /// Sort key (e.g. `brand`, `sellPrice`); unknown keys sort by id.
        #[arg(long)]
        sort_by: Option<String>,

        /// Sort descending instead of ascending.
        #[arg(long)]
        desc: bool,

        /// 1-based page number.
        #[arg(long)]
        page: Option<i64>,

        /// Rows per page.
        #[arg(long)]
        page_size: Option<i64>,
    },

    /// Export the store as CSV to stdout or a file.
    Export {
        /// Output file path; stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Refresh periodically and serve the HTTP API.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Sync { dry_run } => {
            if dry_run {
                let csv_text = feed::fetch_feed(&cfg.feed).await?;
                let mapped = feed::map_feed(&csv_text)?;
                println!("sync feed (dry-run)");
                println!("  rows fetched: {}", mapped.items.len() + mapped.rejected);
                println!("  rows rejected: {}", mapped.rejected);
                println!("  rows mappable: {}", mapped.items.len());
                return Ok(());
            }

            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            let summary = ingest::run_refresh(&pool, &cfg).await?;
            pool.close().await;

            println!("sync feed");
            println!("  fetched: {} rows", summary.fetched);
            println!("  rejected: {}", summary.rejected);
            println!("  stored: {}", summary.stored);
            println!("ok");
        }
        Commands::Search {
            query,
            cities,
            brands,
            products,
            segments,
            rim_ahs,
            sort_by,
            desc,
            page,
            page_size,
        } => {
            let pool = db::connect(&cfg).await?;
            let request = StockQuery {
                search: Some(query),
                cities,
                brands,
                products,
                segments,
                rim_ahs,
                sort_by,
                sort_order: if desc { SortOrder::Desc } else { SortOrder::Asc },
                page,
                page_size,
            };

            let result = query::run_query(&pool, &cfg.query, &request).await?;
            pool.close().await;

            if result.data.is_empty() {
                println!("No results.");
                return Ok(());
            }

            println!(
                "{} matches (page {}, {} per page)",
                result.total, result.page, result.page_size
            );
            for item in &result.data {
                println!(
                    "{} | {} | {} | {} | qty {} | rate {:.2}",
                    item.id, item.brand, item.city, item.item_description, item.quantity,
                    item.sell_price
                );
            }
        }
        Commands::Export { output } => {
            let pool = db::connect(&cfg).await?;
            export::run_export(&pool, output.as_deref()).await?;
            pool.close().await;
        }
        Commands::Serve => {
            let fmt_layer = tracing_subscriber::fmt::layer().with_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            );
            tracing_subscriber::registry().with(fmt_layer).init();

            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;

            let cfg = Arc::new(cfg);
            let refresher = Arc::new(ingest::Refresher::new(pool.clone(), cfg.clone()));

            // Initial refresh; serving starts either way and the next timer
            // tick gets another chance.
            match refresher.refresh().await {
                Ok(Some(summary)) => {
                    tracing::info!(
                        stored = summary.stored,
                        rejected = summary.rejected,
                        "initial refresh complete"
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(error = %e, "initial refresh failed; serving previous snapshot");
                }
            }

            let _refresh_loop = ingest::spawn_scheduler(refresher.clone(), cfg.sync.interval_secs);
            server::run_server(pool, cfg, refresher).await?;
        }
    }

    Ok(())
}
