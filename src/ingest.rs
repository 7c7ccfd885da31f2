//! Full-refresh ingestion pipeline.
//!
//! Each cycle fetches the entire feed, maps it into typed records, derives
//! the canonical shadow fields, and swaps the store contents in a single
//! transaction (delete-all, insert-all). Readers on the WAL database keep
//! seeing the previous snapshot until the swap commits, so no query ever
//! observes a half-refreshed store. A failed cycle leaves the last good
//! snapshot authoritative.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use crate::canon::CanonicalFields;
use crate::config::Config;
use crate::feed;
use crate::models::StockItem;

/// Counters from one completed refresh cycle.
#[derive(Debug, Clone, Copy)]
pub struct RefreshSummary {
    pub fetched: usize,
    pub rejected: usize,
    pub stored: usize,
}

/// Run one refresh cycle: fetch, map, normalize, swap.
pub async fn run_refresh(pool: &SqlitePool, config: &Config) -> Result<RefreshSummary> {
    let csv_text = feed::fetch_feed(&config.feed).await?;
    let mapped = feed::map_feed(&csv_text)?;

    if mapped.items.is_empty() {
        // An empty batch is indistinguishable from a broken feed; keep the
        // previous snapshot rather than publishing an empty store.
        bail!("feed produced no usable rows");
    }

    replace_all(pool, &mapped.items).await?;

    Ok(RefreshSummary {
        fetched: mapped.items.len() + mapped.rejected,
        rejected: mapped.rejected,
        stored: mapped.items.len(),
    })
}

/// Replace the store contents wholesale in one transaction.
///
/// Shadow columns are recomputed from the raw fields here and nowhere else.
/// Duplicate identifiers within a batch resolve as "replace" (last row wins).
pub async fn replace_all(pool: &SqlitePool, items: &[StockItem]) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM stock_items").execute(&mut *tx).await?;

    for item in items {
        let canon = CanonicalFields::of(item);
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO stock_items (
                id, brand, product, city, quantity, sell_price, cost_price,
                remarks, item_description, size, pattern, segment, rim_ah,
                id_canon, brand_canon, product_canon, city_canon,
                item_description_canon, size_canon, pattern_canon,
                segment_canon, rim_ah_canon
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(&item.brand)
        .bind(&item.product)
        .bind(&item.city)
        .bind(item.quantity)
        .bind(item.sell_price)
        .bind(item.cost_price)
        .bind(&item.remarks)
        .bind(&item.item_description)
        .bind(&item.size)
        .bind(&item.pattern)
        .bind(&item.segment)
        .bind(&item.rim_ah)
        .bind(&canon.id)
        .bind(&canon.brand)
        .bind(&canon.product)
        .bind(&canon.city)
        .bind(&canon.item_description)
        .bind(&canon.size)
        .bind(&canon.pattern)
        .bind(&canon.segment)
        .bind(&canon.rim_ah)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Serializes refresh attempts and tracks the last successful cycle.
///
/// A refresh already in flight causes the next trigger to be skipped rather
/// than queued; overlap would duplicate transactional work for no benefit.
pub struct Refresher {
    pool: SqlitePool,
    config: Arc<Config>,
    busy: Mutex<()>,
    last_success: RwLock<Option<DateTime<Utc>>>,
}

impl Refresher {
    pub fn new(pool: SqlitePool, config: Arc<Config>) -> Self {
        Self {
            pool,
            config,
            busy: Mutex::new(()),
            last_success: RwLock::new(None),
        }
    }

    /// Run one refresh unless another is in flight.
    ///
    /// Returns `Ok(None)` when skipped. Errors are propagated so the caller
    /// decides whether to log (scheduler) or report (CLI).
    pub async fn refresh(&self) -> Result<Option<RefreshSummary>> {
        let guard = self.busy.try_lock();
        let _guard = match guard {
            Ok(g) => g,
            Err(_) => {
                tracing::warn!("refresh already in flight; skipping this trigger");
                return Ok(None);
            }
        };

        let summary = run_refresh(&self.pool, &self.config).await?;
        *self.last_success.write().await = Some(Utc::now());
        Ok(Some(summary))
    }

    pub async fn last_success(&self) -> Option<DateTime<Utc>> {
        *self.last_success.read().await
    }
}

/// Spawn the periodic refresh loop.
///
/// The first tick is consumed immediately so the interval starts counting
/// from spawn; the caller is expected to have run the initial refresh
/// itself. Cycle failures are logged and never crash the serving process.
pub fn spawn_scheduler(refresher: Arc<Refresher>, interval_secs: u64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match refresher.refresh().await {
                Ok(Some(summary)) => {
                    tracing::info!(
                        stored = summary.stored,
                        rejected = summary.rejected,
                        "refresh complete"
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(error = %e, "refresh failed; previous snapshot stays authoritative");
                }
            }
        }
    })
}
