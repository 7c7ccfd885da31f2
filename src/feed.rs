//! External stock feed: HTTP fetch and row mapping.
//!
//! The feed is a published spreadsheet CSV with one header row. Fetching
//! retries transient failures with exponential backoff; mapping turns each
//! row into a typed [`StockItem`], stripping thousands-separator commas
//! from numeric cells and rejecting rows without a SKU.
//!
//! Retry strategy:
//! - HTTP 429 and 5xx → retry with backoff
//! - other HTTP 4xx → fail immediately
//! - network errors → retry

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::config::FeedConfig;
use crate::models::StockItem;

/// One raw CSV row keyed by the spreadsheet's header names.
///
/// Every field defaults so a column missing from the sheet yields empty
/// cells instead of a parse failure; unknown columns are ignored.
#[derive(Debug, Default, Deserialize)]
struct FeedRow {
    #[serde(rename = "SKU", default)]
    sku: String,
    #[serde(rename = "Brand", default)]
    brand: String,
    #[serde(rename = "Product", default)]
    product: String,
    #[serde(rename = "City", default)]
    city: String,
    #[serde(rename = "Quantity", default)]
    quantity: String,
    #[serde(rename = "Rate", default)]
    rate: String,
    #[serde(rename = "Value", default)]
    value: String,
    #[serde(rename = "Item Description", default)]
    item_description: String,
    #[serde(rename = "Size", default)]
    size: String,
    #[serde(rename = "Pattern", default)]
    pattern: String,
    #[serde(rename = "Segment", default)]
    segment: String,
    #[serde(rename = "RIM/AH", default)]
    rim_ah: String,
}

/// Result of mapping one CSV payload.
#[derive(Debug)]
pub struct MappedFeed {
    pub items: Vec<StockItem>,
    /// Rows dropped for having an empty SKU after mapping.
    pub rejected: usize,
}

/// Fetch the feed CSV, retrying per the configured policy.
pub async fn fetch_feed(config: &FeedConfig) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let mut last_err = None;

    for attempt in 0..config.retry.max_attempts {
        if attempt > 0 {
            let factor = config.retry.backoff_multiplier.powi(attempt as i32 - 1);
            let delay = (config.retry.base_delay_ms as f64 * factor) as u64;
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let resp = client.get(&config.url).send().await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .text()
                        .await
                        .with_context(|| "Failed to read feed body");
                }

                // Rate limited or server error — retry
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow::anyhow!("Feed returned HTTP {}", status));
                    continue;
                }

                // Client error (not 429) — don't retry
                bail!("Feed returned HTTP {}", status);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Feed fetch failed after retries")))
}

/// Map a CSV payload into typed records.
///
/// A hard CSV error (unbalanced quotes, broken structure) aborts the whole
/// batch; a row that merely lacks a SKU is dropped and counted.
pub fn map_feed(csv_text: &str) -> Result<MappedFeed> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(csv_text.as_bytes());

    let mut items = Vec::new();
    let mut rejected = 0usize;

    for row in reader.deserialize::<FeedRow>() {
        let row = row.with_context(|| "Malformed feed row")?;
        match map_row(row) {
            Some(item) => items.push(item),
            None => rejected += 1,
        }
    }

    Ok(MappedFeed { items, rejected })
}

fn map_row(row: FeedRow) -> Option<StockItem> {
    if row.sku.is_empty() {
        return None;
    }

    Some(StockItem {
        id: row.sku,
        brand: row.brand,
        product: row.product,
        city: row.city,
        quantity: parse_count(&row.quantity),
        sell_price: parse_amount(&row.rate),
        cost_price: parse_amount(&row.value),
        remarks: String::new(),
        item_description: row.item_description,
        size: row.size,
        pattern: row.pattern,
        segment: row.segment,
        rim_ah: row.rim_ah,
    })
}

/// Parse an integer cell, tolerating thousands-separator commas.
/// Unparseable cells map to 0 so row mapping stays total.
fn parse_count(cell: &str) -> i64 {
    cell.replace(',', "").trim().parse().unwrap_or(0)
}

/// Parse a decimal cell, tolerating thousands-separator commas.
fn parse_amount(cell: &str) -> f64 {
    cell.replace(',', "").trim().parse().unwrap_or(0.0)
}
