//! CSV export of the stock table.
//!
//! Produces a CSV of raw record fields for download or piping. Used by both
//! the HTTP export endpoint and the `export` CLI command.

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

use crate::models::StockItem;
use crate::query::{item_from_row, RAW_COLUMNS};

/// Fetch records for export: everything, or just the given identifiers.
pub async fn fetch_for_export(pool: &SqlitePool, ids: &[String]) -> Result<Vec<StockItem>> {
    let rows = if ids.is_empty() {
        sqlx::query(&format!(
            "SELECT {RAW_COLUMNS} FROM stock_items ORDER BY id"
        ))
        .fetch_all(pool)
        .await?
    } else {
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {RAW_COLUMNS} FROM stock_items WHERE id IN ({placeholders}) ORDER BY id"
        );
        let mut q = sqlx::query(&sql);
        for id in ids {
            q = q.bind(id);
        }
        q.fetch_all(pool).await?
    };

    Ok(rows.iter().map(item_from_row).collect())
}

/// Serialize records as CSV with a header row.
pub fn to_csv(items: &[StockItem]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for item in items {
        writer.serialize(item)?;
    }
    Ok(writer.into_inner()?)
}

/// Export the whole store as CSV to `output`, or stdout when absent.
pub async fn run_export(pool: &SqlitePool, output: Option<&Path>) -> Result<()> {
    let items = fetch_for_export(pool, &[]).await?;
    let bytes = to_csv(&items)?;

    match output {
        Some(path) => {
            std::fs::write(path, &bytes)?;
            println!("Exported {} records to {}", items.len(), path.display());
        }
        None => {
            print!("{}", String::from_utf8_lossy(&bytes));
        }
    }

    Ok(())
}
