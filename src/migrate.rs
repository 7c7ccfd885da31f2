//! Schema setup for the stock store.
//!
//! One table holds both the raw record fields and their canonical shadow
//! columns. Shadows are populated only by the ingestion pipeline; nothing
//! else writes them.

use anyhow::Result;
use sqlx::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stock_items (
            id TEXT PRIMARY KEY,
            brand TEXT NOT NULL DEFAULT '',
            product TEXT NOT NULL DEFAULT '',
            city TEXT NOT NULL DEFAULT '',
            quantity INTEGER NOT NULL DEFAULT 0,
            sell_price REAL NOT NULL DEFAULT 0,
            cost_price REAL NOT NULL DEFAULT 0,
            remarks TEXT NOT NULL DEFAULT '',
            item_description TEXT NOT NULL DEFAULT '',
            size TEXT NOT NULL DEFAULT '',
            pattern TEXT NOT NULL DEFAULT '',
            segment TEXT NOT NULL DEFAULT '',
            rim_ah TEXT NOT NULL DEFAULT '',

            id_canon TEXT NOT NULL DEFAULT '',
            brand_canon TEXT NOT NULL DEFAULT '',
            product_canon TEXT NOT NULL DEFAULT '',
            city_canon TEXT NOT NULL DEFAULT '',
            item_description_canon TEXT NOT NULL DEFAULT '',
            size_canon TEXT NOT NULL DEFAULT '',
            pattern_canon TEXT NOT NULL DEFAULT '',
            segment_canon TEXT NOT NULL DEFAULT '',
            rim_ah_canon TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Facet filters match on raw values; a plain sequential list is all the
    // index setup needs.
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_stock_city ON stock_items(city)",
        "CREATE INDEX IF NOT EXISTS idx_stock_brand ON stock_items(brand)",
        "CREATE INDEX IF NOT EXISTS idx_stock_product ON stock_items(product)",
        "CREATE INDEX IF NOT EXISTS idx_stock_segment ON stock_items(segment)",
        "CREATE INDEX IF NOT EXISTS idx_stock_rim_ah ON stock_items(rim_ah)",
    ];

    for stmt in indexes {
        sqlx::query(stmt).execute(pool).await?;
    }

    Ok(())
}
