//! Core data models for the stock store.
//!
//! These types represent the inventory records and query results that flow
//! through the ingestion and query pipeline. JSON field names follow the
//! camelCase convention the table front end consumes.

use serde::{Deserialize, Serialize};

/// One inventory line item, raw fields only.
///
/// The canonical shadow columns that back substring search are an internal
/// storage detail and are never serialized to a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockItem {
    pub id: String,
    pub brand: String,
    pub product: String,
    pub city: String,
    pub quantity: i64,
    pub sell_price: f64,
    pub cost_price: f64,
    pub remarks: String,
    pub item_description: String,
    pub size: String,
    pub pattern: String,
    pub segment: String,
    pub rim_ah: String,
}

/// One page of query results plus the pre-pagination match count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockPage {
    pub data: Vec<StockItem>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

/// Distinct raw values currently reachable for each facet, for populating
/// filter dropdowns. Each list reflects every active constraint except the
/// facet's own selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub cities: Vec<String>,
    pub brands: Vec<String>,
    pub products: Vec<String>,
    pub segments: Vec<String>,
    pub rim_ahs: Vec<String>,
}
