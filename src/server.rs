//! HTTP API for the stock table front end.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`   | `/api/stock` | Paged, filtered, sorted records |
//! | `GET`   | `/api/filters` | Per-facet option lists |
//! | `GET`   | `/api/export` | CSV download (optionally by id) |
//! | `PATCH` | `/api/stock/{id}` | Edit quantity/remarks in place |
//! | `GET`   | `/health` | Liveness, version, last refresh time |
//!
//! # Error contract
//!
//! Failures return `{ "error": { "code": "...", "message": "..." } }`. A
//! query that matches nothing is not a failure; it returns a normal page
//! with `total: 0`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted; the table front end is
//! served from a different origin.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::export;
use crate::ingest::Refresher;
use crate::models::{FilterOptions, StockItem, StockPage};
use crate::query::{self, SortOrder, StockQuery, RAW_COLUMNS};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    pool: SqlitePool,
    config: Arc<Config>,
    refresher: Arc<Refresher>,
}

/// Start the HTTP server. Runs until the process is terminated.
pub async fn run_server(
    pool: SqlitePool,
    config: Arc<Config>,
    refresher: Arc<Refresher>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState {
        pool,
        config,
        refresher,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/stock", get(handle_stock))
        .route("/api/stock/{id}", patch(handle_update))
        .route("/api/filters", get(handle_filters))
        .route("/api/export", get(handle_export))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    tracing::info!(bind = %bind_addr, "stock API listening");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

/// Storage failures surface as a request failure, never as an empty page.
fn storage_error(err: anyhow::Error) -> AppError {
    tracing::error!(error = %err, "storage failure while serving a query");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "storage".to_string(),
        message: "failed to query the stock store".to_string(),
    }
}

// ============ Query-string mapping ============

/// Map raw query pairs into a [`StockQuery`].
///
/// Facet params repeat (`city=Pune&city=Delhi`); the original client's
/// plural spellings (`cities`, `rimAhs`) are accepted as aliases. Malformed
/// numbers are dropped here and defaulted/clamped downstream.
fn parse_stock_query(params: &[(String, String)]) -> StockQuery {
    let mut query = StockQuery::default();

    for (key, value) in params {
        match key.as_str() {
            "search" => query.search = Some(value.clone()),
            "city" | "cities" => query.cities.push(value.clone()),
            "brand" | "brands" => query.brands.push(value.clone()),
            "product" | "products" => query.products.push(value.clone()),
            "segment" | "segments" => query.segments.push(value.clone()),
            "rimAh" | "rimAhs" => query.rim_ahs.push(value.clone()),
            "sortBy" => query.sort_by = Some(value.clone()),
            "sortOrder" => query.sort_order = SortOrder::parse(value),
            "page" => query.page = value.parse().ok(),
            "pageSize" => query.page_size = value.parse().ok(),
            _ => {}
        }
    }

    query
}

// ============ GET /api/stock ============

async fn handle_stock(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<StockPage>, AppError> {
    let stock_query = parse_stock_query(&params);
    let page = query::run_query(&state.pool, &state.config.query, &stock_query)
        .await
        .map_err(storage_error)?;
    Ok(Json(page))
}

// ============ GET /api/filters ============

async fn handle_filters(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<FilterOptions>, AppError> {
    let stock_query = parse_stock_query(&params);
    let options = query::filter_options(&state.pool, &stock_query)
        .await
        .map_err(storage_error)?;
    Ok(Json(options))
}

// ============ GET /api/export ============

async fn handle_export(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let ids: Vec<String> = params
        .iter()
        .filter(|(k, _)| k == "id" || k == "ids")
        .map(|(_, v)| v.clone())
        .collect();

    let items = export::fetch_for_export(&state.pool, &ids)
        .await
        .map_err(storage_error)?;
    let bytes = export::to_csv(&items).map_err(storage_error)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"stock-export.csv\"",
            ),
        ],
        bytes,
    )
        .into_response())
}

// ============ PATCH /api/stock/{id} ============

/// The two fields the table allows editing between refreshes. Neither has a
/// canonical shadow, so no re-normalization is involved.
#[derive(Debug, Deserialize)]
struct StockEdit {
    quantity: Option<i64>,
    remarks: Option<String>,
}

async fn handle_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(edit): Json<StockEdit>,
) -> Result<Json<StockItem>, AppError> {
    if edit.quantity.is_none() && edit.remarks.is_none() {
        return Err(bad_request("provide quantity and/or remarks"));
    }

    let updated = apply_stock_edit(&state.pool, &id, &edit)
        .await
        .map_err(storage_error)?;

    match updated {
        Some(item) => Ok(Json(item)),
        None => Err(not_found(format!("no stock item with id: {}", id))),
    }
}

/// Apply an in-place edit, returning the updated record or `None` when the
/// identifier is unknown.
async fn apply_stock_edit(
    pool: &SqlitePool,
    id: &str,
    edit: &StockEdit,
) -> anyhow::Result<Option<StockItem>> {
    let mut sets = Vec::new();
    if edit.quantity.is_some() {
        sets.push("quantity = ?");
    }
    if edit.remarks.is_some() {
        sets.push("remarks = ?");
    }
    let sql = format!("UPDATE stock_items SET {} WHERE id = ?", sets.join(", "));

    let mut update = sqlx::query(&sql);
    if let Some(quantity) = edit.quantity {
        update = update.bind(quantity);
    }
    if let Some(ref remarks) = edit.remarks {
        update = update.bind(remarks);
    }
    let result = update.bind(id).execute(pool).await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    let row = sqlx::query(&format!(
        "SELECT {RAW_COLUMNS} FROM stock_items WHERE id = ?"
    ))
    .bind(id)
    .fetch_one(pool)
    .await?;

    Ok(Some(query::item_from_row(&row)))
}

// ============ GET /health ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    version: String,
    last_refresh: Option<DateTime<Utc>>,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        last_refresh: state.refresher.last_success().await,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_repeatable_facets() {
        let params = pairs(&[
            ("search", "185/65 R15"),
            ("city", "Pune"),
            ("city", "Delhi"),
            ("brand", "JK"),
            ("sortBy", "sellPrice"),
            ("sortOrder", "desc"),
            ("page", "2"),
            ("pageSize", "50"),
        ]);
        let query = parse_stock_query(&params);

        assert_eq!(query.search.as_deref(), Some("185/65 R15"));
        assert_eq!(query.cities, vec!["Pune", "Delhi"]);
        assert_eq!(query.brands, vec!["JK"]);
        assert_eq!(query.sort_by.as_deref(), Some("sellPrice"));
        assert_eq!(query.sort_order, SortOrder::Desc);
        assert_eq!(query.page, Some(2));
        assert_eq!(query.page_size, Some(50));
    }

    #[test]
    fn test_parse_accepts_plural_aliases() {
        let params = pairs(&[("cities", "Pune"), ("rimAhs", "R15"), ("segments", "PCR")]);
        let query = parse_stock_query(&params);
        assert_eq!(query.cities, vec!["Pune"]);
        assert_eq!(query.rim_ahs, vec!["R15"]);
        assert_eq!(query.segments, vec!["PCR"]);
    }

    #[test]
    fn test_parse_drops_malformed_numbers() {
        let params = pairs(&[("page", "abc"), ("pageSize", "-"), ("unknown", "x")]);
        let query = parse_stock_query(&params);
        assert_eq!(query.page, None);
        assert_eq!(query.page_size, None);
    }

    async fn seeded_pool() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::migrate::run_migrations(&pool).await.unwrap();

        let item = StockItem {
            id: "T-001".to_string(),
            brand: "JK".to_string(),
            product: "TYRE".to_string(),
            city: "Pune".to_string(),
            quantity: 4,
            sell_price: 3550.0,
            cost_price: 3100.0,
            remarks: String::new(),
            item_description: "PCR_TYRE_JK_185/65 R15".to_string(),
            size: "185/65 R15".to_string(),
            pattern: "TAXIMAX".to_string(),
            segment: "PCR".to_string(),
            rim_ah: "R15".to_string(),
        };
        crate::ingest::replace_all(&pool, &[item]).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_edit_updates_only_quantity_and_remarks() {
        let pool = seeded_pool().await;

        let edit = StockEdit {
            quantity: Some(9),
            remarks: Some("reserved for Pune depot".to_string()),
        };
        let updated = apply_stock_edit(&pool, "T-001", &edit).await.unwrap().unwrap();
        assert_eq!(updated.quantity, 9);
        assert_eq!(updated.remarks, "reserved for Pune depot");
        assert_eq!(updated.item_description, "PCR_TYRE_JK_185/65 R15");

        // Neither edited field has a canonical shadow; the search columns
        // are untouched.
        let canon: String =
            sqlx::query_scalar("SELECT item_description_canon FROM stock_items WHERE id = 'T-001'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(canon, "pcrtyrejk185/65 r15");
    }

    #[tokio::test]
    async fn test_edit_unknown_id_is_none() {
        let pool = seeded_pool().await;
        let edit = StockEdit {
            quantity: Some(1),
            remarks: None,
        };
        assert!(apply_stock_edit(&pool, "NOPE", &edit).await.unwrap().is_none());
    }
}
