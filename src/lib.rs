//! # stocklens
//!
//! An inventory browsing service for tyre/battery stock. A periodic sync
//! pulls the published spreadsheet CSV into a local SQLite store, derives
//! canonical shadow fields for formatting-insensitive substring search, and
//! exposes a paginated, filterable, sortable query API for a table front
//! end.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌───────────┐
//! │  CSV feed    │──▶│  Ingestion    │──▶│  SQLite    │
//! │ (spreadsheet)│   │ map+normalize │   │ raw+canon  │
//! └──────────────┘   └───────────────┘   └─────┬─────┘
//!                                              │
//!                            ┌─────────────────┤
//!                            ▼                 ▼
//!                      ┌──────────┐      ┌──────────┐
//!                      │   CLI    │      │   HTTP   │
//!                      │(stocklens)│     │  (axum)  │
//!                      └──────────┘      └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`canon`] | Text canonicalization and record shadows |
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`feed`] | Feed fetch (with retry) and CSV row mapping |
//! | [`ingest`] | Full-refresh pipeline and scheduler |
//! | [`query`] | Search, facet filters, sorting, pagination |
//! | [`export`] | CSV export |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema setup |

pub mod canon;
pub mod config;
pub mod db;
pub mod export;
pub mod feed;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod query;
pub mod server;
