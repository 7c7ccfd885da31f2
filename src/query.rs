//! Query building and execution for the stock table.
//!
//! Translates a structured request — free-text term, exact-match facet
//! sets, sort key, paging — into parameterized SQL over the store.
//!
//! The matching contract: the free-text term is canonicalized as one
//! contiguous unit (never tokenized) and a record matches iff the result is
//! a contiguous substring of the record's canonical item-description
//! shadow. Facets match raw values by exact set membership. All active
//! constraints combine with AND.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::canon::canonicalize;
use crate::config::QueryConfig;
use crate::models::{FilterOptions, StockItem, StockPage};

/// Sort direction; ascending unless the caller says otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("desc") {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        }
    }

    fn sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// A structured query request. Empty vectors and `None` fields impose no
/// constraint.
#[derive(Debug, Clone, Default)]
pub struct StockQuery {
    pub search: Option<String>,
    pub cities: Vec<String>,
    pub brands: Vec<String>,
    pub products: Vec<String>,
    pub segments: Vec<String>,
    pub rim_ahs: Vec<String>,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// The five facet-filterable attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    City,
    Brand,
    Product,
    Segment,
    RimAh,
}

impl Facet {
    pub const ALL: [Facet; 5] = [
        Facet::City,
        Facet::Brand,
        Facet::Product,
        Facet::Segment,
        Facet::RimAh,
    ];

    fn column(self) -> &'static str {
        match self {
            Facet::City => "city",
            Facet::Brand => "brand",
            Facet::Product => "product",
            Facet::Segment => "segment",
            Facet::RimAh => "rim_ah",
        }
    }
}

fn facet_values(query: &StockQuery, facet: Facet) -> &[String] {
    match facet {
        Facet::City => &query.cities,
        Facet::Brand => &query.brands,
        Facet::Product => &query.products,
        Facet::Segment => &query.segments,
        Facet::RimAh => &query.rim_ahs,
    }
}

/// Sort keys callers may request, mapped to their columns. Anything else
/// silently falls back to the identifier.
const SORTABLE: &[(&str, &str)] = &[
    ("id", "id"),
    ("brand", "brand"),
    ("product", "product"),
    ("city", "city"),
    ("quantity", "quantity"),
    ("sellPrice", "sell_price"),
    ("costPrice", "cost_price"),
    ("itemDescription", "item_description"),
    ("size", "size"),
    ("pattern", "pattern"),
    ("segment", "segment"),
    ("rimAh", "rim_ah"),
];

fn sort_column(key: Option<&str>) -> &'static str {
    key.and_then(|k| SORTABLE.iter().find(|(name, _)| *name == k))
        .map(|(_, col)| *col)
        .unwrap_or("id")
}

/// Escape LIKE wildcards so the canonicalized term matches literally.
/// Canonicalization already removed `_`; `%` and `\` must not act as
/// wildcards either.
fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for ch in term.chars() {
        if ch == '\\' || ch == '%' || ch == '_' {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

struct WhereClause {
    sql: String,
    binds: Vec<String>,
}

/// Build the WHERE clause for a request.
///
/// `skip` omits one facet's own constraint; filter-option discovery uses it
/// to compute "what could I additionally pick given everything else".
fn build_where(query: &StockQuery, skip: Option<Facet>) -> WhereClause {
    let mut conditions = Vec::new();
    let mut binds = Vec::new();

    if let Some(term) = query.search.as_deref() {
        let canon = canonicalize(term);
        if !canon.is_empty() {
            conditions.push("item_description_canon LIKE ? ESCAPE '\\'".to_string());
            binds.push(format!("%{}%", escape_like(&canon)));
        }
    }

    for facet in Facet::ALL {
        if skip == Some(facet) {
            continue;
        }
        let values = facet_values(query, facet);
        if values.is_empty() {
            continue;
        }
        let placeholders = vec!["?"; values.len()].join(", ");
        conditions.push(format!("{} IN ({})", facet.column(), placeholders));
        binds.extend(values.iter().cloned());
    }

    let sql = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    WhereClause { sql, binds }
}

/// Resolve paging to a concrete (page, page_size, offset) triple.
/// Out-of-range values clamp; the offset can never go negative.
fn page_bounds(query: &StockQuery, config: &QueryConfig) -> (i64, i64, i64) {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query
        .page_size
        .unwrap_or(config.default_page_size)
        .clamp(1, config.max_page_size);
    (page, page_size, (page - 1) * page_size)
}

/// Raw columns returned to callers. Shadow columns stay internal.
pub(crate) const RAW_COLUMNS: &str = "id, brand, product, city, quantity, sell_price, cost_price, \
     remarks, item_description, size, pattern, segment, rim_ah";

pub(crate) fn item_from_row(row: &SqliteRow) -> StockItem {
    StockItem {
        id: row.get("id"),
        brand: row.get("brand"),
        product: row.get("product"),
        city: row.get("city"),
        quantity: row.get("quantity"),
        sell_price: row.get("sell_price"),
        cost_price: row.get("cost_price"),
        remarks: row.get("remarks"),
        item_description: row.get("item_description"),
        size: row.get("size"),
        pattern: row.get("pattern"),
        segment: row.get("segment"),
        rim_ah: row.get("rim_ah"),
    }
}

/// Run a query: count all matches, then fetch the requested page.
pub async fn run_query(
    pool: &SqlitePool,
    config: &QueryConfig,
    query: &StockQuery,
) -> Result<StockPage> {
    let clause = build_where(query, None);

    let count_sql = format!("SELECT COUNT(*) FROM stock_items {}", clause.sql);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for bind in &clause.binds {
        count_query = count_query.bind(bind);
    }
    let total = count_query.fetch_one(pool).await?;

    let (page, page_size, offset) = page_bounds(query, config);
    let order = sort_column(query.sort_by.as_deref());
    let direction = query.sort_order.sql();

    // Secondary id sort keeps pages stable when the sort column ties.
    let data_sql = format!(
        "SELECT {RAW_COLUMNS} FROM stock_items {} ORDER BY {} {}, id ASC LIMIT ? OFFSET ?",
        clause.sql, order, direction
    );
    let mut data_query = sqlx::query(&data_sql);
    for bind in &clause.binds {
        data_query = data_query.bind(bind);
    }
    let rows = data_query
        .bind(page_size)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    Ok(StockPage {
        data: rows.iter().map(item_from_row).collect(),
        total,
        page,
        page_size,
    })
}

/// Compute the distinct raw option lists for every facet.
///
/// Each facet sees the search term and the other facets' selections but
/// never its own; otherwise its option list would collapse to whatever is
/// already selected.
pub async fn filter_options(pool: &SqlitePool, query: &StockQuery) -> Result<FilterOptions> {
    let mut options = FilterOptions::default();

    for facet in Facet::ALL {
        let clause = build_where(query, Some(facet));
        let column = facet.column();
        let sql = format!(
            "SELECT DISTINCT {column} FROM stock_items {} ORDER BY {column}",
            clause.sql
        );
        let mut q = sqlx::query_scalar::<_, String>(&sql);
        for bind in &clause.binds {
            q = q.bind(bind);
        }
        let values: Vec<String> = q
            .fetch_all(pool)
            .await?
            .into_iter()
            .filter(|v| !v.is_empty())
            .collect();

        match facet {
            Facet::City => options.cities = values,
            Facet::Brand => options.brands = values,
            Facet::Product => options.products = values,
            Facet::Segment => options.segments = values,
            Facet::RimAh => options.rim_ahs = values,
        }
    }

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> QueryConfig {
        QueryConfig::default()
    }

    #[test]
    fn test_no_constraints_yields_empty_where() {
        let clause = build_where(&StockQuery::default(), None);
        assert_eq!(clause.sql, "");
        assert!(clause.binds.is_empty());
    }

    #[test]
    fn test_search_term_is_canonicalized_whole() {
        let query = StockQuery {
            search: Some("185/65 R15".to_string()),
            ..Default::default()
        };
        let clause = build_where(&query, None);
        assert_eq!(clause.sql, "WHERE item_description_canon LIKE ? ESCAPE '\\'");
        // One bind for the whole term; no per-word split.
        assert_eq!(clause.binds, vec!["%185/65 r15%".to_string()]);
    }

    #[test]
    fn test_blank_search_imposes_no_constraint() {
        for term in ["", "   ", ",,__"] {
            let query = StockQuery {
                search: Some(term.to_string()),
                ..Default::default()
            };
            let clause = build_where(&query, None);
            assert_eq!(clause.sql, "", "term {:?} should not constrain", term);
        }
    }

    #[test]
    fn test_facets_combine_with_and() {
        let query = StockQuery {
            search: Some("tyre".to_string()),
            cities: vec!["Pune".to_string(), "Delhi".to_string()],
            brands: vec!["JK".to_string()],
            ..Default::default()
        };
        let clause = build_where(&query, None);
        assert_eq!(
            clause.sql,
            "WHERE item_description_canon LIKE ? ESCAPE '\\' AND city IN (?, ?) AND brand IN (?)"
        );
        assert_eq!(clause.binds, vec!["%tyre%", "Pune", "Delhi", "JK"]);
    }

    #[test]
    fn test_skip_excludes_only_that_facet() {
        let query = StockQuery {
            cities: vec!["Pune".to_string()],
            brands: vec!["JK".to_string()],
            ..Default::default()
        };
        let clause = build_where(&query, Some(Facet::Brand));
        assert_eq!(clause.sql, "WHERE city IN (?)");
        assert_eq!(clause.binds, vec!["Pune"]);
    }

    #[test]
    fn test_like_wildcards_match_literally() {
        assert_eq!(escape_like("50%"), "50\\%");
        assert_eq!(escape_like("a\\b"), "a\\\\b");

        let query = StockQuery {
            search: Some("50% extra".to_string()),
            ..Default::default()
        };
        let clause = build_where(&query, None);
        assert_eq!(clause.binds, vec!["%50\\% extra%".to_string()]);
    }

    #[test]
    fn test_sort_key_allow_list() {
        assert_eq!(sort_column(Some("sellPrice")), "sell_price");
        assert_eq!(sort_column(Some("rimAh")), "rim_ah");
        assert_eq!(sort_column(Some("quantity")), "quantity");
        // Unknown keys fall back silently; no injection path.
        assert_eq!(sort_column(Some("id; DROP TABLE stock_items")), "id");
        assert_eq!(sort_column(Some("remarks")), "id");
        assert_eq!(sort_column(None), "id");
    }

    #[test]
    fn test_sort_order_parse() {
        assert_eq!(SortOrder::parse("desc"), SortOrder::Desc);
        assert_eq!(SortOrder::parse("DESC"), SortOrder::Desc);
        assert_eq!(SortOrder::parse("asc"), SortOrder::Asc);
        assert_eq!(SortOrder::parse("sideways"), SortOrder::Asc);
    }

    #[test]
    fn test_page_bounds_clamp() {
        let cfg = config();

        let (page, size, offset) = page_bounds(&StockQuery::default(), &cfg);
        assert_eq!((page, size, offset), (1, 20, 0));

        let query = StockQuery {
            page: Some(-3),
            page_size: Some(0),
            ..Default::default()
        };
        let (page, size, offset) = page_bounds(&query, &cfg);
        assert_eq!((page, size, offset), (1, 1, 0));

        let query = StockQuery {
            page: Some(4),
            page_size: Some(10_000),
            ..Default::default()
        };
        let (page, size, offset) = page_bounds(&query, &cfg);
        assert_eq!(page, 4);
        assert_eq!(size, cfg.max_page_size);
        assert_eq!(offset, 3 * cfg.max_page_size);
    }
}
