use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use stocklens::config::QueryConfig;
use stocklens::feed::map_feed;
use stocklens::ingest::replace_all;
use stocklens::migrate::run_migrations;
use stocklens::query::{filter_options, run_query, SortOrder, StockQuery};

const HEADER: &str =
    "SKU,Brand,Product,City,Quantity,Rate,Value,Item Description,Size,Pattern,Segment,RIM/AH";

async fn seeded_pool(csv_rows: &str) -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();

    let csv = format!("{HEADER}\n{csv_rows}");
    let mapped = map_feed(&csv).unwrap();
    replace_all(&pool, &mapped.items).await.unwrap();
    pool
}

fn search(term: &str) -> StockQuery {
    StockQuery {
        search: Some(term.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn free_text_matches_canonical_substring() {
    let pool = seeded_pool(
        "T-001,JK,TYRE,Pune,4,3550,3100,PCR_TYRE_JK_185/65 R15_TAXIMAX 88H_88H_TUBELESS TYRE,185/65 R15,TAXIMAX,PCR,R15\n\
         T-002,MRF,TYRE,Pune,2,4100,3700,PCR_TYRE_MRF_165/80 R14_ZVTS,165/80 R14,ZVTS,PCR,R14\n",
    )
    .await;
    let cfg = QueryConfig::default();

    // The size the user typed appears in the first description once
    // formatting noise is canonicalized away.
    let page = run_query(&pool, &cfg, &search("185/65 R15")).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.data[0].id, "T-001");

    // Wrong rim size: no contiguous-substring match anywhere.
    let page = run_query(&pool, &cfg, &search("185/65 R16")).await.unwrap();
    assert_eq!(page.total, 0);
    assert!(page.data.is_empty());
}

#[tokio::test]
async fn query_is_insensitive_to_case_and_separators() {
    let pool = seeded_pool(
        "T-001,JK,TYRE,Pune,4,3550,3100,PCR_TYRE_JK_185/65 R15_TAXIMAX,185/65 R15,TAXIMAX,PCR,R15\n",
    )
    .await;
    let cfg = QueryConfig::default();

    for term in ["185/65 r15", "185/65   R15", "TAXIMAX", "taximax", "tyre_jk"] {
        let page = run_query(&pool, &cfg, &search(term)).await.unwrap();
        assert_eq!(page.total, 1, "term {:?} should match", term);
    }
}

#[tokio::test]
async fn query_is_contiguous_not_tokenized() {
    let pool = seeded_pool(
        "T-001,JK,TYRE,Pune,4,3550,3100,PCR_TYRE_JK_185/65 R15_TAXIMAX,185/65 R15,TAXIMAX,PCR,R15\n",
    )
    .await;
    let cfg = QueryConfig::default();

    // Both words occur in the description, but never adjacently, so the
    // unsplit term must not match.
    let page = run_query(&pool, &cfg, &search("pcr taximax")).await.unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn search_only_covers_item_description() {
    // "Pune" appears in the city field, not the description.
    let pool =
        seeded_pool("T-001,JK,TYRE,Pune,4,3550,3100,PCR_TYRE_JK,185/65 R15,TAXIMAX,PCR,R15\n")
            .await;
    let cfg = QueryConfig::default();

    let page = run_query(&pool, &cfg, &search("Pune")).await.unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn facets_match_raw_values_and_combine_with_and() {
    let pool = seeded_pool(
        "T-001,JK,TYRE,Pune,4,100,90,PCR_TYRE_A,,,PCR,R15\n\
         T-002,JK,TYRE,Delhi,2,100,90,PCR_TYRE_B,,,PCR,R15\n\
         T-003,MRF,TYRE,Pune,1,100,90,PCR_TYRE_C,,,PCR,R14\n",
    )
    .await;
    let cfg = QueryConfig::default();

    let query = StockQuery {
        cities: vec!["Pune".to_string()],
        brands: vec!["JK".to_string()],
        ..Default::default()
    };
    let page = run_query(&pool, &cfg, &query).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.data[0].id, "T-001");

    // Facet equality is exact on the raw value, not canonicalized.
    let query = StockQuery {
        cities: vec!["pune".to_string()],
        ..Default::default()
    };
    let page = run_query(&pool, &cfg, &query).await.unwrap();
    assert_eq!(page.total, 0);

    // A multi-value facet is set membership.
    let query = StockQuery {
        cities: vec!["Pune".to_string(), "Delhi".to_string()],
        ..Default::default()
    };
    let page = run_query(&pool, &cfg, &query).await.unwrap();
    assert_eq!(page.total, 3);
}

#[tokio::test]
async fn facet_options_exclude_own_selection_only() {
    // Two records differing only in city: with a city filter active, brand
    // options must reflect the city filter while city options must not be
    // narrowed by the city selection itself.
    let pool = seeded_pool(
        "T-001,JK,TYRE,Pune,4,100,90,desc_a,,,PCR,R15\n\
         T-002,JK,TYRE,Delhi,2,100,90,desc_b,,,PCR,R15\n\
         T-003,MRF,TYRE,Delhi,1,100,90,desc_c,,,PCR,R14\n",
    )
    .await;

    let query = StockQuery {
        cities: vec!["Pune".to_string()],
        brands: vec!["MRF".to_string()],
        ..Default::default()
    };
    let options = filter_options(&pool, &query).await.unwrap();

    // Brand options honor the city filter (only JK is in Pune) and ignore
    // the current brand selection.
    assert_eq!(options.brands, vec!["JK".to_string()]);
    // City options honor the brand filter (MRF only exists in Delhi) and
    // ignore the current city selection.
    assert_eq!(options.cities, vec!["Delhi".to_string()]);
}

#[tokio::test]
async fn facet_options_are_sorted_and_skip_blanks() {
    let pool = seeded_pool(
        "T-001,JK,TYRE,Pune,4,100,90,a,,,PCR,R15\n\
         T-002,Apollo,TYRE,Delhi,2,100,90,b,,,PCR,R15\n\
         T-003,,TYRE,Agra,1,100,90,c,,,PCR,R14\n",
    )
    .await;

    let options = filter_options(&pool, &StockQuery::default()).await.unwrap();
    assert_eq!(options.brands, vec!["Apollo".to_string(), "JK".to_string()]);
    assert_eq!(
        options.cities,
        vec!["Agra".to_string(), "Delhi".to_string(), "Pune".to_string()]
    );
}

#[tokio::test]
async fn pagination_reports_full_count() {
    let rows: String = (0..25)
        .map(|i| format!("T-{i:03},JK,TYRE,Pune,1,100,90,desc_{i},,,PCR,R15\n"))
        .collect();
    let pool = seeded_pool(&rows).await;
    let cfg = QueryConfig::default();

    let query = StockQuery {
        page: Some(2),
        page_size: Some(10),
        ..Default::default()
    };
    let page = run_query(&pool, &cfg, &query).await.unwrap();
    assert_eq!(page.total, 25);
    assert_eq!(page.page, 2);
    assert_eq!(page.page_size, 10);
    assert_eq!(page.data.len(), 10);
    assert_eq!(page.data[0].id, "T-010");

    // Pages past the end are empty but still carry the count.
    let query = StockQuery {
        page: Some(9),
        page_size: Some(10),
        ..Default::default()
    };
    let page = run_query(&pool, &cfg, &query).await.unwrap();
    assert_eq!(page.total, 25);
    assert!(page.data.is_empty());
}

#[tokio::test]
async fn sorting_with_fallback_key() {
    let pool = seeded_pool(
        "T-001,JK,TYRE,Pune,5,300,90,a,,,PCR,R15\n\
         T-002,Apollo,TYRE,Pune,1,100,90,b,,,PCR,R15\n\
         T-003,MRF,TYRE,Pune,3,200,90,c,,,PCR,R14\n",
    )
    .await;
    let cfg = QueryConfig::default();

    let query = StockQuery {
        sort_by: Some("sellPrice".to_string()),
        sort_order: SortOrder::Desc,
        ..Default::default()
    };
    let page = run_query(&pool, &cfg, &query).await.unwrap();
    let ids: Vec<&str> = page.data.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["T-001", "T-003", "T-002"]);

    // Unknown sort key silently falls back to id ascending.
    let query = StockQuery {
        sort_by: Some("nonsense".to_string()),
        ..Default::default()
    };
    let page = run_query(&pool, &cfg, &query).await.unwrap();
    let ids: Vec<&str> = page.data.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["T-001", "T-002", "T-003"]);
}

#[tokio::test]
async fn empty_search_and_empty_facets_match_everything() {
    let pool = seeded_pool(
        "T-001,JK,TYRE,Pune,5,300,90,a,,,PCR,R15\n\
         T-002,Apollo,TYRE,Pune,1,100,90,b,,,PCR,R15\n",
    )
    .await;
    let cfg = QueryConfig::default();

    let page = run_query(&pool, &cfg, &search("")).await.unwrap();
    assert_eq!(page.total, 2);
}
