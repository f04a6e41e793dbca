mod common;

use chrono::{Local, NaiveDate};
use common::*;
use fin_scraper::apis::icbc::IcbcAdapter;
use fin_scraper::constants::ICBC_BASE_URL;
use fin_scraper::db::Database;
use fin_scraper::pacer::Pacer;
use fin_scraper::pipeline::{CrawlOptions, Pipeline};
use fin_scraper::processor::Processor;
use fin_scraper::types::{CrawlResult, ProductRecord};
use std::sync::Arc;

fn options() -> CrawlOptions {
    CrawlOptions {
        max_products: None,
        lookback_days: 30,
        pacer: Pacer::disabled(),
    }
}

fn scenario_fetcher() -> Arc<StubFetcher> {
    Arc::new(
        StubFetcher::new()
            .with_page(
                catalog_url(1),
                catalog_html(
                    &[
                        Item::new("A001", "稳利A").with_detail("/detail/A001.jsp"),
                        Item::without_code("无代码B").with_detail("/detail/B.jsp"),
                    ],
                    false,
                ),
            )
            .with_page(format!("{ICBC_BASE_URL}/detail/A001.jsp"), DETAILS_HTML)
            .with_page(returns_prefix("A001"), THREE_RETURNS_JSON),
    )
}

fn fresh_db() -> Database {
    let db = Database::open_in_memory().unwrap();
    db.init_schema().unwrap();
    db
}

#[tokio::test]
async fn test_first_run_then_repeat_run_is_idempotent() {
    let mut db = fresh_db();
    let fetcher = scenario_fetcher();
    let adapter = IcbcAdapter::new(fetcher.clone(), Pacer::disabled());

    let first = Pipeline::new(options()).run(&adapter).await;
    let summary = Processor::new(&mut db).process(&first).unwrap();

    assert_eq!(summary.products_count, 1);
    assert_eq!(summary.products_new, 1);
    assert_eq!(summary.products_updated, 0);
    assert_eq!(summary.returns_count, 3);
    assert_eq!(summary.returns_new, 3);

    // the code-less item is never enriched
    assert!(!fetcher.requests().iter().any(|u| u.contains("/detail/B.jsp")));

    let second = Pipeline::new(options()).run(&adapter).await;
    let summary = Processor::new(&mut db).process(&second).unwrap();

    assert_eq!(summary.products_new, 0);
    assert_eq!(summary.products_updated, 1);
    assert_eq!(summary.returns_count, 3);
    assert_eq!(summary.returns_new, 0);

    assert_eq!(db.count_products().unwrap(), 1);
    assert_eq!(db.count_returns().unwrap(), 3);

    let stored = db.find_product("A001").unwrap().unwrap();
    assert_eq!(stored.status.as_deref(), Some("On Sale"));
    assert_eq!(stored.last_update, Some(Local::now().date_naive()));

    let history = db.returns_for("A001").unwrap();
    let dates: Vec<_> = history.iter().map(|r| r.date).collect();
    assert_eq!(
        dates,
        vec![
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 3).unwrap(),
        ]
    );
}

#[tokio::test]
async fn test_failed_returns_still_persist_product() {
    let mut db = fresh_db();
    let fetcher = Arc::new(
        StubFetcher::new()
            .with_page(
                catalog_url(1),
                catalog_html(&[Item::new("A001", "稳利A"), Item::new("A002", "稳利B")], false),
            )
            .with_page(returns_prefix("A002"), THREE_RETURNS_JSON),
    );
    let adapter = IcbcAdapter::new(fetcher, Pacer::disabled());

    let result = Pipeline::new(options()).run(&adapter).await;
    let summary = Processor::new(&mut db).process(&result).unwrap();

    assert_eq!(summary.products_new, 2);
    assert_eq!(summary.returns_new, 3);

    let a1 = db.find_product("A001").unwrap().unwrap();
    assert_eq!(a1.product_name.as_deref(), Some("稳利A"));
    assert_eq!(a1.risk_level.as_deref(), Some("PR2"));
    assert!(db.returns_for("A001").unwrap().is_empty());
    assert_eq!(db.returns_for("A002").unwrap().len(), 3);
}

#[tokio::test]
async fn test_catalog_outage_leaves_store_untouched() {
    let mut db = fresh_db();
    let adapter = IcbcAdapter::new(Arc::new(StubFetcher::new()), Pacer::disabled());

    let result = Pipeline::new(options()).run(&adapter).await;
    let summary = Processor::new(&mut db).process(&result).unwrap();

    assert_eq!(summary.products_count, 0);
    assert_eq!(summary.returns_count, 0);
    assert_eq!(db.count_products().unwrap(), 0);
}

#[test]
fn test_missing_status_keeps_stored_status() {
    let mut db = fresh_db();
    let crawled_at = Local::now();

    let mut with_status = ProductRecord::new("A001");
    with_status.product_name = Some("稳利A".to_string());
    with_status.status = Some("On Sale".to_string());
    let mut first = CrawlResult::empty("公司", "https://example.com", crawled_at);
    first.products.push(with_status);
    Processor::new(&mut db).process(&first).unwrap();

    let mut without_status = ProductRecord::new("A001");
    without_status.product_name = Some("稳利A".to_string());
    let mut second = CrawlResult::empty("公司", "https://example.com", crawled_at);
    second.products.push(without_status);
    let summary = Processor::new(&mut db).process(&second).unwrap();

    assert_eq!(summary.products_updated, 1);
    let stored = db.find_product("A001").unwrap().unwrap();
    assert_eq!(stored.status.as_deref(), Some("On Sale"));
}
