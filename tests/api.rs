// tests/api.rs
//
// End-to-end checks over the warp filters in store-less (degraded) mode.
// Nothing here touches the network or a database: single-symbol lookups are
// excluded, and the blacklist cache is built from the seed list.

use std::sync::Arc;

use serde_json::Value;

use halal_stocks_api::routes::{routes, AppState};
use halal_stocks_api::services::blacklist::BlacklistCache;
use halal_stocks_api::services::yahoo::YahooClient;

fn test_state() -> Arc<AppState> {
    let blacklist = BlacklistCache::new();
    blacklist.load_from_seed();
    Arc::new(AppState {
        db: None,
        blacklist,
        yahoo: YahooClient::new().expect("client builds"),
    })
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let api = routes(test_state());
    let resp = warp::test::request()
        .method("GET")
        .path("/api/v1/health")
        .reply(&api)
        .await;

    assert_eq!(resp.status(), 200);
    let body: Value = serde_json::from_slice(resp.body()).unwrap();
    assert_eq!(body["status"], "OK");
}

#[tokio::test]
async fn listing_without_database_degrades_with_a_message() {
    let api = routes(test_state());
    let resp = warp::test::request()
        .method("GET")
        .path("/api/v1/stocks?sector=technology&sortBy=score")
        .reply(&api)
        .await;

    assert_eq!(resp.status(), 200);
    let body: Value = serde_json::from_slice(resp.body()).unwrap();
    assert_eq!(body["stocks"].as_array().unwrap().len(), 0);
    assert!(body["message"].as_str().unwrap().contains("Database not connected"));
    assert_eq!(body["pagination"]["page"], 1);
    assert_eq!(body["pagination"]["limit"], 100);
}

#[tokio::test]
async fn search_without_database_returns_empty_list() {
    let api = routes(test_state());
    let resp = warp::test::request()
        .method("GET")
        .path("/api/v1/stocks/search/apple")
        .reply(&api)
        .await;

    assert_eq!(resp.status(), 200);
    let body: Value = serde_json::from_slice(resp.body()).unwrap();
    assert_eq!(body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn stats_without_database_report_zeros() {
    let api = routes(test_state());
    let resp = warp::test::request()
        .method("GET")
        .path("/api/v1/stats")
        .reply(&api)
        .await;

    assert_eq!(resp.status(), 200);
    let body: Value = serde_json::from_slice(resp.body()).unwrap();
    assert_eq!(body["stocksAnalyzed"], 0);
    assert_eq!(body["shariahCompliant"], 0);
}

#[tokio::test]
async fn blacklist_cache_refresh_works_without_a_store() {
    let api = routes(test_state());
    let resp = warp::test::request()
        .method("POST")
        .path("/api/v1/admin/blacklist/refresh")
        .reply(&api)
        .await;

    assert_eq!(resp.status(), 200);
    let body: Value = serde_json::from_slice(resp.body()).unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["stats"]["BDS"], 40);
    assert_eq!(body["stats"]["ETHICAL"], 20);
}

#[tokio::test]
async fn blacklist_listing_requires_the_store() {
    let api = routes(test_state());
    let resp = warp::test::request()
        .method("GET")
        .path("/api/v1/admin/blacklist")
        .reply(&api)
        .await;

    assert_eq!(resp.status(), 503);
}

#[tokio::test]
async fn adding_a_blacklist_entry_validates_required_fields() {
    let api = routes(test_state());
    let resp = warp::test::request()
        .method("POST")
        .path("/api/v1/admin/blacklist")
        .json(&serde_json::json!({"type": "", "symbol": "", "reason": ""}))
        .reply(&api)
        .await;

    assert_eq!(resp.status(), 400);
    let body: Value = serde_json::from_slice(resp.body()).unwrap();
    assert!(body["error"].as_str().unwrap().contains("required"));
}

#[tokio::test]
async fn unknown_routes_return_404() {
    let api = routes(test_state());
    let resp = warp::test::request()
        .method("GET")
        .path("/api/v1/nope")
        .reply(&api)
        .await;

    assert_eq!(resp.status(), 404);
}
