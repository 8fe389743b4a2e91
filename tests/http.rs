mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::FakeEngine;
use ecomlab::clickhouse::queries;
use ecomlab::server::{dashboard_router, exporter_router};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn get(router: Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
    let (status, _, body) = get(router, uri).await;
    (status, serde_json::from_str(&body).unwrap())
}

#[tokio::test]
async fn scrape_exports_every_metric() {
    let (status, content_type, body) = get(exporter_router(FakeEngine::populated()), "/metrics/ecommerce").await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/plain"));

    let lines: Vec<&str> = body.lines().collect();
    assert!(lines.contains(&"ecommerce_total_products 3990000"));
    assert!(lines.contains(&"ecommerce_avg_price 1534.27"));
    assert!(lines.contains(&"ecommerce_raw_query_time 0.4"));
    assert!(lines.contains(&"ecommerce_speedup_ratio 24"));
    assert!(lines.contains(&"ecommerce_mv_speedup_ratio_mv 24"));
    // no queries in the last hour is a real zero
    assert!(lines.contains(&"ecommerce_memory_usage_bytes 0"));
    assert!(lines.contains(&"ecommerce_metric_up{metric=\"total_events\"} 1"));
    assert!(lines.contains(&"ecommerce_query_errors_total 0"));
    assert!(!body.contains("speedup_raw"));
    assert!(body.ends_with("ecommerce_query_errors_total 0\n"));
}

#[tokio::test]
async fn failed_metric_is_flagged_not_zeroed() {
    let engine = FakeEngine::populated().fail(queries::TOTAL_EVENTS);
    let (status, _, body) = get(exporter_router(engine), "/metrics/ecommerce").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.lines().any(|l| l.starts_with("ecommerce_total_events ")));
    assert!(body.contains("ecommerce_metric_up{metric=\"total_events\"} 0"));
    assert!(body.contains("ecommerce_query_errors_total 1"));
    assert!(body.contains("ecommerce_total_products 3990000"));
}

#[tokio::test]
async fn unreachable_store_scrapes_as_json_error() {
    let engine = FakeEngine::populated();
    engine.set_offline(true);
    let (status, body) = get_json(exporter_router(engine), "/metrics/ecommerce").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "error": "ClickHouse not connected" }));
}

#[tokio::test]
async fn health_reports_reachability() {
    let engine = FakeEngine::new();
    let (status, body) = get_json(exporter_router(engine.clone()), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok", "clickhouse": true }));

    engine.set_offline(true);
    let (_, body) = get_json(exporter_router(engine), "/health").await;
    assert_eq!(body["clickhouse"], false);
}

#[tokio::test]
async fn index_links_every_api_route() {
    let (status, content_type, body) = get(dashboard_router(FakeEngine::new()), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/html"));
    for route in ["/api/total-products", "/api/top-categories", "/api/top-brands", "/api/performance"] {
        assert!(body.contains(&format!("href=\"{}\"", route)), "missing {}", route);
    }
    assert!(body.contains("<iframe src=\"/api/summary\""));
}

#[tokio::test]
async fn summary_groups_digits_and_escapes_names() {
    let (status, _, body) = get(dashboard_router(FakeEngine::populated()), "/api/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Total Products: 3,990,000"));
    assert!(body.contains("Average Price: ₽1,534.27"));
    assert!(body.contains("<td>7508</td><td>120,000</td><td>₽899.50</td>"));
    assert!(body.contains("Bosch &lt;Pro&gt;"));
    assert!(!body.contains("Bosch <Pro>"));
}

#[tokio::test]
async fn summary_blanks_only_the_failing_section() {
    let engine = FakeEngine::populated().fail(queries::TOP_BRANDS);
    let (status, _, body) = get(dashboard_router(engine), "/api/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Total Products: 3,990,000"));
    assert!(body.contains("<td colspan=\"3\">Error: "));
}

#[tokio::test]
async fn json_api_answers_rows() {
    let router = dashboard_router(FakeEngine::populated());
    let (status, body) = get_json(router.clone(), "/api/total-products").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "total_products": 3_990_000 }));

    let (_, body) = get_json(router.clone(), "/api/top-categories").await;
    assert_eq!(body["top_categories"][0], json!([7508, 120_000, 899.5]));
    assert_eq!(body["top_categories"].as_array().unwrap().len(), 2);

    let (_, body) = get_json(router.clone(), "/api/top-brands").await;
    assert_eq!(body["top_brands"][0], json!(["Bosch <Pro>", 5400, 6100.9]));

    let (status, body) = get_json(router, "/api/performance").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["speedup_ratio"], 24.0);
    assert_eq!(body["memory_usage_bytes"], 0.0);
    assert!(body.get("errors").is_none());
}

#[tokio::test]
async fn api_errors_are_500_with_message() {
    let engine = FakeEngine::populated();
    engine.set_offline(true);
    let router = dashboard_router(engine);
    for uri in ["/api/total-products", "/api/top-categories", "/api/top-brands", "/api/performance"] {
        let (status, body) = get_json(router.clone(), uri).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{}", uri);
        assert!(body["error"].as_str().is_some(), "{}", uri);
    }
}
