use std::net::SocketAddr;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::clickhouse::{queries, value_as_u64, QueryEngine, Rows};
use crate::dashboard::{self, Summary};
use crate::{metrics, Result};

/// Error returned by the dashboard JSON API: HTTP 500 with an `{"error": ...}` body
#[derive(Debug)]
pub struct ApiError(pub String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": self.0 }))).into_response()
    }
}

impl From<crate::LabError> for ApiError {
    fn from(err: crate::LabError) -> Self {
        Self(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self(err.to_string())
    }
}

/// runs a blocking engine call off the async runtime
async fn blocking<E, T, F>(engine: E, f: F) -> std::result::Result<T, tokio::task::JoinError>
where
    E: QueryEngine,
    T: Send + 'static,
    F: FnOnce(E) -> T + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(engine)).await
}

/// Routes of the Prometheus metrics exporter:
///
/// - `GET /metrics/ecommerce` - text exposition of [`metrics::collect`], or a JSON
///   `{"error": ...}` body when ClickHouse does not answer
/// - `GET /health` - `{"status": "ok", "clickhouse": <reachable>}`
pub fn exporter_router<E: QueryEngine>(engine: E) -> Router {
    Router::new()
        .route("/metrics/ecommerce", get(ecommerce_metrics::<E>))
        .route("/health", get(health::<E>))
        .with_state(engine)
        .layer(TraceLayer::new_for_http())
}

/// Routes of the HTML dashboard and its JSON API
pub fn dashboard_router<E: QueryEngine>(engine: E) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/summary", get(summary::<E>))
        .route("/api/total-products", get(total_products::<E>))
        .route("/api/top-categories", get(top_categories::<E>))
        .route("/api/top-brands", get(top_brands::<E>))
        .route("/api/performance", get(performance::<E>))
        .with_state(engine)
        .layer(TraceLayer::new_for_http())
}

/// turns a quoted integer, as ClickHouse may print a 64 bit count, into a JSON number
fn unquoted(v: serde_json::Value) -> serde_json::Value {
    match (&v, value_as_u64(&v)) {
        (serde_json::Value::String(_), Some(n)) => n.into(),
        _ => v,
    }
}

/// applies [`unquoted`] to the integer columns `columns` of every row
fn unquoted_columns(rows: Rows, columns: &[usize]) -> Rows {
    rows.into_iter()
        .map(|row| {
            row.into_iter()
                .enumerate()
                .map(|(i, v)| if columns.contains(&i) { unquoted(v) } else { v })
                .collect()
        })
        .collect()
}

/// binds `addr` and serves `router` until the process is stopped
pub async fn run(addr: SocketAddr, router: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router).await?;
    Ok(())
}

async fn ecommerce_metrics<E: QueryEngine>(State(engine): State<E>) -> Response {
    let scrape = blocking(engine, |engine| {
        if !engine.ping() {
            return Err("ClickHouse not connected".to_string());
        }
        Ok(metrics::collect(&engine).to_prometheus())
    })
    .await;

    match scrape {
        Ok(Ok(body)) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        Ok(Err(msg)) => Json(json!({ "error": msg })).into_response(),
        Err(e) => {
            error!("metrics scrape task failed: {}", e);
            Json(json!({ "error": e.to_string() })).into_response()
        }
    }
}

async fn health<E: QueryEngine>(State(engine): State<E>) -> Json<serde_json::Value> {
    let reachable = blocking(engine, |engine| engine.ping()).await.unwrap_or(false);
    Json(json!({ "status": "ok", "clickhouse": reachable }))
}

async fn index() -> Html<String> {
    Html(dashboard::render_index())
}

async fn summary<E: QueryEngine>(State(engine): State<E>) -> std::result::Result<Html<String>, ApiError> {
    let summary = blocking(engine, |engine| Summary::fetch(&engine)).await?;
    Ok(Html(dashboard::render_summary(&summary)))
}

async fn total_products<E: QueryEngine>(
    State(engine): State<E>,
) -> std::result::Result<Json<serde_json::Value>, ApiError> {
    let total = blocking(engine, |engine| engine.scalar(queries::TOTAL_PRODUCTS)).await??;
    Ok(Json(json!({ "total_products": total.map(unquoted) })))
}

async fn top_categories<E: QueryEngine>(
    State(engine): State<E>,
) -> std::result::Result<Json<serde_json::Value>, ApiError> {
    let rows = blocking(engine, |engine| engine.query(queries::TOP_CATEGORIES)).await??;
    // category id and count
    Ok(Json(json!({ "top_categories": unquoted_columns(rows, &[0, 1]) })))
}

async fn top_brands<E: QueryEngine>(
    State(engine): State<E>,
) -> std::result::Result<Json<serde_json::Value>, ApiError> {
    let rows = blocking(engine, |engine| engine.query(queries::TOP_BRANDS)).await??;
    Ok(Json(json!({ "top_brands": unquoted_columns(rows, &[1]) })))
}

async fn performance<E: QueryEngine>(
    State(engine): State<E>,
) -> std::result::Result<Json<serde_json::Value>, ApiError> {
    let perf = blocking(engine, |engine| metrics::MetricsSnapshot {
        metrics: metrics::collect_performance(&engine),
    })
    .await?;
    if perf.error_count() == perf.metrics.len() {
        return Err(ApiError("no performance metric could be read".to_string()));
    }
    Ok(Json(perf.to_json()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quoted_counts_become_numbers() {
        assert_eq!(unquoted(json!("3990000")), json!(3_990_000));
        assert_eq!(unquoted(json!(42)), json!(42));
        assert_eq!(unquoted(json!("Bosch")), json!("Bosch"));
        assert_eq!(unquoted(serde_json::Value::Null), serde_json::Value::Null);

        let rows = vec![vec![json!("12"), json!("5400"), json!(6100.9)]];
        assert_eq!(unquoted_columns(rows, &[1]), vec![vec![json!("12"), json!(5400), json!(6100.9)]]);
    }
}
