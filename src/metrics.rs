//! Business and performance metrics read from ClickHouse, rendered in the Prometheus text
//! exposition format.
//!
//! A metric whose query failed is never reported as zero. Its value line is left out, its
//! `ecommerce_metric_up` line is `0`, and it is counted in `ecommerce_query_errors_total`.
//! A query that succeeds but returns `NULL` (e.g. no matching rows in `system.query_log`
//! during the last hour) is reported as `0`.
use serde_json::{Map, Value};
use tracing::warn;

use crate::clickhouse::{queries, value_as_f64, QueryEngine};

/// prefix of every exported metric name
pub const PREFIX: &str = "ecommerce";

const BUSINESS: [(&str, &str); 5] = [
    ("total_products", queries::TOTAL_PRODUCTS),
    ("avg_price", queries::AVG_PRICE),
    ("unique_categories", queries::UNIQUE_CATEGORIES),
    ("unique_brands", queries::UNIQUE_BRANDS),
    ("total_events", queries::TOTAL_EVENTS),
];

/// One named metric and the outcome of the query behind it
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: &'static str,
    /// `Ok(value)` when the query succeeded, `Err(message)` when it failed
    pub value: Result<f64, String>,
}

impl Metric {
    fn ok(name: &'static str, value: f64) -> Self {
        Self { name, value: Ok(value) }
    }

    fn failed(name: &'static str, message: String) -> Self {
        warn!(metric = name, %message, "metric query failed");
        Self { name, value: Err(message) }
    }
}

/// All metrics collected during one scrape, in export order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub metrics: Vec<Metric>,
}

impl MetricsSnapshot {
    /// the value of metric `name`, if its query succeeded
    pub fn get(&self, name: &str) -> Option<f64> {
        self.metrics
            .iter()
            .find(|m| m.name == name)
            .and_then(|m| m.value.as_ref().ok().copied())
    }

    /// number of metrics whose query failed
    pub fn error_count(&self) -> usize {
        self.metrics.iter().filter(|m| m.value.is_err()).count()
    }

    /// Renders the snapshot as newline terminated `name value` lines.
    pub fn to_prometheus(&self) -> String {
        let mut lines = Vec::with_capacity(self.metrics.len() * 2 + 1);
        for m in &self.metrics {
            if let Ok(v) = m.value {
                lines.push(format!("{}_{} {}", PREFIX, m.name, v));
            }
        }
        for m in &self.metrics {
            let up = if m.value.is_ok() { 1 } else { 0 };
            lines.push(format!("{}_metric_up{{metric=\"{}\"}} {}", PREFIX, m.name, up));
        }
        lines.push(format!("{}_query_errors_total {}", PREFIX, self.error_count()));
        let mut text = lines.join("\n");
        // every line, the last one included, ends with a newline
        text.push('\n');
        text
    }

    /// Renders the snapshot as a JSON object, `null` for failed metrics plus an `errors`
    /// object holding the failure messages.
    pub fn to_json(&self) -> Value {
        let mut values = Map::new();
        let mut errors = Map::new();
        for m in &self.metrics {
            match &m.value {
                Ok(v) => values.insert(m.name.to_string(), number(*v)),
                Err(e) => {
                    errors.insert(m.name.to_string(), Value::String(e.clone()));
                    values.insert(m.name.to_string(), Value::Null)
                }
            };
        }
        if !errors.is_empty() {
            values.insert("errors".to_string(), Value::Object(errors));
        }
        Value::Object(values)
    }
}

fn number(v: f64) -> Value {
    serde_json::Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

/// rounds to two decimal places
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Ratio of the slowest raw-table query to the average materialized view query.
/// Missing or zero durations count as `1`.
pub fn speedup_ratio(raw_max: Option<f64>, mv_avg: Option<f64>) -> f64 {
    let raw = raw_max.filter(|v| *v != 0.0).unwrap_or(1.0);
    let mv = mv_avg.filter(|v| *v != 0.0).unwrap_or(1.0);
    if mv > 0.0 {
        round2(raw / mv)
    } else {
        1.0
    }
}

/// runs `sql` and reads its first value; `Ok(None)` for NULL or an empty result
fn scalar_f64<E: QueryEngine>(engine: &E, sql: &str) -> Result<Option<f64>, String> {
    engine
        .scalar(sql)
        .map(|v| v.as_ref().and_then(value_as_f64))
        .map_err(|e| e.to_string())
}

fn fetch<E: QueryEngine>(engine: &E, name: &'static str, sql: &str) -> Metric {
    match scalar_f64(engine, sql) {
        Ok(v) => Metric::ok(name, v.unwrap_or(0.0)),
        Err(e) => Metric::failed(name, e),
    }
}

/// Collects the business metrics of the offers table
pub fn collect_business<E: QueryEngine>(engine: &E) -> Vec<Metric> {
    BUSINESS
        .iter()
        .map(|&(name, sql)| fetch(engine, name, sql))
        .collect()
}

/// Collects the query_log based performance metrics, including the raw vs materialized
/// view speedup ratio
pub fn collect_performance<E: QueryEngine>(engine: &E) -> Vec<Metric> {
    let mut metrics = vec![
        fetch(engine, "raw_query_time", queries::RAW_QUERY_TIME),
        fetch(engine, "mv_query_time", queries::MV_QUERY_TIME),
    ];

    match (
        scalar_f64(engine, queries::RAW_MAX_QUERY_TIME),
        scalar_f64(engine, queries::MV_QUERY_TIME),
    ) {
        (Ok(raw), Ok(mv)) => {
            let ratio = speedup_ratio(raw, mv);
            metrics.push(Metric::ok("mv_speedup_ratio_mv", ratio));
            metrics.push(Metric::ok("speedup_ratio", ratio));
        }
        (Err(e), _) | (_, Err(e)) => {
            metrics.push(Metric::failed("mv_speedup_ratio_mv", e.clone()));
            metrics.push(Metric::failed("speedup_ratio", e));
        }
    }

    metrics.push(fetch(engine, "qps_total", queries::QPS_TOTAL));
    // named bytes for dashboard compatibility, the query reports megabytes
    metrics.push(fetch(engine, "memory_usage_bytes", queries::MEMORY_USAGE_MB));
    metrics
}

/// Runs every metric query once
pub fn collect<E: QueryEngine>(engine: &E) -> MetricsSnapshot {
    let mut metrics = collect_business(engine);
    metrics.extend(collect_performance(engine));
    MetricsSnapshot { metrics }
}
