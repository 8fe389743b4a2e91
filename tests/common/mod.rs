use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use ecomlab::clickhouse::{queries, Rows};
use ecomlab::{LabError, QueryEngine, Result};
use serde_json::{json, Value};

/// An in-memory [`QueryEngine`] answering canned rows.
///
/// Statements without a canned answer return a single `[1]` row. Clones share their state,
/// so a test can keep a handle and flip the engine offline while a server holds another.
#[derive(Clone, Default)]
pub struct FakeEngine {
    answers: Arc<Mutex<HashMap<String, Rows>>>,
    failing: Arc<Mutex<Vec<String>>>,
    offline: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

#[allow(dead_code)]
impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// an engine where every statement takes `delay`
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay, ..Self::default() }
    }

    pub fn answer(self, sql: &str, rows: Rows) -> Self {
        self.answers.lock().unwrap().insert(sql.to_string(), rows);
        self
    }

    pub fn scalar(self, sql: &str, value: Value) -> Self {
        self.answer(sql, vec![vec![value]])
    }

    /// makes `sql` fail with a server error
    pub fn fail(self, sql: &str) -> Self {
        self.failing.lock().unwrap().push(sql.to_string());
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// the answers of a populated offers table
    pub fn populated() -> Self {
        Self::new()
            .scalar(queries::TOTAL_PRODUCTS, json!("3990000"))
            .scalar(queries::AVG_PRICE, json!(1534.27))
            .scalar(queries::UNIQUE_CATEGORIES, json!("1200"))
            .scalar(queries::UNIQUE_BRANDS, json!("310"))
            .scalar(queries::TOTAL_EVENTS, json!("25000"))
            .scalar(queries::RAW_QUERY_TIME, json!(0.4))
            .scalar(queries::MV_QUERY_TIME, json!(0.05))
            .scalar(queries::RAW_MAX_QUERY_TIME, json!(1.2))
            .scalar(queries::QPS_TOTAL, json!(0.75))
            .scalar(queries::MEMORY_USAGE_MB, json!(Value::Null))
            .answer(
                queries::TOP_CATEGORIES,
                vec![
                    vec![json!(7508), json!("120000"), json!(899.5)],
                    vec![json!(1201), json!("95000"), json!(2450.0)],
                ],
            )
            .answer(
                queries::TOP_BRANDS,
                vec![vec![json!("Bosch <Pro>"), json!("5400"), json!(6100.9)]],
            )
    }
}

impl QueryEngine for FakeEngine {
    fn query(&self, sql: &str) -> Result<Rows> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(LabError::Http("connection refused".to_string()));
        }
        if self.failing.lock().unwrap().iter().any(|f| f == sql) {
            return Err(LabError::ClickHouse(format!("status 500: cannot run {}", sql)));
        }
        Ok(self
            .answers
            .lock()
            .unwrap()
            .get(sql)
            .cloned()
            .unwrap_or_else(|| vec![vec![json!(1)]]))
    }
}
