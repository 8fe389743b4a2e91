//! Read-only access to the ClickHouse analytical store.
//!
//! Everything that reads from ClickHouse goes through the [`QueryEngine`] trait so that the
//! exporter, the dashboard and the load test can be driven by the HTTP client in production
//! and by an in-memory engine in tests.
use serde_json::Value;

use crate::Result;

mod http;
pub mod queries;

pub use self::http::HttpClickHouse;

/// rows returned by a query, each row holding its column values in select order
pub type Rows = Vec<Vec<Value>>;

/// A trait for something that can run a SQL statement against the analytical store
pub trait QueryEngine: Clone + Send + Sync + 'static {
    /// runs `sql` and returns every row of the result set
    fn query(&self, sql: &str) -> Result<Rows>;

    /// runs `sql` and returns the first column of the first row.
    ///
    /// Returns `None` if the result set is empty.
    fn scalar(&self, sql: &str) -> Result<Option<Value>> {
        Ok(self
            .query(sql)?
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next()))
    }

    /// returns `true` if the store answers a trivial query
    fn ping(&self) -> bool {
        self.query(queries::PING).is_ok()
    }
}

/// Reads a numeric column value.
///
/// ClickHouse quotes 64 bit integers in its JSON output, so numeric strings are accepted too.
/// `NULL` and anything non numeric yields `None`
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Reads an integer column value, accepting quoted integers like [`value_as_f64`]
pub fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quoted_integers_are_numbers() {
        assert_eq!(value_as_f64(&json!("3990000")), Some(3_990_000.0));
        assert_eq!(value_as_f64(&json!(12.5)), Some(12.5));
        assert_eq!(value_as_u64(&json!("42")), Some(42));
        assert_eq!(value_as_f64(&Value::Null), None);
        assert_eq!(value_as_f64(&json!("n/a")), None);
    }
}
