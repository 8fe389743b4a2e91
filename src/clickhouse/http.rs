use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, instrument};

use super::{queries, QueryEngine, Rows};
use crate::config::ClickHouseConfig;
use crate::{LabError, Result};

/// Client for the ClickHouse HTTP interface.
///
/// Each query is POSTed as the request body with `FORMAT JSONCompact` appended, and the
/// `data` array of the response becomes the returned [`Rows`]. Cloning is cheap: clones
/// share the underlying connection pool.
#[derive(Clone)]
pub struct HttpClickHouse {
    agent: ureq::Agent,
    config: ClickHouseConfig,
}

/// the subset of a `JSONCompact` response this client reads
#[derive(Debug, Deserialize)]
struct CompactResponse {
    data: Rows,
}

impl HttpClickHouse {
    /// creates a client for the server described by `config`. No connection is made until
    /// the first query.
    pub fn new(config: ClickHouseConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .timeout_connect(Duration::from_secs(5))
            .build();
        Self { agent, config }
    }

    /// the settings this client was created with
    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }

    /// the version string reported by the server
    pub fn server_version(&self) -> Result<String> {
        match self.scalar(queries::VERSION)? {
            Some(serde_json::Value::String(v)) => Ok(v),
            Some(other) => Ok(other.to_string()),
            None => Err(LabError::ClickHouse("version() returned no rows".to_string())),
        }
    }
}

impl QueryEngine for HttpClickHouse {
    #[instrument(skip(self))]
    fn query(&self, sql: &str) -> Result<Rows> {
        let body = format!("{}\nFORMAT JSONCompact", sql.trim().trim_end_matches(';'));
        let resp = self
            .agent
            .post(&self.config.base_url())
            .query("database", &self.config.database)
            // 64 bit integers come back as JSON numbers instead of quoted strings
            .query("output_format_json_quote_64bit_integers", "0")
            .set("X-ClickHouse-User", &self.config.user)
            .set("X-ClickHouse-Key", &self.config.password)
            .send_string(&body)?;
        let text = resp.into_string()?;
        let parsed: CompactResponse = serde_json::from_str(&text)?;
        debug!(rows = parsed.data.len(), "query finished");
        Ok(parsed.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use axum::Router;

    #[derive(Debug, Clone, Default)]
    struct Received {
        params: HashMap<String, String>,
        user: Option<String>,
        key: Option<String>,
        body: String,
    }

    type Log = Arc<Mutex<Vec<Received>>>;

    async fn answer(
        State(log): State<Log>,
        Query(params): Query<HashMap<String, String>>,
        headers: HeaderMap,
        body: String,
    ) -> Response {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(String::from);
        let failing = body.contains("missing_table");
        log.lock().unwrap().push(Received {
            params,
            user: header("X-ClickHouse-User"),
            key: header("X-ClickHouse-Key"),
            body,
        });
        if failing {
            return (
                StatusCode::NOT_FOUND,
                "Code: 60. DB::Exception: Table ecommerce.missing_table does not exist.\n",
            )
                .into_response();
        }
        (
            [("content-type", "application/json")],
            r#"{"meta":[{"name":"c","type":"UInt64"}],"data":[[3990000,"Bosch"],[12,null]],"rows":2}"#,
        )
            .into_response()
    }

    /// serves `answer` on a local port; the runtime must outlive the client calls
    fn fake_server() -> (tokio::runtime::Runtime, u16, Log) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let log = Log::default();
        let router = Router::new().route("/", post(answer)).with_state(log.clone());
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let port = listener.local_addr().unwrap().port();
        runtime.spawn(async move { axum::serve(listener, router).await });
        (runtime, port, log)
    }

    fn client(port: u16) -> HttpClickHouse {
        HttpClickHouse::new(ClickHouseConfig {
            host: "127.0.0.1".to_string(),
            port,
            user: "lab".to_string(),
            password: "secret".to_string(),
            ..ClickHouseConfig::default()
        })
    }

    #[test]
    fn query_posts_sql_and_reads_compact_rows() {
        let (_runtime, port, log) = fake_server();
        let rows = client(port).query("  SELECT c, vendor FROM ecommerce.ecom_offers;  ").unwrap();
        assert_eq!(
            rows,
            vec![
                vec![serde_json::json!(3_990_000), serde_json::json!("Bosch")],
                vec![serde_json::json!(12), serde_json::Value::Null],
            ]
        );

        let seen = log.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let req = &seen[0];
        assert_eq!(req.body, "SELECT c, vendor FROM ecommerce.ecom_offers\nFORMAT JSONCompact");
        assert_eq!(req.params.get("database").map(String::as_str), Some("ecommerce"));
        assert_eq!(
            req.params.get("output_format_json_quote_64bit_integers").map(String::as_str),
            Some("0")
        );
        assert_eq!(req.user.as_deref(), Some("lab"));
        assert_eq!(req.key.as_deref(), Some("secret"));
    }

    #[test]
    fn error_status_is_a_clickhouse_error() {
        let (_runtime, port, _log) = fake_server();
        match client(port).query("SELECT * FROM ecommerce.missing_table") {
            Err(LabError::ClickHouse(msg)) => {
                assert!(msg.starts_with("status 404"), "{}", msg);
                assert!(msg.contains("Code: 60"), "{}", msg);
            }
            other => panic!("expected a ClickHouse error, got {:?}", other),
        }
    }

    #[test]
    fn unreachable_server_is_a_transport_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let engine = client(port);
        assert!(matches!(engine.query("SELECT 1"), Err(LabError::Http(_))));
        assert!(!engine.ping());
    }
}
