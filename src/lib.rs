//! Tooling for an e-commerce analytics lab built around two stores: a ClickHouse table of
//! marketplace offers (with materialized views over it) and a MongoDB database holding the
//! same offers as a category tree plus products.
//!
//! ## ClickHouse
//! Everything that reads from ClickHouse goes through the [`QueryEngine`] trait, implemented
//! over the HTTP interface by [`HttpClickHouse`]. On top of it sit:
//!
//! - [`metrics`] - business and performance figures rendered in the Prometheus text
//!   exposition format. A metric whose query fails is left out of the exposition and flagged
//!   with `ecommerce_metric_up{metric="..."} 0` instead of being reported as zero.
//! - [`dashboard`] - an HTML dashboard and its small JSON API.
//! - [`server`] - the axum routers serving both of the above.
//! - [`loadtest`] - latency benchmarks of raw queries against their materialized view
//!   counterparts, and a concurrent load test run on one of the [`ThreadPool`]
//!   implementations.
//!
//! ## MongoDB
//! The [`mongo`] module loads the offers dataset (a CSV file) into two collections:
//!
//! - `categories` - one document per distinct (partner, category) using a materialized path
//!   (`path`, `path_array`, `level`, `parent_path`)
//! - `products` - one document per offer, embedding its category and the breadcrumb trail
//!
//! and runs the navigation, product and aggregation queries of the lab against them.
//!
//! ### Executables
//! - `metrics-exporter` serves `/metrics/ecommerce` and `/health`
//! - `dashboard` serves the HTML dashboard
//! - `ch-loadtest` runs the benchmarks and writes a JSON results file and a text report
//! - `mongo-lab` runs the interactive MongoDB menu

pub use clickhouse::{HttpClickHouse, QueryEngine};
pub use error::{LabError, Result};
pub use thread_pool::{NaiveThreadPool, RayonThreadPool, SharedQueueThreadPool, ThreadPool};

pub mod clickhouse;
pub mod config;
pub mod dashboard;
mod error;
pub mod loadtest;
pub mod metrics;
pub mod mongo;
pub mod server;
pub mod thread_pool;
