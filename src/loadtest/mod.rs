//! Latency measurements of the raw offers table against its materialized views, plus a
//! concurrent load test run on a [`ThreadPool`](crate::thread_pool::ThreadPool).
mod bench;
mod report;
mod stats;

pub use self::bench::{
    benchmark_query, query_pairs, run_basic_suite, run_concurrent_load, BenchmarkResult,
    LoadTestResult, QueryPair, SuiteEntry, FAILURE_SENTINEL_SECS,
};
pub use self::report::{
    dataset_size, generate_report, keyed_results, save_results, speedups, Environment,
    SpeedupSummary,
};
pub use self::stats::TimingStats;
