use std::time::Instant;

use crossbeam::channel;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::stats::TimingStats;
use crate::clickhouse::{queries, QueryEngine};
use crate::thread_pool::ThreadPool;
use crate::{LabError, Result};

/// seconds recorded for a load test query that failed
pub const FAILURE_SENTINEL_SECS: f64 = 10.0;

/// The same question asked of the raw offers table and, when it has one, of a
/// materialized view
#[derive(Debug, Clone)]
pub struct QueryPair {
    pub name: &'static str,
    pub raw: String,
    pub mv: Option<String>,
}

/// the four benchmarked questions
pub fn query_pairs() -> Vec<QueryPair> {
    let cat = queries::BENCH_CATEGORY_ID;
    vec![
        QueryPair {
            name: "count all offers",
            raw: "SELECT COUNT(*) FROM ecommerce.ecom_offers".to_string(),
            mv: None,
        },
        QueryPair {
            name: "top 10 categories by count",
            raw: "SELECT category_id, COUNT(*) as cnt FROM ecommerce.ecom_offers \
                  GROUP BY category_id ORDER BY cnt DESC LIMIT 10"
                .to_string(),
            mv: Some(
                "SELECT category_id, SUM(products_count) as cnt FROM ecommerce.catalog_by_category_mv \
                 GROUP BY category_id ORDER BY cnt DESC LIMIT 10"
                    .to_string(),
            ),
        },
        QueryPair {
            name: "top category price stats",
            raw: format!(
                "SELECT category_id, COUNT(*), AVG(price), MIN(price), MAX(price) \
                 FROM ecommerce.ecom_offers WHERE category_id = {} GROUP BY category_id",
                cat
            ),
            mv: Some(format!(
                "SELECT category_id, SUM(total_price)/SUM(products_count) as avg_price, \
                 min(min_price), max(max_price) FROM ecommerce.catalog_by_category_mv \
                 WHERE category_id = {} GROUP BY category_id",
                cat
            )),
        },
        QueryPair {
            name: "top brands in category",
            raw: format!(
                "SELECT vendor, COUNT(*) FROM ecommerce.ecom_offers WHERE category_id = {} \
                 AND vendor != '' AND vendor != 'Unknown' GROUP BY vendor ORDER BY COUNT(*) DESC LIMIT 5",
                cat
            ),
            mv: Some(format!(
                "SELECT vendor, SUM(products_count) FROM ecommerce.catalog_by_brand_mv \
                 WHERE category_id = {} GROUP BY vendor ORDER BY SUM(products_count) DESC LIMIT 5",
                cat
            )),
        },
    ]
}

/// Timing of one query repeated `iterations` times
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub avg_time: f64,
    pub min_time: f64,
    pub max_time: f64,
    pub std_dev: f64,
    pub iterations: usize,
    /// rows returned by the last iteration
    pub rows: usize,
    pub description: String,
}

/// runs `sql` `iterations` times, sequentially, and summarizes the wall clock times
///
/// # Errors
/// fails on the first failing iteration, or if `iterations` is zero
#[instrument(skip(engine, sql))]
pub fn benchmark_query<E: QueryEngine>(
    engine: &E,
    sql: &str,
    description: &str,
    iterations: usize,
) -> Result<BenchmarkResult> {
    if iterations == 0 {
        return Err(LabError::StringErr("iterations must be positive".to_string()));
    }
    let mut times = Vec::with_capacity(iterations);
    let mut rows = 0;
    for i in 0..iterations {
        let start = Instant::now();
        rows = engine.query(sql)?.len();
        let elapsed = start.elapsed().as_secs_f64();
        debug!(iteration = i + 1, elapsed, "benchmark iteration");
        times.push(elapsed);
    }
    // iterations > 0 so there is at least one sample
    let stats = TimingStats::from_samples(&times).unwrap_or(TimingStats {
        mean: 0.0,
        min: 0.0,
        max: 0.0,
        std_dev: 0.0,
    });
    Ok(BenchmarkResult {
        avg_time: stats.mean,
        min_time: stats.min,
        max_time: stats.max,
        std_dev: stats.std_dev,
        iterations,
        rows,
        description: description.to_string(),
    })
}

/// Raw and materialized view timings of one [`QueryPair`]
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteEntry {
    pub name: String,
    pub raw: Option<BenchmarkResult>,
    pub mv: Option<BenchmarkResult>,
}

impl SuiteEntry {
    /// how many times faster the view answered, when both sides were measured
    pub fn speedup(&self) -> Option<f64> {
        match (&self.raw, &self.mv) {
            (Some(raw), Some(mv)) if mv.avg_time > 0.0 => Some(raw.avg_time / mv.avg_time),
            _ => None,
        }
    }
}

/// Benchmarks every pair. A failing query only drops its own side of the pair.
pub fn run_basic_suite<E: QueryEngine>(
    engine: &E,
    pairs: &[QueryPair],
    iterations: usize,
) -> Result<Vec<SuiteEntry>> {
    if iterations == 0 {
        return Err(LabError::StringErr("iterations must be positive".to_string()));
    }
    let mut entries = Vec::with_capacity(pairs.len());
    for pair in pairs {
        info!("--- {} ---", pair.name);
        let raw = match benchmark_query(engine, &pair.raw, &format!("raw: {}", pair.name), iterations) {
            Ok(r) => {
                info!("raw: {:.4}s (min: {:.4}s, max: {:.4}s)", r.avg_time, r.min_time, r.max_time);
                Some(r)
            }
            Err(e) => {
                warn!("raw query for '{}' failed: {}", pair.name, e);
                None
            }
        };
        let mv = match &pair.mv {
            Some(sql) => match benchmark_query(engine, sql, &format!("mv: {}", pair.name), iterations) {
                Ok(r) => {
                    info!("mv:  {:.4}s (min: {:.4}s, max: {:.4}s)", r.avg_time, r.min_time, r.max_time);
                    Some(r)
                }
                Err(e) => {
                    warn!("mv query for '{}' failed: {}", pair.name, e);
                    None
                }
            },
            None => None,
        };
        let entry = SuiteEntry { name: pair.name.to_string(), raw, mv };
        if let Some(s) = entry.speedup() {
            info!("speedup: {:.2}x", s);
        }
        entries.push(entry);
    }
    Ok(entries)
}

/// Outcome of the concurrent load test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadTestResult {
    pub avg_response_time: f64,
    pub max_response_time: f64,
    /// `total_queries / sum(samples)`
    pub qps: f64,
    pub total_queries: usize,
    /// queries that failed and were recorded as [`FAILURE_SENTINEL_SECS`]
    pub failed_queries: usize,
    #[serde(skip)]
    pub samples: Vec<f64>,
}

impl LoadTestResult {
    /// summarizes the collected samples
    pub fn from_samples(samples: Vec<f64>, failed_queries: usize) -> Option<Self> {
        let stats = TimingStats::from_samples(&samples)?;
        let total_time: f64 = samples.iter().sum();
        let total_queries = samples.len();
        let qps = if total_time > 0.0 { total_queries as f64 / total_time } else { 0.0 };
        Some(Self {
            avg_response_time: stats.mean,
            max_response_time: stats.max,
            qps,
            total_queries,
            failed_queries,
            samples,
        })
    }
}

/// the timings of one simulated user
struct UserRun {
    times: Vec<f64>,
    failed: usize,
}

fn simulate_user<E: QueryEngine>(engine: &E, user_id: usize, queries_per_user: usize) -> UserRun {
    let mut run = UserRun { times: Vec::with_capacity(queries_per_user), failed: 0 };
    for i in 0..queries_per_user {
        let sql = queries::LOAD_QUERIES[i % queries::LOAD_QUERIES.len()];
        let start = Instant::now();
        match engine.query(sql) {
            Ok(_) => run.times.push(start.elapsed().as_secs_f64()),
            Err(e) => {
                warn!("user {}, query {}: {}", user_id, i, e);
                run.failed += 1;
                run.times.push(FAILURE_SENTINEL_SECS);
            }
        }
    }
    run
}

/// Simulates `users` concurrent users on `pool`, each issuing `queries_per_user` queries
/// that cycle through [`queries::LOAD_QUERIES`].
///
/// Returns exactly `users * queries_per_user` samples.
///
/// # Errors
/// if either count is zero, or if a simulated user died before reporting its timings
pub fn run_concurrent_load<E: QueryEngine, P: ThreadPool>(
    engine: &E,
    pool: &P,
    users: usize,
    queries_per_user: usize,
) -> Result<LoadTestResult> {
    if users == 0 || queries_per_user == 0 {
        return Err(LabError::StringErr(
            "users and queries per user must be positive".to_string(),
        ));
    }
    info!("load test: {} users, {} queries each", users, queries_per_user);

    let (tx, rx) = channel::unbounded();
    for user_id in 0..users {
        let engine = engine.clone();
        let tx = tx.clone();
        pool.spawn(move || {
            let run = simulate_user(&engine, user_id, queries_per_user);
            // the receiver only goes away if the caller gave up
            let _ = tx.send(run);
        });
    }
    drop(tx);

    let mut samples = Vec::with_capacity(users * queries_per_user);
    let mut failed = 0;
    let mut finished = 0;
    for run in rx.iter() {
        samples.extend(run.times);
        failed += run.failed;
        finished += 1;
    }
    if finished != users {
        return Err(LabError::StringErr(format!(
            "only {} of {} simulated users finished",
            finished, users
        )));
    }

    let result = LoadTestResult::from_samples(samples, failed)
        .ok_or_else(|| LabError::StringErr("load test produced no samples".to_string()))?;
    info!(
        "avg response: {:.4}s, max: {:.4}s, qps: {:.2}",
        result.avg_response_time, result.max_response_time, result.qps
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qps_is_total_over_summed_time() {
        let r = LoadTestResult::from_samples(vec![0.5, 0.25, 0.25], 0).unwrap();
        assert_eq!(r.total_queries, 3);
        assert!((r.qps - 3.0).abs() < 1e-12);
        assert_eq!(r.max_response_time, 0.5);
    }

    #[test]
    fn speedup_needs_both_sides() {
        let result = |avg: f64| BenchmarkResult {
            avg_time: avg,
            min_time: avg,
            max_time: avg,
            std_dev: 0.0,
            iterations: 1,
            rows: 1,
            description: String::new(),
        };
        let mut entry = SuiteEntry { name: "q".into(), raw: Some(result(0.8)), mv: Some(result(0.2)) };
        assert!((entry.speedup().unwrap() - 4.0).abs() < 1e-12);
        entry.mv = None;
        assert_eq!(entry.speedup(), None);
    }

    #[test]
    fn every_pair_targets_the_offers_table() {
        let pairs = query_pairs();
        assert_eq!(pairs.len(), 4);
        assert!(pairs.iter().all(|p| p.raw.contains("ecommerce.ecom_offers")));
        assert_eq!(pairs.iter().filter(|p| p.mv.is_some()).count(), 3);
    }
}
