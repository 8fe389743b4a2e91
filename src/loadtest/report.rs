use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::info;

use super::bench::{BenchmarkResult, LoadTestResult, SuiteEntry};
use super::stats::TimingStats;
use crate::clickhouse::{queries, value_as_u64, QueryEngine};
use crate::Result;

/// Description of the server and dataset the benchmarks ran against
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Environment {
    /// e.g. `3.99M records`
    pub dataset_size: String,
    pub materialized_views: u64,
    pub clickhouse_version: String,
}

impl Environment {
    /// asks the server for its version, the offers row count and the number of views.
    /// Anything that cannot be read is reported as `unknown` / `0`
    pub fn probe<E: QueryEngine>(engine: &E) -> Self {
        let count = |sql: &str| {
            engine
                .scalar(sql)
                .ok()
                .flatten()
                .as_ref()
                .and_then(value_as_u64)
        };
        Self {
            dataset_size: count(queries::TOTAL_PRODUCTS)
                .map(dataset_size)
                .unwrap_or_else(|| "unknown".to_string()),
            materialized_views: count(queries::MV_COUNT).unwrap_or(0),
            clickhouse_version: match engine.scalar(queries::VERSION) {
                Ok(Some(serde_json::Value::String(v))) => v,
                Ok(Some(other)) => other.to_string(),
                _ => "unknown".to_string(),
            },
        }
    }
}

/// row count in millions, e.g. `3.99M records`
pub fn dataset_size(rows: u64) -> String {
    format!("{:.2}M records", rows as f64 / 1_000_000.0)
}

/// Speedups of every pair measured on both sides
pub fn speedups(entries: &[SuiteEntry]) -> Vec<(&str, f64)> {
    entries
        .iter()
        .filter_map(|e| e.speedup().map(|s| (e.name.as_str(), s)))
        .collect()
}

/// Average, best and worst of the measured speedups
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeedupSummary {
    pub average: f64,
    pub max: f64,
    pub min: f64,
}

impl SpeedupSummary {
    /// `None` when no pair was measured on both sides
    pub fn from_speedups(speedups: &[(&str, f64)]) -> Option<Self> {
        let ratios: Vec<f64> = speedups.iter().map(|(_, s)| *s).collect();
        TimingStats::from_samples(&ratios).map(|stats| Self {
            average: stats.mean,
            max: stats.max,
            min: stats.min,
        })
    }
}

/// the suite keyed the way the results file stores it: `<name>_raw` / `<name>_mv`
pub fn keyed_results(entries: &[SuiteEntry]) -> BTreeMap<String, &BenchmarkResult> {
    let mut map = BTreeMap::new();
    for e in entries {
        if let Some(r) = &e.raw {
            map.insert(format!("{}_raw", e.name), r);
        }
        if let Some(r) = &e.mv {
            map.insert(format!("{}_mv", e.name), r);
        }
    }
    map
}

#[derive(Serialize)]
struct ResultsFile<'a> {
    timestamp: String,
    environment: &'a Environment,
    benchmarks: BTreeMap<String, &'a BenchmarkResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    load_test: Option<&'a LoadTestResult>,
}

/// writes the benchmark results as pretty printed JSON to `path`
pub fn save_results(
    path: &Path,
    at: DateTime<Local>,
    environment: &Environment,
    entries: &[SuiteEntry],
    load: Option<&LoadTestResult>,
) -> Result<()> {
    let file = ResultsFile {
        timestamp: at.to_rfc3339(),
        environment,
        benchmarks: keyed_results(entries),
        load_test: load,
    };
    fs::write(path, serde_json::to_string_pretty(&file)?)?;
    info!("results saved to {}", path.display());
    Ok(())
}

/// Builds the plain text report
pub fn generate_report(
    at: DateTime<Local>,
    environment: &Environment,
    entries: &[SuiteEntry],
    load: Option<&LoadTestResult>,
) -> String {
    let rule = "=".repeat(60);
    let mut report = vec![
        rule.clone(),
        "CLICKHOUSE PERFORMANCE TEST REPORT".to_string(),
        rule,
        format!("Date: {}", at.format("%Y-%m-%d %H:%M:%S")),
        format!("Data: {} ecommerce", environment.dataset_size),
        format!("Materialized views: {}", environment.materialized_views),
        format!("ClickHouse version: {}", environment.clickhouse_version),
        String::new(),
    ];

    let speedups = speedups(entries);
    for (name, s) in &speedups {
        report.push(format!("Speedup {}: {:.2}x", name, s));
    }
    if let Some(summary) = SpeedupSummary::from_speedups(&speedups) {
        report.push(String::new());
        report.push(format!("Average speedup: {:.2}x", summary.average));
        report.push(format!("Max speedup: {:.2}x", summary.max));
        report.push(format!("Min speedup: {:.2}x", summary.min));
    }

    report.push(String::new());
    report.push("DETAILED RESULTS:".to_string());
    for e in entries {
        for (kind, result) in [("Raw data", &e.raw), ("MV", &e.mv)] {
            if let Some(r) = result {
                report.push(format!("{}: {}", kind, r.description));
                report.push(format!("  Average: {:.4}s", r.avg_time));
                report.push(format!("  Min: {:.4}s", r.min_time));
                report.push(format!("  Max: {:.4}s", r.max_time));
                report.push(String::new());
            }
        }
    }

    if let Some(load) = load {
        report.push(format!("LOAD TEST: {} queries ({} failed)", load.total_queries, load.failed_queries));
        report.push(format!("  QPS: {:.2}", load.qps));
        report.push(format!("  Average response: {:.4}s", load.avg_response_time));
        report.push(format!("  Max response: {:.4}s", load.max_response_time));
    }

    report.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(avg: f64, description: &str) -> BenchmarkResult {
        BenchmarkResult {
            avg_time: avg,
            min_time: avg / 2.0,
            max_time: avg * 2.0,
            std_dev: 0.0,
            iterations: 10,
            rows: 10,
            description: description.to_string(),
        }
    }

    fn entries() -> Vec<SuiteEntry> {
        vec![
            SuiteEntry { name: "count".into(), raw: Some(result(0.1, "raw: count")), mv: None },
            SuiteEntry {
                name: "top".into(),
                raw: Some(result(0.4, "raw: top")),
                mv: Some(result(0.1, "mv: top")),
            },
        ]
    }

    fn env() -> Environment {
        Environment {
            dataset_size: dataset_size(3_990_000),
            materialized_views: 4,
            clickhouse_version: "24.3.1".to_string(),
        }
    }

    #[test]
    fn report_lists_speedups_and_details() {
        let report = generate_report(Local::now(), &env(), &entries(), None);
        assert!(report.contains("Data: 3.99M records ecommerce"));
        assert!(report.contains("Speedup top: 4.00x"));
        assert!(!report.contains("Speedup count"));
        assert!(report.contains("Average speedup: 4.00x"));
        assert!(report.contains("Raw data: raw: count"));
        assert!(report.contains("MV: mv: top"));
    }

    #[test]
    fn summary_of_speedups() {
        let summary = SpeedupSummary::from_speedups(&[("a", 2.0), ("b", 6.0), ("c", 4.0)]).unwrap();
        assert_eq!(summary, SpeedupSummary { average: 4.0, max: 6.0, min: 2.0 });
        assert!(SpeedupSummary::from_speedups(&[]).is_none());
    }

    #[test]
    fn results_file_keys_raw_and_mv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("performance_results.json");
        let load = LoadTestResult::from_samples(vec![0.5, 0.5], 0).unwrap();
        save_results(&path, Local::now(), &env(), &entries(), Some(&load)).unwrap();

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["environment"]["materialized_views"], 4);
        assert!(json["benchmarks"]["top_raw"].is_object());
        assert!(json["benchmarks"]["top_mv"].is_object());
        assert!(json["benchmarks"]["count_mv"].is_null());
        assert_eq!(json["load_test"]["total_queries"], 2);
        assert!(json["load_test"].get("samples").is_none());
    }
}
