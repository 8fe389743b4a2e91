//! The canned SQL used against the `ecommerce` database.
//!
//! `ecom_offers` is the raw denormalized offers table. `catalog_by_category_mv` and
//! `catalog_by_brand_mv` are materialized views pre-aggregating it by category and by
//! (category, vendor).

pub const PING: &str = "SELECT 1";
pub const VERSION: &str = "SELECT version()";

// business metrics
pub const TOTAL_PRODUCTS: &str = "SELECT COUNT(*) FROM ecommerce.ecom_offers";
pub const AVG_PRICE: &str = "SELECT round(avg(price), 2) FROM ecommerce.ecom_offers";
pub const UNIQUE_CATEGORIES: &str = "SELECT countDistinct(category_id) FROM ecommerce.ecom_offers";
pub const UNIQUE_BRANDS: &str =
    "SELECT countDistinct(vendor) FROM ecommerce.ecom_offers WHERE vendor != ''";
pub const TOTAL_EVENTS: &str = "SELECT COUNT(*) FROM ecommerce.raw_events";

// query_log based performance metrics, all over the last hour
pub const RAW_QUERY_TIME: &str = "SELECT round(avg(query_duration_ms) / 1000, 3) FROM system.query_log \
    WHERE query LIKE '%ecom_offers%' AND type = 'QueryFinish' AND event_time > now() - INTERVAL 1 HOUR";
pub const MV_QUERY_TIME: &str = "SELECT round(avg(query_duration_ms) / 1000, 3) FROM system.query_log \
    WHERE query LIKE '%catalog_by_category_mv%' AND type = 'QueryFinish' AND event_time > now() - INTERVAL 1 HOUR";
pub const RAW_MAX_QUERY_TIME: &str = "SELECT round(max(query_duration_ms) / 1000, 3) FROM system.query_log \
    WHERE query LIKE '%ecom_offers%' AND type = 'QueryFinish' AND event_time > now() - INTERVAL 1 HOUR";
pub const QPS_TOTAL: &str = "SELECT count() / 3600 FROM system.query_log \
    WHERE type = 'QueryFinish' AND event_time > now() - INTERVAL 1 HOUR";
pub const MEMORY_USAGE_MB: &str = "SELECT toUInt64(sum(memory_usage))/1024/1024 as memory_mb FROM system.query_log \
    WHERE type = 'QueryFinish' AND event_time > now() - INTERVAL 1 HOUR";

// dashboard tables
pub const TOP_CATEGORIES: &str = "SELECT category_id, COUNT(*) as count, round(avg(price), 2) as avg_price \
    FROM ecommerce.ecom_offers GROUP BY category_id ORDER BY count DESC LIMIT 10";
pub const TOP_BRANDS: &str = "SELECT vendor, COUNT(*) as count, round(avg(price), 2) as avg_price \
    FROM ecommerce.ecom_offers WHERE vendor != '' GROUP BY vendor ORDER BY count DESC LIMIT 10";

/// category used by the single-category benchmarks
pub const BENCH_CATEGORY_ID: u64 = 7508;

/// queries cycled through by every simulated user of the concurrent load test
pub const LOAD_QUERIES: [&str; 3] = [
    "SELECT COUNT(*) FROM ecommerce.ecom_offers",
    "SELECT category_id, COUNT(*) FROM ecommerce.ecom_offers GROUP BY category_id LIMIT 5",
    "SELECT vendor, COUNT(*) FROM ecommerce.ecom_offers WHERE vendor != '' GROUP BY vendor LIMIT 10",
];

// environment description for the results file
pub const MV_COUNT: &str = "SELECT count() FROM system.tables \
    WHERE database = 'ecommerce' AND engine = 'MaterializedView'";
