//! The console reports behind each entry of the `mongo-lab` menu.
use std::path::Path;
use std::time::Instant;

use bson::{Bson, Document};
use tracing::{error, info};

use super::database::{MongoConnection, MongoOps, QueryResult};
use super::format::{format_breadcrumbs, format_number, format_time, percentage, print_section, truncate};
use super::models::{analyze, read_offers, Breadcrumb};
use super::services::{
    Analytics, CategoryQueries, DataLoader, Indexing, ProductQueries, CATEGORIES, DEFAULT_PARTNER, PRODUCTS,
};
use crate::Result;

/// root category browsed by the navigation queries
pub const NAVIGATION_ROOT: &str = "Строительство и ремонт";
/// category searched through product breadcrumbs
pub const BREADCRUMB_CATEGORY: &str = "Пневмоинструменты";
/// product type combined with [`BREADCRUMB_CATEGORY`]
pub const PRODUCT_TYPE: &str = "Степлер строительный";

/// index share of the data size considered healthy, in percent
const INDEX_RATIO_RANGE: std::ops::RangeInclusive<f64> = 5.0..=25.0;

fn str_field<'d>(d: &'d Document, key: &str) -> &'d str {
    d.get_str(key).unwrap_or("N/A")
}

/// integer field whatever width it was stored with, following `a.b` paths
fn int_field(d: &Document, path: &str) -> i64 {
    let mut current = d;
    let mut parts = path.split('.').peekable();
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            return match current.get(part) {
                Some(Bson::Int32(v)) => *v as i64,
                Some(Bson::Int64(v)) => *v,
                Some(Bson::Double(v)) => *v as i64,
                _ => 0,
            };
        }
        match current.get_document(part) {
            Ok(inner) => current = inner,
            Err(_) => return 0,
        }
    }
    0
}

fn breadcrumbs_of(product: &Document) -> Vec<Breadcrumb> {
    product
        .get_document("category")
        .ok()
        .and_then(|c| c.get_array("breadcrumbs").ok())
        .map(|crumbs| {
            crumbs
                .iter()
                .filter_map(|b| b.as_document())
                .map(|b| Breadcrumb { level: int_field(b, "level") as i32, name: str_field(b, "name").to_string() })
                .collect()
        })
        .unwrap_or_default()
}

fn print_result(description: &str, result: &QueryResult) {
    println!("\n {}", description);
    println!("    • Documents: {}", format_number(result.len() as i64));
    println!("    • Time: {}", format_time(result.execution_time_ms));
}

fn print_examples(result: &QueryResult, max: usize) {
    if result.is_empty() {
        return;
    }
    println!("    Examples (first {}):", max.min(result.documents.len()));
    for (i, d) in result.documents.iter().take(max).enumerate() {
        println!("      {}. {}", i + 1, str_field(d, "name"));
    }
}

/// Option 1: describes the dataset without touching the database
pub fn analyze_dataset(dataset: &Path) -> Result<()> {
    print_section("DATASET ANALYSIS");
    let rows = read_offers(dataset)?;
    let a = analyze(&rows);
    println!(" Source: {}", dataset.display());
    println!("   • Offer rows: {}", format_number(a.rows as i64));
    println!("   • Partners: {}", a.partners);
    println!("   • Categories (partner, id): {}", format_number(a.categories as i64));
    println!("   • Offer types: {}", format_number(a.offer_types as i64));
    println!("   • Rows with a bad category path: {}", a.invalid_rows);
    println!("\n Categories per level:");
    for (level, count) in &a.categories_per_level {
        println!("   • Level {}: {}", level, format_number(*count as i64));
    }
    println!("\n Schema: categories use a materialized path (path, path_array, parent_path);");
    println!(" products embed their category with a breadcrumb trail.");
    Ok(())
}

fn print_collection_sizes(ops: &MongoOps) -> Result<()> {
    let mut data_mb = 0.0;
    let mut index_mb = 0.0;
    for name in [CATEGORIES, PRODUCTS] {
        let stats = ops.collection_stats(name)?;
        println!("\n {}:", name);
        println!("   • Documents: {}", format_number(stats.count as i64));
        println!("   • Data: {:.2} MB", stats.size_mb());
        println!(
            "   • Indexes: {:.2} MB ({:.1}%)",
            stats.index_mb(),
            percentage(stats.index_mb(), stats.size_mb())
        );
        data_mb += stats.size_mb();
        index_mb += stats.index_mb();
    }
    let pct = percentage(index_mb, data_mb);
    println!("\n TOTAL:");
    println!("   • Data: {:.2} MB", data_mb);
    println!("   • Indexes: {:.2} MB ({:.1}%)", index_mb, pct);
    if INDEX_RATIO_RANGE.contains(&pct) {
        println!("   Index share is in the recommended range (5-25%)");
    } else {
        println!("   Index share is outside the recommended range (5-25%)");
    }
    Ok(())
}

/// Option 2: loads both collections, builds their indexes and prints sizes
pub fn load_data(conn: &MongoConnection, dataset: &Path) -> Result<()> {
    print_section("MONGODB DATA LOAD");
    let ops = MongoOps::new(conn);
    let loader = DataLoader::new(&ops, conn.config().batch_size);
    let rows = loader.read(dataset)?;

    print_section("CATEGORIES COLLECTION");
    let (result, stats) = loader.load_categories(&rows)?;
    print_result("categories loaded", &result);
    println!("    • Max depth: {}", stats.max_depth);
    println!("    • Avg depth: {:.2}", stats.avg_depth);

    print_section("PRODUCTS COLLECTION");
    let (result, stats) = loader.load_products(&rows)?;
    print_result("products loaded", &result);
    println!("    • Product types: {}", format_number(stats.unique_types as i64));
    println!("    • Partners: {}", stats.partners);

    create_indexes(conn)?;

    print_section("COLLECTION SIZES");
    print_collection_sizes(&ops)
}

/// Option 3: creates the secondary indexes that do not exist yet
pub fn create_indexes(conn: &MongoConnection) -> Result<()> {
    print_section("INDEX CREATION");
    let ops = MongoOps::new(conn);
    for (collection, outcome) in Indexing::new(&ops).create_all()? {
        println!("\n {} indexes", collection);
        println!("    • Created: {:?}", outcome.created);
        println!("    • Already present: {:?}", outcome.already_present);
        println!("    • Time: {}", format_time(outcome.execution_time_ms));
    }
    Ok(())
}

/// Option 4: category tree navigation with the materialized path
pub fn category_navigation(conn: &MongoConnection) -> Result<()> {
    let ops = MongoOps::new(conn);
    let categories = CategoryQueries::new(&ops);

    print_section(&format!("QUERY 1: root categories of partner '{}'", DEFAULT_PARTNER));
    let roots = categories.roots(DEFAULT_PARTNER)?;
    print_result("level = 1", &roots);
    print_examples(&roots, 3);

    print_section(&format!("QUERY 2: subcategories of '{}'", NAVIGATION_ROOT));
    let subs = categories.subcategories(NAVIGATION_ROOT)?;
    print_result("path_array contains the root name", &subs);
    print_examples(&subs, 3);
    for (i, d) in subs.documents.iter().take(3).enumerate() {
        println!("         {}. Path: {}", i + 1, str_field(d, "path"));
    }

    print_section("QUERY 3: top 10 categories by products");
    let top = categories.top(10)?;
    print_result("sorted by metadata.total_products", &top);
    println!("\n{:>3} | {:^9} | {:>3} | Category", "#", "Products", "Lvl");
    println!("{} | {} | {} | {}", "-".repeat(3), "-".repeat(9), "-".repeat(3), "-".repeat(40));
    for (i, d) in top.documents.iter().enumerate() {
        println!(
            "{:>3} | {:>9} | {:>3} | {}",
            i + 1,
            format_number(int_field(d, "metadata.total_products")),
            int_field(d, "level"),
            str_field(d, "name")
        );
    }

    print_section("EFFICIENCY");
    let by_array = categories.subcategories(NAVIGATION_ROOT)?;
    let by_regex = categories.subcategories_by_regex(NAVIGATION_ROOT)?;
    println!("\n Subtree lookup:");
    println!("   • path_array: {}, {} results", format_time(by_array.execution_time_ms), by_array.len());
    println!("   • regex on path: {}, {} results", format_time(by_regex.execution_time_ms), by_regex.len());
    if by_array.execution_time_ms > 0.0 && by_array.execution_time_ms < by_regex.execution_time_ms {
        println!(
            "   path_array is {:.1}x faster",
            by_regex.execution_time_ms / by_array.execution_time_ms
        );
    }
    Ok(())
}

/// Option 5: products and their embedded categories
pub fn product_queries(conn: &MongoConnection) -> Result<()> {
    let ops = MongoOps::new(conn);
    let products = ProductQueries::new(&ops);

    print_section(&format!("QUERY 1: '{}' products in '{}'", PRODUCT_TYPE, BREADCRUMB_CATEGORY));
    let found = products.by_type_and_category(PRODUCT_TYPE, BREADCRUMB_CATEGORY)?;
    print_result("type + category.breadcrumbs.name", &found);
    for (i, d) in found.documents.iter().take(3).enumerate() {
        println!("      {}. {}", i + 1, truncate(str_field(d, "name"), 60));
        println!("         Trail: {}", format_breadcrumbs(&breadcrumbs_of(d)));
    }

    print_section("QUERY 2: products at hierarchy level 4");
    let level4 = products.at_level(4, None)?;
    print_result("exactly four breadcrumbs", &level4);
    for (i, d) in level4.documents.iter().take(3).enumerate() {
        let category = d.get_document("category").map(|c| str_field(c, "name")).unwrap_or("N/A");
        println!("      {}. Category: {}", i + 1, category);
        println!("         Trail: {}", format_breadcrumbs(&breadcrumbs_of(d)));
    }

    print_section("QUERY 3: products per first level category");
    let first = products.by_first_level()?;
    print_result("first breadcrumb, grouped", &first);
    if !first.is_empty() {
        println!("{:>3} | {:^40} | {:>12}", "#", "Category", "Products");
        println!("{} | {} | {}", "-".repeat(3), "-".repeat(40), "-".repeat(12));
        let counts: Vec<i64> = first.documents.iter().map(|d| int_field(d, "product_count")).collect();
        for (i, d) in first.documents.iter().enumerate() {
            println!(
                "{:>3} | {:>40} | {:>12}",
                i + 1,
                truncate(str_field(d, "category_name"), 38),
                format_number(counts[i])
            );
        }
        let total: i64 = counts.iter().sum();
        println!("\n    • Max: {}", format_number(counts.iter().copied().max().unwrap_or(0)));
        println!("    • Min: {}", format_number(counts.iter().copied().min().unwrap_or(0)));
        println!("    • Average: {}", format_number(total / counts.len() as i64));
        println!("    • Categories: {}", counts.len());
    }

    print_section("BREADCRUMBS VS JOIN EMULATION");
    let started = Instant::now();
    let via_crumbs = products.in_breadcrumb(BREADCRUMB_CATEGORY)?;
    let crumbs_ms = via_crumbs.execution_time_ms;
    let ids: Vec<String> = via_crumbs
        .documents
        .iter()
        .take(100)
        .filter_map(|d| d.get_document("category").ok())
        .map(|c| str_field(c, "id").to_string())
        .collect();
    let via_ids = products.in_categories(ids)?;
    let join_ms = started.elapsed().as_secs_f64() * 1000.0 - crumbs_ms;
    println!("   • Breadcrumbs: {}, {} results", format_time(crumbs_ms), format_number(via_crumbs.len() as i64));
    println!("   • Join emulation: {}, {} results", format_time(join_ms), format_number(via_ids.len() as i64));
    if crumbs_ms > 0.0 && crumbs_ms < join_ms {
        println!("   Breadcrumbs are {:.1}x faster", join_ms / crumbs_ms);
    }
    Ok(())
}

/// Option 6: aggregation framework analytics
pub fn analytics(conn: &MongoConnection) -> Result<()> {
    let ops = MongoOps::new(conn);
    let analytics = Analytics::new(&ops);

    print_section("AGGREGATION 1: top 10 categories");
    let top = analytics.top_categories(10)?;
    print_result("$group → $sort → $limit → $project", &top);
    println!("\n{:>3} | {:>8} | {:^8} | {:>3} | Category", "#", "ID", "Products", "Lvl");
    for (i, d) in top.documents.iter().enumerate() {
        println!(
            "{:>3} | {:>8} | {:>8} | {:>3} | {}",
            i + 1,
            truncate(str_field(d, "category_id"), 8),
            format_number(int_field(d, "products")),
            int_field(d, "level"),
            truncate(str_field(d, "name"), 35)
        );
    }

    print_section("AGGREGATION 2: products per level");
    let hierarchy = analytics.hierarchy_stats()?;
    print_result("$unwind → $group → $sort → $limit", &hierarchy);
    let mut current_level = None;
    for d in &hierarchy.documents {
        let id = d.get_document("_id").ok();
        let level = id.map(|i| int_field(i, "level")).unwrap_or(0);
        if current_level != Some(level) {
            println!("\n LEVEL {}:", level);
            println!("{:^45} | {:>10}", "Category", "Products");
            current_level = Some(level);
        }
        let name = id.map(|i| str_field(i, "name")).unwrap_or("N/A");
        println!("{:<45} | {:>10}", truncate(name, 42), format_number(int_field(d, "products")));
    }

    print_section("AGGREGATION 3: leaf categories");
    let leaves = analytics.leaf_categories(10)?;
    print_result("$lookup children → $match none", &leaves);
    println!("\n{:>3} | {:>3} | {:^10} | Category", "#", "Lvl", "Products");
    for (i, d) in leaves.documents.iter().enumerate() {
        println!(
            "{:>3} | {:>3} | {:>10} | {}",
            i + 1,
            int_field(d, "level"),
            format_number(int_field(d, "products")),
            truncate(str_field(d, "name"), 37)
        );
    }

    print_section("PARTNERS AND LEVELS");
    let partners = analytics.partner_stats()?;
    print_result("$group by partner and level", &partners);
    println!("\n{:>10} | {:>3} | {:^10} | {:^12}", "Partner", "Lvl", "Categories", "Products");
    for d in &partners.documents {
        println!(
            "{:>10} | {:>3} | {:>10} | {:>12}",
            str_field(d, "partner"),
            int_field(d, "level"),
            format_number(int_field(d, "categories_count")),
            format_number(int_field(d, "total_products"))
        );
    }
    Ok(())
}

/// Option 7: index listing and size statistics
pub fn show_indexes(conn: &MongoConnection) -> Result<()> {
    print_section("MONGODB INDEXES");
    let ops = MongoOps::new(conn);
    for name in [CATEGORIES, PRODUCTS] {
        println!("\n Indexes of {}:", name);
        for (index, keys) in ops.list_indexes(name)? {
            let keys = keys.iter().map(|(k, v)| format!("{}: {}", k, v)).collect::<Vec<_>>().join(", ");
            println!("   • {}: {}", index, keys);
        }
    }
    print_collection_sizes(&ops)
}

/// Option 8: load, navigation, product and analytics parts in sequence.
///
/// Returns the process exit code: `0` if every part succeeded, `1` otherwise.
pub fn run_full_sequence(conn: &MongoConnection, dataset: &Path) -> i32 {
    let started = Instant::now();
    let parts: Vec<(&str, Box<dyn Fn() -> Result<()> + '_>)> = vec![
        ("Data load", Box::new(|| load_data(conn, dataset))),
        ("Category navigation", Box::new(|| category_navigation(conn))),
        ("Product queries", Box::new(|| product_queries(conn))),
        ("Aggregations", Box::new(|| analytics(conn))),
    ];

    let mut outcomes = Vec::with_capacity(parts.len());
    for (name, part) in &parts {
        println!("\n Running: {}", name);
        println!("{}", "-".repeat(60));
        match part() {
            Ok(()) => {
                info!("{} succeeded", name);
                outcomes.push((*name, true));
            }
            Err(e) => {
                error!("{} failed: {}", name, e);
                outcomes.push((*name, false));
            }
        }
        println!("Time: {}", chrono::Local::now().format("%H:%M:%S"));
    }

    let succeeded = outcomes.iter().filter(|(_, ok)| *ok).count();
    print_section("PIPELINE SUMMARY");
    println!("Total time: {:.1} minutes", started.elapsed().as_secs_f64() / 60.0);
    println!("Succeeded: {}/{} parts", succeeded, outcomes.len());
    for (name, ok) in &outcomes {
        println!("   {}: {}", name, if *ok { "OK" } else { "FAILED" });
    }
    if succeeded == outcomes.len() {
        0
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn nested_int_fields_of_any_width() {
        let d = doc! { "level": 3_i32, "metadata": { "total_products": 12_i64 }, "avg": 2.9 };
        assert_eq!(int_field(&d, "level"), 3);
        assert_eq!(int_field(&d, "metadata.total_products"), 12);
        assert_eq!(int_field(&d, "avg"), 2);
        assert_eq!(int_field(&d, "metadata.missing"), 0);
        assert_eq!(int_field(&d, "nothing.here"), 0);
    }

    #[test]
    fn breadcrumbs_read_back_from_product() {
        let d = doc! { "category": { "breadcrumbs": [ { "level": 1, "name": "A" }, { "level": 2, "name": "B" } ] } };
        assert_eq!(format_breadcrumbs(&breadcrumbs_of(&d)), "L1: A → L2: B");
        assert!(breadcrumbs_of(&doc! {}).is_empty());
    }
}
