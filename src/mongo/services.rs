//! The loaders and canned queries of the lab, grouped by what they work on.
use std::collections::BTreeMap;
use std::path::Path;

use bson::{doc, Document};
use tracing::{info, warn};

use super::database::{IndexOutcome, MongoOps, QueryResult};
use super::models::{
    build_categories, build_products, read_offers, templates, CategoryStats, IndexKind, IndexSpec,
    OfferRow, ProductStats,
};
use crate::Result;

pub const CATEGORIES: &str = "categories";
pub const PRODUCTS: &str = "products";

/// partner whose catalogue the navigation queries browse
pub const DEFAULT_PARTNER: &str = "_ozon";

/// Loads the offers dataset into both collections
pub struct DataLoader<'a> {
    ops: &'a MongoOps<'a>,
    batch_size: usize,
}

impl<'a> DataLoader<'a> {
    pub fn new(ops: &'a MongoOps<'a>, batch_size: usize) -> Self {
        Self { ops, batch_size }
    }

    pub fn read(&self, path: &Path) -> Result<Vec<OfferRow>> {
        let rows = read_offers(path)?;
        info!("read {} offer rows from {}", rows.len(), path.display());
        for err in rows.iter().filter_map(|r| r.validate().err()) {
            warn!("{}, loading it without the empty levels", err);
        }
        Ok(rows)
    }

    /// replaces `categories` with one document per distinct (partner, category)
    pub fn load_categories(&self, rows: &[OfferRow]) -> Result<(QueryResult, CategoryStats)> {
        let (docs, stats) = build_categories(rows);
        let docs = docs.iter().map(|d| d.to_document()).collect::<Result<Vec<_>>>()?;
        let result = self.ops.insert_many(CATEGORIES, docs, self.batch_size)?;
        Ok((result, stats))
    }

    /// replaces `products` with one document per offer row
    pub fn load_products(&self, rows: &[OfferRow]) -> Result<(QueryResult, ProductStats)> {
        let (docs, stats) = build_products(rows);
        let docs = docs.iter().map(|d| d.to_document()).collect::<Result<Vec<_>>>()?;
        let result = self.ops.insert_many(PRODUCTS, docs, self.batch_size)?;
        Ok((result, stats))
    }
}

/// secondary indexes of `categories`
pub fn category_indexes() -> Vec<IndexSpec> {
    vec![
        IndexSpec::text("path"),
        IndexSpec::ascending("path_array"),
        IndexSpec::compound(&[("partner", IndexKind::Ascending), ("level", IndexKind::Ascending)]),
        IndexSpec::descending("metadata.total_products"),
    ]
}

/// secondary indexes of `products`
pub fn product_indexes() -> Vec<IndexSpec> {
    vec![
        IndexSpec::compound(&[("partner", IndexKind::Ascending), ("category.id", IndexKind::Ascending)]),
        IndexSpec::ascending("category.breadcrumbs.name"),
        IndexSpec::compound(&[("type", IndexKind::Ascending), ("partner", IndexKind::Ascending)]),
        IndexSpec::ascending("offer_id"),
    ]
}

pub struct Indexing<'a> {
    ops: &'a MongoOps<'a>,
}

impl<'a> Indexing<'a> {
    pub fn new(ops: &'a MongoOps<'a>) -> Self {
        Self { ops }
    }

    /// creates the missing indexes of both collections, keyed by collection name
    pub fn create_all(&self) -> Result<BTreeMap<&'static str, IndexOutcome>> {
        let mut out = BTreeMap::new();
        out.insert(CATEGORIES, self.ops.create_indexes(CATEGORIES, &category_indexes())?);
        out.insert(PRODUCTS, self.ops.create_indexes(PRODUCTS, &product_indexes())?);
        Ok(out)
    }
}

pub fn top_categories_pipeline(limit: i64) -> Vec<Document> {
    vec![
        doc! { "$sort": { "metadata.total_products": -1 } },
        doc! { "$limit": limit },
        doc! { "$project": { "name": 1, "metadata.total_products": 1, "level": 1, "partner": 1 } },
    ]
}

/// Navigation of the category tree
pub struct CategoryQueries<'a> {
    ops: &'a MongoOps<'a>,
}

impl<'a> CategoryQueries<'a> {
    pub fn new(ops: &'a MongoOps<'a>) -> Self {
        Self { ops }
    }

    pub fn roots(&self, partner: &str) -> Result<QueryResult> {
        self.ops.find(CATEGORIES, templates::by_partner_and_level(partner, 1), None)
    }

    /// every category below (and including) the one named `parent_name`, via `path_array`
    pub fn subcategories(&self, parent_name: &str) -> Result<QueryResult> {
        self.ops.find(CATEGORIES, templates::by_path_array_element(parent_name), None)
    }

    /// the same subtree found with an anchored regex on `path`, for comparison
    pub fn subcategories_by_regex(&self, parent_name: &str) -> Result<QueryResult> {
        self.ops.find(CATEGORIES, templates::by_path_prefix(parent_name), None)
    }

    pub fn top(&self, limit: i64) -> Result<QueryResult> {
        self.ops.aggregate(CATEGORIES, top_categories_pipeline(limit))
    }
}

pub fn first_level_pipeline() -> Vec<Document> {
    vec![
        doc! { "$match": { "category.breadcrumbs.0": { "$exists": true } } },
        doc! { "$project": { "first_level": { "$arrayElemAt": ["$category.breadcrumbs.name", 0] } } },
        doc! { "$group": { "_id": "$first_level", "count": { "$sum": 1 } } },
        doc! { "$sort": { "count": -1 } },
        doc! { "$limit": 10 },
        doc! { "$project": { "category_name": "$_id", "product_count": "$count", "_id": 0 } },
    ]
}

/// Queries over products and their embedded categories
pub struct ProductQueries<'a> {
    ops: &'a MongoOps<'a>,
}

impl<'a> ProductQueries<'a> {
    pub fn new(ops: &'a MongoOps<'a>) -> Self {
        Self { ops }
    }

    pub fn by_type_and_category(&self, product_type: &str, breadcrumb_name: &str) -> Result<QueryResult> {
        self.ops.find(
            PRODUCTS,
            templates::by_product_type_and_category(product_type, breadcrumb_name),
            None,
        )
    }

    /// products whose category is exactly `level` deep
    pub fn at_level(&self, level: usize, limit: Option<i64>) -> Result<QueryResult> {
        self.ops.find(PRODUCTS, templates::by_exact_level(level), limit)
    }

    pub fn in_breadcrumb(&self, name: &str) -> Result<QueryResult> {
        self.ops.find(PRODUCTS, templates::by_breadcrumb_name(name), None)
    }

    pub fn in_categories(&self, ids: Vec<String>) -> Result<QueryResult> {
        self.ops.find(PRODUCTS, templates::by_category_ids(ids), None)
    }

    /// product counts of the ten largest first level categories
    pub fn by_first_level(&self) -> Result<QueryResult> {
        self.ops.aggregate(PRODUCTS, first_level_pipeline())
    }
}

pub fn grouped_top_categories_pipeline(limit: i64) -> Vec<Document> {
    vec![
        doc! { "$group": {
            "_id": "$category_id",
            "name": { "$first": "$name" },
            "path": { "$first": "$path" },
            "products": { "$sum": "$metadata.total_products" },
            "level": { "$first": "$level" },
            "partner": { "$first": "$partner" },
        } },
        doc! { "$sort": { "products": -1 } },
        doc! { "$limit": limit },
        doc! { "$project": { "category_id": "$_id", "name": 1, "path": 1, "products": 1, "level": 1, "partner": 1 } },
    ]
}

pub fn hierarchy_pipeline() -> Vec<Document> {
    vec![
        doc! { "$unwind": { "path": "$path_array", "includeArrayIndex": "depth" } },
        doc! { "$group": {
            "_id": { "level": { "$add": ["$depth", 1] }, "name": "$path_array" },
            "products": { "$sum": "$metadata.total_products" },
        } },
        doc! { "$sort": { "_id.level": 1, "products": -1 } },
        doc! { "$limit": 30 },
    ]
}

pub fn leaf_categories_pipeline(limit: i64) -> Vec<Document> {
    vec![
        doc! { "$lookup": {
            "from": CATEGORIES,
            "localField": "path",
            "foreignField": "parent_path",
            "as": "children",
        } },
        doc! { "$match": { "children.0": { "$exists": false } } },
        doc! { "$project": { "name": 1, "level": 1, "products": "$metadata.total_products" } },
        doc! { "$sort": { "products": -1 } },
        doc! { "$limit": limit },
    ]
}

pub fn partner_stats_pipeline() -> Vec<Document> {
    vec![
        doc! { "$group": {
            "_id": { "partner": "$partner", "level": "$level" },
            "categories_count": { "$sum": 1 },
            "total_products": { "$sum": "$metadata.total_products" },
        } },
        doc! { "$sort": { "_id.partner": 1, "_id.level": 1 } },
        doc! { "$project": {
            "_id": 0,
            "partner": "$_id.partner",
            "level": "$_id.level",
            "categories_count": 1,
            "total_products": 1,
        } },
    ]
}

/// Aggregation framework analytics over the category tree
pub struct Analytics<'a> {
    ops: &'a MongoOps<'a>,
}

impl<'a> Analytics<'a> {
    pub fn new(ops: &'a MongoOps<'a>) -> Self {
        Self { ops }
    }

    pub fn top_categories(&self, limit: i64) -> Result<QueryResult> {
        self.ops.aggregate(CATEGORIES, grouped_top_categories_pipeline(limit))
    }

    /// product totals per (depth, path element)
    pub fn hierarchy_stats(&self) -> Result<QueryResult> {
        self.ops.aggregate(CATEGORIES, hierarchy_pipeline())
    }

    /// categories no other category names as its parent
    pub fn leaf_categories(&self, limit: i64) -> Result<QueryResult> {
        self.ops.aggregate(CATEGORIES, leaf_categories_pipeline(limit))
    }

    pub fn partner_stats(&self) -> Result<QueryResult> {
        self.ops.aggregate(CATEGORIES, partner_stats_pipeline())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn index_names_are_unique_per_collection() {
        for specs in [category_indexes(), product_indexes()] {
            let names: BTreeSet<String> = specs.iter().map(IndexSpec::name).collect();
            assert_eq!(names.len(), specs.len());
        }
        let names: Vec<String> = category_indexes().iter().map(IndexSpec::name).collect();
        assert_eq!(
            names,
            vec!["path_text", "path_array_1", "partner_1_level_1", "metadata.total_products_-1"]
        );
    }

    #[test]
    fn leaf_lookup_joins_path_to_parent_path() {
        let pipeline = leaf_categories_pipeline(10);
        let lookup = pipeline[0].get_document("$lookup").unwrap();
        assert_eq!(lookup.get_str("localField").unwrap(), "path");
        assert_eq!(lookup.get_str("foreignField").unwrap(), "parent_path");
        assert_eq!(pipeline.last().unwrap(), &doc! { "$limit": 10_i64 });
    }

    #[test]
    fn hierarchy_groups_by_depth_of_each_element() {
        let pipeline = hierarchy_pipeline();
        let unwind = pipeline[0].get_document("$unwind").unwrap();
        assert_eq!(unwind.get_str("includeArrayIndex").unwrap(), "depth");
        assert_eq!(pipeline.len(), 4);
    }
}
