//! Document shapes of the `categories` and `products` collections and their construction
//! from the offers dataset.
//!
//! Categories use the materialized path pattern: every category stores its full path both
//! as a `/` separated string and as an array, so a subtree is found by matching one array
//! element. Products embed their category together with a breadcrumb trail.
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use bson::{doc, DateTime, Document};
use serde::{Deserialize, Serialize};

use crate::{LabError, Result};

/// separator of `Category_FullPathName` in the dataset
pub const SOURCE_PATH_SEPARATOR: char = '\\';
/// separator of the stored `path` and `parent_path`
pub const PATH_SEPARATOR: &str = "/";

/// One offer row of the dataset
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OfferRow {
    #[serde(rename = "Partner_Name")]
    pub partner: String,
    #[serde(rename = "Category_ID")]
    pub category_id: String,
    #[serde(rename = "Category_FullPathName")]
    pub category_path: String,
    #[serde(rename = "Offer_ID")]
    pub offer_id: String,
    #[serde(rename = "Offer_Name")]
    pub name: String,
    #[serde(rename = "Offer_Type")]
    pub offer_type: String,
}

impl OfferRow {
    /// the category path split into its levels.
    ///
    /// Empty levels (e.g. from a trailing `\`) are skipped. A path with no named level at
    /// all falls back to the category id, so every row still maps to a category.
    pub fn path_array(&self) -> Vec<String> {
        let parts: Vec<String> = self
            .category_path
            .split(SOURCE_PATH_SEPARATOR)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect();
        if parts.is_empty() {
            vec![self.category_id.clone()]
        } else {
            parts
        }
    }

    /// checks that every level of the category path is named
    ///
    /// # Errors
    /// [`LabError::InvalidRow`] if the path is empty or has an empty level
    pub fn validate(&self) -> Result<()> {
        if self.category_path.split(SOURCE_PATH_SEPARATOR).any(|p| p.trim().is_empty()) {
            return Err(LabError::InvalidRow(format!(
                "offer {}: bad category path '{}'",
                self.offer_id, self.category_path
            )));
        }
        Ok(())
    }
}

/// reads every offer row of a CSV file with a header line
pub fn read_offers(path: &Path) -> Result<Vec<OfferRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader.deserialize().collect::<std::result::Result<Vec<OfferRow>, _>>()?;
    Ok(rows)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMetadata {
    pub total_products: i64,
    pub last_updated: DateTime,
}

/// A document of the `categories` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDoc {
    /// `<partner>_<category_id>`
    #[serde(rename = "_id")]
    pub id: String,
    pub partner: String,
    pub category_id: String,
    /// last level of the path
    pub name: String,
    pub path: String,
    pub path_array: Vec<String>,
    /// number of levels, `1` for a root category
    pub level: i32,
    pub parent_path: Option<String>,
    pub metadata: CategoryMetadata,
}

impl CategoryDoc {
    /// builds the category of `row`, owning `total_products` offers
    pub fn from_row(row: &OfferRow, total_products: i64) -> Self {
        let path_array = row.path_array();
        let level = path_array.len();
        let parent_path = if level > 1 {
            Some(path_array[..level - 1].join(PATH_SEPARATOR))
        } else {
            None
        };
        Self {
            id: format!("{}_{}", row.partner, row.category_id),
            partner: row.partner.clone(),
            category_id: row.category_id.clone(),
            name: path_array[level - 1].clone(),
            path: path_array.join(PATH_SEPARATOR),
            level: level as i32,
            parent_path,
            path_array,
            metadata: CategoryMetadata { total_products, last_updated: DateTime::now() },
        }
    }

    pub fn to_document(&self) -> Result<Document> {
        Ok(bson::to_document(self)?)
    }
}

/// One level of a product's category ancestry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    /// 1 for the root
    pub level: i32,
    pub name: String,
}

/// The category embedded in a product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub id: String,
    pub name: String,
    pub full_path: String,
    pub breadcrumbs: Vec<Breadcrumb>,
}

/// A document of the `products` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDoc {
    /// `<partner>_<offer_id>`
    #[serde(rename = "_id")]
    pub id: String,
    pub partner: String,
    pub offer_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub product_type: String,
    pub category: CategoryInfo,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl ProductDoc {
    pub fn from_row(row: &OfferRow) -> Self {
        let path_array = row.path_array();
        let breadcrumbs = path_array
            .iter()
            .enumerate()
            .map(|(i, name)| Breadcrumb { level: i as i32 + 1, name: name.clone() })
            .collect();
        let now = DateTime::now();
        Self {
            id: format!("{}_{}", row.partner, row.offer_id),
            partner: row.partner.clone(),
            offer_id: row.offer_id.clone(),
            name: row.name.clone(),
            product_type: row.offer_type.clone(),
            category: CategoryInfo {
                id: row.category_id.clone(),
                name: path_array[path_array.len() - 1].clone(),
                full_path: path_array.join(PATH_SEPARATOR),
                breadcrumbs,
            },
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_document(&self) -> Result<Document> {
        Ok(bson::to_document(self)?)
    }
}

/// Summary of a category load
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryStats {
    pub total_categories: usize,
    pub max_depth: i32,
    pub avg_depth: f64,
}

/// Summary of a product load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductStats {
    pub total_products: usize,
    pub unique_types: usize,
    pub partners: usize,
}

/// One category document per distinct (partner, category id), in first seen order, each
/// counting the rows that reference it
pub fn build_categories(rows: &[OfferRow]) -> (Vec<CategoryDoc>, CategoryStats) {
    let mut order: Vec<(&str, &str)> = Vec::new();
    let mut seen: HashMap<(&str, &str), (&OfferRow, i64)> = HashMap::new();
    for row in rows {
        let key = (row.partner.as_str(), row.category_id.as_str());
        seen.entry(key)
            .and_modify(|(_, count)| *count += 1)
            .or_insert_with(|| {
                order.push(key);
                (row, 1)
            });
    }

    let docs: Vec<CategoryDoc> = order
        .iter()
        .map(|key| {
            let (row, count) = seen[key];
            CategoryDoc::from_row(row, count)
        })
        .collect();

    let max_depth = docs.iter().map(|d| d.level).max().unwrap_or(0);
    let avg_depth = if docs.is_empty() {
        0.0
    } else {
        docs.iter().map(|d| d.level as f64).sum::<f64>() / docs.len() as f64
    };
    let stats = CategoryStats { total_categories: docs.len(), max_depth, avg_depth };
    (docs, stats)
}

/// One product document per row
pub fn build_products(rows: &[OfferRow]) -> (Vec<ProductDoc>, ProductStats) {
    let docs: Vec<ProductDoc> = rows.iter().map(ProductDoc::from_row).collect();
    let unique_types = rows.iter().map(|r| r.offer_type.as_str()).collect::<BTreeSet<_>>().len();
    let partners = rows.iter().map(|r| r.partner.as_str()).collect::<BTreeSet<_>>().len();
    let stats = ProductStats { total_products: docs.len(), unique_types, partners };
    (docs, stats)
}

/// What the dataset looks like before anything is loaded
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetAnalysis {
    pub rows: usize,
    pub partners: usize,
    pub categories: usize,
    pub offer_types: usize,
    /// number of distinct categories at each depth
    pub categories_per_level: BTreeMap<i32, usize>,
    /// rows whose category path has an empty level; they are still loaded
    pub invalid_rows: usize,
}

pub fn analyze(rows: &[OfferRow]) -> DatasetAnalysis {
    let mut categories = BTreeSet::new();
    let mut per_level: BTreeMap<i32, BTreeSet<(&str, &str)>> = BTreeMap::new();
    let mut invalid_rows = 0;
    for row in rows {
        let key = (row.partner.as_str(), row.category_id.as_str());
        categories.insert(key);
        if row.validate().is_err() {
            invalid_rows += 1;
        }
        per_level.entry(row.path_array().len() as i32).or_default().insert(key);
    }
    DatasetAnalysis {
        rows: rows.len(),
        partners: rows.iter().map(|r| r.partner.as_str()).collect::<BTreeSet<_>>().len(),
        categories: categories.len(),
        offer_types: rows.iter().map(|r| r.offer_type.as_str()).collect::<BTreeSet<_>>().len(),
        categories_per_level: per_level.into_iter().map(|(l, s)| (l, s.len())).collect(),
        invalid_rows,
    }
}

/// Sort order of one indexed field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Ascending,
    Descending,
    Text,
}

/// The keys of a secondary index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub keys: Vec<(String, IndexKind)>,
}

impl IndexSpec {
    pub fn text(field: &str) -> Self {
        Self { keys: vec![(field.to_string(), IndexKind::Text)] }
    }

    pub fn ascending(field: &str) -> Self {
        Self { keys: vec![(field.to_string(), IndexKind::Ascending)] }
    }

    pub fn descending(field: &str) -> Self {
        Self { keys: vec![(field.to_string(), IndexKind::Descending)] }
    }

    pub fn compound(keys: &[(&str, IndexKind)]) -> Self {
        Self { keys: keys.iter().map(|(f, k)| (f.to_string(), *k)).collect() }
    }

    /// the key document sent to `createIndexes`
    pub fn keys_document(&self) -> Document {
        let mut d = Document::new();
        for (field, kind) in &self.keys {
            match kind {
                IndexKind::Ascending => d.insert(field.clone(), 1),
                IndexKind::Descending => d.insert(field.clone(), -1),
                IndexKind::Text => d.insert(field.clone(), "text"),
            };
        }
        d
    }

    /// the name the server gives this index by default, e.g. `partner_1_level_1`
    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|(field, kind)| match kind {
                IndexKind::Ascending => format!("{}_1", field),
                IndexKind::Descending => format!("{}_-1", field),
                IndexKind::Text => format!("{}_text", field),
            })
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// The specs from `wanted` whose names are not in `existing`, without repeats
pub fn missing_indexes<'a>(existing: &[String], wanted: &'a [IndexSpec]) -> Vec<&'a IndexSpec> {
    let mut names: BTreeSet<String> = existing.iter().cloned().collect();
    wanted.iter().filter(|spec| names.insert(spec.name())).collect()
}

/// Filters used by the canned queries
pub mod templates {
    use bson::{doc, Document};

    pub fn by_partner_and_level(partner: &str, level: i32) -> Document {
        doc! { "partner": partner, "level": level }
    }

    pub fn by_path_array_element(element: &str) -> Document {
        doc! { "path_array": element }
    }

    pub fn by_path_prefix(prefix: &str) -> Document {
        doc! { "path": { "$regex": format!("^{}/", regex_escape(prefix)) } }
    }

    pub fn by_breadcrumb_name(name: &str) -> Document {
        doc! { "category.breadcrumbs.name": name }
    }

    pub fn by_product_type_and_category(product_type: &str, breadcrumb_name: &str) -> Document {
        doc! { "type": product_type, "category.breadcrumbs.name": breadcrumb_name }
    }

    /// products whose category is at least `level` deep
    pub fn by_breadcrumb_level_exists(level: usize) -> Document {
        doc! { format!("category.breadcrumbs.{}", level.saturating_sub(1)): { "$exists": true } }
    }

    /// products whose category is exactly `level` deep
    pub fn by_exact_level(level: usize) -> Document {
        doc! {
            format!("category.breadcrumbs.{}", level.saturating_sub(1)): { "$exists": true },
            format!("category.breadcrumbs.{}", level): { "$exists": false },
        }
    }

    pub fn by_category_ids(ids: Vec<String>) -> Document {
        doc! { "category.id": { "$in": ids } }
    }

    fn regex_escape(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        for c in s.chars() {
            if "\\^$.|?*+()[]{}/".contains(c) {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }
}

/// the empty filter, matching every document
pub fn match_all() -> Document {
    doc! {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(partner: &str, category: &str, path: &str, offer: &str, kind: &str) -> OfferRow {
        OfferRow {
            partner: partner.into(),
            category_id: category.into(),
            category_path: path.into(),
            offer_id: offer.into(),
            name: format!("offer {}", offer),
            offer_type: kind.into(),
        }
    }

    #[test]
    fn category_materialized_path() {
        let r = row("_ozon", "7508", r"Construction\Tools\Pneumatic", "1", "Stapler");
        let doc = CategoryDoc::from_row(&r, 3);
        assert_eq!(doc.id, "_ozon_7508");
        assert_eq!(doc.name, "Pneumatic");
        assert_eq!(doc.path, "Construction/Tools/Pneumatic");
        assert_eq!(doc.path_array, vec!["Construction", "Tools", "Pneumatic"]);
        assert_eq!(doc.level, 3);
        assert_eq!(doc.parent_path.as_deref(), Some("Construction/Tools"));
        assert_eq!(doc.metadata.total_products, 3);
    }

    #[test]
    fn root_category_has_no_parent() {
        let doc = CategoryDoc::from_row(&row("_ozon", "1", "Construction", "1", "t"), 1);
        assert_eq!(doc.level, 1);
        assert_eq!(doc.parent_path, None);
    }

    #[test]
    fn product_breadcrumbs_start_at_level_one() {
        let p = ProductDoc::from_row(&row("_ozon", "7508", r"A\B", "42", "Stapler"));
        assert_eq!(p.id, "_ozon_42");
        assert_eq!(p.category.name, "B");
        assert_eq!(p.category.full_path, "A/B");
        assert_eq!(
            p.category.breadcrumbs,
            vec![Breadcrumb { level: 1, name: "A".into() }, Breadcrumb { level: 2, name: "B".into() }]
        );
        let d = p.to_document().unwrap();
        assert_eq!(d.get_str("type").unwrap(), "Stapler");
        assert_eq!(d.get_str("_id").unwrap(), "_ozon_42");
    }

    #[test]
    fn empty_path_levels_are_skipped_but_flagged() {
        let r = row("_ozon", "1", r"A\C\", "1", "t");
        assert!(matches!(r.validate(), Err(LabError::InvalidRow(_))));
        let doc = CategoryDoc::from_row(&r, 1);
        assert_eq!(doc.path_array, vec!["A", "C"]);
        assert_eq!(doc.level, 2);
        assert_eq!(doc.name, "C");
        assert_eq!(doc.parent_path.as_deref(), Some("A"));

        let r = row("_ozon", "9", "  ", "2", "t");
        assert_eq!(r.path_array(), vec!["9"]);
        assert_eq!(ProductDoc::from_row(&r).category.breadcrumbs.len(), 1);
        assert!(row("_ozon", "1", r"A\B", "1", "t").validate().is_ok());
    }

    #[test]
    fn one_category_per_partner_and_id() {
        let rows = vec![
            row("_ozon", "1", r"A\B", "1", "x"),
            row("_ozon", "1", r"A\B", "2", "y"),
            row("_wb", "1", r"A\B", "3", "x"),
            row("_ozon", "2", "A", "4", "x"),
        ];
        let (cats, stats) = build_categories(&rows);
        assert_eq!(cats.len(), 3);
        assert_eq!(stats.total_categories, 3);
        assert_eq!(stats.max_depth, 2);
        assert_eq!(cats[0].id, "_ozon_1");
        assert_eq!(cats[0].metadata.total_products, 2);
        assert_eq!(cats[1].id, "_wb_1");
        assert_eq!(cats[2].metadata.total_products, 1);

        let (products, pstats) = build_products(&rows);
        assert_eq!(products.len(), 4);
        assert_eq!(pstats, ProductStats { total_products: 4, unique_types: 2, partners: 2 });
    }

    #[test]
    fn index_names_follow_server_convention() {
        assert_eq!(IndexSpec::text("path").name(), "path_text");
        assert_eq!(IndexSpec::descending("metadata.total_products").name(), "metadata.total_products_-1");
        let compound = IndexSpec::compound(&[("partner", IndexKind::Ascending), ("level", IndexKind::Ascending)]);
        assert_eq!(compound.name(), "partner_1_level_1");
        assert_eq!(compound.keys_document(), doc! { "partner": 1, "level": 1 });
    }

    #[test]
    fn existing_indexes_are_not_recreated() {
        let wanted = vec![IndexSpec::ascending("offer_id"), IndexSpec::ascending("type"), IndexSpec::ascending("type")];
        let existing = vec!["_id_".to_string(), "offer_id_1".to_string()];
        let missing = missing_indexes(&existing, &wanted);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name(), "type_1");
    }

    #[test]
    fn exact_level_filter() {
        assert_eq!(
            templates::by_exact_level(4),
            doc! {
                "category.breadcrumbs.3": { "$exists": true },
                "category.breadcrumbs.4": { "$exists": false },
            }
        );
        assert_eq!(
            templates::by_path_prefix("A.B"),
            doc! { "path": { "$regex": "^A\\.B/" } }
        );
    }

    #[test]
    fn analysis_counts_levels() {
        let rows = vec![
            row("_ozon", "1", r"A\B", "1", "x"),
            row("_ozon", "2", "A", "2", "x"),
            row("_ozon", "2", "A", "3", "y"),
        ];
        let a = analyze(&rows);
        assert_eq!(a.rows, 3);
        assert_eq!(a.categories, 2);
        assert_eq!(a.categories_per_level.get(&1), Some(&1));
        assert_eq!(a.categories_per_level.get(&2), Some(&1));
        assert_eq!(a.invalid_rows, 0);
    }
}
