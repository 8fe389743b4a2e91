use std::collections::HashSet;
use std::fs;

use ecomlab::mongo::format::format_breadcrumbs;
use ecomlab::mongo::models::{analyze, build_categories, build_products, read_offers, OfferRow};
use ecomlab::LabError;

const DATASET: &str = "\
Partner_Name,Category_ID,Category_FullPathName,Offer_ID,Offer_Name,Offer_Type
_ozon,101,Строительство и ремонт\\Инструменты\\Пневмоинструменты,1,Степлер Fubag,Степлер строительный
_ozon,101,Строительство и ремонт\\Инструменты\\Пневмоинструменты,2,Степлер Metabo,Степлер строительный
_ozon,102,Строительство и ремонт\\Инструменты,3,Набор отверток,Набор
_wb,101,Строительство и ремонт\\Инструменты\\Пневмоинструменты,4,Нейлер,Степлер строительный
_ozon,200,Дом и сад,5,Лейка,Садовый инвентарь
";

fn rows() -> Vec<OfferRow> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("offers.csv");
    fs::write(&path, DATASET).unwrap();
    read_offers(&path).unwrap()
}

#[test]
fn csv_dataset_gives_one_category_per_partner_and_id() {
    let rows = rows();
    assert_eq!(rows.len(), 5);
    let distinct: HashSet<(&str, &str)> =
        rows.iter().map(|r| (r.partner.as_str(), r.category_id.as_str())).collect();

    let (categories, stats) = build_categories(&rows);
    assert_eq!(categories.len(), distinct.len());
    assert_eq!(stats.total_categories, 4);
    assert_eq!(stats.max_depth, 3);
    assert!((stats.avg_depth - 9.0 / 4.0).abs() < 1e-12);

    let total: i64 = categories.iter().map(|c| c.metadata.total_products).sum();
    assert_eq!(total, rows.len() as i64);

    let first = &categories[0];
    assert_eq!(first.id, "_ozon_101");
    assert_eq!(first.metadata.total_products, 2);
    assert_eq!(first.path, "Строительство и ремонт/Инструменты/Пневмоинструменты");
    assert_eq!(first.level as usize, first.path_array.len());
    assert_eq!(first.parent_path.as_deref(), Some("Строительство и ремонт/Инструменты"));
    assert_eq!(first.name, "Пневмоинструменты");

    let root = categories.iter().find(|c| c.id == "_ozon_200").unwrap();
    assert_eq!(root.level, 1);
    assert_eq!(root.parent_path, None);
}

#[test]
fn parent_path_is_the_path_of_the_parent_category() {
    let (categories, _) = build_categories(&rows());
    let paths: HashSet<&str> = categories.iter().map(|c| c.path.as_str()).collect();
    let child = categories.iter().find(|c| c.id == "_ozon_101").unwrap();
    assert!(paths.contains(child.parent_path.as_deref().unwrap()));
}

#[test]
fn one_product_per_row_with_breadcrumbs() {
    let rows = rows();
    let (products, stats) = build_products(&rows);
    assert_eq!(products.len(), rows.len());
    assert_eq!(stats.total_products, 5);
    assert_eq!(stats.unique_types, 3);
    assert_eq!(stats.partners, 2);

    let p = &products[0];
    assert_eq!(p.id, "_ozon_1");
    assert_eq!(p.product_type, "Степлер строительный");
    assert_eq!(p.category.id, "101");
    let levels: Vec<i32> = p.category.breadcrumbs.iter().map(|b| b.level).collect();
    assert_eq!(levels, vec![1, 2, 3]);
    assert_eq!(
        format_breadcrumbs(&p.category.breadcrumbs),
        "L1: Строительство и ремонт → L2: Инструменты → L3: Пневмоинструменты"
    );

    let doc = p.to_document().unwrap();
    assert_eq!(doc.get_str("type").unwrap(), "Степлер строительный");
    assert_eq!(doc.get_str("_id").unwrap(), "_ozon_1");
    assert!(doc.get_datetime("created_at").is_ok());
}

#[test]
fn category_document_uses_mongo_field_names() {
    let (categories, _) = build_categories(&rows());
    let doc = categories[0].to_document().unwrap();
    assert_eq!(doc.get_str("_id").unwrap(), "_ozon_101");
    assert_eq!(doc.get_i32("level").unwrap(), 3);
    assert_eq!(doc.get_array("path_array").unwrap().len(), 3);
    assert!(doc.get_document("metadata").unwrap().get_datetime("last_updated").is_ok());
}

#[test]
fn rows_with_empty_path_levels_are_still_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("offers.csv");
    fs::write(
        &path,
        "Partner_Name,Category_ID,Category_FullPathName,Offer_ID,Offer_Name,Offer_Type\n\
         _ozon,1,A\\B,1,first,t\n\
         _ozon,2,A\\C\\,2,second,t\n",
    )
    .unwrap();
    let rows = read_offers(&path).unwrap();
    assert_eq!(rows.len(), 2);

    let (categories, _) = build_categories(&rows);
    let (products, stats) = build_products(&rows);
    assert_eq!(categories.len(), 2);
    assert_eq!(products.len(), 2);
    assert_eq!(stats.total_products, 2);
    assert_eq!(categories[1].path, "A/C");
    assert_eq!(categories[1].parent_path.as_deref(), Some("A"));

    let analysis = analyze(&rows);
    assert_eq!(analysis.invalid_rows, 1);
    assert_eq!(analysis.rows, 2);
    assert_eq!(analysis.categories_per_level.get(&2), Some(&2));
    assert!(matches!(rows[1].validate(), Err(LabError::InvalidRow(_))));
}

#[test]
fn analysis_counts_categories_per_level() {
    let analysis = analyze(&rows());
    assert_eq!(analysis.partners, 2);
    assert_eq!(analysis.categories, 4);
    assert_eq!(analysis.offer_types, 3);
    assert_eq!(analysis.categories_per_level.get(&3), Some(&2));
    assert_eq!(analysis.categories_per_level.get(&2), Some(&1));
    assert_eq!(analysis.categories_per_level.get(&1), Some(&1));
}

#[test]
fn missing_dataset_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(read_offers(&dir.path().join("nope.csv")).is_err());
}
