//! Tests for the reconciliation engine against the in-memory store

use commerceml_catalog::{
    AttributeKind, AttributeService, CatalogStatus, CategoryService, FileRelationService,
    FileStore, MemoryCatalog, NewAttribute, NullProgress, ProductService, ProgressSink, NO_PARENT,
};
use commerceml_import::{
    CategoryRecord, ImportBatch, ImportConfig, ProductRecord, PropertyRecord, PropertyValueRef,
    ReconciliationEngine, VariantRecord,
};
use chrono::Utc;

fn category(external_id: &str, parent: Option<&str>) -> CategoryRecord {
    CategoryRecord {
        title: format!("Category {external_id}"),
        external_id: external_id.to_string(),
        parent: parent.map(str::to_string),
        category: None,
    }
}

fn product(external_id: &str, category: &str) -> ProductRecord {
    ProductRecord {
        title: format!("Product {external_id}"),
        external_id: external_id.to_string(),
        category: Some(category.to_string()),
        description: String::new(),
        vendor_code: String::new(),
        barcode: String::new(),
        unit: "шт".to_string(),
        volume: "0".to_string(),
        width: String::new(),
        length: String::new(),
        height: String::new(),
        properties: Vec::new(),
        files: Vec::new(),
        product: None,
    }
}

fn minimal_batch() -> ImportBatch {
    ImportBatch {
        categories: vec![category("1", None)],
        properties: Vec::new(),
        products: vec![product("P1", "1")],
    }
}

fn run(store: &mut MemoryCatalog, batch: &mut ImportBatch) {
    ReconciliationEngine::new(store, &mut NullProgress, ImportConfig::default())
        .run(batch)
        .expect("reconciliation should succeed");
}

// ============================================================================
// Phase Gating
// ============================================================================

#[test]
fn test_incomplete_batch_is_a_silent_noop() {
    let mut store = MemoryCatalog::new();

    let mut only_categories = ImportBatch {
        categories: vec![category("1", None)],
        ..ImportBatch::default()
    };
    run(&mut store, &mut only_categories);

    assert_eq!(store.category_count(), 0);
    assert_eq!(store.product_count(), 0);
}

// ============================================================================
// Properties → Attributes
// ============================================================================

#[test]
fn test_properties_resolve_or_create_attributes() {
    let mut store = MemoryCatalog::new();
    let existing = store
        .create_attribute(NewAttribute {
            title: "Цвет".to_string(),
            kind: AttributeKind::String,
        })
        .unwrap();

    let mut batch = minimal_batch();
    batch.properties = vec![
        PropertyRecord {
            title: "Цвет".to_string(),
            external_id: "PR1".to_string(),
            variants: Vec::new(),
            attribute: None,
        },
        PropertyRecord {
            title: "Материал".to_string(),
            external_id: "PR2".to_string(),
            variants: Vec::new(),
            attribute: None,
        },
    ];
    run(&mut store, &mut batch);

    assert_eq!(store.attribute_count(), 2);
    assert_eq!(batch.properties[0].attribute.as_ref().unwrap().uuid, existing.uuid);
    assert_eq!(
        batch.properties[1].attribute.as_ref().unwrap().kind,
        AttributeKind::String
    );
}

// ============================================================================
// Categories
// ============================================================================

#[test]
fn test_category_parent_resolution_single_pass() {
    let mut store = MemoryCatalog::new();
    let mut batch = minimal_batch();
    batch.categories = vec![
        category("1", None),
        category("11", Some("1")),
        category("111", Some("11")),
    ];
    run(&mut store, &mut batch);

    let root = store.category_by_external_id("1").unwrap();
    let child = store.category_by_external_id("11").unwrap();
    let grandchild = store.category_by_external_id("111").unwrap();

    assert_eq!(root.parent, NO_PARENT);
    assert_eq!(child.parent, root.uuid);
    assert_eq!(grandchild.parent, child.uuid);
}

#[test]
fn test_unknown_parent_degrades_to_sentinel() {
    let mut store = MemoryCatalog::new();
    let mut batch = minimal_batch();
    batch.categories = vec![category("7", Some("does-not-exist"))];
    batch.products = vec![product("P1", "7")];
    run(&mut store, &mut batch);

    assert_eq!(store.category_by_external_id("7").unwrap().parent, NO_PARENT);
}

#[test]
fn test_category_upsert_is_idempotent() {
    let mut store = MemoryCatalog::new();
    let mut batch = minimal_batch();
    run(&mut store, &mut batch);
    let first = store.category_by_external_id("1").unwrap();

    let mut again = minimal_batch();
    again.categories[0].title = "Renamed".to_string();
    run(&mut store, &mut again);

    assert_eq!(store.category_count(), 1);
    let second = store.category_by_external_id("1").unwrap();
    assert_eq!(second.uuid, first.uuid);
    assert_eq!(second.title, "Renamed");
    // Historical fields survive the update.
    assert_eq!(second.pagination, first.pagination);
    assert_eq!(second.template, first.template);
}

// ============================================================================
// Products
// ============================================================================

#[test]
fn test_product_upsert_is_idempotent_and_priceless() {
    let mut store = MemoryCatalog::new();
    let mut batch = minimal_batch();
    run(&mut store, &mut batch);

    let first = store.product_by_external_id("P1").unwrap();
    assert_eq!(first.price, 0.0);
    assert_eq!(first.price_first, 0.0);
    assert_eq!(first.price_wholesale, 0.0);
    assert_eq!(first.status, CatalogStatus::Work);
    assert_eq!(first.export, "1c");

    let mut again = minimal_batch();
    again.products[0].title = "Renamed".to_string();
    run(&mut store, &mut again);

    assert_eq!(store.product_count(), 1);
    let second = store.product_by_external_id("P1").unwrap();
    assert_eq!(second.uuid, first.uuid);
    assert_eq!(second.title, "Renamed");
    assert_eq!(second.price, 0.0);
}

#[test]
fn test_missing_category_fails_record_not_batch() {
    let mut store = MemoryCatalog::new();
    let mut batch = minimal_batch();
    batch.products = vec![product("P-orphan", "no-such-category"), product("P1", "1")];
    run(&mut store, &mut batch);

    assert!(store.product_by_external_id("P-orphan").is_err());
    assert!(store.product_by_external_id("P1").is_ok());
}

#[test]
fn test_attribute_values_resolve_against_batch_properties() {
    let mut store = MemoryCatalog::new();
    let mut batch = minimal_batch();
    batch.properties = vec![PropertyRecord {
        title: "Цвет".to_string(),
        external_id: "PR1".to_string(),
        variants: vec![
            VariantRecord {
                external_id: "V1".to_string(),
                value: "Красный".to_string(),
            },
            VariantRecord {
                external_id: "V2".to_string(),
                value: "Синий".to_string(),
            },
        ],
        attribute: None,
    }];
    batch.products[0].properties = vec![
        PropertyValueRef {
            property: "PR1".to_string(),
            variant: "V2".to_string(),
        },
        // Unresolvable pair: silently skipped.
        PropertyValueRef {
            property: "PR9".to_string(),
            variant: "V1".to_string(),
        },
    ];
    run(&mut store, &mut batch);

    let product = store.product_by_external_id("P1").unwrap();
    let attribute = store.attribute_by_title("Цвет").unwrap();
    let assigned = store.assigned_attributes(product.uuid);

    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned.get(&attribute.uuid), Some(&"Синий".to_string()));
}

// ============================================================================
// File Relations
// ============================================================================

#[test]
fn test_file_relations_are_replaced_destructively() {
    let mut store = MemoryCatalog::new();
    store.add_file("a", "/upload/a.jpg", Utc::now());
    store.add_file("b", "/upload/b.jpg", Utc::now());
    store.add_file("c", "/upload/c.jpg", Utc::now());

    // First import links [a, b].
    let mut batch = minimal_batch();
    batch.products[0].files = vec!["a".to_string(), "b".to_string()];
    run(&mut store, &mut batch);

    let product = store.product_by_external_id("P1").unwrap();
    assert_eq!(store.file_relations(product.uuid).len(), 2);

    // Second import lists only [c]: a and b are unconditionally unlinked.
    let mut again = minimal_batch();
    again.products[0].files = vec!["c".to_string()];
    run(&mut store, &mut again);

    let relations = store.file_relations(product.uuid);
    assert_eq!(relations.len(), 1);
    assert_eq!(relations[0].order, 1);
    let c = store.first_file_by_name("c").unwrap();
    assert_eq!(relations[0].file, c.uuid);
}

#[test]
fn test_empty_file_list_preserves_relations() {
    let mut store = MemoryCatalog::new();
    store.add_file("a", "/upload/a.jpg", Utc::now());

    let mut batch = minimal_batch();
    batch.products[0].files = vec!["a".to_string()];
    run(&mut store, &mut batch);

    let product = store.product_by_external_id("P1").unwrap();
    assert_eq!(store.file_relations(product.uuid).len(), 1);

    // Re-import with no files listed: relations untouched.
    let mut again = minimal_batch();
    run(&mut store, &mut again);
    assert_eq!(store.file_relations(product.uuid).len(), 1);
}

#[test]
fn test_unknown_file_names_are_skipped_but_order_is_list_position() {
    let mut store = MemoryCatalog::new();
    store.add_file("known", "/upload/known.jpg", Utc::now());

    let mut batch = minimal_batch();
    batch.products[0].files = vec!["ghost".to_string(), "known".to_string()];
    run(&mut store, &mut batch);

    let product = store.product_by_external_id("P1").unwrap();
    let relations = store.file_relations(product.uuid);
    assert_eq!(relations.len(), 1);
    // Order comes from the incoming list position, 1-based.
    assert_eq!(relations[0].order, 2);
}

// ============================================================================
// Progress Telemetry
// ============================================================================

#[derive(Default)]
struct Recording(Vec<(usize, usize)>);

impl ProgressSink for Recording {
    fn report(&mut self, current: usize, total: usize) {
        self.0.push((current, total));
    }
}

#[test]
fn test_progress_totals_are_per_phase() {
    let mut store = MemoryCatalog::new();
    let mut batch = ImportBatch {
        categories: vec![category("1", None), category("2", None)],
        properties: vec![PropertyRecord {
            title: "Цвет".to_string(),
            external_id: "PR1".to_string(),
            variants: Vec::new(),
            attribute: None,
        }],
        products: vec![product("P1", "1")],
    };

    let mut progress = Recording::default();
    ReconciliationEngine::new(&mut store, &mut progress, ImportConfig::default())
        .run(&mut batch)
        .unwrap();

    assert_eq!(
        progress.0,
        vec![(0, 1), (0, 2), (1, 2), (0, 1)],
        "one report per record, denominator per phase"
    );
}
