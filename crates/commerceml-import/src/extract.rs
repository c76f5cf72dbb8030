//! Domain extractors: normalized feed tree in, flat staging records out
//!
//! Pure functions, no I/O. All lookups go through the uniform accessor API
//! of `commerceml-xmltree`, so schema-repeatable fields are handled the
//! same whether the feed carried one occurrence or many.
//!
//! Records without the mandatory external id (`Ид`) are unusable for
//! reconciliation and are rejected here, per record, with a warning.

use crate::{CategoryRecord, ProductRecord, PropertyRecord, PropertyValueRef, VariantRecord};
use commerceml_xmltree::Node;
use tracing::warn;

/// Default sale unit when the feed does not carry one.
const DEFAULT_UNIT: &str = "шт";

// ============================================================================
// Categories
// ============================================================================

/// Emit one record per group of the classifier's group tree.
///
/// Depth-first, parent before children: a record's parent external id always
/// appears earlier in the output, so the reconciliation engine resolves
/// parents in a single left-to-right pass.
pub fn extract_categories(classifier: &Node) -> Vec<CategoryRecord> {
    let mut records = Vec::new();
    if let Some(groups) = classifier.first("Группы") {
        for group in groups.get("Группа") {
            walk_group(group, None, &mut records);
        }
    }
    records
}

fn walk_group(group: &Node, parent: Option<&str>, records: &mut Vec<CategoryRecord>) {
    let Some(external_id) = group.first_text("Ид") else {
        warn!("classifier group without external id, skipping subtree");
        return;
    };
    let external_id = external_id.to_string();

    records.push(CategoryRecord {
        title: group.first_text("Наименование").unwrap_or_default().to_string(),
        external_id: external_id.clone(),
        parent: parent.map(str::to_string),
        category: None,
    });

    if let Some(subgroups) = group.first("Группы") {
        for sub in subgroups.get("Группа") {
            walk_group(sub, Some(&external_id), records);
        }
    }
}

// ============================================================================
// Properties
// ============================================================================

/// Emit one record per property node; variants only when a nested
/// value-dictionary section exists.
pub fn extract_properties(classifier: &Node) -> Vec<PropertyRecord> {
    let mut records = Vec::new();

    if let Some(properties) = classifier.first("Свойства") {
        for property in properties.get("Свойство") {
            let Some(external_id) = property.first_text("Ид") else {
                warn!("property without external id, skipping");
                continue;
            };

            let mut variants = Vec::new();
            if let Some(dictionary) = property.first("ВариантыЗначений") {
                for value in dictionary.get("Справочник") {
                    variants.push(VariantRecord {
                        external_id: value
                            .first_text("ИдЗначения")
                            .unwrap_or_default()
                            .to_string(),
                        value: value.first_text("Значение").unwrap_or_default().to_string(),
                    });
                }
            }

            records.push(PropertyRecord {
                title: property
                    .first_text("Наименование")
                    .unwrap_or_default()
                    .to_string(),
                external_id: external_id.to_string(),
                variants,
                attribute: None,
            });
        }
    }
    records
}

// ============================================================================
// Products
// ============================================================================

/// Emit one record per product node of the catalog section.
pub fn extract_products(catalog: &Node) -> Vec<ProductRecord> {
    let mut records = Vec::new();

    if let Some(products) = catalog.first("Товары") {
        for product in products.get("Товар") {
            let Some(external_id) = product.first_text("Ид") else {
                warn!("product without external id, rejecting record");
                continue;
            };

            // Malformed references extract as empty strings; they fail to
            // resolve during reconciliation instead of failing the record.
            let properties = product
                .get("ЗначенияСвойств")
                .iter()
                .map(|value| PropertyValueRef {
                    property: value.first_text("Ид").unwrap_or_default().to_string(),
                    variant: value.first_text("Значение").unwrap_or_default().to_string(),
                })
                .collect();

            let files = product
                .get("Картинка")
                .iter()
                .filter_map(Node::text)
                .map(file_base_name)
                .collect();

            records.push(ProductRecord {
                title: product
                    .first_text("Наименование")
                    .unwrap_or_default()
                    .to_string(),
                external_id: external_id.to_string(),
                category: product
                    .first("Группы")
                    .and_then(|groups| groups.first_text("Ид"))
                    .map(str::to_string),
                description: product.first_text("Описание").unwrap_or_default().to_string(),
                vendor_code: product.first_text("Артикул").unwrap_or_default().to_string(),
                barcode: product.first_text("Штрихкод").unwrap_or_default().to_string(),
                unit: DEFAULT_UNIT.to_string(),
                volume: product.first_text("Вес").unwrap_or("0").to_string(),
                width: product.first_text("Ширина").unwrap_or_default().to_string(),
                length: product.first_text("Длина").unwrap_or_default().to_string(),
                height: product.first_text("Высота").unwrap_or_default().to_string(),
                properties,
                files,
                product: None,
            });
        }
    }
    records
}

/// Recover the bare base-name an image path refers to: path separators
/// removed, extension dropped. Used later as the lookup key into the file
/// store.
fn file_base_name(path: &str) -> String {
    let flat = path.replace('/', "");
    flat.split('.').next().unwrap_or_default().to_string()
}

// ============================================================================
// Tests
// ============================================================================
