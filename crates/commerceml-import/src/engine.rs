//! Reconciliation engine: one staged batch in, catalog store mutations out
//!
//! Three phases in a fixed order, each completing before the next starts,
//! because later phases depend on entities resolved earlier:
//!
//! 1. Properties → attributes (read by title, create string-typed on miss)
//! 2. Categories (upsert by external id, parents resolved left-to-right)
//! 3. Products (upsert by external id, then attribute values, then file
//!    relations)
//!
//! Progress is reported after every record of every phase. It is advisory
//! telemetry only; nothing resumes from it.

use crate::{CategoryRecord, ImportBatch, ImportError, ProductRecord, PropertyRecord};
use commerceml_catalog::{
    AttributeKind, CatalogError, CatalogStatus, CatalogStore, CategoryPatch, EntityId,
    NewAttribute, NewCategory, NewFileRelation, NewProduct, Product, ProductPatch, ProgressSink,
    TemplateConfig, NO_PARENT,
};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Origin marker stamped on every entity this feed creates.
const EXPORT_MARKER: &str = "1c";

// ============================================================================
// Configuration
// ============================================================================

/// View parameters applied to entities the import creates. Passed in
/// explicitly; the engine reads no ambient settings.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub template: TemplateConfig,
    pub pagination: u32,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            template: TemplateConfig::default(),
            pagination: 10,
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Synchronizes one [`ImportBatch`] against the catalog store.
pub struct ReconciliationEngine<'a, S: CatalogStore, P: ProgressSink> {
    store: &'a mut S,
    progress: &'a mut P,
    config: ImportConfig,
}

impl<'a, S: CatalogStore, P: ProgressSink> ReconciliationEngine<'a, S, P> {
    pub fn new(store: &'a mut S, progress: &'a mut P, config: ImportConfig) -> Self {
        Self {
            store,
            progress,
            config,
        }
    }

    /// Run all phases. A batch without both categories and products is a
    /// partial staging and reconciles nothing.
    pub fn run(&mut self, batch: &mut ImportBatch) -> Result<(), ImportError> {
        if !batch.is_complete() {
            debug!(
                categories = batch.categories.len(),
                products = batch.products.len(),
                "batch incomplete, skipping reconciliation"
            );
            return Ok(());
        }

        self.sync_properties(&mut batch.properties)?;
        self.sync_categories(&mut batch.categories)?;
        self.sync_products(&mut batch.products, &batch.properties)?;
        Ok(())
    }

    /// Phase 1: resolve every staged property to a catalog attribute,
    /// creating string-typed attributes on miss. Variants are not persisted
    /// here; they resolve per-product in phase 3.
    fn sync_properties(&mut self, properties: &mut [PropertyRecord]) -> Result<(), ImportError> {
        let total = properties.len();
        for (index, record) in properties.iter_mut().enumerate() {
            let attribute = match self.store.attribute_by_title(&record.title) {
                Ok(existing) => existing,
                Err(CatalogError::AttributeNotFound) => {
                    self.store.create_attribute(NewAttribute {
                        title: record.title.clone(),
                        kind: AttributeKind::String,
                    })?
                }
                Err(err) => return Err(err.into()),
            };
            record.attribute = Some(attribute);
            self.progress.report(index, total);
        }
        Ok(())
    }

    /// Phase 2: upsert categories in emission order. Parents always appear
    /// earlier in the list, so one left-to-right pass resolves them; a
    /// parent the store does not know degrades to the no-parent sentinel.
    fn sync_categories(&mut self, categories: &mut [CategoryRecord]) -> Result<(), ImportError> {
        let total = categories.len();
        for (index, record) in categories.iter_mut().enumerate() {
            let parent = match &record.parent {
                Some(parent_id) => match self.store.category_by_external_id(parent_id) {
                    Ok(parent) => parent.uuid,
                    Err(CatalogError::CategoryNotFound) => NO_PARENT,
                    Err(err) => return Err(err.into()),
                },
                None => NO_PARENT,
            };

            let category = match self.store.category_by_external_id(&record.external_id) {
                Ok(existing) => {
                    // Title and parent are the only fields an import may
                    // overwrite; status flips back to active so archived
                    // categories revive on re-import.
                    self.store.update_category(
                        existing.uuid,
                        CategoryPatch {
                            title: record.title.clone(),
                            parent,
                            status: CatalogStatus::Work,
                        },
                    )?
                }
                Err(CatalogError::CategoryNotFound) => self.store.create_category(NewCategory {
                    title: record.title.clone(),
                    parent,
                    external_id: record.external_id.clone(),
                    template: self.config.template.clone(),
                    pagination: self.config.pagination,
                    export: EXPORT_MARKER.to_string(),
                })?,
                Err(err) => return Err(err.into()),
            };

            record.category = Some(category);
            self.progress.report(index, total);
        }
        Ok(())
    }

    /// Phase 3: upsert products, then attribute values, then file relations.
    fn sync_products(
        &mut self,
        products: &mut [ProductRecord],
        properties: &[PropertyRecord],
    ) -> Result<(), ImportError> {
        let total = products.len();
        for (index, record) in products.iter_mut().enumerate() {
            let Some(category) = resolve_category(self.store, record) else {
                self.progress.report(index, total);
                continue;
            };

            let product = upsert_product(self.store, record, category)?;

            if !record.properties.is_empty() {
                let values = resolve_attribute_values(record, properties);
                self.store.assign_attributes(product.uuid, values)?;
            }

            if !record.files.is_empty() {
                replace_file_relations(self.store, product.uuid, &record.files)?;
            }

            record.product = Some(product);
            self.progress.report(index, total);
        }
        Ok(())
    }
}

// ============================================================================
// Phase 3 Helpers
// ============================================================================

/// A product whose category reference does not resolve fails the record,
/// not the batch.
fn resolve_category<S: CatalogStore>(store: &S, record: &ProductRecord) -> Option<EntityId> {
    let Some(category_id) = &record.category else {
        warn!(product = %record.external_id, "product names no category, skipping record");
        return None;
    };
    match store.category_by_external_id(category_id) {
        Ok(category) => Some(category.uuid),
        Err(_) => {
            warn!(
                product = %record.external_id,
                category = %category_id,
                "category missing from store, skipping record"
            );
            None
        }
    }
}

/// Upsert by external id. Prices are not sourced from this feed type and
/// are forced to zero on both create and update; status re-derives active.
fn upsert_product<S: CatalogStore>(
    store: &mut S,
    record: &ProductRecord,
    category: EntityId,
) -> Result<Product, ImportError> {
    let volume = record.volume.parse::<f64>().unwrap_or(0.0);

    let product = match store.product_by_external_id(&record.external_id) {
        Ok(existing) => store.update_product(
            existing.uuid,
            ProductPatch {
                category,
                title: record.title.clone(),
                description: record.description.clone(),
                vendor_code: record.vendor_code.clone(),
                barcode: record.barcode.clone(),
                price_first: 0.0,
                price: 0.0,
                price_wholesale: 0.0,
                volume,
                unit: record.unit.clone(),
                status: CatalogStatus::Work,
            },
        )?,
        Err(CatalogError::ProductNotFound) => store.create_product(NewProduct {
            category,
            title: record.title.clone(),
            description: record.description.clone(),
            vendor_code: record.vendor_code.clone(),
            barcode: record.barcode.clone(),
            price_first: 0.0,
            price: 0.0,
            price_wholesale: 0.0,
            volume,
            unit: record.unit.clone(),
            external_id: record.external_id.clone(),
            export: EXPORT_MARKER.to_string(),
        })?,
        Err(err) => return Err(err.into()),
    };
    Ok(product)
}

/// Resolve each (property, variant) reference against the in-batch property
/// list. Pairs that do not resolve are skipped, never an error.
fn resolve_attribute_values(
    record: &ProductRecord,
    properties: &[PropertyRecord],
) -> HashMap<EntityId, String> {
    let mut values = HashMap::new();
    for reference in &record.properties {
        let Some(property) = properties
            .iter()
            .find(|p| p.external_id == reference.property)
        else {
            continue;
        };
        let Some(variant) = property
            .variants
            .iter()
            .find(|v| v.external_id == reference.variant)
        else {
            continue;
        };
        if let Some(attribute) = &property.attribute {
            values.insert(attribute.uuid, variant.value.clone());
        }
    }
    values
}

/// Destructive replace: every existing relation goes, then the incoming
/// list is created in order (1-based). Only called for records that list
/// files, so a record with none preserves existing relations.
fn replace_file_relations<S: CatalogStore>(
    store: &mut S,
    product: EntityId,
    files: &[String],
) -> Result<(), ImportError> {
    for relation in store.file_relations(product) {
        store.delete_file_relation(relation.uuid)?;
    }

    for (index, name) in files.iter().enumerate() {
        let Some(file) = store.first_file_by_name(name) else {
            debug!(file = %name, "feed references unknown file, skipping relation");
            continue;
        };
        store.create_file_relation(NewFileRelation {
            entity: product,
            file: file.uuid,
            order: index as u32 + 1,
        })?;
    }
    Ok(())
}
