//! CommerceML catalog import: extraction, reconciliation, job shell
//!
//! Reconciles a multi-file CommerceML feed against the persistent catalog
//! store, creating or updating categories, attributes and products by their
//! vendor-assigned external id:
//!
//! ```text
//! ┌───────────┐   ┌───────────┐   ┌────────────┐   ┌────────────────┐
//! │ staged    │──►│ TreeParser│──►│ Domain     │──►│ Reconciliation │
//! │ feed files│   │ +normalize│   │ extractors │   │ engine         │──► catalog store
//! └───────────┘   └───────────┘   └────────────┘   └────────────────┘
//!       ▲                              │                  │
//!  exchange protocol             ImportBatch         progress sink
//!  (checkauth/../complete)      (staging records)
//! ```
//!
//! ## Guarantees
//!
//! - **Idempotent upsert**: re-running an unchanged batch creates nothing;
//!   every record resolves via its external id and only field-level updates
//!   happen.
//! - **Re-entrant batches**: staging records are in-memory only; a crash
//!   mid-batch loses progress and the batch restarts from scratch.
//! - **Per-record failure isolation**: an unparseable file, a product with
//!   no external id, or a product whose category is missing is logged and
//!   skipped; the batch carries on.
//!
//! Imports must be serialized externally: two batches racing on the same
//! store could double-create entities under one external id.

pub mod engine;
pub mod extract;
pub mod job;
pub mod protocol;

use commerceml_catalog::{Attribute, CatalogError, Category, Product};
use commerceml_xmltree::Node;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use engine::{ImportConfig, ReconciliationEngine};
pub use job::{ImportJob, JobStatus};
pub use protocol::{ExchangeConfig, ExchangeResponse, ExchangeSession};

// ============================================================================
// Staging Records
// ============================================================================

/// One category staged from the classifier section. Never persisted itself;
/// consumed once by the reconciliation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub title: String,
    pub external_id: String,
    /// External id of the parent group; `None` for roots.
    pub parent: Option<String>,
    /// Filled during reconciliation.
    #[serde(skip)]
    pub category: Option<Category>,
}

/// One admissible value of a property, keyed by its own external id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantRecord {
    pub external_id: String,
    pub value: String,
}

/// One property definition staged from the classifier section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub title: String,
    pub external_id: String,
    pub variants: Vec<VariantRecord>,
    /// Filled during reconciliation.
    #[serde(skip)]
    pub attribute: Option<Attribute>,
}

/// A (property, variant) reference carried by a product. Malformed
/// references extract as empty strings and simply fail to resolve later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyValueRef {
    pub property: String,
    pub variant: String,
}

/// One product staged from the catalog section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub title: String,
    pub external_id: String,
    /// External id of the owning category, if the feed named one.
    pub category: Option<String>,
    pub description: String,
    pub vendor_code: String,
    pub barcode: String,
    pub unit: String,
    /// Weight/volume as the feed spells it.
    pub volume: String,
    pub width: String,
    pub length: String,
    pub height: String,
    pub properties: Vec<PropertyValueRef>,
    /// Associated file base-names, path- and extension-stripped.
    pub files: Vec<String>,
    /// Filled during reconciliation.
    #[serde(skip)]
    pub product: Option<Product>,
}

// ============================================================================
// Import Batch
// ============================================================================

/// Staging records accumulated from all files of one import job.
///
/// Each section populates at most once per batch: a later file carrying a
/// section that is already populated is ignored (first-seen-wins, preserved
/// from the exchange convention of one file per section type).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportBatch {
    pub categories: Vec<CategoryRecord>,
    pub properties: Vec<PropertyRecord>,
    pub products: Vec<ProductRecord>,
}

impl ImportBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage the contents of one parsed feed file.
    ///
    /// At most one section is taken per file, in classifier-groups,
    /// classifier-properties, catalog-products precedence, mirroring how
    /// the vendor splits a feed across files.
    pub fn stage(&mut self, tree: &Node) {
        let Some(feed) = tree.first("КоммерческаяИнформация") else {
            tracing::debug!("file has no feed root element, ignoring");
            return;
        };

        if let Some(classifier) = feed.first("Классификатор") {
            if classifier.has("Группы") && self.categories.is_empty() {
                self.categories = extract::extract_categories(classifier);
                return;
            }
            if classifier.has("Свойства") && self.properties.is_empty() {
                self.properties = extract::extract_properties(classifier);
                return;
            }
        }

        if let Some(catalog) = feed.first("Каталог") {
            if catalog.has("Товары") && self.products.is_empty() {
                self.products = extract::extract_products(catalog);
            }
        }
    }

    /// A batch reconciles only when both categories and products arrived;
    /// anything less is a partial staging the vendor will complete later.
    pub fn is_complete(&self) -> bool {
        !self.categories.is_empty() && !self.products.is_empty()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Failures that abort an import and surface to the task runner. Per-file
/// and per-record problems are logged and skipped instead.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("catalog store failure: {0}")]
    Catalog(#[from] CatalogError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use commerceml_xmltree::parse_normalized;

    const GROUPS_FILE: &str = r#"
        <КоммерческаяИнформация>
          <Классификатор>
            <Группы>
              <Группа><Ид>1</Ид><Наименование>Root</Наименование></Группа>
            </Группы>
          </Классификатор>
        </КоммерческаяИнформация>"#;

    const PRODUCTS_FILE: &str = r#"
        <КоммерческаяИнформация>
          <Каталог>
            <Товары>
              <Товар><Ид>P1</Ид><Наименование>Widget</Наименование></Товар>
            </Товары>
          </Каталог>
        </КоммерческаяИнформация>"#;

    #[test]
    fn test_stage_routes_sections() {
        let mut batch = ImportBatch::new();
        batch.stage(&parse_normalized(GROUPS_FILE).unwrap());
        batch.stage(&parse_normalized(PRODUCTS_FILE).unwrap());

        assert_eq!(batch.categories.len(), 1);
        assert_eq!(batch.products.len(), 1);
        assert!(batch.is_complete());
    }

    #[test]
    fn test_first_seen_wins_per_section() {
        let second = r#"
            <КоммерческаяИнформация>
              <Классификатор>
                <Группы>
                  <Группа><Ид>9</Ид><Наименование>Other</Наименование></Группа>
                </Группы>
              </Классификатор>
            </КоммерческаяИнформация>"#;

        let mut batch = ImportBatch::new();
        batch.stage(&parse_normalized(GROUPS_FILE).unwrap());
        batch.stage(&parse_normalized(second).unwrap());

        assert_eq!(batch.categories.len(), 1);
        assert_eq!(batch.categories[0].external_id, "1");
    }

    #[test]
    fn test_one_section_per_file() {
        // A classifier carrying both groups and properties only contributes
        // its groups; the properties must come from another file.
        let combined = r#"
            <КоммерческаяИнформация>
              <Классификатор>
                <Группы>
                  <Группа><Ид>1</Ид><Наименование>Root</Наименование></Группа>
                </Группы>
                <Свойства>
                  <Свойство><Ид>PR1</Ид><Наименование>Цвет</Наименование></Свойство>
                </Свойства>
              </Классификатор>
            </КоммерческаяИнформация>"#;

        let mut batch = ImportBatch::new();
        batch.stage(&parse_normalized(combined).unwrap());

        assert_eq!(batch.categories.len(), 1);
        assert!(batch.properties.is_empty());
    }

    #[test]
    fn test_non_feed_file_is_ignored() {
        let mut batch = ImportBatch::new();
        batch.stage(&parse_normalized("<Другое/>").unwrap());
        assert!(batch.categories.is_empty());
        assert!(!batch.is_complete());
    }
}
