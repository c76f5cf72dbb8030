//! Catalog store contracts for the CommerceML import pipeline
//!
//! The import engine talks to the persistent catalog exclusively through the
//! traits in this crate, treating it as a key-value-by-external-id store
//! with create/update/read operations:
//!
//! ```text
//! ┌──────────────────┐        ┌───────────────────────────────┐
//! │ Reconciliation   │───────►│ CategoryService               │
//! │ Engine           │───────►│ AttributeService              │
//! │ (commerceml-     │───────►│ ProductService                │
//! │  import)         │───────►│ ProductAttributeService       │
//! │                  │───────►│ FileStore / FileRelationService│
//! └──────────────────┘        └───────────────────────────────┘
//! ```
//!
//! The storage engine behind the traits is out of scope; [`MemoryCatalog`]
//! is a reference implementation backing the integration tests and the CLI.

pub mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryCatalog;

// ============================================================================
// Entity Types
// ============================================================================

/// Store-assigned identity of a persisted entity.
pub type EntityId = Uuid;

/// Sentinel parent for root categories (and for parents the feed references
/// but the store does not know).
pub const NO_PARENT: Uuid = Uuid::nil();

/// Publication state of a category or product. `Work` is the active,
/// publicly visible state; imports revive archived entities to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogStatus {
    Work,
    Delete,
}

/// View-template and pagination parameters applied to entities created by an
/// import. Passed in explicitly rather than read from ambient settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub category: String,
    pub product: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            category: "catalog.category.twig".to_string(),
            product: "catalog.product.twig".to_string(),
        }
    }
}

/// A persisted catalog category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub uuid: EntityId,
    pub title: String,
    pub parent: Uuid,
    pub external_id: String,
    pub template: TemplateConfig,
    pub pagination: u32,
    pub status: CatalogStatus,
    /// Origin marker for entities owned by an exchange feed.
    pub export: String,
}

/// Fields for creating a category.
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub title: String,
    pub parent: Uuid,
    pub external_id: String,
    pub template: TemplateConfig,
    pub pagination: u32,
    pub export: String,
}

/// Fields an import is allowed to overwrite on an existing category.
/// Everything else is historical state the import must preserve.
#[derive(Debug, Clone)]
pub struct CategoryPatch {
    pub title: String,
    pub parent: Uuid,
    pub status: CatalogStatus,
}

/// Value type of a catalog attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeKind {
    String,
    Integer,
    Float,
}

/// A persisted catalog attribute (the store-side form of a feed property).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub uuid: EntityId,
    pub title: String,
    pub kind: AttributeKind,
}

#[derive(Debug, Clone)]
pub struct NewAttribute {
    pub title: String,
    pub kind: AttributeKind,
}

/// A persisted catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub uuid: EntityId,
    pub category: Uuid,
    pub title: String,
    pub description: String,
    pub vendor_code: String,
    pub barcode: String,
    pub price_first: f64,
    pub price: f64,
    pub price_wholesale: f64,
    pub volume: f64,
    pub unit: String,
    pub external_id: String,
    pub status: CatalogStatus,
    pub export: String,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub category: Uuid,
    pub title: String,
    pub description: String,
    pub vendor_code: String,
    pub barcode: String,
    pub price_first: f64,
    pub price: f64,
    pub price_wholesale: f64,
    pub volume: f64,
    pub unit: String,
    pub external_id: String,
    pub export: String,
}

/// Fields an import overwrites on an existing product.
#[derive(Debug, Clone)]
pub struct ProductPatch {
    pub category: Uuid,
    pub title: String,
    pub description: String,
    pub vendor_code: String,
    pub barcode: String,
    pub price_first: f64,
    pub price: f64,
    pub price_wholesale: f64,
    pub volume: f64,
    pub unit: String,
    pub status: CatalogStatus,
}

/// A file known to the file store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub uuid: EntityId,
    /// Display name without path or extension, the lookup key feeds use.
    pub name: String,
    pub path: PathBuf,
    pub date: DateTime<Utc>,
}

/// An ordered link between a catalog entity and a stored file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRelation {
    pub uuid: EntityId,
    pub entity: EntityId,
    pub file: EntityId,
    pub order: u32,
}

#[derive(Debug, Clone)]
pub struct NewFileRelation {
    pub entity: EntityId,
    pub file: EntityId,
    pub order: u32,
}

// ============================================================================
// Errors
// ============================================================================

/// Lookup and mutation failures surfaced by the catalog services.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("category not found")]
    CategoryNotFound,

    #[error("attribute not found")]
    AttributeNotFound,

    #[error("product not found")]
    ProductNotFound,

    #[error("file relation not found")]
    RelationNotFound,
}

// ============================================================================
// Collaborator Contracts
// ============================================================================

/// Category read/create/update keyed by external id.
pub trait CategoryService {
    fn category_by_external_id(&self, external_id: &str) -> Result<Category, CatalogError>;
    fn create_category(&mut self, fields: NewCategory) -> Result<Category, CatalogError>;
    fn update_category(&mut self, uuid: EntityId, patch: CategoryPatch)
        -> Result<Category, CatalogError>;
}

/// Attribute read-by-title and create.
pub trait AttributeService {
    fn attribute_by_title(&self, title: &str) -> Result<Attribute, CatalogError>;
    fn create_attribute(&mut self, fields: NewAttribute) -> Result<Attribute, CatalogError>;
}

/// Product read/create/update keyed by external id.
pub trait ProductService {
    fn product_by_external_id(&self, external_id: &str) -> Result<Product, CatalogError>;
    fn create_product(&mut self, fields: NewProduct) -> Result<Product, CatalogError>;
    fn update_product(&mut self, uuid: EntityId, patch: ProductPatch)
        -> Result<Product, CatalogError>;
}

/// Attribute-value assignment for one product. Replace-vs-merge semantics
/// are the implementation's business, not the engine's.
pub trait ProductAttributeService {
    fn assign_attributes(
        &mut self,
        product: EntityId,
        values: HashMap<EntityId, String>,
    ) -> Result<(), CatalogError>;
}

/// Ordered entity-to-file links.
pub trait FileRelationService {
    /// Relations for an entity, ascending by `order`.
    fn file_relations(&self, entity: EntityId) -> Vec<FileRelation>;
    fn create_file_relation(&mut self, fields: NewFileRelation)
        -> Result<FileRelation, CatalogError>;
    fn delete_file_relation(&mut self, relation: EntityId) -> Result<(), CatalogError>;
}

/// Read side of the uploaded-file store.
pub trait FileStore {
    /// Files matching the given display names, oldest first.
    fn files_by_names(&self, names: &[String]) -> Vec<StoredFile>;
    /// First file with the given display name, if any.
    fn first_file_by_name(&self, name: &str) -> Option<StoredFile>;
}

/// Everything the reconciliation engine needs from one store value.
/// Blanket-implemented; [`MemoryCatalog`] qualifies, as would any real
/// backend implementing the individual services.
pub trait CatalogStore:
    CategoryService
    + AttributeService
    + ProductService
    + ProductAttributeService
    + FileRelationService
    + FileStore
{
}

impl<T> CatalogStore for T where
    T: CategoryService
        + AttributeService
        + ProductService
        + ProductAttributeService
        + FileRelationService
        + FileStore
{
}

/// Fire-and-forget progress telemetry. Advisory only: nothing checkpoints
/// on it and a crash mid-batch restarts the batch from scratch.
pub trait ProgressSink {
    fn report(&mut self, current: usize, total: usize);
}

/// Sink that drops every report.
#[derive(Debug, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&mut self, _current: usize, _total: usize) {}
}
