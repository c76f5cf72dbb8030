//! In-memory reference implementation of the catalog contracts
//!
//! Backs the integration tests and the CLI. Lookups by external id or title
//! scan the entity maps; fine for a reference store, not a statement about
//! how a real backend should index.

use crate::{
    Attribute, AttributeService, CatalogError, Category, CategoryPatch, CategoryService,
    EntityId, FileRelation, FileRelationService, FileStore, NewAttribute, NewCategory,
    NewFileRelation, NewProduct, Product, ProductAttributeService, ProductPatch, ProductService,
    StoredFile,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use uuid::Uuid;

/// Everything the import pipeline needs, in one owned value.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    categories: HashMap<EntityId, Category>,
    attributes: HashMap<EntityId, Attribute>,
    products: HashMap<EntityId, Product>,
    /// Current attribute-value assignment per product (replace semantics).
    product_attributes: HashMap<EntityId, HashMap<EntityId, String>>,
    relations: HashMap<EntityId, FileRelation>,
    files: Vec<StoredFile>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an uploaded file, as the exchange upload endpoint would.
    pub fn add_file(&mut self, name: &str, path: impl Into<PathBuf>, date: DateTime<Utc>) -> StoredFile {
        let file = StoredFile {
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            path: path.into(),
            date,
        };
        self.files.push(file.clone());
        file
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }

    /// Current attribute-value assignment for a product.
    pub fn assigned_attributes(&self, product: EntityId) -> HashMap<EntityId, String> {
        self.product_attributes
            .get(&product)
            .cloned()
            .unwrap_or_default()
    }
}

impl CategoryService for MemoryCatalog {
    fn category_by_external_id(&self, external_id: &str) -> Result<Category, CatalogError> {
        self.categories
            .values()
            .find(|c| c.external_id == external_id)
            .cloned()
            .ok_or(CatalogError::CategoryNotFound)
    }

    fn create_category(&mut self, fields: NewCategory) -> Result<Category, CatalogError> {
        let category = Category {
            uuid: Uuid::new_v4(),
            title: fields.title,
            parent: fields.parent,
            external_id: fields.external_id,
            template: fields.template,
            pagination: fields.pagination,
            status: crate::CatalogStatus::Work,
            export: fields.export,
        };
        self.categories.insert(category.uuid, category.clone());
        Ok(category)
    }

    fn update_category(
        &mut self,
        uuid: EntityId,
        patch: CategoryPatch,
    ) -> Result<Category, CatalogError> {
        let category = self
            .categories
            .get_mut(&uuid)
            .ok_or(CatalogError::CategoryNotFound)?;
        category.title = patch.title;
        category.parent = patch.parent;
        category.status = patch.status;
        Ok(category.clone())
    }
}

impl AttributeService for MemoryCatalog {
    fn attribute_by_title(&self, title: &str) -> Result<Attribute, CatalogError> {
        self.attributes
            .values()
            .find(|a| a.title == title)
            .cloned()
            .ok_or(CatalogError::AttributeNotFound)
    }

    fn create_attribute(&mut self, fields: NewAttribute) -> Result<Attribute, CatalogError> {
        let attribute = Attribute {
            uuid: Uuid::new_v4(),
            title: fields.title,
            kind: fields.kind,
        };
        self.attributes.insert(attribute.uuid, attribute.clone());
        Ok(attribute)
    }
}

impl ProductService for MemoryCatalog {
    fn product_by_external_id(&self, external_id: &str) -> Result<Product, CatalogError> {
        self.products
            .values()
            .find(|p| p.external_id == external_id)
            .cloned()
            .ok_or(CatalogError::ProductNotFound)
    }

    fn create_product(&mut self, fields: NewProduct) -> Result<Product, CatalogError> {
        let product = Product {
            uuid: Uuid::new_v4(),
            category: fields.category,
            title: fields.title,
            description: fields.description,
            vendor_code: fields.vendor_code,
            barcode: fields.barcode,
            price_first: fields.price_first,
            price: fields.price,
            price_wholesale: fields.price_wholesale,
            volume: fields.volume,
            unit: fields.unit,
            external_id: fields.external_id,
            status: crate::CatalogStatus::Work,
            export: fields.export,
        };
        self.products.insert(product.uuid, product.clone());
        Ok(product)
    }

    fn update_product(
        &mut self,
        uuid: EntityId,
        patch: ProductPatch,
    ) -> Result<Product, CatalogError> {
        let product = self
            .products
            .get_mut(&uuid)
            .ok_or(CatalogError::ProductNotFound)?;
        product.category = patch.category;
        product.title = patch.title;
        product.description = patch.description;
        product.vendor_code = patch.vendor_code;
        product.barcode = patch.barcode;
        product.price_first = patch.price_first;
        product.price = patch.price;
        product.price_wholesale = patch.price_wholesale;
        product.volume = patch.volume;
        product.unit = patch.unit;
        product.status = patch.status;
        Ok(product.clone())
    }
}

impl ProductAttributeService for MemoryCatalog {
    fn assign_attributes(
        &mut self,
        product: EntityId,
        values: HashMap<EntityId, String>,
    ) -> Result<(), CatalogError> {
        if !self.products.contains_key(&product) {
            return Err(CatalogError::ProductNotFound);
        }
        self.product_attributes.insert(product, values);
        Ok(())
    }
}

impl FileRelationService for MemoryCatalog {
    fn file_relations(&self, entity: EntityId) -> Vec<FileRelation> {
        let mut relations: Vec<FileRelation> = self
            .relations
            .values()
            .filter(|r| r.entity == entity)
            .cloned()
            .collect();
        relations.sort_by_key(|r| r.order);
        relations
    }

    fn create_file_relation(
        &mut self,
        fields: NewFileRelation,
    ) -> Result<FileRelation, CatalogError> {
        let relation = FileRelation {
            uuid: Uuid::new_v4(),
            entity: fields.entity,
            file: fields.file,
            order: fields.order,
        };
        self.relations.insert(relation.uuid, relation.clone());
        Ok(relation)
    }

    fn delete_file_relation(&mut self, relation: EntityId) -> Result<(), CatalogError> {
        self.relations
            .remove(&relation)
            .map(|_| ())
            .ok_or(CatalogError::RelationNotFound)
    }
}

impl FileStore for MemoryCatalog {
    fn files_by_names(&self, names: &[String]) -> Vec<StoredFile> {
        let mut matched: Vec<StoredFile> = self
            .files
            .iter()
            .filter(|f| names.contains(&f.name))
            .cloned()
            .collect();
        matched.sort_by_key(|f| f.date);
        matched
    }

    fn first_file_by_name(&self, name: &str) -> Option<StoredFile> {
        self.files.iter().find(|f| f.name == name).cloned()
    }
}
