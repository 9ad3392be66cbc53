//! In-memory catalog for development and tests.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use cartwright_core::{ProductId, ProductRecord};
use rust_decimal::Decimal;

use super::{CatalogError, CatalogLookup};

/// Shared product map. Clones see the same products.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    products: Arc<RwLock<HashMap<ProductId, ProductRecord>>>,
}

impl InMemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog holding `products`.
    #[must_use]
    pub fn with_products(products: impl IntoIterator<Item = ProductRecord>) -> Self {
        let catalog = Self::new();
        for product in products {
            catalog.insert(product);
        }
        catalog
    }

    /// Insert or replace a product.
    pub fn insert(&self, product: ProductRecord) {
        self.products
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(product.id, product);
    }

    /// Current record for a product, if any.
    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<ProductRecord> {
        self.products
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&product_id)
            .cloned()
    }

    /// Change a product's live price. Returns `false` for unknown products.
    pub fn set_price(&self, product_id: ProductId, price: Decimal) -> bool {
        self.update(product_id, |p| p.price = price)
    }

    /// Change a product's stock. Returns `false` for unknown products.
    pub fn set_stock(&self, product_id: ProductId, stock: u32) -> bool {
        self.update(product_id, |p| p.stock = stock)
    }

    fn update(&self, product_id: ProductId, f: impl FnOnce(&mut ProductRecord)) -> bool {
        let mut products = self
            .products
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        products.get_mut(&product_id).map(f).is_some()
    }
}

#[async_trait]
impl CatalogLookup for InMemoryCatalog {
    async fn get_product(&self, product_id: ProductId) -> Result<ProductRecord, CatalogError> {
        self.get(product_id)
            .ok_or(CatalogError::NotFound(product_id))
    }
}
