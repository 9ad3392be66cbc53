//! Read-only catalog lookup.
//!
//! The engine only needs one question answered: does this product exist, and
//! what does it look like right now.

mod http;
mod memory;

pub use http::HttpCatalog;
pub use memory::InMemoryCatalog;

use async_trait::async_trait;
use cartwright_core::{ProductId, ProductRecord};
use thiserror::Error;

/// Product lookup by ID.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Get a product.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] for unknown IDs, or a transport error.
    async fn get_product(&self, product_id: ProductId) -> Result<ProductRecord, CatalogError>;
}

/// Errors that can occur during a catalog lookup.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No product with that ID.
    #[error("Product not found: {0}")]
    NotFound(ProductId),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Any other non-success response.
    #[error("Catalog returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        message: String,
    },
}
