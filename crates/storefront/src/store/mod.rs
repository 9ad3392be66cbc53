//! Remote cart store port and adapters.
//!
//! # Architecture
//!
//! - The store is the source of truth for cart contents, prices and stock caps
//! - The engine never patches lines locally: every write is followed by a
//!   full [`CartStore::fetch_cart`]
//! - Lines are keyed by (user, product); there is at most one line per pair
//!
//! # Adapters
//!
//! - [`HttpCartStore`] - REST backend (hosted backend-as-a-service or API server)
//! - [`InMemoryCartStore`] - Development and test adapter with failure injection

mod conversions;
pub(crate) mod http;
mod memory;

pub use conversions::{CartLineRecord, ErrorBody, UpdateQuantityRequest, UpsertLineRequest};
pub use http::HttpCartStore;
pub use memory::{InMemoryCartStore, StockPolicy};

use async_trait::async_trait;
use cartwright_core::{LineItem, ProductId, Quantity, UserId};
use thiserror::Error;

/// Read/write contract with the remote cart store.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Fetch every line in the user's cart, in store order.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the store returns lines that
    /// break cart invariants.
    async fn fetch_cart(&self, user_id: UserId) -> Result<Vec<LineItem>, StoreError>;

    /// Insert a line, or replace the quantity of an existing one.
    ///
    /// # Errors
    ///
    /// - `Validation` if the product is unknown
    /// - `Conflict` if stock is insufficient
    async fn upsert_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<(), StoreError>;

    /// Set the quantity of an existing line.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`CartStore::upsert_line`].
    async fn update_line_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<(), StoreError>;

    /// Delete a line. Deleting a line that does not exist succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn delete_line(&self, user_id: UserId, product_id: ProductId) -> Result<(), StoreError>;
}

/// The four calls a cart store supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Fetch,
    Upsert,
    UpdateQuantity,
    Delete,
}

impl std::fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch => write!(f, "fetch_cart"),
            Self::Upsert => write!(f, "upsert_line"),
            Self::UpdateQuantity => write!(f, "update_line_quantity"),
            Self::Delete => write!(f, "delete_line"),
        }
    }
}

/// Errors that can occur when talking to a cart store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The store rejected the input (unknown product, bad quantity).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not enough stock for the requested quantity.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited by the store.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Any other non-success response.
    #[error("Store returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message from the error body, or a truncated raw body.
        message: String,
    },

    /// The store returned data that violates cart invariants.
    #[error("Store contract violation: {0}")]
    Contract(String),
}

impl StoreError {
    /// Whether re-issuing the same call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Parse(_) | Self::Validation(_) | Self::Conflict(_) | Self::Contract(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Conflict("only 2 left".to_string());
        assert_eq!(err.to_string(), "Conflict: only 2 left");

        let err = StoreError::Api {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "Store returned 503: unavailable");
    }

    #[test]
    fn test_is_transient() {
        assert!(StoreError::RateLimited(3).is_transient());
        assert!(
            StoreError::Api {
                status: 502,
                message: String::new()
            }
            .is_transient()
        );
        assert!(
            !StoreError::Api {
                status: 403,
                message: String::new()
            }
            .is_transient()
        );
        assert!(!StoreError::Validation("unknown product".to_string()).is_transient());
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(StoreOperation::UpdateQuantity.to_string(), "update_line_quantity");
    }
}
