//! Cart provider shared across sessions.

use std::sync::Arc;

use cartwright_core::{CurrencyCode, UserId};
use tracing::{info, instrument, warn};

use crate::cart::CartEngine;
use crate::catalog::{CatalogError, CatalogLookup, HttpCatalog};
use crate::config::CartConfig;
use crate::store::{CartStore, HttpCartStore, StoreError};
use crate::view::CartView;

/// Error building the HTTP adapters.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("cart store client: {0}")]
    Store(#[from] StoreError),
    #[error("catalog client: {0}")]
    Catalog(#[from] CatalogError),
}

/// Owns the store and catalog adapters and hands out one [`CartEngine`] per
/// signed-in session.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct CartProvider {
    inner: Arc<CartProviderInner>,
}

struct CartProviderInner {
    store: Arc<dyn CartStore>,
    catalog: Arc<dyn CatalogLookup>,
    currency: CurrencyCode,
}

impl CartProvider {
    /// Create a provider over explicit adapters.
    #[must_use]
    pub fn new(
        store: Arc<dyn CartStore>,
        catalog: Arc<dyn CatalogLookup>,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            inner: Arc::new(CartProviderInner {
                store,
                catalog,
                currency,
            }),
        }
    }

    /// Create a provider talking to the REST APIs named in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if either HTTP client cannot be built.
    pub fn from_config(config: &CartConfig) -> Result<Self, ProviderError> {
        let store = HttpCartStore::new(config)?;
        let catalog = HttpCatalog::new(config)?;
        Ok(Self::new(
            Arc::new(store),
            Arc::new(catalog),
            config.currency,
        ))
    }

    #[must_use]
    pub fn currency(&self) -> CurrencyCode {
        self.inner.currency
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<dyn CatalogLookup> {
        &self.inner.catalog
    }

    /// Start a cart session for `user_id` and hydrate it.
    ///
    /// A failed hydration does not fail the session: the engine comes back
    /// with an empty cart and its error flag set, and the caller can retry
    /// with [`CartEngine::hydrate`].
    #[instrument(skip(self))]
    pub async fn open_session(&self, user_id: UserId) -> CartEngine {
        let engine = CartEngine::new(
            user_id,
            Arc::clone(&self.inner.store),
            Arc::clone(&self.inner.catalog),
        );

        match engine.hydrate().await {
            Ok(()) => info!("Cart session opened"),
            Err(e) => warn!(error = %e, "Cart session opened without a hydrated cart"),
        }
        engine
    }

    /// End a session. Round trips still in flight are not applied.
    pub fn close_session(&self, engine: &CartEngine) {
        engine.teardown();
    }

    /// Render the engine's current state in this provider's currency.
    #[must_use]
    pub fn view(&self, engine: &CartEngine) -> CartView {
        CartView::from_snapshot(&engine.snapshot(), self.inner.currency)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use cartwright_core::{ProductId, ProductRecord, Quantity};
    use rust_decimal::Decimal;

    use crate::catalog::InMemoryCatalog;
    use crate::error::ErrorKind;
    use crate::store::{InMemoryCartStore, StoreOperation};

    fn provider() -> (CartProvider, InMemoryCartStore) {
        let catalog = InMemoryCatalog::with_products([ProductRecord {
            id: ProductId::new(7),
            name: "Invoice Parser".to_string(),
            price: Decimal::new(4999, 2),
            image: None,
            category: Some("Finance".to_string()),
            stock: 20,
        }]);
        let store = InMemoryCartStore::new(catalog.clone());
        let provider = CartProvider::new(
            Arc::new(store.clone()),
            Arc::new(catalog),
            CurrencyCode::USD,
        );
        (provider, store)
    }

    #[tokio::test]
    async fn test_open_session_hydrates_existing_cart() {
        let (provider, store) = provider();
        let user = UserId::generate();
        store
            .insert_line(user, ProductId::new(7), Quantity::new(2).unwrap())
            .await;

        let engine = provider.open_session(user).await;
        let snapshot = engine.snapshot();
        assert!(!snapshot.loading);
        assert_eq!(snapshot.total_item_count(), 2);

        let view = provider.view(&engine);
        assert_eq!(view.subtotal, "$99.98");
    }

    #[tokio::test]
    async fn test_open_session_survives_hydration_failure() {
        let (provider, store) = provider();
        store.fail_next(StoreOperation::Fetch, StoreError::RateLimited(3));

        let engine = provider.open_session(UserId::generate()).await;
        let snapshot = engine.snapshot();
        assert!(!snapshot.loading);
        assert!(snapshot.cart.is_empty());
        assert_eq!(snapshot.error.unwrap().kind, ErrorKind::Hydration);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated_per_user() {
        let (provider, _store) = provider();
        let alice = provider.open_session(UserId::generate()).await;
        let bob = provider.open_session(UserId::generate()).await;

        alice.add_item(ProductId::new(7), 1).await.unwrap();
        bob.hydrate().await.unwrap();
        assert!(bob.snapshot().cart.is_empty());
        assert_eq!(alice.snapshot().total_item_count(), 1);
    }

    #[tokio::test]
    async fn test_close_session_resets_state() {
        let (provider, _store) = provider();
        let engine = provider.open_session(UserId::generate()).await;
        engine.add_item(ProductId::new(7), 1).await.unwrap();

        provider.close_session(&engine);
        assert!(engine.snapshot().cart.is_empty());
        assert_eq!(provider.view(&engine).item_count, 0);
    }
}
