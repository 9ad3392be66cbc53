//! Cart state engine.
//!
//! Holds the current user's cart and keeps it consistent with the remote
//! cart store. Reads are synchronous snapshots; every mutation (except
//! [`CartEngine::clear_cart`]) is a write to the store followed by a full
//! re-read, and local state changes only after that re-read succeeds.
//!
//! # Ordering
//!
//! Mutations and hydrations on one engine are serialized through a fair
//! (FIFO) lock, so the final state follows call order rather than completion
//! order. `clear_cart` bypasses the lock: a round trip already in flight will
//! still replace the cart with the store's contents when it completes.
//!
//! Each intent records the session generation when it is called, before any
//! await. Teardown bumps the generation, so an intent issued earlier never
//! touches the snapshot again, even if it was still queued on the lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cartwright_core::{Cart, ProductId, Quantity, SyncStatus, UserId};
use chrono::Utc;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, instrument};

use super::snapshot::{CartSnapshot, SnapshotError};
use crate::catalog::{CatalogError, CatalogLookup};
use crate::error::{CartError, MutationKind, SyncError, ValidationError, add_breadcrumb};
use crate::store::CartStore;

/// One write to the store.
#[derive(Debug, Clone, Copy)]
enum Write {
    Upsert(ProductId, Quantity),
    Update(ProductId, Quantity),
    Delete(ProductId),
}

impl Write {
    const fn kind(self) -> MutationKind {
        match self {
            Self::Upsert(..) => MutationKind::Add,
            Self::Update(..) => MutationKind::Update,
            Self::Delete(_) => MutationKind::Remove,
        }
    }
}

/// Single source of truth for one user's cart.
///
/// Cheap to clone; clones drive the same cart. Consumers read through
/// [`CartEngine::snapshot`] or [`CartEngine::subscribe`] and can only change
/// the cart through the intent methods.
#[derive(Clone)]
pub struct CartEngine {
    inner: Arc<CartEngineInner>,
}

struct CartEngineInner {
    user_id: UserId,
    store: Arc<dyn CartStore>,
    catalog: Arc<dyn CatalogLookup>,
    state: watch::Sender<CartSnapshot>,
    mutations: Mutex<()>,
    /// Bumped on teardown; round trips started under an older value are dropped.
    generation: AtomicU64,
}

impl CartEngine {
    /// Create an engine in the mounting state. Call [`CartEngine::hydrate`]
    /// to load the cart.
    #[must_use]
    pub fn new(
        user_id: UserId,
        store: Arc<dyn CartStore>,
        catalog: Arc<dyn CatalogLookup>,
    ) -> Self {
        let (state, _) = watch::channel(CartSnapshot::mounting());
        Self {
            inner: Arc::new(CartEngineInner {
                user_id,
                store,
                catalog,
                state,
                mutations: Mutex::new(()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.inner.user_id
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Receive every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.inner.state.subscribe()
    }

    /// Replace the local cart with a fresh read from the store.
    ///
    /// On failure the cart is left as it was (empty at mount) and the error
    /// flag is set. There is no automatic retry.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Hydration`] if the read fails or the store
    /// returns an invalid cart.
    #[instrument(skip(self), fields(user_id = %self.inner.user_id))]
    pub async fn hydrate(&self) -> Result<(), CartError> {
        let generation = self.generation();
        add_breadcrumb("hydrate", &[]);

        let _guard = self.inner.mutations.lock().await;
        self.apply_if_current(generation, |s| s.status = SyncStatus::InFlight);

        match self.read_cart().await {
            Ok(cart) => {
                let count = cart.len();
                if self.apply_if_current(generation, |s| Self::apply_cart(s, cart)) {
                    info!(lines = count, "Cart hydrated");
                }
                Ok(())
            }
            Err(source) => {
                let err = CartError::hydration(source);
                err.report();
                self.apply_if_current(generation, |s| {
                    s.loading = false;
                    s.status = SyncStatus::Failed;
                    s.error = Some(SnapshotError::from(&err));
                });
                Err(err)
            }
        }
    }

    /// Add a product, or set its quantity if already in the cart.
    ///
    /// The store decides the final quantity (it may cap to stock); the cart
    /// reflects whatever it returns afterwards.
    ///
    /// # Errors
    ///
    /// - [`CartError::Validation`] if `quantity < 1` or the product is unknown
    /// - [`CartError::Mutation`] if the write or the re-read fails
    #[instrument(skip(self), fields(user_id = %self.inner.user_id))]
    pub async fn add_item(&self, product_id: ProductId, quantity: i64) -> Result<(), CartError> {
        let generation = self.generation();
        add_breadcrumb(
            "add_item",
            &[
                ("product_id", product_id.to_string()),
                ("quantity", quantity.to_string()),
            ],
        );

        let quantity = Self::validate_quantity(quantity)?;

        match self.inner.catalog.get_product(product_id).await {
            Ok(_) => {}
            Err(CatalogError::NotFound(_)) => {
                let err = CartError::from(ValidationError::UnknownProduct(product_id));
                err.report();
                return Err(err);
            }
            Err(source) => {
                let err = CartError::mutation(MutationKind::Add, source);
                err.report();
                // Ordered after earlier round trips
                let _guard = self.inner.mutations.lock().await;
                self.apply_if_current(generation, |s| {
                    s.status = SyncStatus::Failed;
                    s.error = Some(SnapshotError::from(&err));
                });
                return Err(err);
            }
        }

        self.write_through(generation, Write::Upsert(product_id, quantity))
            .await
    }

    /// Set the quantity of a line.
    ///
    /// Callers translate "decrement below one" into [`CartEngine::remove_item`];
    /// a quantity below one is rejected here without contacting the store.
    ///
    /// # Errors
    ///
    /// - [`CartError::Validation`] if `quantity < 1`
    /// - [`CartError::Mutation`] if the write or the re-read fails
    #[instrument(skip(self), fields(user_id = %self.inner.user_id))]
    pub async fn update_item(&self, product_id: ProductId, quantity: i64) -> Result<(), CartError> {
        let generation = self.generation();
        add_breadcrumb(
            "update_item",
            &[
                ("product_id", product_id.to_string()),
                ("quantity", quantity.to_string()),
            ],
        );

        let quantity = Self::validate_quantity(quantity)?;
        self.write_through(generation, Write::Update(product_id, quantity))
            .await
    }

    /// Remove a line. Removing a product that is not in the cart succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Mutation`] if the delete or the re-read fails.
    #[instrument(skip(self), fields(user_id = %self.inner.user_id))]
    pub async fn remove_item(&self, product_id: ProductId) -> Result<(), CartError> {
        let generation = self.generation();
        add_breadcrumb("remove_item", &[("product_id", product_id.to_string())]);
        self.write_through(generation, Write::Delete(product_id))
            .await
    }

    /// Empty the local cart without touching the store.
    ///
    /// This only forgets what the view is showing. The persisted cart is
    /// unchanged and comes back on the next [`CartEngine::hydrate`].
    pub fn clear_cart(&self) {
        add_breadcrumb("clear_cart", &[]);
        self.inner.state.send_modify(|s| s.cart = Cart::empty());
        info!(user_id = %self.inner.user_id, "Cart cleared locally");
    }

    /// Reset to an empty cart at logout or session end.
    ///
    /// Round trips still in flight, or still queued, complete against the
    /// store, but their results are not applied.
    pub fn teardown(&self) {
        self.inner.state.send_modify(|s| {
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            *s = CartSnapshot::default();
        });
        info!(user_id = %self.inner.user_id, "Cart session torn down");
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn validate_quantity(quantity: i64) -> Result<Quantity, CartError> {
        Quantity::new(quantity).map_err(|e| {
            let err = CartError::from(ValidationError::from(e));
            err.report();
            err
        })
    }

    fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Write, re-read, then replace the cart in one assignment.
    ///
    /// `generation` is the value read when the intent was called.
    async fn write_through(&self, generation: u64, write: Write) -> Result<(), CartError> {
        let op = write.kind();

        let _guard = self.inner.mutations.lock().await;
        self.apply_if_current(generation, |s| {
            s.error = None;
            s.status = SyncStatus::InFlight;
        });

        match self.round_trip(write).await {
            Ok(cart) => {
                let (count, total) = (cart.total_item_count(), cart.total_price());
                if self.apply_if_current(generation, |s| Self::apply_cart(s, cart)) {
                    info!(%op, item_count = count, total_price = %total, "Cart mutation applied");
                }
                Ok(())
            }
            Err(source) => {
                let err = CartError::mutation(op, source);
                err.report();
                self.apply_if_current(generation, |s| {
                    s.status = SyncStatus::Failed;
                    s.error = Some(SnapshotError::from(&err));
                });
                Err(err)
            }
        }
    }

    async fn round_trip(&self, write: Write) -> Result<Cart, SyncError> {
        let user_id = self.inner.user_id;
        let store = &self.inner.store;

        match write {
            Write::Upsert(product_id, quantity) => {
                store.upsert_line(user_id, product_id, quantity).await?;
            }
            Write::Update(product_id, quantity) => {
                store
                    .update_line_quantity(user_id, product_id, quantity)
                    .await?;
            }
            Write::Delete(product_id) => store.delete_line(user_id, product_id).await?,
        }

        self.read_cart().await
    }

    async fn read_cart(&self) -> Result<Cart, SyncError> {
        let lines = self.inner.store.fetch_cart(self.inner.user_id).await?;
        Ok(Cart::new(lines)?)
    }

    fn apply_cart(snapshot: &mut CartSnapshot, cart: Cart) {
        snapshot.cart = cart;
        snapshot.loading = false;
        snapshot.error = None;
        snapshot.status = SyncStatus::Applied;
        snapshot.synced_at = Some(Utc::now());
    }

    /// Apply `f` unless the engine was torn down after `generation` was read.
    ///
    /// The check runs under the watch lock, the same lock `teardown` holds.
    fn apply_if_current(&self, generation: u64, f: impl FnOnce(&mut CartSnapshot)) -> bool {
        self.inner.state.send_if_modified(|s| {
            if self.inner.generation.load(Ordering::SeqCst) != generation {
                debug!("Discarding result from a torn-down session");
                return false;
            }
            f(s);
            true
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    use cartwright_core::ProductRecord;
    use rust_decimal::Decimal;

    use crate::catalog::InMemoryCatalog;
    use crate::error::ErrorKind;
    use crate::store::{InMemoryCartStore, StockPolicy, StoreError, StoreOperation};

    const SCORER: ProductId = ProductId::new(1);
    const DIGEST: ProductId = ProductId::new(2);

    fn product(id: ProductId, cents: i64, stock: u32) -> ProductRecord {
        ProductRecord {
            id,
            name: format!("Automation {id}"),
            price: Decimal::new(cents, 2),
            image: Some(format!("https://cdn.example.com/{id}.png")),
            category: Some("Data Processing".to_string()),
            stock,
        }
    }

    fn setup() -> (CartEngine, InMemoryCartStore) {
        let catalog =
            InMemoryCatalog::with_products([product(SCORER, 1000, 50), product(DIGEST, 250, 50)]);
        let store = InMemoryCartStore::new(catalog.clone());
        let engine = CartEngine::new(
            UserId::generate(),
            Arc::new(store.clone()),
            Arc::new(catalog),
        );
        (engine, store)
    }

    /// Catalog that answers every lookup with a 503 after `delay`.
    struct UnavailableCatalog {
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl CatalogLookup for UnavailableCatalog {
        async fn get_product(&self, _product_id: ProductId) -> Result<ProductRecord, CatalogError> {
            tokio::time::sleep(self.delay).await;
            Err(CatalogError::Api {
                status: 503,
                message: "catalog unavailable".to_string(),
            })
        }
    }

    fn setup_with_unavailable_catalog(delay: Duration) -> (CartEngine, InMemoryCartStore) {
        let store = InMemoryCartStore::new(InMemoryCatalog::with_products([
            product(SCORER, 1000, 50),
            product(DIGEST, 250, 50),
        ]));
        let engine = CartEngine::new(
            UserId::generate(),
            Arc::new(store.clone()),
            Arc::new(UnavailableCatalog { delay }),
        );
        (engine, store)
    }

    fn quantities(engine: &CartEngine) -> Vec<(ProductId, u32)> {
        engine
            .snapshot()
            .cart
            .items()
            .iter()
            .map(|i| (i.product_id, i.quantity.get()))
            .collect()
    }

    #[tokio::test]
    async fn test_add_update_remove_scenario() {
        let (engine, _store) = setup();
        engine.hydrate().await.unwrap();
        assert!(engine.snapshot().cart.is_empty());

        engine.add_item(SCORER, 2).await.unwrap();
        let snapshot = engine.snapshot();
        assert_eq!(quantities(&engine), vec![(SCORER, 2)]);
        assert_eq!(snapshot.total_item_count(), 2);
        assert_eq!(snapshot.total_price(), Decimal::new(2000, 2));

        engine.update_item(SCORER, 5).await.unwrap();
        assert_eq!(engine.snapshot().total_price(), Decimal::new(5000, 2));

        engine.remove_item(SCORER).await.unwrap();
        let snapshot = engine.snapshot();
        assert!(snapshot.cart.is_empty());
        assert_eq!(snapshot.total_item_count(), 0);
        assert_eq!(snapshot.total_price(), Decimal::ZERO);
        assert_eq!(snapshot.status, SyncStatus::Applied);
    }

    #[tokio::test]
    async fn test_repeated_add_keeps_one_line_with_store_quantity() {
        let (engine, _store) = setup();
        engine.add_item(SCORER, 1).await.unwrap();
        engine.add_item(SCORER, 3).await.unwrap();
        engine.add_item(SCORER, 2).await.unwrap();

        assert_eq!(quantities(&engine), vec![(SCORER, 2)]);
    }

    #[tokio::test]
    async fn test_add_reflects_server_side_cap() {
        let (engine, store) = setup();
        store.catalog().set_stock(SCORER, 3);
        store.set_stock_policy(StockPolicy::Cap);

        engine.add_item(SCORER, 10).await.unwrap();
        assert_eq!(quantities(&engine), vec![(SCORER, 3)]);
    }

    #[tokio::test]
    async fn test_quantity_below_one_never_reaches_store() {
        let (engine, store) = setup();
        engine.add_item(SCORER, 2).await.unwrap();
        let calls_before = store.total_calls();

        for bad in [0, -1] {
            let err = engine.update_item(SCORER, bad).await.unwrap_err();
            assert!(matches!(
                err,
                CartError::Validation(ValidationError::InvalidQuantity(_))
            ));
            let err = engine.add_item(DIGEST, bad).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }

        assert_eq!(store.total_calls(), calls_before);
        assert_eq!(quantities(&engine), vec![(SCORER, 2)]);
    }

    #[tokio::test]
    async fn test_unknown_product_rejected_before_store() {
        let (engine, store) = setup();
        let err = engine.add_item(ProductId::new(404), 1).await.unwrap_err();
        assert!(matches!(
            err,
            CartError::Validation(ValidationError::UnknownProduct(id)) if id == ProductId::new(404)
        ));
        assert_eq!(store.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_catalog_outage_fails_add_without_store_write() {
        let (engine, store) = setup_with_unavailable_catalog(Duration::ZERO);
        store.insert_line(engine.user_id(), SCORER, Quantity::ONE).await;
        engine.hydrate().await.unwrap();
        let before = engine.snapshot().cart;
        let calls_before = store.total_calls();

        let err = engine.add_item(DIGEST, 1).await.unwrap_err();
        assert!(matches!(
            err,
            CartError::Mutation {
                op: MutationKind::Add,
                source: SyncError::Catalog(CatalogError::Api { status: 503, .. }),
            }
        ));
        assert!(err.is_retryable());

        assert_eq!(store.total_calls(), calls_before);
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.cart, before);
        assert_eq!(snapshot.status, SyncStatus::Failed);
        assert_eq!(snapshot.error.unwrap().kind, ErrorKind::Mutation);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (engine, _store) = setup();
        engine.add_item(SCORER, 1).await.unwrap();
        engine.add_item(DIGEST, 1).await.unwrap();

        engine.remove_item(SCORER).await.unwrap();
        let once = engine.snapshot().cart;
        engine.remove_item(SCORER).await.unwrap();
        assert_eq!(engine.snapshot().cart, once);
        assert_eq!(quantities(&engine), vec![(DIGEST, 1)]);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_items_unchanged() {
        let (engine, store) = setup();
        engine.add_item(SCORER, 2).await.unwrap();
        let before = engine.snapshot().cart;

        store.fail_next(
            StoreOperation::UpdateQuantity,
            StoreError::Api {
                status: 503,
                message: "unavailable".to_string(),
            },
        );
        let err = engine.update_item(SCORER, 4).await.unwrap_err();
        assert!(matches!(
            err,
            CartError::Mutation {
                op: MutationKind::Update,
                ..
            }
        ));

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.cart, before);
        assert_eq!(snapshot.status, SyncStatus::Failed);
        let error = snapshot.error.unwrap();
        assert_eq!(error.kind, ErrorKind::Mutation);
        assert!(error.retryable);
    }

    #[tokio::test]
    async fn test_failed_reread_leaves_items_unchanged() {
        let (engine, store) = setup();
        engine.add_item(SCORER, 2).await.unwrap();
        let before = engine.snapshot().cart;

        store.fail_next(StoreOperation::Fetch, StoreError::RateLimited(1));
        assert!(engine.update_item(SCORER, 4).await.is_err());
        assert_eq!(engine.snapshot().cart, before);

        // The write itself landed; the next successful read shows it
        engine.hydrate().await.unwrap();
        assert_eq!(quantities(&engine), vec![(SCORER, 4)]);
    }

    #[tokio::test]
    async fn test_conflict_surfaces_as_mutation_error() {
        let (engine, store) = setup();
        store.catalog().set_stock(DIGEST, 1);

        let err = engine.add_item(DIGEST, 2).await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(engine.snapshot().cart.is_empty());
    }

    #[tokio::test]
    async fn test_next_mutation_clears_error() {
        let (engine, store) = setup();
        store.fail_next(StoreOperation::Upsert, StoreError::RateLimited(1));
        assert!(engine.add_item(SCORER, 1).await.is_err());
        assert!(engine.snapshot().error.is_some());

        engine.add_item(SCORER, 1).await.unwrap();
        assert!(engine.snapshot().error.is_none());
    }

    #[tokio::test]
    async fn test_clear_cart_is_local_only() {
        let (engine, store) = setup();
        engine.add_item(SCORER, 2).await.unwrap();
        let calls_before = store.total_calls();

        engine.clear_cart();
        assert!(engine.snapshot().cart.is_empty());
        assert_eq!(store.total_calls(), calls_before);

        engine.hydrate().await.unwrap();
        assert_eq!(quantities(&engine), vec![(SCORER, 2)]);
    }

    #[tokio::test]
    async fn test_hydration_failure_sets_error_and_empty_cart() {
        let (engine, store) = setup();
        store.insert_line(engine.user_id(), SCORER, Quantity::ONE).await;
        store.fail_next(StoreOperation::Fetch, StoreError::RateLimited(1));

        assert!(engine.snapshot().loading);
        let err = engine.hydrate().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Hydration);

        let snapshot = engine.snapshot();
        assert!(!snapshot.loading);
        assert!(snapshot.cart.is_empty());
        assert_eq!(snapshot.error.unwrap().kind, ErrorKind::Hydration);

        // Retry affordance
        engine.hydrate().await.unwrap();
        assert_eq!(quantities(&engine), vec![(SCORER, 1)]);
    }

    #[tokio::test]
    async fn test_duplicate_lines_from_store_fail_hydration() {
        let (engine, store) = setup();
        store.insert_line(engine.user_id(), SCORER, Quantity::ONE).await;
        store.insert_line(engine.user_id(), SCORER, Quantity::ONE).await;

        let err = engine.hydrate().await.unwrap_err();
        assert!(matches!(err, CartError::Hydration(SyncError::Invariant(_))));
        assert!(engine.snapshot().cart.is_empty());
    }

    #[tokio::test]
    async fn test_store_price_overflow_fails_hydration() {
        let (engine, store) = setup();
        assert!(store.catalog().set_price(SCORER, Decimal::MAX));
        store
            .insert_line(engine.user_id(), SCORER, Quantity::new(2).unwrap())
            .await;

        let err = engine.hydrate().await.unwrap_err();
        assert!(matches!(
            err,
            CartError::Hydration(SyncError::Invariant(
                cartwright_core::CartError::PriceOverflow(id)
            )) if id == SCORER
        ));
        assert!(engine.snapshot().cart.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_is_busy_during_round_trip() {
        let (engine, store) = setup();
        engine.hydrate().await.unwrap();
        assert!(!engine.snapshot().is_busy());
        store.set_latency(StoreOperation::Upsert, Duration::from_millis(50));

        let pending = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.add_item(SCORER, 1).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(engine.snapshot().is_busy());

        pending.await.unwrap().unwrap();
        assert!(!engine.snapshot().is_busy());
    }

    #[tokio::test]
    async fn test_overlapping_mutations_apply_in_call_order() {
        let (engine, store) = setup();
        engine.add_item(SCORER, 1).await.unwrap();

        // The first write is slow; without sequencing the second would finish first
        store.set_latency(StoreOperation::UpdateQuantity, Duration::from_millis(50));
        let first = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.update_item(SCORER, 3).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.set_latency(StoreOperation::UpdateQuantity, Duration::ZERO);
        let second = engine.update_item(SCORER, 7);

        second.await.unwrap();
        first.await.unwrap().unwrap();
        assert_eq!(quantities(&engine), vec![(SCORER, 7)]);
        assert_eq!(store.lines(engine.user_id()).await, vec![(SCORER, Quantity::new(7).unwrap())]);
    }

    #[tokio::test]
    async fn test_teardown_discards_in_flight_result() {
        let (engine, store) = setup();
        engine.hydrate().await.unwrap();
        store.set_latency(StoreOperation::Upsert, Duration::from_millis(50));

        let pending = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.add_item(SCORER, 2).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        engine.teardown();

        pending.await.unwrap().unwrap();
        let snapshot = engine.snapshot();
        assert!(snapshot.cart.is_empty());
        assert_eq!(snapshot.status, SyncStatus::Idle);
        // The store still received the write
        assert_eq!(store.lines(engine.user_id()).await.len(), 1);
    }

    #[tokio::test]
    async fn test_teardown_discards_intents_queued_behind_slow_write() {
        let (engine, store) = setup();
        engine.hydrate().await.unwrap();
        store.set_latency(StoreOperation::Upsert, Duration::from_millis(50));

        let first = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.add_item(SCORER, 1).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        let queued = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.add_item(DIGEST, 1).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        engine.teardown();

        first.await.unwrap().unwrap();
        queued.await.unwrap().unwrap();
        let snapshot = engine.snapshot();
        assert!(snapshot.cart.is_empty());
        assert_eq!(snapshot.status, SyncStatus::Idle);
        assert!(snapshot.error.is_none());
        assert_eq!(store.lines(engine.user_id()).await.len(), 2);
    }

    #[tokio::test]
    async fn test_teardown_discards_catalog_failure() {
        let (engine, store) = setup_with_unavailable_catalog(Duration::from_millis(50));

        let pending = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.add_item(SCORER, 1).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        engine.teardown();

        assert!(pending.await.unwrap().is_err());
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.status, SyncStatus::Idle);
        assert!(snapshot.error.is_none());
        assert_eq!(store.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_subscribers_see_each_applied_state() {
        let (engine, _store) = setup();
        let mut rx = engine.subscribe();
        assert!(!rx.has_changed().unwrap());

        engine.add_item(DIGEST, 4).await.unwrap();
        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen.total_item_count(), 4);
        assert_eq!(seen.total_price(), Decimal::new(1000, 2));
    }
}
