//! In-memory cart store for development and tests.
//!
//! Behaves like the hosted store: prices and stock come from the catalog at
//! read time, upserts replace quantities, deletes are idempotent. Tests can
//! queue failures, add latency and count calls per operation.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use cartwright_core::{LineItem, LineItemId, ProductId, Quantity, UserId};
use tokio::sync::RwLock;
use tracing::debug;

use super::{CartStore, StoreError, StoreOperation};
use crate::catalog::InMemoryCatalog;

/// What the store does when a requested quantity exceeds stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StockPolicy {
    /// Refuse the write with [`StoreError::Conflict`].
    #[default]
    Reject,
    /// Store the available stock instead of the requested quantity.
    Cap,
}

#[derive(Debug, Clone)]
struct StoredLine {
    id: LineItemId,
    product_id: ProductId,
    quantity: Quantity,
}

/// In-memory cart store keyed by (user, product).
///
/// Clones share the same carts.
#[derive(Debug, Clone)]
pub struct InMemoryCartStore {
    inner: Arc<InMemoryCartStoreInner>,
}

#[derive(Debug)]
struct InMemoryCartStoreInner {
    catalog: InMemoryCatalog,
    carts: RwLock<HashMap<UserId, Vec<StoredLine>>>,
    next_line_id: AtomicI32,
    policy: Mutex<StockPolicy>,
    failures: Mutex<HashMap<StoreOperation, VecDeque<StoreError>>>,
    latency: Mutex<HashMap<StoreOperation, Duration>>,
    calls: Mutex<HashMap<StoreOperation, usize>>,
}

impl InMemoryCartStore {
    /// Create an empty store pricing lines from `catalog`.
    #[must_use]
    pub fn new(catalog: InMemoryCatalog) -> Self {
        Self {
            inner: Arc::new(InMemoryCartStoreInner {
                catalog,
                carts: RwLock::new(HashMap::new()),
                next_line_id: AtomicI32::new(1),
                policy: Mutex::new(StockPolicy::default()),
                failures: Mutex::new(HashMap::new()),
                latency: Mutex::new(HashMap::new()),
                calls: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The catalog this store prices from.
    #[must_use]
    pub fn catalog(&self) -> &InMemoryCatalog {
        &self.inner.catalog
    }

    /// Choose how over-stock writes are handled.
    pub fn set_stock_policy(&self, policy: StockPolicy) {
        *lock(&self.inner.policy) = policy;
    }

    /// Make the next call to `operation` fail with `error`.
    ///
    /// Queued failures are consumed in order, one per call.
    pub fn fail_next(&self, operation: StoreOperation, error: StoreError) {
        lock(&self.inner.failures)
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Delay every call to `operation` by `delay` before it touches state.
    pub fn set_latency(&self, operation: StoreOperation, delay: Duration) {
        lock(&self.inner.latency).insert(operation, delay);
    }

    /// Number of calls made to `operation`, including failed ones.
    #[must_use]
    pub fn calls(&self, operation: StoreOperation) -> usize {
        lock(&self.inner.calls).get(&operation).copied().unwrap_or(0)
    }

    /// Number of calls made to any operation.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        lock(&self.inner.calls).values().sum()
    }

    /// Append a row as-is, bypassing stock and uniqueness rules.
    ///
    /// Used to seed server-side state, including states the store's own
    /// operations would never produce.
    pub async fn insert_line(&self, user_id: UserId, product_id: ProductId, quantity: Quantity) {
        let id = self.next_id();
        self.inner
            .carts
            .write()
            .await
            .entry(user_id)
            .or_default()
            .push(StoredLine {
                id,
                product_id,
                quantity,
            });
    }

    /// Raw (product, quantity) rows for a user, in store order.
    pub async fn lines(&self, user_id: UserId) -> Vec<(ProductId, Quantity)> {
        self.inner
            .carts
            .read()
            .await
            .get(&user_id)
            .map(|lines| {
                lines
                    .iter()
                    .map(|line| (line.product_id, line.quantity))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn next_id(&self) -> LineItemId {
        LineItemId::new(self.inner.next_line_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Count the call, wait out any latency, then pop a queued failure.
    async fn begin(&self, operation: StoreOperation) -> Result<(), StoreError> {
        *lock(&self.inner.calls).entry(operation).or_insert(0) += 1;

        let delay = lock(&self.inner.latency).get(&operation).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = lock(&self.inner.failures)
            .get_mut(&operation)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(error) => {
                debug!(%operation, %error, "Injected store failure");
                Err(error)
            }
            None => Ok(()),
        }
    }

    /// Apply stock rules to a requested quantity.
    fn admit(&self, product_id: ProductId, quantity: Quantity) -> Result<Quantity, StoreError> {
        let product = self
            .inner
            .catalog
            .get(product_id)
            .ok_or_else(|| StoreError::Validation(format!("unknown product {product_id}")))?;

        if quantity.get() <= product.stock {
            return Ok(quantity);
        }

        match *lock(&self.inner.policy) {
            StockPolicy::Cap if product.stock > 0 => Ok(quantity.capped_at(product.stock)),
            StockPolicy::Cap | StockPolicy::Reject => Err(StoreError::Conflict(format!(
                "only {} of product {product_id} in stock",
                product.stock
            ))),
        }
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn fetch_cart(&self, user_id: UserId) -> Result<Vec<LineItem>, StoreError> {
        self.begin(StoreOperation::Fetch).await?;

        let carts = self.inner.carts.read().await;
        let Some(lines) = carts.get(&user_id) else {
            return Ok(Vec::new());
        };

        lines
            .iter()
            .map(|line| {
                let product = self.inner.catalog.get(line.product_id).ok_or_else(|| {
                    StoreError::Contract(format!(
                        "line {} references missing product {}",
                        line.id, line.product_id
                    ))
                })?;
                Ok(LineItem {
                    id: Some(line.id),
                    product_id: line.product_id,
                    quantity: line.quantity,
                    unit_price: product.price,
                    product: product.snapshot(),
                })
            })
            .collect()
    }

    async fn upsert_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<(), StoreError> {
        self.begin(StoreOperation::Upsert).await?;
        let quantity = self.admit(product_id, quantity)?;

        let mut carts = self.inner.carts.write().await;
        let lines = carts.entry(user_id).or_default();
        if let Some(line) = lines.iter_mut().find(|l| l.product_id == product_id) {
            line.quantity = quantity;
        } else {
            lines.push(StoredLine {
                id: self.next_id(),
                product_id,
                quantity,
            });
        }
        Ok(())
    }

    async fn update_line_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<(), StoreError> {
        self.begin(StoreOperation::UpdateQuantity).await?;
        let quantity = self.admit(product_id, quantity)?;

        // Updating a row that does not exist matches nothing, like a SQL UPDATE
        let mut carts = self.inner.carts.write().await;
        if let Some(line) = carts
            .get_mut(&user_id)
            .and_then(|lines| lines.iter_mut().find(|l| l.product_id == product_id))
        {
            line.quantity = quantity;
        }
        Ok(())
    }

    async fn delete_line(&self, user_id: UserId, product_id: ProductId) -> Result<(), StoreError> {
        self.begin(StoreOperation::Delete).await?;

        if let Some(lines) = self.inner.carts.write().await.get_mut(&user_id) {
            lines.retain(|l| l.product_id != product_id);
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
