//! Display models built from a cart snapshot.

use cartwright_core::{CurrencyCode, LineItem, Price, ProductId};
use serde::Serialize;

use crate::cart::CartSnapshot;

/// Cart line display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItemView {
    pub product_id: ProductId,
    pub title: String,
    pub category: Option<String>,
    pub image: Option<String>,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
}

/// Cart display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub item_count: u64,
    pub loading: bool,
    /// Shopper-facing message for the last failure, if any.
    pub error: Option<String>,
}

impl CartView {
    /// Create an empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            subtotal: Price::zero(CurrencyCode::default()).display(),
            item_count: 0,
            loading: false,
            error: None,
        }
    }

    /// Build a view from `snapshot`, formatting money in `currency`.
    #[must_use]
    pub fn from_snapshot(snapshot: &CartSnapshot, currency: CurrencyCode) -> Self {
        Self {
            items: snapshot
                .cart
                .items()
                .iter()
                .map(|item| CartItemView::new(item, currency))
                .collect(),
            subtotal: Price::new(snapshot.total_price(), currency).display(),
            item_count: snapshot.total_item_count(),
            loading: snapshot.loading,
            error: snapshot.error.as_ref().map(|e| e.message.clone()),
        }
    }
}

impl CartItemView {
    fn new(item: &LineItem, currency: CurrencyCode) -> Self {
        Self {
            product_id: item.product_id,
            title: item.product.name.clone(),
            category: item.product.category.clone(),
            image: item.product.image.clone(),
            quantity: item.quantity.get(),
            price: Price::new(item.unit_price, currency).display(),
            line_price: Price::new(item.line_total(), currency).display(),
        }
    }
}
