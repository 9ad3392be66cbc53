//! Cart aggregate and its derived totals.
//!
//! A [`Cart`] is an ordered list of [`LineItem`]s with at most one line per
//! product. Totals are never stored: [`total_item_count`] and [`total_price`]
//! are recomputed from the lines every time they are asked for.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{LineItemId, ProductId};
use super::product::ProductSnapshot;
use super::quantity::Quantity;

/// Errors raised when a list of lines cannot form a cart.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    /// Two lines refer to the same product.
    #[error("duplicate line for product {0}")]
    DuplicateProduct(ProductId),

    /// A line's total, or the cart's, does not fit in a `Decimal`.
    #[error("price overflow at product {0}")]
    PriceOverflow(ProductId),
}

/// One product's presence in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Row ID assigned by the cart store, when it exposes one.
    pub id: Option<LineItemId>,
    pub product_id: ProductId,
    pub quantity: Quantity,
    /// Unit price as of the last sync with the store (not live-priced).
    pub unit_price: Decimal,
    pub product: ProductSnapshot,
}

impl LineItem {
    /// `unit_price * quantity`, unrounded. Saturates at the `Decimal` bounds.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price
            .saturating_mul(Decimal::from(self.quantity.get()))
    }

    /// `unit_price * quantity`, or `None` on overflow.
    #[must_use]
    pub fn checked_line_total(&self) -> Option<Decimal> {
        self.unit_price
            .checked_mul(Decimal::from(self.quantity.get()))
    }
}

/// The lines currently in a user's cart.
///
/// Lines can only be supplied wholesale through [`Cart::new`], which enforces
/// product uniqueness; there is no way to patch a single line in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Cart {
    items: Vec<LineItem>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn empty() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a cart from lines in store order.
    ///
    /// # Errors
    ///
    /// - [`CartError::DuplicateProduct`] if two lines share a product ID
    /// - [`CartError::PriceOverflow`] if the total price cannot be represented
    pub fn new(items: Vec<LineItem>) -> Result<Self, CartError> {
        let mut seen = HashSet::with_capacity(items.len());
        let mut total = Decimal::ZERO;
        for item in &items {
            if !seen.insert(item.product_id) {
                return Err(CartError::DuplicateProduct(item.product_id));
            }
            total = item
                .checked_line_total()
                .and_then(|line| total.checked_add(line))
                .ok_or(CartError::PriceOverflow(item.product_id))?;
        }
        Ok(Self { items })
    }

    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<&LineItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    #[must_use]
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.get(product_id).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of all line quantities.
    #[must_use]
    pub fn total_item_count(&self) -> u64 {
        total_item_count(&self.items)
    }

    /// Sum of all line totals, unrounded.
    #[must_use]
    pub fn total_price(&self) -> Decimal {
        total_price(&self.items)
    }
}

/// Σ quantity over `items`; zero for an empty slice.
#[must_use]
pub fn total_item_count(items: &[LineItem]) -> u64 {
    items
        .iter()
        .map(|item| u64::from(item.quantity.get()))
        .sum()
}

/// Σ (unit price × quantity) over `items`; zero for an empty slice.
#[must_use]
pub fn total_price(items: &[LineItem]) -> Decimal {
    items
        .iter()
        .map(LineItem::line_total)
        .fold(Decimal::ZERO, Decimal::saturating_add)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn line(product: i32, quantity: i64, cents: i64) -> LineItem {
        LineItem {
            id: None,
            product_id: ProductId::new(product),
            quantity: Quantity::new(quantity).unwrap(),
            unit_price: Decimal::new(cents, 2),
            product: ProductSnapshot {
                name: format!("Product {product}"),
                image: None,
                category: None,
            },
        }
    }

    #[test]
    fn test_empty_totals_are_zero() {
        let cart = Cart::empty();
        assert_eq!(cart.total_item_count(), 0);
        assert_eq!(cart.total_price(), Decimal::ZERO);
        assert_eq!(total_item_count(&[]), 0);
        assert_eq!(total_price(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_totals() {
        let cart = Cart::new(vec![line(1, 2, 1000), line(2, 3, 250)]).unwrap();
        assert_eq!(cart.total_item_count(), 5);
        assert_eq!(cart.total_price(), Decimal::new(2750, 2));
    }

    #[test]
    fn test_total_price_keeps_full_precision() {
        let mut item = line(1, 3, 0);
        item.unit_price = Decimal::new(3_333, 3);
        let cart = Cart::new(vec![item]).unwrap();
        assert_eq!(cart.total_price(), Decimal::new(9_999, 3));
    }

    #[test]
    fn test_new_rejects_duplicate_product() {
        let result = Cart::new(vec![line(1, 1, 100), line(2, 1, 100), line(1, 4, 100)]);
        assert_eq!(result, Err(CartError::DuplicateProduct(ProductId::new(1))));
    }

    #[test]
    fn test_new_rejects_unrepresentable_total() {
        let mut huge = line(7, 3, 0);
        huge.unit_price = Decimal::MAX;
        assert_eq!(
            Cart::new(vec![line(1, 1, 100), huge.clone()]),
            Err(CartError::PriceOverflow(ProductId::new(7)))
        );

        let mut half = line(8, 1, 0);
        half.unit_price = Decimal::MAX;
        let mut other = line(9, 1, 0);
        other.unit_price = Decimal::MAX;
        assert_eq!(
            Cart::new(vec![half, other]),
            Err(CartError::PriceOverflow(ProductId::new(9)))
        );

        // Free functions saturate instead of panicking
        assert_eq!(huge.line_total(), Decimal::MAX);
        assert_eq!(total_price(&[huge.clone(), huge]), Decimal::MAX);
    }

    #[test]
    fn test_get_preserves_store_order() {
        let cart = Cart::new(vec![line(9, 1, 100), line(3, 2, 100)]).unwrap();
        let ids: Vec<i32> = cart.items().iter().map(|i| i.product_id.as_i32()).collect();
        assert_eq!(ids, vec![9, 3]);
        assert_eq!(cart.get(ProductId::new(3)).unwrap().quantity.get(), 2);
        assert!(!cart.contains(ProductId::new(4)));
    }

    proptest! {
        #[test]
        fn prop_totals_match_line_sums(
            lines in prop::collection::vec((1_i64..500, 0_i64..1_000_000), 0..40)
        ) {
            let items: Vec<LineItem> = lines
                .iter()
                .enumerate()
                .map(|(i, (qty, cents))| line(i32::try_from(i).unwrap(), *qty, *cents))
                .collect();

            let expected_count: u64 = lines.iter().map(|(qty, _)| u64::try_from(*qty).unwrap()).sum();
            let expected_price: Decimal = lines
                .iter()
                .map(|(qty, cents)| Decimal::new(*cents, 2) * Decimal::from(*qty))
                .sum();

            let cart = Cart::new(items).unwrap();
            prop_assert_eq!(cart.total_item_count(), expected_count);
            prop_assert_eq!(cart.total_price(), expected_price);
        }
    }
}
