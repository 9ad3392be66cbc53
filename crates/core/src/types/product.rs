//! Catalog product records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// A product as returned by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    /// Current unit price in the store currency.
    pub price: Decimal,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Units available for sale.
    #[serde(default)]
    pub stock: u32,
}

impl ProductRecord {
    /// The display fields a cart line keeps for rendering.
    #[must_use]
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            name: self.name.clone(),
            image: self.image.clone(),
            category: self.category.clone(),
        }
    }
}

/// Denormalized product fields stored on a line item so a cart can be
/// rendered without a second catalog round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub name: String,
    pub image: Option<String>,
    pub category: Option<String>,
}
