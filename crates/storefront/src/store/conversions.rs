//! Wire types for the REST cart store and their conversions to core types.
//!
//! Field names follow the hosted backend's camelCase JSON. Quantities are read
//! as raw integers so that a bad row is reported as a contract violation
//! instead of an opaque parse error.

use cartwright_core::{
    LineItem, LineItemId, ProductId, ProductRecord, ProductSnapshot, Quantity, UserId,
};
use serde::{Deserialize, Serialize};

use super::StoreError;

/// One row of `GET /users/{user}/cart`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineRecord {
    #[serde(default)]
    pub id: Option<LineItemId>,
    pub product_id: ProductId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub quantity: i64,
    pub product: ProductRecord,
}

impl CartLineRecord {
    /// Build the wire row for a line, re-expanding its product snapshot.
    #[must_use]
    pub fn from_line(user_id: UserId, line: &LineItem, stock: u32) -> Self {
        Self {
            id: line.id,
            product_id: line.product_id,
            user_id: Some(user_id),
            quantity: i64::from(line.quantity.get()),
            product: ProductRecord {
                id: line.product_id,
                name: line.product.name.clone(),
                price: line.unit_price,
                image: line.product.image.clone(),
                category: line.product.category.clone(),
                stock,
            },
        }
    }
}

/// Body of `POST /users/{user}/cart`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertLineRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Body of `PUT /users/{user}/cart/{product}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

/// JSON error body returned with non-success statuses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

/// Convert fetched rows into line items, rejecting rows the store should
/// never have produced.
pub(crate) fn convert_cart_lines(
    records: Vec<CartLineRecord>,
) -> Result<Vec<LineItem>, StoreError> {
    records.into_iter().map(convert_cart_line).collect()
}

fn convert_cart_line(record: CartLineRecord) -> Result<LineItem, StoreError> {
    let quantity = Quantity::new(record.quantity).map_err(|e| {
        StoreError::Contract(format!("line for product {}: {e}", record.product_id))
    })?;

    if record.product.id != record.product_id {
        return Err(StoreError::Contract(format!(
            "line for product {} embeds product {}",
            record.product_id, record.product.id
        )));
    }

    Ok(LineItem {
        id: record.id,
        product_id: record.product_id,
        quantity,
        unit_price: record.product.price,
        product: ProductSnapshot {
            name: record.product.name,
            image: record.product.image,
            category: record.product.category,
        },
    })
}
