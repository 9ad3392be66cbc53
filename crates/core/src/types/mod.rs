//! Core types for Cartwright.
//!
//! This module provides type-safe wrappers for cart and catalog concepts.

pub mod cart;
pub mod id;
pub mod price;
pub mod product;
pub mod quantity;
pub mod status;

pub use cart::{Cart, CartError, LineItem, total_item_count, total_price};
pub use id::*;
pub use price::{CurrencyCode, Price};
pub use product::{ProductRecord, ProductSnapshot};
pub use quantity::{Quantity, QuantityError};
pub use status::SyncStatus;
