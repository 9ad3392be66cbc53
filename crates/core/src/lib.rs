//! Cartwright Core - Shared types library.
//!
//! This crate provides the types used across all Cartwright components:
//! - `storefront` - Cart state engine, cart store and catalog clients
//! - `cli` - Command-line driver for a user's cart
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, quantities, prices, products, line items and carts

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
