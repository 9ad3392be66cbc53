//! Cartwright storefront cart library.
//!
//! Keeps a shopper's cart consistent with a remote cart store. The
//! [`cart::CartEngine`] is the single source of truth for one session; the
//! [`state::CartProvider`] builds engines over a [`store::CartStore`] and a
//! [`catalog::CatalogLookup`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod state;
pub mod store;
pub mod view;

pub use cart::{CartEngine, CartSnapshot, SnapshotError};
pub use config::{CartConfig, ConfigError};
pub use error::{CartError, ErrorKind, MutationKind, SyncError, ValidationError};
pub use state::{CartProvider, ProviderError};
pub use view::{CartItemView, CartView};
