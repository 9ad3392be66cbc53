//! Cart error taxonomy with Sentry integration.
//!
//! Every failure leaving the engine is one of three kinds: the initial load
//! failed ([`CartError::Hydration`]), a write or its confirming re-read failed
//! ([`CartError::Mutation`]), or the caller's request was rejected before any
//! network call ([`CartError::Validation`]). Store and catalog errors are
//! wrapped, never returned bare.

use cartwright_core::{ProductId, QuantityError};
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::store::StoreError;

/// A request rejected before it reached the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Quantity below one (or out of range).
    #[error("invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),

    /// The catalog has no such product.
    #[error("unknown product: {0}")]
    UnknownProduct(ProductId),
}

/// Which intent a mutation error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Add,
    Update,
    Remove,
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Update => write!(f, "update"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// Underlying cause of a failed round trip.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The cart store call failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The catalog lookup failed for a reason other than a missing product.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The store returned lines that do not form a valid cart.
    #[error("store returned an invalid cart: {0}")]
    Invariant(#[from] cartwright_core::CartError),
}

impl SyncError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Store(err) => err.is_transient(),
            Self::Catalog(CatalogError::Http(_)) => true,
            Self::Catalog(CatalogError::Api { status, .. }) => *status >= 500,
            Self::Catalog(_) | Self::Invariant(_) => false,
        }
    }
}

/// Coarse error category exposed to views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Hydration,
    Mutation,
    Validation,
}

/// Errors returned by cart engine intents.
#[derive(Debug, Error)]
pub enum CartError {
    /// Loading the cart from the store failed.
    #[error("Failed to load cart: {0}")]
    Hydration(#[source] SyncError),

    /// A write or its confirming re-read failed. Local state is unchanged.
    #[error("Failed to {op} cart item: {source}")]
    Mutation {
        /// The intent that failed.
        op: MutationKind,
        /// What went wrong.
        #[source]
        source: SyncError,
    },

    /// The request was rejected before any network call.
    #[error("Invalid cart request: {0}")]
    Validation(#[from] ValidationError),
}

impl CartError {
    pub(crate) fn hydration(source: impl Into<SyncError>) -> Self {
        Self::Hydration(source.into())
    }

    pub(crate) fn mutation(op: MutationKind, source: impl Into<SyncError>) -> Self {
        Self::Mutation {
            op,
            source: source.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Hydration(_) => ErrorKind::Hydration,
            Self::Mutation { .. } => ErrorKind::Mutation,
            Self::Validation(_) => ErrorKind::Validation,
        }
    }

    /// Whether the view should offer a retry affordance.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Hydration(_) => true,
            Self::Mutation { source, .. } => source.is_transient(),
            Self::Validation(_) => false,
        }
    }

    /// Message safe to show to the shopper.
    ///
    /// Transport details stay in logs and Sentry.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Hydration(_) => "We couldn't load your cart. Please try again.".to_string(),
            Self::Mutation { source, .. } => match source {
                SyncError::Store(StoreError::Conflict(msg)) => {
                    format!("Not enough stock: {msg}")
                }
                SyncError::Store(StoreError::Validation(msg)) => msg.clone(),
                SyncError::Store(StoreError::RateLimited(secs)) => {
                    format!("Too many requests, please wait {secs} seconds")
                }
                _ => "We couldn't update your cart. Please try again.".to_string(),
            },
            Self::Validation(ValidationError::InvalidQuantity(_)) => {
                "Quantity must be at least 1".to_string()
            }
            Self::Validation(ValidationError::UnknownProduct(_)) => {
                "That product is no longer available".to_string()
            }
        }
    }

    /// Log the error and capture server-class failures to Sentry.
    ///
    /// Validation errors are caller mistakes and are only logged.
    pub fn report(&self) {
        match self {
            Self::Hydration(_) | Self::Mutation { .. } => {
                let event_id = sentry::capture_error(self);
                tracing::error!(
                    error = %self,
                    sentry_event_id = %event_id,
                    "Cart sync error"
                );
            }
            Self::Validation(_) => {
                tracing::warn!(error = %self, "Rejected cart request");
            }
        }
    }
}

/// Add a breadcrumb for a cart intent.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart
/// actions leading up to an error.
pub fn add_breadcrumb(message: &str, data: &[(&str, String)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some("cart".to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb
            .data
            .insert((*key).to_string(), serde_json::Value::String(value.clone()));
    }

    sentry::add_breadcrumb(breadcrumb);
}
