//! Read-only view of the engine's state.

use cartwright_core::{Cart, SyncStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::{CartError, ErrorKind};

/// The last error recorded by the engine, in a cloneable form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotError {
    pub kind: ErrorKind,
    /// Shopper-facing message.
    pub message: String,
    /// Whether a retry affordance makes sense.
    pub retryable: bool,
}

impl From<&CartError> for SnapshotError {
    fn from(err: &CartError) -> Self {
        Self {
            kind: err.kind(),
            message: err.user_message(),
            retryable: err.is_retryable(),
        }
    }
}

/// Everything a view needs to render the cart.
///
/// Totals are methods, not fields: they are recomputed from `cart` on every
/// call and cannot drift from the lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartSnapshot {
    pub cart: Cart,
    /// True until the first hydration finishes.
    pub loading: bool,
    pub error: Option<SnapshotError>,
    pub status: SyncStatus,
    /// When `cart` last matched a fresh read from the store.
    pub synced_at: Option<DateTime<Utc>>,
}

impl CartSnapshot {
    /// State at mount, before the first hydration.
    #[must_use]
    pub fn mounting() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn total_item_count(&self) -> u64 {
        self.cart.total_item_count()
    }

    #[must_use]
    pub fn total_price(&self) -> Decimal {
        self.cart.total_price()
    }

    /// Whether quantity controls should be disabled.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.status.is_busy()
    }
}
