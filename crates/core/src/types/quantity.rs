//! Line item quantity type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// The value is zero or negative.
    #[error("quantity must be at least {min} (got {got})")]
    BelowMinimum {
        /// Smallest accepted quantity.
        min: u32,
        /// The rejected value.
        got: i64,
    },
    /// The value does not fit the stored representation.
    #[error("quantity must be at most {max} (got {got})")]
    TooLarge {
        /// Largest accepted quantity.
        max: u32,
        /// The rejected value.
        got: i64,
    },
}

/// How many units of a product a cart line holds.
///
/// ## Constraints
///
/// - Always at least 1. A line that would drop to zero is removed instead,
///   so a zero quantity is unrepresentable.
///
/// ## Examples
///
/// ```
/// use cartwright_core::Quantity;
///
/// assert!(Quantity::new(2).is_ok());
/// assert!(Quantity::new(0).is_err());  // decrement past one
/// assert!(Quantity::new(-3).is_err()); // negative
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// Smallest quantity a line item may hold.
    pub const MIN: u32 = 1;

    /// A single unit.
    pub const ONE: Self = Self(1);

    /// Build a quantity from a caller-supplied value.
    ///
    /// Takes `i64` so that UI arithmetic such as `current - 1` can be passed
    /// straight through and rejected here.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::BelowMinimum`] for values below 1 and
    /// [`QuantityError::TooLarge`] for values above `u32::MAX`.
    pub fn new(value: i64) -> Result<Self, QuantityError> {
        if value < i64::from(Self::MIN) {
            return Err(QuantityError::BelowMinimum {
                min: Self::MIN,
                got: value,
            });
        }

        u32::try_from(value)
            .map(Self)
            .map_err(|_| QuantityError::TooLarge {
                max: u32::MAX,
                got: value,
            })
    }

    /// Get the underlying count.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Clamp to an upper bound, keeping the minimum of one.
    #[must_use]
    pub fn capped_at(self, max: u32) -> Self {
        Self(self.0.min(max).max(Self::MIN))
    }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(i64::from(value))
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
