//! Type-safe price representation using decimal arithmetic.
//!
//! Amounts are carried at full precision through every sum and product;
//! rounding to the currency's minor unit happens only in [`Price::display`].

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Number of decimal places shown for every supported currency.
    pub const DISPLAY_PRECISION: u32 = 2;

    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// A zero amount in the given currency.
    #[must_use]
    pub const fn zero(currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency_code)
    }

    /// Format for display (e.g., "$19.99").
    ///
    /// Rounds half away from zero to two decimal places.
    #[must_use]
    pub fn display(&self) -> String {
        let rounded = self
            .amount
            .round_dp_with_strategy(Self::DISPLAY_PRECISION, RoundingStrategy::MidpointAwayFromZero);
        format!("{}{:.2}", self.currency_code.symbol(), rounded)
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl CurrencyCode {
    /// Symbol prefixed to formatted amounts.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            other => Err(format!("unsupported currency code: {other}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_pads_to_two_places() {
        let price = Price::new(Decimal::new(20, 0), CurrencyCode::USD);
        assert_eq!(price.display(), "$20.00");
    }

    #[test]
    fn test_display_rounds_half_away_from_zero() {
        let price = Price::new(Decimal::new(10_005, 3), CurrencyCode::EUR);
        assert_eq!(price.display(), "€10.01");
    }

    #[test]
    fn test_zero() {
        assert_eq!(Price::zero(CurrencyCode::GBP).display(), "£0.00");
    }

    #[test]
    fn test_currency_from_str() {
        assert_eq!("cad".parse::<CurrencyCode>().unwrap(), CurrencyCode::CAD);
        assert!("XYZ".parse::<CurrencyCode>().is_err());
    }
}
