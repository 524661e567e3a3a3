//! Display prices stored alongside liked products.
//!
//! The backend reports decimal amounts (`unitPrice: 129.9`). Liked products
//! keep a denormalized copy in minor units with an explicit precision so the
//! record survives a round trip through durable storage unchanged.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price in minor currency units.
///
/// ```
/// use furniture_core::{CurrencyCode, Price};
/// use rust_decimal::Decimal;
///
/// let price = Price::from_decimal(Decimal::new(12990, 2), CurrencyCode::EUR);
/// assert_eq!(price.amount, Some(12990));
/// assert_eq!(price.display(), "129,90 €");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    /// Amount in minor units (e.g. cents).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    /// ISO 4217 currency code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<CurrencyCode>,
    /// Number of decimal places `amount` is scaled by.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
}

impl Price {
    /// Default precision for the supported currencies.
    pub const DEFAULT_PRECISION: u32 = 2;

    /// Convert a decimal backend amount into minor units.
    ///
    /// Amounts that do not fit into `i64` minor units are dropped.
    #[must_use]
    pub fn from_decimal(amount: Decimal, currency: CurrencyCode) -> Self {
        let scaled = amount
            .checked_mul(Decimal::from(10_i64.pow(Self::DEFAULT_PRECISION)))
            .map(|scaled| scaled.round());
        Self {
            amount: scaled.and_then(|scaled| i64::try_from(scaled).ok()),
            currency: Some(currency),
            precision: Some(Self::DEFAULT_PRECISION),
        }
    }

    /// The amount as a decimal in the currency's standard unit.
    #[must_use]
    pub fn to_decimal(&self) -> Option<Decimal> {
        let precision = self.precision.unwrap_or(Self::DEFAULT_PRECISION);
        self.amount.map(|minor| Decimal::new(minor, precision))
    }

    /// Format for display using German number conventions (`1.234,50 €`).
    #[must_use]
    pub fn display(&self) -> String {
        let currency = self.currency.unwrap_or_default();
        self.to_decimal().map_or_else(String::new, |amount| {
            format!("{} {}", format_decimal_de(amount), currency.symbol())
        })
    }
}

/// Format a decimal with `.` thousands separators and a `,` decimal mark.
fn format_decimal_de(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    if negative {
        format!("-{grouped},{fraction}")
    } else {
        format!("{grouped},{fraction}")
    }
}

/// ISO 4217 currency codes used by the shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    EUR,
    USD,
    GBP,
    CHF,
}

impl CurrencyCode {
    /// Currency symbol for display.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::EUR => "€",
            Self::USD => "$",
            Self::GBP => "£",
            Self::CHF => "CHF",
        }
    }

    /// Parse a backend `isoCode`. Unknown codes yield `None`.
    #[must_use]
    pub fn from_iso(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "EUR" => Some(Self::EUR),
            "USD" => Some(Self::USD),
            "GBP" => Some(Self::GBP),
            "CHF" => Some(Self::CHF),
            _ => None,
        }
    }
}
