//! Conversion between order amounts and gateway minor units.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::error::MarketError;

/// ISO 4217 currencies the gateway expresses without a fractional unit.
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "BIF", "CLP", "DJF", "GNF", "JPY", "KMF", "KRW", "MGA", "PYG", "RWF", "UGX", "VND", "VUV",
    "XAF", "XOF", "XPF",
];

/// Most fractional digits a stored amount may carry (`NUMERIC(14, 2)`).
pub const MAX_SCALE: u32 = 2;

/// Number of fractional digits the gateway uses for `currency`.
#[must_use]
pub fn minor_unit_exponent(currency: &str) -> u32 {
    if ZERO_DECIMAL_CURRENCIES
        .iter()
        .any(|c| c.eq_ignore_ascii_case(currency))
    {
        0
    } else {
        2
    }
}

/// Checks that `amount` can be charged in `currency` and stored without
/// rounding. Trailing zeros are not counted.
///
/// # Errors
///
/// Returns [`MarketError::Validation`] if the amount carries more
/// fractional digits than the currency's minor unit.
pub fn check_precision(amount: Decimal, currency: &str) -> Result<(), MarketError> {
    let allowed = minor_unit_exponent(currency).min(MAX_SCALE);
    if amount.normalize().scale() > allowed {
        return Err(MarketError::Validation(format!(
            "{amount} has more than {allowed} decimal places for {currency}"
        )));
    }
    Ok(())
}

/// Converts an amount to the gateway's integer minor units.
///
/// # Errors
///
/// Returns [`MarketError::Validation`] if the amount has more precision
/// than the currency allows, or does not fit in an `i64`.
pub fn to_minor_units(amount: Decimal, currency: &str) -> Result<i64, MarketError> {
    let scaled = amount * Decimal::from(10_i64.pow(minor_unit_exponent(currency)));
    if scaled.fract() != Decimal::ZERO {
        return Err(MarketError::Validation(format!(
            "{amount} {currency} is not representable in minor units"
        )));
    }
    scaled
        .to_i64()
        .ok_or_else(|| MarketError::Validation(format!("{amount} {currency} is out of range")))
}

/// Converts gateway minor units back to an amount.
#[must_use]
pub fn from_minor_units(minor: i64, currency: &str) -> Decimal {
    Decimal::new(minor, minor_unit_exponent(currency))
}
