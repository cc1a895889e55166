//! Money helpers
//!
//! Amounts travel as `Decimal` and are persisted as integer minor units so
//! that balance deltas stay exact inside single-statement SQL updates.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{Error, Result};

/// Fractional digits kept for every amount
pub const CURRENCY_SCALE: u32 = 2;

/// Round an amount to currency precision (half away from zero)
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Validate a transaction amount and convert it to cents
///
/// The amount is rounded to 2 fractional digits first; anything that is not
/// strictly positive after rounding is rejected.
pub fn amount_to_cents(amount: Decimal) -> Result<i64> {
    let rounded = round_currency(amount);
    if rounded <= Decimal::ZERO {
        return Err(Error::Validation(
            "Amount must be greater than zero".to_string(),
        ));
    }
    to_cents(rounded)
}

/// Convert any (possibly negative) decimal to cents
pub fn to_cents(amount: Decimal) -> Result<i64> {
    (round_currency(amount) * Decimal::ONE_HUNDRED)
        .to_i64()
        .ok_or_else(|| Error::Validation(format!("Amount out of range: {}", amount)))
}

/// Convert cents back to a two-digit decimal
pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, CURRENCY_SCALE)
}
