//! Conversion between user-entered amounts and integer minor units.
//!
//! Amounts are parsed as decimals, never floats, and rounded half away from
//! zero to two places before scaling.

use crate::error::{Error, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Minor units per major currency unit.
const MINOR_PER_UNIT: u64 = 100;

/// Preset donation amounts offered to listeners, in minor units.
pub const PRESET_AMOUNTS: [u64; 4] = [500, 1_000, 2_000, 5_000];

/// Convert a decimal amount such as `"5.00"` or `"$12.345"` to minor units.
///
/// # Errors
///
/// Returns a validation error for malformed, negative or overflowing input.
pub fn minor_units(input: &str) -> Result<u64> {
    let trimmed = input.trim();
    let digits = trimmed.strip_prefix('$').unwrap_or(trimmed).trim();
    if digits.is_empty() {
        return Err(Error::Validation("amount is required".into()));
    }

    let value = Decimal::from_str(digits)
        .map_err(|_| Error::Validation(format!("invalid amount: {input}")))?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(Error::Validation(format!("amount cannot be negative: {input}")));
    }

    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|scaled| scaled.to_u64())
        .ok_or_else(|| Error::Validation(format!("amount out of range: {input}")))
}

/// Parse a donation amount and enforce the minimum.
///
/// # Errors
///
/// Returns a validation error for malformed input or amounts below `minimum`.
pub fn parse_donation_amount(input: &str, minimum: u64) -> Result<u64> {
    let minor = minor_units(input)?;
    ensure_minimum(minor, minimum)?;
    Ok(minor)
}

/// Reject totals below `minimum` minor units.
///
/// # Errors
///
/// Returns a validation error naming the minimum.
pub fn ensure_minimum(minor: u64, minimum: u64) -> Result<()> {
    if minor < minimum {
        return Err(Error::Validation(format!(
            "minimum amount is ${}",
            display_amount(minimum)
        )));
    }
    Ok(())
}

/// Render minor units as `"D.CC"`.
#[must_use]
pub fn display_amount(minor: u64) -> String {
    format!("{}.{:02}", minor / MINOR_PER_UNIT, minor % MINOR_PER_UNIT)
}
