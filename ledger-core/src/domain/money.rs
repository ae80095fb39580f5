//! Monetary amount rules

use rust_decimal::Decimal;

use super::result::{Error, Result};

/// Number of fractional digits the ledger stores
pub const CURRENCY_SCALE: u32 = 2;

/// Largest absolute value representable by a DECIMAL(18,2) column
pub fn max_amount() -> Decimal {
    Decimal::new(999_999_999_999_999_999, CURRENCY_SCALE)
}

/// Check that an amount fits the ledger's fixed-point precision.
///
/// Amounts are never rounded: `10.005` is rejected rather than stored as `10.01`.
fn check_precision(amount: Decimal) -> Result<()> {
    if amount.normalize().scale() > CURRENCY_SCALE {
        return Err(Error::invalid_amount(format!(
            "{} has more than {} decimal places",
            amount, CURRENCY_SCALE
        )));
    }
    if amount.abs() > max_amount() {
        return Err(Error::invalid_amount(format!("{} is out of range", amount)));
    }
    Ok(())
}

/// Validate the amount of a transfer: strictly positive, currency precision.
pub fn validate_transfer_amount(amount: Decimal) -> Result<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(Error::invalid_amount(format!(
            "{} must be greater than zero",
            amount
        )));
    }
    check_precision(amount)?;
    Ok(amount.round_dp(CURRENCY_SCALE))
}

/// Validate an opening balance: zero or positive, currency precision.
pub fn validate_opening_balance(balance: Decimal) -> Result<Decimal> {
    if balance.is_sign_negative() && !balance.is_zero() {
        return Err(Error::invalid_amount(format!(
            "opening balance {} cannot be negative",
            balance
        )));
    }
    check_precision(balance)?;
    Ok(balance.round_dp(CURRENCY_SCALE))
}
