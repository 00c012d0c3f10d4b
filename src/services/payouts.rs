//! Payout and floor-price calculators. Pure financial functions.

use alloy::primitives::U256;

use crate::error::TreasuryError;
use crate::services::metadata::MAX_CASH_OUT_TAX_RATE;

/// Sentinel for an unlimited payout limit: the maximum value of the
/// on-chain `uint224` amount field. The comparison is exact, never an
/// "above some threshold" approximation.
pub const UNLIMITED_PAYOUT_LIMIT: U256 =
    U256::from_limbs([u64::MAX, u64::MAX, u64::MAX, u32::MAX as u64]);

/// Remaining distributable payout under a rolling limit.
///
/// Three distinct cases, deliberately not collapsed into one clamp:
/// - `limit == 0`: payouts are disabled, nothing is distributable.
/// - `limit == UNLIMITED_PAYOUT_LIMIT`: everything in the terminal is.
/// - otherwise: whatever of the limit is not yet used.
pub fn distributable_payout(limit: U256, used: U256, terminal_balance: U256) -> U256 {
    if limit.is_zero() {
        U256::ZERO
    } else if limit == UNLIMITED_PAYOUT_LIMIT {
        terminal_balance
    } else {
        limit.saturating_sub(used)
    }
}

/// Bonding-curve cash-out value (floor price).
///
/// For a redeemed fraction `x = tokens / total_supply` and tax rate `r`
/// (basis points converted to 0-1), the returned fraction of the treasury
/// is `y = x * ((1 - r) + r * x)`. At `r = 0` this is linear redemption;
/// at `r = 1` it degenerates to `y = x^2`, under-paying small redemptions
/// relative to linear.
pub fn cash_out_value(
    tokens_to_redeem: f64,
    total_supply: f64,
    balance: f64,
    cash_out_tax_rate: u16,
) -> Result<f64, TreasuryError> {
    if cash_out_tax_rate > MAX_CASH_OUT_TAX_RATE {
        return Err(TreasuryError::Decode(format!(
            "cashOutTaxRate {} exceeds {} basis points",
            cash_out_tax_rate, MAX_CASH_OUT_TAX_RATE
        )));
    }
    if total_supply <= 0.0 || tokens_to_redeem <= 0.0 || balance <= 0.0 {
        return Ok(0.0);
    }

    let x = (tokens_to_redeem / total_supply).min(1.0);
    let r = cash_out_tax_rate as f64 / MAX_CASH_OUT_TAX_RATE as f64;
    let y = x * ((1.0 - r) + r * x);
    Ok(y * balance)
}

/// Lossy conversion for ratio math over raw token amounts.
pub fn to_float(amount: U256) -> f64 {
    amount.to_string().parse::<f64>().unwrap_or(f64::MAX)
}
