//! Round-up Math
//!
//! Works on raw token base units so the result matches what the savings
//! contract will move on-chain.

use crate::error::{RelayError, RelayResult};
use alloy::primitives::{
    utils::{format_units, parse_units, ParseUnits},
    U256,
};
use serde::{Deserialize, Serialize};

/// Result of rounding a purchase up to the next increment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundUp {
    /// Purchase amount as spent
    pub amount: U256,
    /// Increment the purchase was rounded to
    pub increment: U256,
    /// Purchase amount rounded up to the increment
    pub rounded: U256,
    /// Spare change to sweep into savings
    pub savings: U256,
}

impl RoundUp {
    /// True when the purchase already sits on an increment boundary
    pub fn is_zero(&self) -> bool {
        self.savings.is_zero()
    }
}

/// Round `amount` up to the next multiple of `increment`.
///
/// `rounded = ceil(amount / increment) * increment`, `savings = rounded - amount`.
pub fn round_up(amount: U256, increment: U256) -> RelayResult<RoundUp> {
    if increment.is_zero() {
        return Err(RelayError::InvalidIncrement);
    }

    let remainder = amount % increment;
    let savings = if remainder.is_zero() {
        U256::ZERO
    } else {
        increment - remainder
    };

    let rounded = amount
        .checked_add(savings)
        .ok_or(RelayError::MathOverflow { amount, increment })?;

    Ok(RoundUp {
        amount,
        increment,
        rounded,
        savings,
    })
}

/// Convert a human increment ("1", "0.50") into base units
pub fn increment_from_units(value: &str, decimals: u8) -> RelayResult<U256> {
    match parse_units(value, decimals) {
        Ok(ParseUnits::U256(units)) => Ok(units),
        Ok(ParseUnits::I256(_)) => Err(RelayError::InvalidConfig(format!(
            "bad amount {value:?}: must not be negative"
        ))),
        Err(e) => Err(RelayError::InvalidConfig(format!("bad amount {value:?}: {e}"))),
    }
}

/// Render base units for logs, e.g. `1500000` with 6 decimals -> `1.500000`
pub fn display_units(value: U256, decimals: u8) -> String {
    format_units(value, decimals).unwrap_or_else(|_| value.to_string())
}
