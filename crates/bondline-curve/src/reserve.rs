//! # Reserve Backing
//!
//! The reserve ledger holds the currency that backs circulating tokens. The
//! backing ratio compares it against the exact curve integral of the supply:
//!
//! ```text
//!   ratio = min(10000, reserve · 10000 / integral(supply))    [bps]
//! ```
//!
//! An empty supply (or one too small to have any curve value) is treated as
//! fully backed.

use crate::curve::BondingCurve;
use bondline_core::prelude::*;
use serde::{Deserialize, Serialize};

/// Backing ratio in basis points, capped at `MAX_RATIO`
pub fn backing_ratio(curve: &BondingCurve, supply: U256, reserve: U256) -> Result<u32> {
    if supply.is_zero() {
        return Ok(MAX_RATIO);
    }
    let value = curve.integral(supply)?;
    if value.is_zero() {
        return Ok(MAX_RATIO);
    }
    // compared in 512 bits: a huge reserve over a tiny value still caps
    let ratio = reserve.full_mul(U256::from(BPS_DENOMINATOR)) / U512::from(value);
    if ratio >= U512::from(MAX_RATIO) {
        Ok(MAX_RATIO)
    } else {
        Ok(ratio.low_u32())
    }
}

/// A ratio is healthy when it meets the floor
pub fn is_healthy(ratio: u32, floor: u32) -> bool {
    ratio >= floor
}

/// Currency balance backing one token
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveLedger {
    balance: U256,
}

impl ReserveLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(balance: U256) -> Self {
        Self { balance }
    }

    pub fn balance(&self) -> U256 {
        self.balance
    }

    pub fn deposit(&mut self, amount: U256) -> Result<()> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(BondlineError::ArithmeticOverflow)?;
        Ok(())
    }

    pub fn withdraw(&mut self, amount: U256) -> Result<()> {
        if amount > self.balance {
            return Err(BondlineError::InsufficientReserve {
                required: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        Ok(())
    }

    /// Current backing ratio for `supply`
    pub fn ratio(&self, curve: &BondingCurve, supply: U256) -> Result<u32> {
        backing_ratio(curve, supply, self.balance)
    }

    /// Ratio after `withdrawal` leaves the reserve and supply drops to `supply_after`
    pub fn projected_ratio(
        &self,
        curve: &BondingCurve,
        supply_after: U256,
        withdrawal: U256,
    ) -> Result<u32> {
        let remaining = self.balance.checked_sub(withdrawal).ok_or(
            BondlineError::InsufficientReserve {
                required: withdrawal,
                available: self.balance,
            },
        )?;
        backing_ratio(curve, supply_after, remaining)
    }

    pub fn is_healthy(&self, curve: &BondingCurve, supply: U256, floor: u32) -> Result<bool> {
        Ok(is_healthy(self.ratio(curve, supply)?, floor))
    }
}
