//! # Fee Accrual
//!
//! Pull-payment ledger for the spread and protocol fee streams. Fees are only
//! credited during trades; currency leaves the engine when a beneficiary
//! calls `withdraw`, so a recipient that cannot receive funds never blocks
//! anyone else's mint or burn.

use crate::journal::Journal;
use bondline_core::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Split of a gross amount into the two fee streams and the remainder
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    pub spread: U256,
    pub protocol_fee: U256,
    pub net: U256,
}

impl FeeSplit {
    /// Both fees round down; the remainder stays with `net`
    pub fn compute(gross: U256, spread_bps: u32, protocol_bps: u32) -> Self {
        let denominator = U256::from(BPS_DENOMINATOR);
        let spread = gross.full_mul(U256::from(spread_bps)) / U512::from(denominator);
        let protocol_fee = gross.full_mul(U256::from(protocol_bps)) / U512::from(denominator);
        // each fee is at most gross when bps <= 10000, so both narrow losslessly
        let spread = U256::try_from(spread).unwrap_or(gross);
        let protocol_fee = U256::try_from(protocol_fee).unwrap_or(gross);
        let net = gross.saturating_sub(spread).saturating_sub(protocol_fee);
        Self {
            spread,
            protocol_fee,
            net,
        }
    }

    /// No fees at all
    pub fn exempt(gross: U256) -> Self {
        Self {
            spread: U256::zero(),
            protocol_fee: U256::zero(),
            net: gross,
        }
    }

    pub fn total_fees(&self) -> U256 {
        self.spread + self.protocol_fee
    }
}

/// Accrued, unwithdrawn fee balances
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeAccrual {
    pending: BTreeMap<Address, U256>,
    total_accrued: U256,
    /// Previous (beneficiary, pending, total) for each write
    #[serde(skip)]
    journal: Journal<(Address, U256, U256)>,
}

impl FeeAccrual {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` to `beneficiary`. Zero amounts are skipped and
    /// reported as `false`.
    pub fn credit(&mut self, beneficiary: &Address, amount: U256) -> Result<bool> {
        if amount.is_zero() {
            return Ok(false);
        }
        let total = self
            .total_accrued
            .checked_add(amount)
            .ok_or(BondlineError::ArithmeticOverflow)?;
        let owed = self
            .pending(beneficiary)
            .checked_add(amount)
            .ok_or(BondlineError::ArithmeticOverflow)?;
        self.set(beneficiary, owed, total);
        Ok(true)
    }

    /// Zero the caller's balance and return what was owed. The caller is
    /// responsible for moving the currency afterwards.
    pub fn withdraw(&mut self, caller: &Address) -> Result<U256> {
        let owed = self.pending(caller);
        if owed.is_zero() {
            return Err(BondlineError::NoFeesOwed);
        }
        self.set(caller, U256::zero(), self.total_accrued - owed);
        Ok(owed)
    }

    pub fn pending(&self, beneficiary: &Address) -> U256 {
        self.pending.get(beneficiary).copied().unwrap_or_default()
    }

    /// Aggregate outstanding liability
    pub fn total_accrued(&self) -> U256 {
        self.total_accrued
    }

    pub fn beneficiaries(&self) -> impl Iterator<Item = (&Address, &U256)> {
        self.pending.iter()
    }

    pub(crate) fn checkpoint(&mut self) {
        self.journal.begin();
    }

    pub(crate) fn commit(&mut self) {
        self.journal.commit();
    }

    /// Undo every credit and withdrawal since `checkpoint`
    pub(crate) fn revert(&mut self) {
        let undo: Vec<_> = self.journal.rewind().collect();
        for (beneficiary, pending, total) in undo {
            self.write(&beneficiary, pending, total);
        }
    }

    fn set(&mut self, beneficiary: &Address, pending: U256, total: U256) {
        let previous = (*beneficiary, self.pending(beneficiary), self.total_accrued);
        self.journal.record(previous);
        self.write(beneficiary, pending, total);
    }

    fn write(&mut self, beneficiary: &Address, pending: U256, total: U256) {
        if pending.is_zero() {
            self.pending.remove(beneficiary);
        } else {
            self.pending.insert(*beneficiary, pending);
        }
        self.total_accrued = total;
    }

    /// `total_accrued == Σ pending`
    pub fn is_consistent(&self) -> bool {
        let mut sum = U256::zero();
        for amount in self.pending.values() {
            match sum.checked_add(*amount) {
                Some(next) => sum = next,
                None => return false,
            }
        }
        sum == self.total_accrued
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_split() {
        let split = FeeSplit::compute(U256::from(10_000u64), 100, 50);
        assert_eq!(split.spread, U256::from(100u64));
        assert_eq!(split.protocol_fee, U256::from(50u64));
        assert_eq!(split.net, U256::from(9_850u64));
        assert_eq!(split.total_fees(), U256::from(150u64));
    }

    #[test]
    fn test_fee_split_rounds_down() {
        let split = FeeSplit::compute(U256::from(99u64), 100, 50);
        assert!(split.spread.is_zero());
        assert!(split.protocol_fee.is_zero());
        assert_eq!(split.net, U256::from(99u64));
    }

    #[test]
    fn test_credit_skips_zero() {
        let mut fees = FeeAccrual::new();
        let creator = Address::from_label("creator");
        assert!(!fees.credit(&creator, U256::zero()).unwrap());
        assert!(fees.credit(&creator, U256::from(7u64)).unwrap());
        assert!(fees.credit(&creator, U256::from(3u64)).unwrap());
        assert_eq!(fees.pending(&creator), U256::from(10u64));
        assert_eq!(fees.total_accrued(), U256::from(10u64));
    }

    #[test]
    fn test_withdraw_zeroes_balance() {
        let mut fees = FeeAccrual::new();
        let (a, b) = (Address::from_label("a"), Address::from_label("b"));
        fees.credit(&a, U256::from(5u64)).unwrap();
        fees.credit(&b, U256::from(9u64)).unwrap();

        assert_eq!(fees.withdraw(&a).unwrap(), U256::from(5u64));
        assert!(fees.pending(&a).is_zero());
        assert_eq!(fees.total_accrued(), U256::from(9u64));
        assert_eq!(fees.withdraw(&a), Err(BondlineError::NoFeesOwed));
        assert!(fees.is_consistent());
    }

    #[test]
    fn test_revert_undoes_credit_and_withdraw() {
        let mut fees = FeeAccrual::new();
        let (a, b) = (Address::from_label("a"), Address::from_label("b"));
        fees.credit(&a, U256::from(5u64)).unwrap();
        let before = fees.clone();

        fees.checkpoint();
        fees.withdraw(&a).unwrap();
        fees.credit(&b, U256::from(9u64)).unwrap();
        fees.revert();

        assert_eq!(fees, before);
        assert_eq!(fees.pending(&a), U256::from(5u64));
        assert!(fees.pending(&b).is_zero());
        assert!(fees.is_consistent());
    }
}
