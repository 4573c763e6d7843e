//! Token balance ledger (ERC-20 semantics)
//!
//! Invariant: `total_supply == Σ balances`.

use crate::journal::Journal;
use bondline_core::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug)]
enum LedgerUndo {
    Balance(Address, U256),
    Allowance(Address, Address, U256),
    Supply(U256),
}

/// Balances, allowances and circulating supply for one token
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    balances: BTreeMap<Address, U256>,
    /// owner -> spender -> remaining allowance
    allowances: BTreeMap<Address, BTreeMap<Address, U256>>,
    total_supply: U256,
    #[serde(skip)]
    journal: Journal<LedgerUndo>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    pub fn balance_of(&self, account: &Address) -> U256 {
        self.balances.get(account).copied().unwrap_or_default()
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> U256 {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or_default()
    }

    /// Number of accounts with a non-zero balance
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    pub fn holders(&self) -> impl Iterator<Item = (&Address, &U256)> {
        self.balances.iter()
    }

    /// Create `amount` new tokens for `to`
    pub fn mint(&mut self, to: &Address, amount: U256) -> Result<()> {
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(BondlineError::ArithmeticOverflow)?;
        let balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(BondlineError::ArithmeticOverflow)?;
        self.set_supply(supply);
        self.set_balance(to, balance);
        Ok(())
    }

    /// Destroy `amount` of `from`'s tokens
    pub fn burn(&mut self, from: &Address, amount: U256) -> Result<()> {
        let balance = self.debit_amount(from, amount)?;
        self.set_supply(self.total_supply - amount);
        self.set_balance(from, balance);
        Ok(())
    }

    pub fn transfer(&mut self, from: &Address, to: &Address, amount: U256) -> Result<()> {
        if to.is_zero() {
            return Err(BondlineError::InvalidParameter(
                "transfer to the zero address".into(),
            ));
        }
        let from_balance = self.debit_amount(from, amount)?;
        self.set_balance(from, from_balance);
        let to_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(BondlineError::ArithmeticOverflow)?;
        self.set_balance(to, to_balance);
        Ok(())
    }

    pub fn approve(&mut self, owner: &Address, spender: &Address, amount: U256) -> Result<()> {
        if spender.is_zero() {
            return Err(BondlineError::InvalidParameter(
                "approve to the zero address".into(),
            ));
        }
        let previous = self.allowance(owner, spender);
        self.journal.record(LedgerUndo::Allowance(*owner, *spender, previous));
        self.write_allowance(owner, spender, amount);
        Ok(())
    }

    /// Consume allowance; `U256::MAX` is treated as unlimited
    pub fn spend_allowance(&mut self, owner: &Address, spender: &Address, amount: U256) -> Result<()> {
        let current = self.allowance(owner, spender);
        if current == U256::MAX {
            return Ok(());
        }
        if current < amount {
            return Err(BondlineError::InsufficientAllowance {
                required: amount,
                available: current,
            });
        }
        self.approve(owner, spender, current - amount)
    }

    /// `total_supply == Σ balances`
    pub fn is_conserved(&self) -> bool {
        let mut sum = U256::zero();
        for balance in self.balances.values() {
            match sum.checked_add(*balance) {
                Some(next) => sum = next,
                None => return false,
            }
        }
        sum == self.total_supply
    }

    fn debit_amount(&self, account: &Address, amount: U256) -> Result<U256> {
        let balance = self.balance_of(account);
        balance
            .checked_sub(amount)
            .ok_or(BondlineError::InsufficientBalance {
                required: amount,
                available: balance,
            })
    }

    /// Start recording undo entries for every write
    pub(crate) fn checkpoint(&mut self) {
        self.journal.begin();
    }

    pub(crate) fn commit(&mut self) {
        self.journal.commit();
    }

    /// Undo every write since `checkpoint`
    pub(crate) fn revert(&mut self) {
        let undo: Vec<_> = self.journal.rewind().collect();
        for entry in undo {
            match entry {
                LedgerUndo::Balance(account, balance) => self.write_balance(&account, balance),
                LedgerUndo::Allowance(owner, spender, amount) => {
                    self.write_allowance(&owner, &spender, amount)
                }
                LedgerUndo::Supply(supply) => self.total_supply = supply,
            }
        }
    }

    fn set_supply(&mut self, supply: U256) {
        self.journal.record(LedgerUndo::Supply(self.total_supply));
        self.total_supply = supply;
    }

    fn set_balance(&mut self, account: &Address, balance: U256) {
        let previous = self.balance_of(account);
        self.journal.record(LedgerUndo::Balance(*account, previous));
        self.write_balance(account, balance);
    }

    fn write_allowance(&mut self, owner: &Address, spender: &Address, amount: U256) {
        let spenders = self.allowances.entry(*owner).or_default();
        if amount.is_zero() {
            spenders.remove(spender);
        } else {
            spenders.insert(*spender, amount);
        }
        if spenders.is_empty() {
            self.allowances.remove(owner);
        }
    }

    fn write_balance(&mut self, account: &Address, balance: U256) {
        if balance.is_zero() {
            self.balances.remove(account);
        } else {
            self.balances.insert(*account, balance);
        }
    }
}
