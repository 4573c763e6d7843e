//! Outgoing currency movement
//!
//! The engine never pushes currency as a side effect of someone else's
//! trade; it only pays the caller of `burn` or `withdraw_fees`. Transfers go
//! through `CurrencyTransfer`, which is allowed to fail.

use bondline_core::prelude::*;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Failure reported by a currency transfer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("recipient {0} rejected the transfer")]
    Rejected(Address),

    #[error("transfer to the zero address")]
    ZeroRecipient,

    #[error("recipient balance overflow")]
    Overflow,
}

/// Moves base currency out of a token engine
pub trait CurrencyTransfer: Send + Sync {
    fn transfer(&self, to: &Address, amount: U256) -> std::result::Result<(), TransferError>;
}

/// In-process currency bank: credits recipients and can be told to refuse
/// specific addresses.
#[derive(Default)]
pub struct MemoryBank {
    balances: RwLock<HashMap<Address, U256>>,
    rejecting: RwLock<HashSet<Address>>,
}

impl MemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, account: &Address) -> U256 {
        self.balances.read().get(account).copied().unwrap_or_default()
    }

    /// Make every future transfer to `account` fail
    pub fn reject(&self, account: Address) {
        self.rejecting.write().insert(account);
    }

    pub fn accept(&self, account: &Address) {
        self.rejecting.write().remove(account);
    }
}

impl CurrencyTransfer for MemoryBank {
    fn transfer(&self, to: &Address, amount: U256) -> std::result::Result<(), TransferError> {
        if to.is_zero() {
            return Err(TransferError::ZeroRecipient);
        }
        if self.rejecting.read().contains(to) {
            return Err(TransferError::Rejected(*to));
        }
        let mut balances = self.balances.write();
        let entry = balances.entry(*to).or_default();
        *entry = entry.checked_add(amount).ok_or(TransferError::Overflow)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_bank_credits() {
        let bank = MemoryBank::new();
        let alice = Address::from_label("alice");
        bank.transfer(&alice, U256::from(10u64)).unwrap();
        bank.transfer(&alice, U256::from(5u64)).unwrap();
        assert_eq!(bank.balance_of(&alice), U256::from(15u64));
    }

    #[test]
    fn test_memory_bank_rejects() {
        let bank = MemoryBank::new();
        let mallory = Address::from_label("mallory");
        bank.reject(mallory);
        assert_eq!(
            bank.transfer(&mallory, U256::one()),
            Err(TransferError::Rejected(mallory))
        );
        bank.accept(&mallory);
        assert!(bank.transfer(&mallory, U256::one()).is_ok());
        assert_eq!(
            bank.transfer(&Address::ZERO, U256::one()),
            Err(TransferError::ZeroRecipient)
        );
    }
}
