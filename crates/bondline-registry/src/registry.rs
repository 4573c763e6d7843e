//! # Token Registry
//!
//! Launches token engines and indexes them. The registry is a single-writer
//! object: every mutation takes `&mut self`, and the engines it creates are
//! shared out as `Arc<TokenEngine>`.
//!
//! ## Launch
//!
//! ```text
//!   validate ─► symbol free? ─► payment > fee ─► TokenEngine::new
//!            ─► factory_mint(payment - fee) to creator ─► record
//! ```
//!
//! Nothing is recorded until the engine has accepted its initial mint, so a
//! failed launch leaves the registry untouched.

use crate::config::{LaunchRequest, RegistryConfig};
use bondline_core::prelude::*;
use bondline_token::{CurrencyTransfer, TokenEngine, TokenParams};
use std::collections::HashMap;
use std::sync::Arc;

/// A token launched through the registry
#[derive(Clone, Debug)]
pub struct LaunchedToken {
    pub id: TokenId,
    /// Launch order, starting at 0
    pub sequence: u64,
    pub creator: Address,
    pub engine: Arc<TokenEngine>,
}

pub struct Registry {
    config: RegistryConfig,
    /// Identity the registry uses as factory for its engines
    address: Address,
    transfer: Arc<dyn CurrencyTransfer>,
    tokens: Vec<LaunchedToken>,
    by_id: HashMap<TokenId, usize>,
    by_symbol: HashMap<String, usize>,
    by_creator: HashMap<Address, Vec<usize>>,
    /// Creation fees collected and not yet withdrawn by the owner
    collected_fees: U256,
}

impl Registry {
    pub fn new(config: RegistryConfig, transfer: Arc<dyn CurrencyTransfer>) -> Result<Self> {
        config.validate()?;
        let address = Address::from_label(&format!("bondline-registry:{}", config.owner));
        tracing::info!(
            owner = %config.owner,
            registry = %address,
            creation_fee = %config.creation_fee,
            "registry initialised"
        );
        Ok(Self {
            config,
            address,
            transfer,
            tokens: Vec::new(),
            by_id: HashMap::new(),
            by_symbol: HashMap::new(),
            by_creator: HashMap::new(),
            collected_fees: U256::zero(),
        })
    }

    /// Launch a token for `creator`, who sends `payment` currency. The
    /// creation fee is kept; the rest buys the creator's initial position.
    pub fn launch(&mut self, creator: &Address, request: LaunchRequest, payment: U256) -> Result<LaunchedToken> {
        let result = self.try_launch(creator, request, payment);
        if let Err(err) = &result {
            tracing::warn!(%creator, code = err.code(), error = %err, "launch rejected");
        }
        result
    }

    fn try_launch(&mut self, creator: &Address, request: LaunchRequest, payment: U256) -> Result<LaunchedToken> {
        request.validate(&self.config)?;
        let symbol_key = request.symbol_key();
        if self.by_symbol.contains_key(&symbol_key) {
            return Err(BondlineError::SymbolTaken(request.symbol));
        }
        if payment <= self.config.creation_fee {
            return Err(BondlineError::InsufficientPayment {
                required: self.config.creation_fee,
                provided: payment,
            });
        }
        let initial_deposit = payment - self.config.creation_fee;
        let collected_fees = self
            .collected_fees
            .checked_add(self.config.creation_fee)
            .ok_or(BondlineError::ArithmeticOverflow)?;

        let params = TokenParams {
            name: request.name,
            symbol: request.symbol,
            creator: *creator,
            base_price: request.base_price,
            curve_coefficient: request.curve_coefficient,
            min_reserve_ratio: request.min_reserve_ratio,
            protocol_fee_recipient: self.config.protocol_fee_recipient(),
            description: request.description,
            image_uri: request.image_uri,
        };
        let engine = TokenEngine::new(
            params,
            self.config.engine.clone(),
            self.address,
            Arc::clone(&self.transfer),
        )?;
        let receipt = engine.factory_mint(&self.address, creator, initial_deposit)?;

        let sequence = self.tokens.len() as u64;
        let id = TokenId::derive(creator, &symbol_key, sequence);
        let token = LaunchedToken {
            id,
            sequence,
            creator: *creator,
            engine: Arc::new(engine),
        };

        self.collected_fees = collected_fees;
        let index = self.tokens.len();
        self.by_id.insert(id, index);
        self.by_symbol.insert(symbol_key, index);
        self.by_creator.entry(*creator).or_default().push(index);
        self.tokens.push(token.clone());

        tracing::info!(
            token = %token.engine.symbol(),
            %id,
            %creator,
            initial_tokens = %receipt.tokens_out,
            initial_deposit = %initial_deposit,
            "token launched"
        );
        Ok(token)
    }

    /// Pay collected creation fees to the owner
    pub fn withdraw_creation_fees(&mut self, caller: &Address) -> Result<U256> {
        if *caller != self.config.owner {
            return Err(BondlineError::Unauthorized);
        }
        let amount = self.collected_fees;
        if amount.is_zero() {
            return Err(BondlineError::NoFeesOwed);
        }

        self.collected_fees = U256::zero();
        if let Err(err) = self.transfer.transfer(caller, amount) {
            self.collected_fees = amount;
            tracing::warn!(owner = %caller, %amount, error = %err, "creation fee payout failed");
            return Err(BondlineError::TransferFailed(err.to_string()));
        }
        tracing::info!(owner = %caller, %amount, "creation fees withdrawn");
        Ok(amount)
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn collected_fees(&self) -> U256 {
        self.collected_fees
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn get(&self, id: &TokenId) -> Result<&LaunchedToken> {
        self.by_id
            .get(id)
            .map(|&index| &self.tokens[index])
            .ok_or_else(|| BondlineError::TokenNotFound(id.to_hex()))
    }

    /// Case-insensitive symbol lookup
    pub fn by_symbol(&self, symbol: &str) -> Option<&LaunchedToken> {
        self.by_symbol
            .get(&symbol.to_ascii_uppercase())
            .map(|&index| &self.tokens[index])
    }

    pub fn is_symbol_taken(&self, symbol: &str) -> bool {
        self.by_symbol.contains_key(&symbol.to_ascii_uppercase())
    }

    pub fn tokens_by_creator(&self, creator: &Address) -> Vec<&LaunchedToken> {
        self.by_creator
            .get(creator)
            .map(|indices| indices.iter().map(|&index| &self.tokens[index]).collect())
            .unwrap_or_default()
    }

    /// Every token in launch order
    pub fn all_tokens(&self) -> &[LaunchedToken] {
        &self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bondline_token::MemoryBank;

    fn owner() -> Address {
        Address::from_label("owner")
    }

    fn registry() -> (Registry, Arc<MemoryBank>) {
        let bank = Arc::new(MemoryBank::new());
        let registry = Registry::new(RegistryConfig::new(owner()), bank.clone()).unwrap();
        (registry, bank)
    }

    fn frog() -> LaunchRequest {
        LaunchRequest::new("Frog", "FROG", U256::exp10(15), U256::exp10(8))
    }

    #[test]
    fn test_launch_records_token() {
        let (mut registry, _) = registry();
        let creator = Address::from_label("creator");
        let token = registry.launch(&creator, frog(), U256::exp10(18)).unwrap();

        assert_eq!(token.sequence, 0);
        assert_eq!(registry.token_count(), 1);
        assert_eq!(registry.get(&token.id).unwrap().id, token.id);
        assert!(registry.by_symbol("frog").is_some());
        assert_eq!(registry.tokens_by_creator(&creator).len(), 1);
        assert_eq!(registry.collected_fees(), registry.config().creation_fee);

        let engine = &token.engine;
        assert!(engine.is_initialized());
        assert!(engine.balance_of(&creator) > U256::zero());
        assert_eq!(engine.reserve_balance(), U256::exp10(18) - registry.config().creation_fee);
    }

    #[test]
    fn test_payment_must_exceed_fee() {
        let (mut registry, _) = registry();
        let fee = registry.config().creation_fee;
        let result = registry.launch(&Address::from_label("c"), frog(), fee);
        assert!(matches!(result, Err(BondlineError::InsufficientPayment { .. })));
        assert_eq!(registry.token_count(), 0);
        assert!(registry.collected_fees().is_zero());
    }

    #[test]
    fn test_unknown_token() {
        let (registry, _) = registry();
        let missing = TokenId::new([7u8; 32]);
        assert!(matches!(registry.get(&missing), Err(BondlineError::TokenNotFound(_))));
    }

    #[test]
    fn test_withdraw_creation_fees() {
        let (mut registry, bank) = registry();
        registry
            .launch(&Address::from_label("c"), frog(), U256::exp10(18))
            .unwrap();

        assert_eq!(
            registry.withdraw_creation_fees(&Address::from_label("c")),
            Err(BondlineError::Unauthorized)
        );

        bank.reject(owner());
        assert!(matches!(
            registry.withdraw_creation_fees(&owner()),
            Err(BondlineError::TransferFailed(_))
        ));
        let fee = registry.config().creation_fee;
        assert_eq!(registry.collected_fees(), fee);

        bank.accept(&owner());
        assert_eq!(registry.withdraw_creation_fees(&owner()).unwrap(), fee);
        assert_eq!(bank.balance_of(&owner()), fee);
        assert_eq!(registry.withdraw_creation_fees(&owner()), Err(BondlineError::NoFeesOwed));
    }
}
