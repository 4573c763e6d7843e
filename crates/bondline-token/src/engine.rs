//! # Token Engine
//!
//! One engine per launched token. It owns the balance ledger, the reserve,
//! the fee accrual and the pause gate, and runs every operation through a
//! single `execute` path:
//!
//! ```text
//!   lock ─► borrow state ─► checkpoint ─► checks + effects ─► refresh redemption flag
//!        ─► release borrow ─► currency payout ─► commit (or revert to checkpoint)
//! ```
//!
//! While a payout is in flight every other mutating call on the same engine
//! fails with `ReentrantCall`. Views stay available and see the effects of
//! the operation being paid out.
//!
//! ## States
//!
//! | paused | redemptions paused | mint | burn |
//! |--------|--------------------|------|------|
//! | no     | no                 | yes  | yes  |
//! | no     | yes                | yes  | no   |
//! | yes    | no                 | no   | no   |
//! | yes    | yes                | no   | no   |
//!
//! `redemptions_paused` is never set directly: it is recomputed from the live
//! backing ratio after every successful operation.
//!
//! Currency amounts passed to `mint`, `deposit_reserve` and `receive` are the
//! value sent along with the call; the engine records it as held currency.

use crate::config::{EngineConfig, TokenParams};
use crate::events::{EngineEvent, EventLog};
use crate::fees::{FeeAccrual, FeeSplit};
use crate::ledger::Ledger;
use crate::pause::PauseGate;
use crate::treasury::CurrencyTransfer;
use bondline_core::prelude::*;
use bondline_curve::{BondingCurve, ReserveLedger};
use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

/// Immutable identity and curve parameters
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
    pub creator: Address,
    /// Only caller allowed to perform the first mint
    pub factory: Address,
    pub protocol_fee_recipient: Address,
    pub base_price: U256,
    pub curve_coefficient: U256,
}

/// Mutable engine state
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    /// Backing floor in bps; only ever raised
    pub min_reserve_ratio: u32,
    pub ledger: Ledger,
    pub reserve: ReserveLedger,
    pub fees: FeeAccrual,
    pub pause: PauseGate,
    pub redemptions_paused: bool,
    /// Latch for the factory's one-shot mint
    pub initialized: bool,
    /// Currency actually held: reserve, unwithdrawn fees and rounding dust
    pub currency_balance: U256,
    pub description: String,
    pub image_uri: Option<String>,
}

impl EngineState {
    /// `reserve + total accrued fees <= currency held`
    pub fn is_solvent(&self) -> bool {
        self.reserve
            .balance()
            .checked_add(self.fees.total_accrued())
            .map_or(false, |owed| owed <= self.currency_balance)
    }

    /// Open undo journals on the ledgers and capture the scalar fields
    fn checkpoint(&mut self) -> Checkpoint {
        self.ledger.checkpoint();
        self.fees.checkpoint();
        Checkpoint {
            min_reserve_ratio: self.min_reserve_ratio,
            reserve: self.reserve.clone(),
            pause: self.pause.clone(),
            redemptions_paused: self.redemptions_paused,
            initialized: self.initialized,
            currency_balance: self.currency_balance,
            description: self.description.clone(),
            image_uri: self.image_uri.clone(),
        }
    }

    fn commit(&mut self) {
        self.ledger.commit();
        self.fees.commit();
    }

    fn revert(&mut self, checkpoint: Checkpoint) {
        self.ledger.revert();
        self.fees.revert();
        self.min_reserve_ratio = checkpoint.min_reserve_ratio;
        self.reserve = checkpoint.reserve;
        self.pause = checkpoint.pause;
        self.redemptions_paused = checkpoint.redemptions_paused;
        self.initialized = checkpoint.initialized;
        self.currency_balance = checkpoint.currency_balance;
        self.description = checkpoint.description;
        self.image_uri = checkpoint.image_uri;
    }

    fn refresh_redemptions(&mut self, curve: &BondingCurve) -> Result<()> {
        let ratio = self.reserve.ratio(curve, self.ledger.total_supply())?;
        self.redemptions_paused = ratio < self.min_reserve_ratio;
        Ok(())
    }

    fn receive_currency(&mut self, amount: U256) -> Result<()> {
        self.currency_balance = self
            .currency_balance
            .checked_add(amount)
            .ok_or(BondlineError::ArithmeticOverflow)?;
        Ok(())
    }

    fn release_currency(&mut self, amount: U256) -> Result<()> {
        self.currency_balance = self.currency_balance.checked_sub(amount).ok_or(
            BondlineError::InsufficientReserve {
                required: amount,
                available: self.currency_balance,
            },
        )?;
        Ok(())
    }
}

/// Scalar state before an operation; map writes are journaled separately
struct Checkpoint {
    min_reserve_ratio: u32,
    reserve: ReserveLedger,
    pause: PauseGate,
    redemptions_paused: bool,
    initialized: bool,
    currency_balance: U256,
    description: String,
    image_uri: Option<String>,
}

/// Serialisable copy of an engine
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub info: TokenInfo,
    pub config: EngineConfig,
    pub state: EngineState,
    #[serde(default)]
    pub events: EventLog,
}

/// Breakdown of a buy. Previews return exactly what `mint` would.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintReceipt {
    pub gross_in: U256,
    pub spread: U256,
    pub protocol_fee: U256,
    /// Amount added to the reserve
    pub net_deposit: U256,
    pub tokens_out: U256,
    /// Net deposit per whole token
    pub effective_price: U256,
    pub new_price: U256,
}

/// Breakdown of a sell. Previews return exactly what `burn` would.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnReceipt {
    pub tokens_in: U256,
    /// Amount leaving the reserve
    pub gross_out: U256,
    pub spread: U256,
    pub protocol_fee: U256,
    /// Amount paid to the seller
    pub net_out: U256,
    /// Gross proceeds per whole token
    pub effective_price: U256,
    pub new_price: U256,
    /// Backing ratio once the burn settles
    pub ratio_after: u32,
}

struct Payout {
    to: Address,
    amount: U256,
}

type Applied<T> = Result<(T, Option<Payout>)>;

struct Inner {
    state: EngineState,
    events: EventLog,
    /// Set while currency is being sent for a committed-in-memory operation
    payout_in_flight: bool,
}

/// Bonding-curve token engine
pub struct TokenEngine {
    info: TokenInfo,
    config: EngineConfig,
    curve: BondingCurve,
    inner: ReentrantMutex<RefCell<Inner>>,
    transfer: Arc<dyn CurrencyTransfer>,
}

impl TokenEngine {
    /// Create an engine. Bounds are re-checked here even when a registry has
    /// already validated them.
    pub fn new(
        params: TokenParams,
        config: EngineConfig,
        factory: Address,
        transfer: Arc<dyn CurrencyTransfer>,
    ) -> Result<Self> {
        params.validate()?;
        config.validate()?;
        if factory.is_zero() {
            return Err(BondlineError::InvalidParameter("factory is the zero address".into()));
        }

        let curve = BondingCurve::new(params.base_price, params.curve_coefficient)?
            .with_steps(config.quote_steps)?;
        let info = TokenInfo {
            name: params.name,
            symbol: params.symbol,
            creator: params.creator,
            factory,
            protocol_fee_recipient: params.protocol_fee_recipient,
            base_price: params.base_price,
            curve_coefficient: params.curve_coefficient,
        };
        let state = EngineState {
            min_reserve_ratio: params.min_reserve_ratio,
            description: params.description,
            image_uri: params.image_uri,
            ..EngineState::default()
        };

        tracing::info!(
            token = %info.symbol,
            creator = %info.creator,
            base_price = %info.base_price,
            coefficient = %info.curve_coefficient,
            min_reserve_ratio = state.min_reserve_ratio,
            "token engine created"
        );

        Ok(Self::assemble(info, config, curve, state, EventLog::default(), transfer))
    }

    /// Restore an engine from a snapshot. The redemption flag is re-derived
    /// and the ledger invariants are checked.
    pub fn from_snapshot(snapshot: EngineSnapshot, transfer: Arc<dyn CurrencyTransfer>) -> Result<Self> {
        let EngineSnapshot {
            info,
            config,
            mut state,
            events,
        } = snapshot;

        config.validate()?;
        if info.creator.is_zero() || info.factory.is_zero() || info.protocol_fee_recipient.is_zero() {
            return Err(BondlineError::InvalidParameter(
                "snapshot contains a zero address".into(),
            ));
        }
        if !(RATIO_FLOOR..=MAX_RATIO).contains(&state.min_reserve_ratio) {
            return Err(BondlineError::InvalidParameter(format!(
                "snapshot reserve floor {} out of range",
                state.min_reserve_ratio
            )));
        }
        if !state.ledger.is_conserved() {
            return Err(BondlineError::InvalidParameter(
                "snapshot supply does not match balances".into(),
            ));
        }
        if !state.fees.is_consistent() {
            return Err(BondlineError::InvalidParameter(
                "snapshot fee total does not match pending fees".into(),
            ));
        }
        if !state.is_solvent() {
            return Err(BondlineError::InvalidParameter(
                "snapshot reserve and fees exceed held currency".into(),
            ));
        }

        let curve = BondingCurve::new(info.base_price, info.curve_coefficient)?
            .with_steps(config.quote_steps)?;
        state.refresh_redemptions(&curve)?;

        tracing::debug!(token = %info.symbol, redemptions_paused = state.redemptions_paused, "engine restored");
        Ok(Self::assemble(info, config, curve, state, events, transfer))
    }

    fn assemble(
        info: TokenInfo,
        config: EngineConfig,
        curve: BondingCurve,
        state: EngineState,
        events: EventLog,
        transfer: Arc<dyn CurrencyTransfer>,
    ) -> Self {
        Self {
            info,
            config,
            curve,
            inner: ReentrantMutex::new(RefCell::new(Inner {
                state,
                events,
                payout_in_flight: false,
            })),
            transfer,
        }
    }

    // ------------------------------------------------------------------
    // Trading
    // ------------------------------------------------------------------

    /// Buy tokens with `amount` currency
    pub fn mint(&self, caller: &Address, amount: U256) -> Result<MintReceipt> {
        self.execute("mint", |state, events| {
            state.pause.ensure_active()?;
            let receipt = self.plan_mint(state, amount, self.fee_split(amount))?;
            self.settle_mint(state, events, caller, &receipt)?;
            self.credit_fees(state, events, receipt.spread, receipt.protocol_fee)?;
            Ok((receipt, None))
        })
    }

    /// Sell `tokens` back to the curve
    pub fn burn(&self, caller: &Address, tokens: U256) -> Result<BurnReceipt> {
        self.execute("burn", |state, events| {
            if state.redemptions_paused {
                return Err(BondlineError::RedemptionsPaused);
            }
            state.pause.ensure_active()?;
            if tokens.is_zero() {
                return Err(BondlineError::ZeroAmount);
            }
            let balance = state.ledger.balance_of(caller);
            if balance < tokens {
                return Err(BondlineError::InsufficientBalance {
                    required: tokens,
                    available: balance,
                });
            }

            let receipt = self.plan_burn(state, tokens)?;
            state.reserve.withdraw(receipt.gross_out)?;
            state.ledger.burn(caller, tokens)?;
            state.release_currency(receipt.net_out)?;
            self.credit_fees(state, events, receipt.spread, receipt.protocol_fee)?;

            events.push(EngineEvent::Transfer {
                from: Some(*caller),
                to: None,
                amount: tokens,
            });
            events.push(EngineEvent::Burned {
                user: *caller,
                tokens_in: tokens,
                net_out: receipt.net_out,
                new_price: receipt.new_price,
            });

            let payout = Payout {
                to: *caller,
                amount: receipt.net_out,
            };
            Ok((receipt, Some(payout)))
        })
    }

    /// The registry's one-shot initial mint: no fees, and the resulting
    /// backing must meet the floor.
    pub fn factory_mint(&self, caller: &Address, recipient: &Address, amount: U256) -> Result<MintReceipt> {
        self.execute("factory_mint", |state, events| {
            if *caller != self.info.factory {
                return Err(BondlineError::Unauthorized);
            }
            if state.initialized {
                return Err(BondlineError::AlreadyInitialized);
            }
            let receipt = self.plan_mint(state, amount, FeeSplit::exempt(amount))?;
            self.settle_mint(state, events, recipient, &receipt)?;
            state.initialized = true;

            let ratio = state.reserve.ratio(&self.curve, state.ledger.total_supply())?;
            if ratio < state.min_reserve_ratio {
                return Err(BondlineError::ReserveRatioTooLow {
                    current: ratio,
                    floor: state.min_reserve_ratio,
                });
            }
            Ok((receipt, None))
        })
    }

    /// Top up the reserve. Anyone may call this.
    pub fn deposit_reserve(&self, caller: &Address, amount: U256) -> Result<()> {
        self.execute("deposit_reserve", |state, events| {
            if amount.is_zero() {
                return Err(BondlineError::ZeroAmount);
            }
            state.receive_currency(amount)?;
            state.reserve.deposit(amount)?;
            events.push(EngineEvent::ReserveDeposited { by: *caller, amount });
            Ok(((), None))
        })
    }

    /// Unsolicited currency. Credited to the reserve only when the engine is
    /// configured to accept bare deposits.
    pub fn receive(&self, from: &Address, amount: U256) -> Result<()> {
        if !self.config.accept_bare_deposits {
            tracing::warn!(token = %self.info.symbol, %from, %amount, "bare deposit refused");
            return Err(BondlineError::BareDepositRejected);
        }
        self.deposit_reserve(from, amount)
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    pub fn update_min_reserve_ratio(&self, caller: &Address, new_ratio: u32) -> Result<()> {
        self.execute("update_min_reserve_ratio", |state, events| {
            self.ensure_creator(caller)?;
            let current = state.min_reserve_ratio;
            if new_ratio < current {
                return Err(BondlineError::RatioDecrease {
                    current,
                    requested: new_ratio,
                });
            }
            if new_ratio > MAX_RATIO {
                return Err(BondlineError::RatioTooHigh(new_ratio));
            }
            state.min_reserve_ratio = new_ratio;
            events.push(EngineEvent::ReserveRatioUpdated {
                old: current,
                new: new_ratio,
            });
            Ok(((), None))
        })
    }

    pub fn emergency_pause(&self, caller: &Address, reason: &str) -> Result<()> {
        self.execute("emergency_pause", |state, events| {
            self.ensure_creator(caller)?;
            state.pause.pause(reason)?;
            events.push(EngineEvent::Paused {
                by: *caller,
                reason: reason.to_string(),
            });
            Ok(((), None))
        })
    }

    /// Resume trading. Refused while the backing ratio is under the floor.
    pub fn emergency_unpause(&self, caller: &Address) -> Result<()> {
        self.execute("emergency_unpause", |state, events| {
            self.ensure_creator(caller)?;
            if !state.pause.is_paused() {
                return Err(BondlineError::NotPaused);
            }
            let ratio = state.reserve.ratio(&self.curve, state.ledger.total_supply())?;
            if ratio < state.min_reserve_ratio {
                return Err(BondlineError::ReserveRatioTooLow {
                    current: ratio,
                    floor: state.min_reserve_ratio,
                });
            }
            state.pause.unpause()?;
            events.push(EngineEvent::Unpaused { by: *caller });
            Ok(((), None))
        })
    }

    /// Pay out the caller's accrued fees
    pub fn withdraw_fees(&self, caller: &Address) -> Result<U256> {
        self.execute("withdraw_fees", |state, events| {
            let amount = state.fees.withdraw(caller)?;
            state.release_currency(amount)?;
            events.push(EngineEvent::FeeWithdrawn {
                recipient: *caller,
                amount,
            });
            Ok((amount, Some(Payout { to: *caller, amount })))
        })
    }

    pub fn update_metadata(&self, caller: &Address, description: &str, image_uri: Option<&str>) -> Result<()> {
        self.execute("update_metadata", |state, events| {
            self.ensure_creator(caller)?;
            state.description = description.to_string();
            state.image_uri = image_uri.map(str::to_string);
            events.push(EngineEvent::MetadataUpdated {
                description: state.description.clone(),
                image_uri: state.image_uri.clone(),
            });
            Ok(((), None))
        })
    }

    // ------------------------------------------------------------------
    // ERC-20 surface (not gated by pause)
    // ------------------------------------------------------------------

    pub fn transfer(&self, from: &Address, to: &Address, amount: U256) -> Result<()> {
        self.execute("transfer", |state, events| {
            state.ledger.transfer(from, to, amount)?;
            events.push(EngineEvent::Transfer {
                from: Some(*from),
                to: Some(*to),
                amount,
            });
            Ok(((), None))
        })
    }

    pub fn approve(&self, owner: &Address, spender: &Address, amount: U256) -> Result<()> {
        self.execute("approve", |state, events| {
            state.ledger.approve(owner, spender, amount)?;
            events.push(EngineEvent::Approval {
                owner: *owner,
                spender: *spender,
                amount,
            });
            Ok(((), None))
        })
    }

    pub fn transfer_from(&self, spender: &Address, from: &Address, to: &Address, amount: U256) -> Result<()> {
        self.execute("transfer_from", |state, events| {
            state.ledger.spend_allowance(from, spender, amount)?;
            state.ledger.transfer(from, to, amount)?;
            events.push(EngineEvent::Transfer {
                from: Some(*from),
                to: Some(*to),
                amount,
            });
            Ok(((), None))
        })
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    pub fn info(&self) -> &TokenInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn symbol(&self) -> &str {
        &self.info.symbol
    }

    pub fn decimals(&self) -> u8 {
        DECIMALS
    }

    pub fn creator(&self) -> Address {
        self.info.creator
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn curve(&self) -> &BondingCurve {
        &self.curve
    }

    pub fn current_price(&self) -> Result<U256> {
        self.read(|state| self.curve.price_at(state.ledger.total_supply()))
    }

    pub fn reserve_ratio(&self) -> Result<u32> {
        self.read(|state| state.reserve.ratio(&self.curve, state.ledger.total_supply()))
    }

    pub fn reserve_balance(&self) -> U256 {
        self.read(|state| state.reserve.balance())
    }

    pub fn total_supply(&self) -> U256 {
        self.read(|state| state.ledger.total_supply())
    }

    pub fn balance_of(&self, account: &Address) -> U256 {
        self.read(|state| state.ledger.balance_of(account))
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> U256 {
        self.read(|state| state.ledger.allowance(owner, spender))
    }

    pub fn min_reserve_ratio(&self) -> u32 {
        self.read(|state| state.min_reserve_ratio)
    }

    pub fn pending_fees(&self, account: &Address) -> U256 {
        self.read(|state| state.fees.pending(account))
    }

    pub fn total_accrued_fees(&self) -> U256 {
        self.read(|state| state.fees.total_accrued())
    }

    pub fn currency_balance(&self) -> U256 {
        self.read(|state| state.currency_balance)
    }

    pub fn is_paused(&self) -> bool {
        self.read(|state| state.pause.is_paused())
    }

    pub fn pause_reason(&self) -> Option<String> {
        self.read(|state| state.pause.reason().map(str::to_string))
    }

    pub fn redemptions_paused(&self) -> bool {
        self.read(|state| state.redemptions_paused)
    }

    pub fn is_initialized(&self) -> bool {
        self.read(|state| state.initialized)
    }

    pub fn is_solvent(&self) -> bool {
        self.read(EngineState::is_solvent)
    }

    pub fn description(&self) -> String {
        self.read(|state| state.description.clone())
    }

    pub fn image_uri(&self) -> Option<String> {
        self.read(|state| state.image_uri.clone())
    }

    /// What `mint(amount)` would return right now
    pub fn preview_mint(&self, amount: U256) -> Result<MintReceipt> {
        let receipt = self.read(|state| self.plan_mint(state, amount, self.fee_split(amount)))?;
        tracing::debug!(token = %self.info.symbol, %amount, tokens_out = %receipt.tokens_out, "mint preview");
        Ok(receipt)
    }

    /// What `burn(tokens)` would return right now, ignoring pause flags
    pub fn preview_burn(&self, tokens: U256) -> Result<BurnReceipt> {
        let receipt = self.read(|state| self.plan_burn(state, tokens))?;
        tracing::debug!(token = %self.info.symbol, %tokens, net_out = %receipt.net_out, "burn preview");
        Ok(receipt)
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        inner.events.iter().cloned().collect()
    }

    pub fn drain_events(&self) -> Result<Vec<EngineEvent>> {
        let guard = self.inner.lock();
        let mut inner = guard.try_borrow_mut().map_err(|_| BondlineError::ReentrantCall)?;
        if inner.payout_in_flight {
            return Err(BondlineError::ReentrantCall);
        }
        Ok(inner.events.drain())
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        EngineSnapshot {
            info: self.info.clone(),
            config: self.config.clone(),
            state: inner.state.clone(),
            events: inner.events.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn fee_split(&self, gross: U256) -> FeeSplit {
        FeeSplit::compute(gross, self.config.spread_bps, self.config.protocol_bps)
    }

    fn ensure_creator(&self, caller: &Address) -> Result<()> {
        if *caller != self.info.creator {
            return Err(BondlineError::Unauthorized);
        }
        Ok(())
    }

    fn plan_mint(&self, state: &EngineState, gross: U256, fees: FeeSplit) -> Result<MintReceipt> {
        if gross.is_zero() {
            return Err(BondlineError::ZeroAmount);
        }
        if fees.net.is_zero() {
            return Err(BondlineError::ZeroTokensMinted);
        }
        let quote = self.curve.mint_quote(state.ledger.total_supply(), fees.net)?;
        if quote.tokens_out.is_zero() {
            return Err(BondlineError::ZeroTokensMinted);
        }
        Ok(MintReceipt {
            gross_in: gross,
            spread: fees.spread,
            protocol_fee: fees.protocol_fee,
            net_deposit: fees.net,
            tokens_out: quote.tokens_out,
            effective_price: quote.effective_price,
            new_price: quote.end_price,
        })
    }

    fn plan_burn(&self, state: &EngineState, tokens: U256) -> Result<BurnReceipt> {
        if tokens.is_zero() {
            return Err(BondlineError::ZeroAmount);
        }
        let supply = state.ledger.total_supply();
        let quote = self.curve.burn_quote(supply, tokens)?;
        let fees = self.fee_split(quote.gross_out);
        if fees.net.is_zero() {
            return Err(BondlineError::ZeroTonReturned);
        }

        let reserve = state.reserve.balance();
        if quote.gross_out > reserve {
            return Err(BondlineError::InsufficientReserve {
                required: quote.gross_out,
                available: reserve,
            });
        }

        // re-derive the post-burn backing instead of trusting the cached flag
        let ratio_after = state
            .reserve
            .projected_ratio(&self.curve, supply - tokens, quote.gross_out)?;
        if ratio_after < state.min_reserve_ratio {
            return Err(BondlineError::WouldBreachReserveRatio {
                projected: ratio_after,
                floor: state.min_reserve_ratio,
            });
        }

        Ok(BurnReceipt {
            tokens_in: tokens,
            gross_out: quote.gross_out,
            spread: fees.spread,
            protocol_fee: fees.protocol_fee,
            net_out: fees.net,
            effective_price: quote.effective_price,
            new_price: quote.end_price,
            ratio_after,
        })
    }

    fn settle_mint(
        &self,
        state: &mut EngineState,
        events: &mut Vec<EngineEvent>,
        recipient: &Address,
        receipt: &MintReceipt,
    ) -> Result<()> {
        state.receive_currency(receipt.gross_in)?;
        state.reserve.deposit(receipt.net_deposit)?;
        state.ledger.mint(recipient, receipt.tokens_out)?;
        events.push(EngineEvent::Transfer {
            from: None,
            to: Some(*recipient),
            amount: receipt.tokens_out,
        });
        events.push(EngineEvent::Minted {
            user: *recipient,
            gross_in: receipt.gross_in,
            tokens_out: receipt.tokens_out,
            new_price: receipt.new_price,
        });
        Ok(())
    }

    fn credit_fees(
        &self,
        state: &mut EngineState,
        events: &mut Vec<EngineEvent>,
        spread: U256,
        protocol_fee: U256,
    ) -> Result<()> {
        let streams = [
            (self.info.creator, spread),
            (self.info.protocol_fee_recipient, protocol_fee),
        ];
        for (recipient, amount) in streams {
            if state.fees.credit(&recipient, amount)? {
                events.push(EngineEvent::FeeAccrued { recipient, amount });
            }
        }
        Ok(())
    }

    fn read<R>(&self, view: impl FnOnce(&EngineState) -> R) -> R {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        view(&inner.state)
    }

    /// Run one operation atomically. `apply` performs checks and effects on
    /// the borrowed state; an optional payout happens after the borrow is
    /// released. Any failure restores the state as it was before the call.
    fn execute<T>(
        &self,
        op: &'static str,
        apply: impl FnOnce(&mut EngineState, &mut Vec<EngineEvent>) -> Applied<T>,
    ) -> Result<T> {
        let guard = self.inner.lock();
        let result = self.run(&guard, apply);
        if let Err(err) = &result {
            tracing::warn!(
                token = %self.info.symbol,
                op,
                code = err.code(),
                error = %err,
                "operation rejected"
            );
        }
        result
    }

    fn run<T>(
        &self,
        cell: &RefCell<Inner>,
        apply: impl FnOnce(&mut EngineState, &mut Vec<EngineEvent>) -> Applied<T>,
    ) -> Result<T> {
        let (checkpoint, start, value, payout) = {
            let mut inner = cell.try_borrow_mut().map_err(|_| BondlineError::ReentrantCall)?;
            if inner.payout_in_flight {
                return Err(BondlineError::ReentrantCall);
            }
            let checkpoint = inner.state.checkpoint();
            let mut pending = Vec::new();

            let applied = apply(&mut inner.state, &mut pending);
            let outcome = match applied {
                Ok(out) => inner.state.refresh_redemptions(&self.curve).map(|()| out),
                Err(err) => Err(err),
            };
            let (value, payout) = match outcome {
                Ok(out) => out,
                Err(err) => {
                    inner.state.revert(checkpoint);
                    return Err(err);
                }
            };
            debug_assert!(inner.state.is_solvent());
            debug_assert!(inner.state.ledger.is_conserved());

            let start = inner.events.len();
            for event in pending {
                inner.events.emit(event);
            }
            if payout.is_some() {
                inner.payout_in_flight = true;
            }
            (checkpoint, start, value, payout)
        };

        // interaction: the borrow is released so the recipient may read the
        // engine, but any mutating call is refused until the payout settles
        if let Some(payout) = payout {
            let sent = self.transfer.transfer(&payout.to, payout.amount);
            let mut inner = cell.try_borrow_mut().map_err(|_| BondlineError::ReentrantCall)?;
            inner.payout_in_flight = false;
            if let Err(err) = sent {
                inner.state.revert(checkpoint);
                inner.events.truncate(start);
                return Err(BondlineError::TransferFailed(err.to_string()));
            }
        }

        let mut inner = cell.try_borrow_mut().map_err(|_| BondlineError::ReentrantCall)?;
        inner.state.commit();
        for event in inner.events.since(start) {
            event.trace(&self.info.symbol);
        }
        inner.events.trim(self.config.event_log_capacity);
        Ok(value)
    }
}

impl fmt::Debug for TokenEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenEngine")
            .field("symbol", &self.info.symbol)
            .field("creator", &self.info.creator)
            .field("curve", &self.curve)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::treasury::MemoryBank;

    fn units(n: u64) -> U256 {
        U256::from(n) * PRECISION
    }

    fn creator() -> Address {
        Address::from_label("creator")
    }

    fn factory() -> Address {
        Address::from_label("factory")
    }

    fn platform() -> Address {
        Address::from_label("platform")
    }

    fn params() -> TokenParams {
        TokenParams {
            name: "Frog".into(),
            symbol: "FROG".into(),
            creator: creator(),
            base_price: U256::exp10(15),
            curve_coefficient: U256::exp10(8),
            min_reserve_ratio: 5_000,
            protocol_fee_recipient: platform(),
            description: "a frog".into(),
            image_uri: None,
        }
    }

    fn engine() -> (TokenEngine, Arc<MemoryBank>) {
        let bank = Arc::new(MemoryBank::new());
        let engine = TokenEngine::new(params(), EngineConfig::default(), factory(), bank.clone()).unwrap();
        engine.factory_mint(&factory(), &creator(), units(1)).unwrap();
        (engine, bank)
    }

    /// Engine whose reserve holds only `bps` of the curve value of its supply
    fn underbacked(bps: u32) -> (TokenEngine, Arc<MemoryBank>) {
        let (engine, bank) = engine();
        let user = Address::from_label("user");
        engine.mint(&user, units(50)).unwrap();

        let mut snapshot = engine.snapshot();
        let supply = snapshot.state.ledger.total_supply();
        let value = engine.curve().integral(supply).unwrap();
        let reserve = value * U256::from(bps) / U256::from(BPS_DENOMINATOR);
        snapshot.state.reserve = ReserveLedger::with_balance(reserve);
        let restored = TokenEngine::from_snapshot(snapshot, bank.clone()).unwrap();
        (restored, bank)
    }

    #[test]
    fn test_construction_validates_params() {
        let bank: Arc<dyn CurrencyTransfer> = Arc::new(MemoryBank::new());
        let mut bad = params();
        bad.min_reserve_ratio = 4_000;
        assert!(TokenEngine::new(bad, EngineConfig::default(), factory(), bank.clone()).is_err());
        assert!(TokenEngine::new(params(), EngineConfig::default(), Address::ZERO, bank).is_err());
    }

    #[test]
    fn test_factory_mint_is_one_shot() {
        let (engine, _) = engine();
        assert!(engine.is_initialized());
        assert!(engine.total_supply() > U256::zero());
        assert!(engine.reserve_ratio().unwrap() >= 5_000);
        // no fees on the initial mint
        assert!(engine.total_accrued_fees().is_zero());
        assert_eq!(
            engine.factory_mint(&factory(), &creator(), units(1)),
            Err(BondlineError::AlreadyInitialized)
        );
    }

    #[test]
    fn test_factory_mint_requires_factory() {
        let bank = Arc::new(MemoryBank::new());
        let engine = TokenEngine::new(params(), EngineConfig::default(), factory(), bank).unwrap();
        assert_eq!(
            engine.factory_mint(&creator(), &creator(), units(1)),
            Err(BondlineError::Unauthorized)
        );
        assert!(!engine.is_initialized());
    }

    #[test]
    fn test_mint_splits_fees() {
        let (engine, _) = engine();
        let user = Address::from_label("user");
        let reserve_before = engine.reserve_balance();
        let receipt = engine.mint(&user, units(1)).unwrap();

        assert_eq!(receipt.spread, units(1) / U256::from(100u64));
        assert_eq!(receipt.protocol_fee, units(1) / U256::from(200u64));
        assert_eq!(engine.pending_fees(&creator()), receipt.spread);
        assert_eq!(engine.pending_fees(&platform()), receipt.protocol_fee);
        assert_eq!(engine.reserve_balance(), reserve_before + receipt.net_deposit);
        assert_eq!(engine.balance_of(&user), receipt.tokens_out);
        assert!(engine.is_solvent());
    }

    #[test]
    fn test_pause_blocks_trading_not_transfers() {
        let (engine, _) = engine();
        let user = Address::from_label("user");
        engine.mint(&user, units(1)).unwrap();
        engine.emergency_pause(&creator(), "incident").unwrap();

        assert_eq!(engine.mint(&user, units(1)), Err(BondlineError::AlreadyPaused));
        assert_eq!(engine.burn(&user, U256::one()), Err(BondlineError::AlreadyPaused));
        engine.transfer(&user, &creator(), U256::one()).unwrap();
        assert_eq!(engine.pause_reason().as_deref(), Some("incident"));

        assert_eq!(engine.emergency_unpause(&user), Err(BondlineError::Unauthorized));
        engine.emergency_unpause(&creator()).unwrap();
        assert_eq!(engine.emergency_unpause(&creator()), Err(BondlineError::NotPaused));
    }

    #[test]
    fn test_failed_op_leaves_state_untouched() {
        let (engine, _) = engine();
        let before = engine.snapshot();
        let stranger = Address::from_label("stranger");
        assert!(engine.burn(&stranger, units(1)).is_err());
        assert!(engine.update_min_reserve_ratio(&creator(), 4_000).is_err());
        assert_eq!(engine.snapshot(), before);
    }

    #[test]
    fn test_raise_floor_and_reject_decrease() {
        let (engine, _) = engine();
        engine.update_min_reserve_ratio(&creator(), 7_000).unwrap();
        assert_eq!(
            engine.update_min_reserve_ratio(&creator(), 6_000),
            Err(BondlineError::RatioDecrease {
                current: 7_000,
                requested: 6_000
            })
        );
        assert_eq!(
            engine.update_min_reserve_ratio(&creator(), 10_001),
            Err(BondlineError::RatioTooHigh(10_001))
        );
        assert_eq!(
            engine.update_min_reserve_ratio(&Address::from_label("x"), 8_000),
            Err(BondlineError::Unauthorized)
        );
        assert_eq!(engine.min_reserve_ratio(), 7_000);
    }

    #[test]
    fn test_underbacked_token_pauses_redemptions() {
        let (engine, _) = underbacked(4_000);
        assert!(engine.redemptions_paused());
        let user = Address::from_label("user");
        assert_eq!(engine.burn(&user, units(1)), Err(BondlineError::RedemptionsPaused));

        // buying still works and a deposit restores health
        engine.mint(&user, units(1)).unwrap();
        let supply = engine.total_supply();
        let value = engine.curve().integral(supply).unwrap();
        engine.deposit_reserve(&Address::from_label("rescuer"), value).unwrap();
        assert!(!engine.redemptions_paused());
        assert_eq!(engine.reserve_ratio().unwrap(), MAX_RATIO);
    }

    #[test]
    fn test_unpause_refused_below_floor() {
        let (engine, _) = underbacked(4_000);
        engine.emergency_pause(&creator(), "audit").unwrap();
        assert!(matches!(
            engine.emergency_unpause(&creator()),
            Err(BondlineError::ReserveRatioTooLow { .. })
        ));
        assert!(engine.is_paused());
    }

    #[test]
    fn test_burn_rejected_when_it_would_breach_floor() {
        let (engine, _) = underbacked(5_100);
        assert!(!engine.redemptions_paused());
        let user = Address::from_label("user");
        let before = engine.snapshot();
        let holding = engine.balance_of(&user);

        // the tenth fits in the reserve but drags backing under 50%
        let result = engine.burn(&user, holding / U256::from(10u64));
        assert!(matches!(result, Err(BondlineError::WouldBreachReserveRatio { .. })));
        assert_eq!(engine.snapshot(), before);
    }

    #[test]
    fn test_bare_deposit_policy() {
        let (strict, _) = engine();
        assert_eq!(
            strict.receive(&Address::from_label("anon"), units(1)),
            Err(BondlineError::BareDepositRejected)
        );

        let bank = Arc::new(MemoryBank::new());
        let config = EngineConfig {
            accept_bare_deposits: true,
            ..EngineConfig::default()
        };
        let permissive = TokenEngine::new(params(), config, factory(), bank).unwrap();
        permissive.receive(&Address::from_label("anon"), units(1)).unwrap();
        assert_eq!(permissive.reserve_balance(), units(1));
        assert_eq!(permissive.currency_balance(), units(1));
    }

    #[test]
    fn test_metadata_update_is_creator_only() {
        let (engine, _) = engine();
        assert_eq!(
            engine.update_metadata(&Address::from_label("x"), "nope", None),
            Err(BondlineError::Unauthorized)
        );
        engine
            .update_metadata(&creator(), "new", Some("ipfs://frog"))
            .unwrap();
        assert_eq!(engine.description(), "new");
        assert_eq!(engine.image_uri().as_deref(), Some("ipfs://frog"));
    }

    #[test]
    fn test_transfer_from_uses_allowance() {
        let (engine, _) = engine();
        let spender = Address::from_label("spender");
        let dest = Address::from_label("dest");
        engine.approve(&creator(), &spender, U256::from(10u64)).unwrap();
        engine
            .transfer_from(&spender, &creator(), &dest, U256::from(4u64))
            .unwrap();
        assert_eq!(engine.balance_of(&dest), U256::from(4u64));
        assert_eq!(engine.allowance(&creator(), &spender), U256::from(6u64));
        assert!(matches!(
            engine.transfer_from(&spender, &creator(), &dest, U256::from(7u64)),
            Err(BondlineError::InsufficientAllowance { .. })
        ));
    }

    #[test]
    fn test_events_recorded_in_order() {
        let (engine, _) = engine();
        let names: Vec<_> = engine.events().iter().map(EngineEvent::name).collect();
        assert_eq!(names, vec!["Transfer", "Minted"]);

        let user = Address::from_label("user");
        engine.drain_events().unwrap();
        engine.mint(&user, units(1)).unwrap();
        let names: Vec<_> = engine.events().iter().map(EngineEvent::name).collect();
        assert_eq!(names, vec!["Transfer", "Minted", "FeeAccrued", "FeeAccrued"]);
    }

    #[test]
    fn test_failed_payout_restores_snapshot() {
        let (engine, bank) = engine();
        let user = Address::from_label("user");
        engine.mint(&user, units(2)).unwrap();
        engine.approve(&user, &creator(), units(1)).unwrap();
        let before = engine.snapshot();

        bank.reject(user);
        let held = engine.balance_of(&user);
        assert!(matches!(
            engine.burn(&user, held),
            Err(BondlineError::TransferFailed(_))
        ));
        assert_eq!(engine.snapshot(), before);

        bank.accept(&user);
        engine.burn(&user, held).unwrap();
        assert!(engine.balance_of(&user).is_zero());
    }

    #[test]
    fn test_event_log_capacity_evicts_oldest() {
        let bank = Arc::new(MemoryBank::new());
        let config = EngineConfig {
            event_log_capacity: 3,
            ..EngineConfig::default()
        };
        let engine = TokenEngine::new(params(), config, factory(), bank).unwrap();
        engine.factory_mint(&factory(), &creator(), units(1)).unwrap();
        engine.mint(&Address::from_label("user"), units(1)).unwrap();

        let names: Vec<_> = engine.events().iter().map(EngineEvent::name).collect();
        assert_eq!(names, vec!["Minted", "FeeAccrued", "FeeAccrued"]);
        assert_eq!(engine.snapshot().events.evicted(), 3);
    }

    #[test]
    fn test_corrupt_snapshot_rejected() {
        let (engine, bank) = engine();
        let mut snapshot = engine.snapshot();
        snapshot.state.currency_balance = U256::zero();
        assert!(matches!(
            TokenEngine::from_snapshot(snapshot, bank),
            Err(BondlineError::InvalidParameter(_))
        ));
    }
}
