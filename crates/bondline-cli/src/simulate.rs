//! Scenario replay
//!
//! Launches every `[[launch]]` entry through a fresh registry, then applies
//! each `[[step]]` in order. Launch failures abort the run; step failures are
//! recorded with their error code and the replay continues, mirroring how a
//! rejected transaction leaves the chain untouched.

use crate::config::{resolve_account, resolve_amount, Scenario, Step};
use anyhow::{Context, Result};
use bondline_core::prelude::*;
use bondline_registry::Registry;
use bondline_token::{MemoryBank, TokenEngine};
use serde::Serialize;
use std::sync::Arc;

/// Result of one replayed step
#[derive(Clone, Debug, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub action: &'static str,
    pub ok: bool,
    /// Human-readable result or error message
    pub detail: String,
    /// Error code when the step was rejected
    pub code: Option<u32>,
}

/// End-of-run view of one token
#[derive(Clone, Debug, Serialize)]
pub struct TokenSummary {
    pub symbol: String,
    pub id: String,
    pub creator: Address,
    pub total_supply: String,
    pub current_price: String,
    pub reserve: String,
    pub reserve_ratio_bps: u32,
    pub min_reserve_ratio_bps: u32,
    pub accrued_fees: String,
    pub paused: bool,
    pub redemptions_paused: bool,
    pub solvent: bool,
    pub holders: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct SimulationReport {
    pub steps: Vec<StepOutcome>,
    pub tokens: Vec<TokenSummary>,
    pub creation_fees_collected: String,
}

impl SimulationReport {
    pub fn failed_steps(&self) -> usize {
        self.steps.iter().filter(|step| !step.ok).count()
    }

    /// Plain-text rendering for terminals
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("Steps:\n");
        for step in &self.steps {
            let status = if step.ok { "ok " } else { "ERR" };
            out.push_str(&format!(
                "  #{:<3} {:<22} {} {}\n",
                step.index, step.action, status, step.detail
            ));
        }
        out.push_str("\nTokens:\n");
        for token in &self.tokens {
            out.push_str(&format!("  {} ({})\n", token.symbol, token.id));
            out.push_str(&format!("    supply        {}\n", token.total_supply));
            out.push_str(&format!("    price         {}\n", token.current_price));
            out.push_str(&format!("    reserve       {}\n", token.reserve));
            out.push_str(&format!(
                "    ratio         {} bps (floor {})\n",
                token.reserve_ratio_bps, token.min_reserve_ratio_bps
            ));
            out.push_str(&format!("    fees owed     {}\n", token.accrued_fees));
            out.push_str(&format!(
                "    paused        {} (redemptions {})\n",
                token.paused, token.redemptions_paused
            ));
            out.push_str(&format!("    holders       {}\n", token.holders));
        }
        out.push_str(&format!(
            "\nCreation fees collected: {}\n",
            self.creation_fees_collected
        ));
        out
    }
}

/// Replay a scenario against an in-memory currency bank
pub fn run(scenario: &Scenario) -> Result<SimulationReport> {
    let bank = Arc::new(MemoryBank::new());
    let mut registry = Registry::new(scenario.registry_config()?, bank)?;

    for launch in &scenario.launch {
        let creator = resolve_account(&launch.creator)?;
        registry
            .launch(&creator, launch.request.clone(), launch.payment)
            .with_context(|| format!("launching {}", launch.request.symbol))?;
    }

    let mut steps = Vec::with_capacity(scenario.step.len());
    for (index, step) in scenario.step.iter().enumerate() {
        let outcome = match apply_step(&mut registry, step) {
            Ok(detail) => StepOutcome {
                index,
                action: step.action(),
                ok: true,
                detail,
                code: None,
            },
            Err(err) => {
                let code = err.downcast_ref::<BondlineError>().map(BondlineError::code);
                StepOutcome {
                    index,
                    action: step.action(),
                    ok: false,
                    detail: format!("{err:#}"),
                    code,
                }
            }
        };
        tracing::debug!(index, action = outcome.action, ok = outcome.ok, "step replayed");
        steps.push(outcome);
    }

    let tokens = registry
        .all_tokens()
        .iter()
        .map(|token| summarize(&token.engine, token.id.to_hex()))
        .collect::<Result<Vec<_>>>()?;

    Ok(SimulationReport {
        steps,
        tokens,
        creation_fees_collected: format_units(registry.collected_fees()),
    })
}

fn engine_for(registry: &Registry, symbol: &str) -> Result<Arc<TokenEngine>> {
    registry
        .by_symbol(symbol)
        .map(|token| Arc::clone(&token.engine))
        .ok_or_else(|| BondlineError::TokenNotFound(symbol.to_string()).into())
}

fn apply_step(registry: &mut Registry, step: &Step) -> Result<String> {
    let detail = match step {
        Step::Mint { token, account, amount } => {
            let engine = engine_for(registry, token)?;
            let buyer = resolve_account(account)?;
            let receipt = engine.mint(&buyer, resolve_amount(amount, U256::zero())?)?;
            format!(
                "{account} bought {} {token} for {} (price now {})",
                format_units(receipt.tokens_out),
                format_units(receipt.gross_in),
                format_units(receipt.new_price)
            )
        }
        Step::Burn { token, account, amount } => {
            let engine = engine_for(registry, token)?;
            let seller = resolve_account(account)?;
            let tokens = resolve_amount(amount, engine.balance_of(&seller))?;
            let receipt = engine.burn(&seller, tokens)?;
            format!(
                "{account} sold {} {token} for {} (price now {})",
                format_units(receipt.tokens_in),
                format_units(receipt.net_out),
                format_units(receipt.new_price)
            )
        }
        Step::Deposit { token, account, amount } => {
            let engine = engine_for(registry, token)?;
            let amount = resolve_amount(amount, U256::zero())?;
            engine.deposit_reserve(&resolve_account(account)?, amount)?;
            format!("{account} deposited {} into {token} reserve", format_units(amount))
        }
        Step::WithdrawFees { token, account } => {
            let engine = engine_for(registry, token)?;
            let amount = engine.withdraw_fees(&resolve_account(account)?)?;
            format!("{account} withdrew {} in {token} fees", format_units(amount))
        }
        Step::Pause { token, account, reason } => {
            engine_for(registry, token)?.emergency_pause(&resolve_account(account)?, reason)?;
            format!("{token} paused")
        }
        Step::Unpause { token, account } => {
            engine_for(registry, token)?.emergency_unpause(&resolve_account(account)?)?;
            format!("{token} unpaused")
        }
        Step::RaiseFloor { token, account, ratio } => {
            engine_for(registry, token)?.update_min_reserve_ratio(&resolve_account(account)?, *ratio)?;
            format!("{token} reserve floor now {ratio} bps")
        }
        Step::Transfer { token, from, to, amount } => {
            let engine = engine_for(registry, token)?;
            let sender = resolve_account(from)?;
            let amount = resolve_amount(amount, engine.balance_of(&sender))?;
            engine.transfer(&sender, &resolve_account(to)?, amount)?;
            format!("{from} sent {} {token} to {to}", format_units(amount))
        }
        Step::WithdrawCreationFees { account } => {
            let amount = registry.withdraw_creation_fees(&resolve_account(account)?)?;
            format!("{account} withdrew {} in creation fees", format_units(amount))
        }
    };
    Ok(detail)
}

fn summarize(engine: &TokenEngine, id: String) -> Result<TokenSummary> {
    let snapshot = engine.snapshot();
    Ok(TokenSummary {
        symbol: engine.symbol().to_string(),
        id,
        creator: engine.creator(),
        total_supply: format_units(engine.total_supply()),
        current_price: format_units(engine.current_price()?),
        reserve: format_units(engine.reserve_balance()),
        reserve_ratio_bps: engine.reserve_ratio()?,
        min_reserve_ratio_bps: engine.min_reserve_ratio(),
        accrued_fees: format_units(engine.total_accrued_fees()),
        paused: engine.is_paused(),
        redemptions_paused: engine.redemptions_paused(),
        solvent: engine.is_solvent(),
        holders: snapshot.state.ledger.holder_count(),
    })
}
