//! Engine configuration and launch parameters

use bondline_core::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-engine trading policy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Spread credited to the creator (bps of gross)
    #[serde(default = "default_spread_bps")]
    pub spread_bps: u32,

    /// Protocol fee credited to the platform (bps of gross)
    #[serde(default = "default_protocol_bps")]
    pub protocol_bps: u32,

    /// Slices used by mint/burn quoting
    #[serde(default = "default_quote_steps")]
    pub quote_steps: u32,

    /// Credit unsolicited currency to the reserve instead of refusing it
    #[serde(default)]
    pub accept_bare_deposits: bool,

    /// Retained event history; older events are evicted
    #[serde(default = "default_event_log_capacity")]
    pub event_log_capacity: usize,
}

fn default_spread_bps() -> u32 {
    DEFAULT_SPREAD_BPS
}

fn default_protocol_bps() -> u32 {
    DEFAULT_PROTOCOL_BPS
}

fn default_quote_steps() -> u32 {
    QUOTE_STEPS
}

fn default_event_log_capacity() -> usize {
    EVENT_LOG_CAPACITY
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            spread_bps: default_spread_bps(),
            protocol_bps: default_protocol_bps(),
            quote_steps: default_quote_steps(),
            accept_bare_deposits: false,
            event_log_capacity: default_event_log_capacity(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.spread_bps > MAX_FEE_BPS || self.protocol_bps > MAX_FEE_BPS {
            return Err(BondlineError::InvalidParameter(format!(
                "fee above {MAX_FEE_BPS} bps (spread {}, protocol {})",
                self.spread_bps, self.protocol_bps
            )));
        }
        if self.spread_bps + self.protocol_bps >= BPS_DENOMINATOR {
            return Err(BondlineError::InvalidParameter(
                "fees must leave a non-zero net amount".into(),
            ));
        }
        if self.quote_steps == 0 {
            return Err(BondlineError::InvalidParameter(
                "quote steps must be at least 1".into(),
            ));
        }
        if self.event_log_capacity == 0 {
            return Err(BondlineError::InvalidParameter(
                "event log capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Constructor contract consumed from the registry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenParams {
    pub name: String,
    pub symbol: String,
    pub creator: Address,
    pub base_price: U256,
    pub curve_coefficient: U256,
    /// Initial minimum reserve ratio (bps)
    pub min_reserve_ratio: u32,
    /// Beneficiary of the protocol fee stream
    pub protocol_fee_recipient: Address,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_uri: Option<String>,
}

impl TokenParams {
    /// Bounds every engine re-checks at construction, whatever the registry did
    pub fn validate(&self) -> Result<()> {
        if self.creator.is_zero() {
            return Err(BondlineError::InvalidParameter("creator is the zero address".into()));
        }
        if self.protocol_fee_recipient.is_zero() {
            return Err(BondlineError::InvalidParameter(
                "protocol fee recipient is the zero address".into(),
            ));
        }
        if self.name.trim().is_empty() || self.symbol.trim().is_empty() {
            return Err(BondlineError::InvalidParameter("name and symbol are required".into()));
        }
        if self.base_price < U256::from(MIN_BASE_PRICE) || self.base_price > U256::from(MAX_BASE_PRICE) {
            return Err(BondlineError::InvalidParameter(format!(
                "base price {} outside [{MIN_BASE_PRICE}, {MAX_BASE_PRICE}]",
                self.base_price
            )));
        }
        if self.curve_coefficient > U256::from(MAX_CURVE_COEFFICIENT) {
            return Err(BondlineError::InvalidParameter(format!(
                "curve coefficient {} above {MAX_CURVE_COEFFICIENT}",
                self.curve_coefficient
            )));
        }
        if self.min_reserve_ratio < RATIO_FLOOR || self.min_reserve_ratio > MAX_RATIO {
            return Err(BondlineError::InvalidParameter(format!(
                "min reserve ratio {} outside [{RATIO_FLOOR}, {MAX_RATIO}]",
                self.min_reserve_ratio
            )));
        }
        Ok(())
    }
}
