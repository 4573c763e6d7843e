//! Registry configuration and launch requests

use bondline_core::prelude::*;
use bondline_core::types::amount_str;
use bondline_token::EngineConfig;
use serde::{Deserialize, Serialize};

/// Registry-wide launch policy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Receives creation fees
    pub owner: Address,

    /// Protocol fee beneficiary for every launched token (defaults to owner)
    #[serde(default)]
    pub protocol_fee_recipient: Option<Address>,

    /// Flat fee taken from each launch payment
    #[serde(default = "default_creation_fee", with = "amount_str")]
    pub creation_fee: U256,

    /// Fee schedule and quoting policy handed to each engine
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,

    #[serde(default = "default_max_symbol_len")]
    pub max_symbol_len: usize,

    #[serde(default = "default_min_base_price", with = "amount_str")]
    pub min_base_price: U256,

    #[serde(default = "default_max_base_price", with = "amount_str")]
    pub max_base_price: U256,

    #[serde(default = "default_max_curve_coefficient", with = "amount_str")]
    pub max_curve_coefficient: U256,

    /// Lowest minimum reserve ratio a launch may ask for (bps)
    #[serde(default = "default_reserve_ratio_floor")]
    pub reserve_ratio_floor: u32,
}

fn default_creation_fee() -> U256 {
    // 0.01 TON
    U256::exp10(16)
}

fn default_max_name_len() -> usize {
    32
}

fn default_max_symbol_len() -> usize {
    10
}

fn default_min_base_price() -> U256 {
    U256::from(MIN_BASE_PRICE)
}

fn default_max_base_price() -> U256 {
    U256::from(MAX_BASE_PRICE)
}

fn default_max_curve_coefficient() -> U256 {
    U256::from(MAX_CURVE_COEFFICIENT)
}

fn default_reserve_ratio_floor() -> u32 {
    RATIO_FLOOR
}

impl RegistryConfig {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            protocol_fee_recipient: None,
            creation_fee: default_creation_fee(),
            engine: EngineConfig::default(),
            max_name_len: default_max_name_len(),
            max_symbol_len: default_max_symbol_len(),
            min_base_price: default_min_base_price(),
            max_base_price: default_max_base_price(),
            max_curve_coefficient: default_max_curve_coefficient(),
            reserve_ratio_floor: default_reserve_ratio_floor(),
        }
    }

    pub fn protocol_fee_recipient(&self) -> Address {
        self.protocol_fee_recipient.unwrap_or(self.owner)
    }

    /// Registry bounds must sit inside what an engine accepts
    pub fn validate(&self) -> Result<()> {
        if self.owner.is_zero() || self.protocol_fee_recipient().is_zero() {
            return Err(BondlineError::InvalidParameter(
                "registry owner and fee recipient must be set".into(),
            ));
        }
        if self.max_name_len == 0 || self.max_symbol_len == 0 {
            return Err(BondlineError::InvalidParameter(
                "name and symbol limits must be positive".into(),
            ));
        }
        if self.min_base_price < U256::from(MIN_BASE_PRICE)
            || self.max_base_price > U256::from(MAX_BASE_PRICE)
            || self.min_base_price > self.max_base_price
        {
            return Err(BondlineError::InvalidParameter(format!(
                "base price bounds [{}, {}] invalid",
                self.min_base_price, self.max_base_price
            )));
        }
        if self.max_curve_coefficient > U256::from(MAX_CURVE_COEFFICIENT) {
            return Err(BondlineError::InvalidParameter(format!(
                "max curve coefficient {} above {MAX_CURVE_COEFFICIENT}",
                self.max_curve_coefficient
            )));
        }
        if !(RATIO_FLOOR..=MAX_RATIO).contains(&self.reserve_ratio_floor) {
            return Err(BondlineError::InvalidParameter(format!(
                "reserve ratio floor {} outside [{RATIO_FLOOR}, {MAX_RATIO}]",
                self.reserve_ratio_floor
            )));
        }
        self.engine.validate()
    }
}

/// What a creator submits to launch a token
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchRequest {
    pub name: String,
    pub symbol: String,
    #[serde(with = "amount_str")]
    pub base_price: U256,
    #[serde(default, with = "amount_str")]
    pub curve_coefficient: U256,
    #[serde(default = "default_reserve_ratio_floor")]
    pub min_reserve_ratio: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_uri: Option<String>,
}

impl LaunchRequest {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, base_price: U256, curve_coefficient: U256) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            base_price,
            curve_coefficient,
            min_reserve_ratio: RATIO_FLOOR,
            description: String::new(),
            image_uri: None,
        }
    }

    pub fn with_min_reserve_ratio(mut self, ratio: u32) -> Self {
        self.min_reserve_ratio = ratio;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Check the request against registry policy
    pub fn validate(&self, config: &RegistryConfig) -> Result<()> {
        let name_len = self.name.trim().chars().count();
        if name_len == 0 || name_len > config.max_name_len {
            return Err(BondlineError::InvalidParameter(format!(
                "name must be 1..={} characters",
                config.max_name_len
            )));
        }
        let symbol_len = self.symbol.len();
        if symbol_len == 0 || symbol_len > config.max_symbol_len {
            return Err(BondlineError::InvalidParameter(format!(
                "symbol must be 1..={} characters",
                config.max_symbol_len
            )));
        }
        if !self.symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(BondlineError::InvalidParameter(format!(
                "symbol {} must be ASCII alphanumeric",
                self.symbol
            )));
        }
        if self.base_price < config.min_base_price || self.base_price > config.max_base_price {
            return Err(BondlineError::InvalidParameter(format!(
                "base price {} outside [{}, {}]",
                self.base_price, config.min_base_price, config.max_base_price
            )));
        }
        if self.curve_coefficient > config.max_curve_coefficient {
            return Err(BondlineError::InvalidParameter(format!(
                "curve coefficient {} above {}",
                self.curve_coefficient, config.max_curve_coefficient
            )));
        }
        if self.min_reserve_ratio < config.reserve_ratio_floor || self.min_reserve_ratio > MAX_RATIO {
            return Err(BondlineError::InvalidParameter(format!(
                "min reserve ratio {} outside [{}, {MAX_RATIO}]",
                self.min_reserve_ratio, config.reserve_ratio_floor
            )));
        }
        Ok(())
    }

    /// Canonical key used for symbol uniqueness
    pub fn symbol_key(&self) -> String {
        self.symbol.to_ascii_uppercase()
    }
}
