//! Scenario files
//!
//! A scenario is a TOML document describing a registry, the tokens to launch
//! and an ordered list of steps to replay against them:
//!
//! ```toml
//! [logging]
//! level = "info"
//! format = "text"
//!
//! [registry]
//! owner = "platform"
//! creation_fee = "1e16"
//!
//! [engine]
//! spread_bps = 100
//! protocol_bps = 50
//!
//! [[launch]]
//! creator = "alice"
//! name = "Frog Coin"
//! symbol = "FROG"
//! base_price = "1e15"
//! curve_coefficient = "1e8"
//! payment = "1e18"
//!
//! [[step]]
//! action = "mint"
//! token = "FROG"
//! account = "bob"
//! amount = "5e17"
//! ```
//!
//! Accounts are either `0x` hex addresses or labels hashed into an address.
//! Amounts are base-unit strings; burns and transfers also accept `"all"`.

use anyhow::{Context, Result};
use bondline_core::prelude::*;
use bondline_core::types::amount_str;
use bondline_registry::{LaunchRequest, RegistryConfig};
use bondline_token::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub registry: RegistrySection,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub launch: Vec<LaunchSection>,

    #[serde(default)]
    pub step: Vec<Step>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing scenario {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn registry_config(&self) -> Result<RegistryConfig> {
        let mut config = RegistryConfig::new(resolve_account(&self.registry.owner)?);
        config.protocol_fee_recipient = self
            .registry
            .protocol_fee_recipient
            .as_deref()
            .map(resolve_account)
            .transpose()?;
        config.creation_fee = self.registry.creation_fee;
        config.engine = self.engine.clone();
        Ok(config)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistrySection {
    #[serde(default = "default_owner")]
    pub owner: String,

    #[serde(default)]
    pub protocol_fee_recipient: Option<String>,

    #[serde(default = "default_creation_fee", with = "amount_str")]
    pub creation_fee: U256,
}

fn default_owner() -> String {
    "platform".to_string()
}

fn default_creation_fee() -> U256 {
    U256::exp10(16)
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            protocol_fee_recipient: None,
            creation_fee: default_creation_fee(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LaunchSection {
    pub creator: String,

    #[serde(flatten)]
    pub request: LaunchRequest,

    /// Currency sent with the launch: creation fee plus the initial buy
    #[serde(with = "amount_str")]
    pub payment: U256,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Mint {
        token: String,
        account: String,
        amount: String,
    },
    Burn {
        token: String,
        account: String,
        amount: String,
    },
    Deposit {
        token: String,
        account: String,
        amount: String,
    },
    WithdrawFees {
        token: String,
        account: String,
    },
    Pause {
        token: String,
        account: String,
        #[serde(default)]
        reason: String,
    },
    Unpause {
        token: String,
        account: String,
    },
    RaiseFloor {
        token: String,
        account: String,
        ratio: u32,
    },
    Transfer {
        token: String,
        from: String,
        to: String,
        amount: String,
    },
    WithdrawCreationFees {
        account: String,
    },
}

impl Step {
    pub fn action(&self) -> &'static str {
        match self {
            Self::Mint { .. } => "mint",
            Self::Burn { .. } => "burn",
            Self::Deposit { .. } => "deposit",
            Self::WithdrawFees { .. } => "withdraw_fees",
            Self::Pause { .. } => "pause",
            Self::Unpause { .. } => "unpause",
            Self::RaiseFloor { .. } => "raise_floor",
            Self::Transfer { .. } => "transfer",
            Self::WithdrawCreationFees { .. } => "withdraw_creation_fees",
        }
    }
}

/// `0x…` hex address, or a label hashed into one
pub fn resolve_account(account: &str) -> Result<Address> {
    let account = account.trim();
    if account.starts_with("0x") {
        return Address::from_hex(account).with_context(|| format!("account {account}"));
    }
    if account.is_empty() {
        anyhow::bail!("empty account name");
    }
    Ok(Address::from_label(account))
}

/// Parse a step amount; `"all"` resolves to `available`
pub fn resolve_amount(amount: &str, available: U256) -> Result<U256> {
    if amount.trim().eq_ignore_ascii_case("all") {
        return Ok(available);
    }
    parse_amount(amount).with_context(|| format!("amount {amount}"))
}
