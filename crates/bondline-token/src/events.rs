//! Engine events for off-chain indexing
//!
//! Events are appended to the engine's log as part of the operation that
//! produced them and disappear with it if the operation is rolled back. After
//! commit each one is mirrored as a `tracing` record.

use bondline_core::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    Minted {
        user: Address,
        gross_in: U256,
        tokens_out: U256,
        new_price: U256,
    },
    Burned {
        user: Address,
        tokens_in: U256,
        net_out: U256,
        new_price: U256,
    },
    ReserveRatioUpdated {
        old: u32,
        new: u32,
    },
    Paused {
        by: Address,
        reason: String,
    },
    Unpaused {
        by: Address,
    },
    ReserveDeposited {
        by: Address,
        amount: U256,
    },
    FeeAccrued {
        recipient: Address,
        amount: U256,
    },
    FeeWithdrawn {
        recipient: Address,
        amount: U256,
    },
    MetadataUpdated {
        description: String,
        image_uri: Option<String>,
    },
    Transfer {
        from: Option<Address>,
        to: Option<Address>,
        amount: U256,
    },
    Approval {
        owner: Address,
        spender: Address,
        amount: U256,
    },
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Minted { .. } => "Minted",
            Self::Burned { .. } => "Burned",
            Self::ReserveRatioUpdated { .. } => "ReserveRatioUpdated",
            Self::Paused { .. } => "Paused",
            Self::Unpaused { .. } => "Unpaused",
            Self::ReserveDeposited { .. } => "ReserveDeposited",
            Self::FeeAccrued { .. } => "FeeAccrued",
            Self::FeeWithdrawn { .. } => "FeeWithdrawn",
            Self::MetadataUpdated { .. } => "MetadataUpdated",
            Self::Transfer { .. } => "Transfer",
            Self::Approval { .. } => "Approval",
        }
    }

    pub(crate) fn trace(&self, symbol: &str) {
        match self {
            Self::Minted { user, gross_in, tokens_out, new_price } => tracing::info!(
                token = symbol, %user, %gross_in, %tokens_out, %new_price, "minted"
            ),
            Self::Burned { user, tokens_in, net_out, new_price } => tracing::info!(
                token = symbol, %user, %tokens_in, %net_out, %new_price, "burned"
            ),
            Self::ReserveRatioUpdated { old, new } => {
                tracing::info!(token = symbol, old, new, "reserve ratio floor raised")
            }
            Self::Paused { by, reason } => {
                tracing::warn!(token = symbol, %by, reason = reason.as_str(), "paused")
            }
            Self::Unpaused { by } => tracing::info!(token = symbol, %by, "unpaused"),
            Self::ReserveDeposited { by, amount } => {
                tracing::info!(token = symbol, %by, %amount, "reserve deposited")
            }
            Self::FeeWithdrawn { recipient, amount } => {
                tracing::info!(token = symbol, %recipient, %amount, "fees withdrawn")
            }
            Self::MetadataUpdated { .. } => tracing::info!(token = symbol, "metadata updated"),
            Self::FeeAccrued { recipient, amount } => {
                tracing::debug!(token = symbol, %recipient, %amount, "fee accrued")
            }
            Self::Transfer { .. } | Self::Approval { .. } => {
                tracing::trace!(token = symbol, event = self.name())
            }
        }
    }
}

/// Ordered event history of one engine. Oldest entries are evicted by
/// `trim` once the engine's capacity is exceeded; `evicted` counts them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    entries: VecDeque<EngineEvent>,
    #[serde(default)]
    evicted: u64,
}

impl EventLog {
    pub fn emit(&mut self, event: EngineEvent) {
        self.entries.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Events dropped by `trim` over the log's lifetime
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn iter(&self) -> impl Iterator<Item = &EngineEvent> {
        self.entries.iter()
    }

    /// Events recorded at or after `start`
    pub fn since(&self, start: usize) -> impl Iterator<Item = &EngineEvent> {
        self.entries.iter().skip(start)
    }

    pub fn drain(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.entries).into()
    }

    /// Drop everything recorded at or after `len`
    pub(crate) fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    /// Evict the oldest events until at most `capacity` remain
    pub(crate) fn trim(&mut self, capacity: usize) {
        let excess = self.entries.len().saturating_sub(capacity);
        if excess > 0 {
            self.entries.drain(..excess);
            self.evicted += excess as u64;
        }
    }
}
