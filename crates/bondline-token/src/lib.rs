//! # Bondline Token
//!
//! The per-token state machine: an ERC-20 style ledger whose supply is
//! issued and redeemed against a quadratic bonding curve, backed by a
//! currency reserve and charged two pull-payment fee streams.
//!
//! ```text
//!   mint(ton) ──► fees ──► net ──► curve quote ──► reserve += net, supply += out
//!   burn(tok) ──► curve quote ──► fees ──► ratio check ──► reserve -= gross, pay net
//! ```
//!
//! - `Ledger` - balances, allowances, supply
//! - `FeeAccrual` - creator spread and protocol fee, withdrawn on demand
//! - `PauseGate` - creator emergency stop
//! - `TokenEngine` - composes the above behind one per-instance lock

pub mod config;
pub mod engine;
pub mod events;
pub mod fees;
mod journal;
pub mod ledger;
pub mod pause;
pub mod treasury;

pub use config::{EngineConfig, TokenParams};
pub use engine::{BurnReceipt, EngineSnapshot, EngineState, MintReceipt, TokenEngine, TokenInfo};
pub use events::{EngineEvent, EventLog};
pub use fees::{FeeAccrual, FeeSplit};
pub use ledger::Ledger;
pub use pause::PauseGate;
pub use treasury::{CurrencyTransfer, MemoryBank, TransferError};
