//! Error types for Bondline operations
//!
//! Every failure is terminal for the call that produced it: the operation is
//! rolled back in full and nothing is retried on the caller's behalf.

use primitive_types::U256;
use thiserror::Error;

/// Result type alias for Bondline operations
pub type Result<T> = std::result::Result<T, BondlineError>;

/// Errors that can occur while launching or trading a bonding-curve token
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BondlineError {
    // === Parameters ===
    /// Construction-time bound violation
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Trade or deposit with zero value
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    /// Fixed-point intermediate did not fit in 256 bits
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    // === Authorization & state ===
    /// Caller is not allowed to perform this operation
    #[error("Unauthorized caller")]
    Unauthorized,

    /// Operation blocked because the token is paused
    #[error("Token is paused")]
    AlreadyPaused,

    /// Unpause requested while not paused
    #[error("Token is not paused")]
    NotPaused,

    /// Burn blocked because the backing ratio is under the floor
    #[error("Redemptions are paused")]
    RedemptionsPaused,

    /// Privileged first mint already performed
    #[error("Token already initialized")]
    AlreadyInitialized,

    /// Same-thread call into an engine whose state is mid-update
    #[error("Re-entrant call rejected")]
    ReentrantCall,

    // === Balances ===
    /// Caller lacks tokens
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: U256, available: U256 },

    /// Spender lacks allowance
    #[error("Insufficient allowance: required {required}, available {available}")]
    InsufficientAllowance { required: U256, available: U256 },

    /// Reserve cannot cover the gross redemption
    #[error("Insufficient reserve: required {required}, available {available}")]
    InsufficientReserve { required: U256, available: U256 },

    /// Burn amount larger than circulating supply
    #[error("Amount {requested} exceeds supply {supply}")]
    ExceedsSupply { requested: U256, supply: U256 },

    /// Net deposit buys no tokens
    #[error("Deposit too small to mint any tokens")]
    ZeroTokensMinted,

    /// Burn proceeds round to zero after fees
    #[error("Burn too small to return any currency")]
    ZeroTonReturned,

    // === Reserve ratio ===
    /// Burn would leave the backing ratio below the floor
    #[error("Burn would breach reserve ratio: projected {projected} bps, floor {floor} bps")]
    WouldBreachReserveRatio { projected: u32, floor: u32 },

    /// Current ratio is below the floor
    #[error("Reserve ratio too low: {current} bps, floor {floor} bps")]
    ReserveRatioTooLow { current: u32, floor: u32 },

    /// Minimum ratio may only increase
    #[error("Reserve ratio cannot decrease: current {current} bps, requested {requested} bps")]
    RatioDecrease { current: u32, requested: u32 },

    /// Minimum ratio above 100%
    #[error("Reserve ratio {0} bps exceeds 10000")]
    RatioTooHigh(u32),

    // === Fees & currency ===
    /// Withdraw with nothing owed
    #[error("No fees owed")]
    NoFeesOwed,

    /// Outgoing currency transfer failed
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    /// Unsolicited currency refused by policy
    #[error("Bare deposits are not accepted")]
    BareDepositRejected,

    // === Registry ===
    /// Symbol already launched
    #[error("Symbol already exists: {0}")]
    SymbolTaken(String),

    /// Launch payment does not exceed the creation fee
    #[error("Insufficient payment: required more than {required}, got {provided}")]
    InsufficientPayment { required: U256, provided: U256 },

    /// Unknown token
    #[error("Token not found: {0}")]
    TokenNotFound(String),
}

impl BondlineError {
    /// Stable numeric code for client surfaces
    pub fn code(&self) -> u32 {
        match self {
            Self::InvalidParameter(_) => 1001,
            Self::ZeroAmount => 1002,
            Self::ArithmeticOverflow => 1003,
            Self::Unauthorized => 2001,
            Self::AlreadyPaused => 2002,
            Self::NotPaused => 2003,
            Self::RedemptionsPaused => 2004,
            Self::AlreadyInitialized => 2005,
            Self::ReentrantCall => 2006,
            Self::InsufficientBalance { .. } => 3001,
            Self::InsufficientAllowance { .. } => 3002,
            Self::InsufficientReserve { .. } => 3003,
            Self::ExceedsSupply { .. } => 3004,
            Self::ZeroTokensMinted => 3005,
            Self::ZeroTonReturned => 3006,
            Self::WouldBreachReserveRatio { .. } => 4001,
            Self::ReserveRatioTooLow { .. } => 4002,
            Self::RatioDecrease { .. } => 4003,
            Self::RatioTooHigh(_) => 4004,
            Self::NoFeesOwed => 5001,
            Self::TransferFailed(_) => 5002,
            Self::BareDepositRejected => 5003,
            Self::SymbolTaken(_) => 6001,
            Self::InsufficientPayment { .. } => 6002,
            Self::TokenNotFound(_) => 6003,
        }
    }

    /// Nothing in this core is retried automatically; callers resubmit.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(BondlineError::ZeroAmount.code(), 1002);
        assert_eq!(BondlineError::RedemptionsPaused.code(), 2004);
        assert_eq!(
            BondlineError::WouldBreachReserveRatio { projected: 4000, floor: 5000 }.code(),
            4001
        );
    }

    #[test]
    fn test_error_display() {
        let err = BondlineError::InsufficientBalance {
            required: U256::from(10u64),
            available: U256::from(3u64),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("required 10"));
        assert!(msg.contains("available 3"));
    }

    #[test]
    fn test_nothing_is_retryable() {
        assert!(!BondlineError::TransferFailed("rejected".into()).is_retryable());
        assert!(!BondlineError::ReentrantCall.is_retryable());
    }
}
