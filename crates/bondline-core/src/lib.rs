//! # Bondline Core
//!
//! Shared building blocks for the Bondline bonding-curve token engine.
//!
//! - `Address` / `TokenId` - identities for accounts and launched tokens
//! - `Amount` - 256-bit unsigned fixed-point quantity (18 decimals)
//! - `BondlineError` - the single error taxonomy every crate reports through
//!
//! ## Units
//!
//! ```text
//!   1 TON   = 1_000_000_000_000_000_000 units  (PRECISION)
//!   1 token = 1_000_000_000_000_000_000 units
//!   ratios and fees are basis points: 10_000 = 100%
//! ```

pub mod error;
pub mod types;

pub use error::*;
pub use types::*;

/// 256-bit unsigned integers used for every currency and token quantity.
pub use primitive_types::{U256, U512};

/// Protocol constants
pub mod constants {
    use primitive_types::U256;

    /// Fixed-point scale shared by prices, supplies and currency amounts
    pub const PRECISION: U256 = U256([1_000_000_000_000_000_000, 0, 0, 0]);

    /// One whole unit (TON or token) in base units
    pub const ONE_UNIT: u128 = 1_000_000_000_000_000_000;

    /// Token decimals (same as ETH)
    pub const DECIMALS: u8 = 18;

    /// Basis-point denominator
    pub const BPS_DENOMINATOR: u32 = 10_000;

    /// Fully backed ratio; reported ratios are capped here
    pub const MAX_RATIO: u32 = 10_000;

    /// Lowest minimum reserve ratio a token may be launched with (50%)
    pub const RATIO_FLOOR: u32 = 5_000;

    /// Smallest accepted base price: 0.000001 TON
    pub const MIN_BASE_PRICE: u128 = 1_000_000_000_000;

    /// Largest accepted base price: 1,000,000 TON
    pub const MAX_BASE_PRICE: u128 = 1_000_000 * ONE_UNIT;

    /// Largest accepted curve coefficient
    pub const MAX_CURVE_COEFFICIENT: u128 = ONE_UNIT;

    /// Default spread credited to the creator (1%)
    pub const DEFAULT_SPREAD_BPS: u32 = 100;

    /// Default protocol fee credited to the platform (0.5%)
    pub const DEFAULT_PROTOCOL_BPS: u32 = 50;

    /// Upper bound for any single fee stream (10%)
    pub const MAX_FEE_BPS: u32 = 1_000;

    /// Number of slices used when quoting mints and burns
    pub const QUOTE_STEPS: u32 = 100;

    /// Events an engine retains before evicting the oldest
    pub const EVENT_LOG_CAPACITY: usize = 10_000;
}

pub use constants::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::constants::*;
    pub use crate::error::{BondlineError, Result};
    pub use crate::types::*;
    pub use primitive_types::{U256, U512};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_matches_one_unit() {
        assert_eq!(PRECISION, U256::from(ONE_UNIT));
        assert_eq!(PRECISION, U256::exp10(18));
    }

    #[test]
    fn test_bounds_are_ordered() {
        assert!(MIN_BASE_PRICE < MAX_BASE_PRICE);
        assert!(RATIO_FLOOR < MAX_RATIO);
        assert!(DEFAULT_SPREAD_BPS + DEFAULT_PROTOCOL_BPS < BPS_DENOMINATOR);
    }
}
