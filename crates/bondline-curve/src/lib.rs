//! # Bondline Curve
//!
//! Pure pricing math for a quadratic bonding curve and the reserve backing
//! ratio derived from it. Nothing here holds locks or performs I/O; every
//! function is a deterministic function of its inputs.
//!
//! ```text
//!   price ▲
//!         │                       ╱
//!         │                    ╱
//!         │               ╱
//!         │        _ ─ ‾
//!   base ─┼─ ─ ‾
//!         └──────────────────────────► supply
//! ```

pub mod curve;
pub mod reserve;

pub use curve::{BondingCurve, BurnQuote, MintQuote};
pub use reserve::{backing_ratio, is_healthy, ReserveLedger};
