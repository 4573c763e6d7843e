//! # Bondline Registry
//!
//! Factory for token engines. Validates launch requests against registry
//! policy, keeps symbols unique (case-insensitively), collects the creation
//! fee and performs each engine's privileged first mint.

pub mod config;
pub mod registry;

pub use config::{LaunchRequest, RegistryConfig};
pub use registry::{LaunchedToken, Registry};
