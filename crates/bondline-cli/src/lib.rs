//! Bondline command-line support: scenario files and their replay.

pub mod config;
pub mod simulate;

pub use config::{LogFormat, LoggingConfig, Scenario, Step};
pub use simulate::{run, SimulationReport};
