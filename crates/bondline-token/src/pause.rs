//! Emergency pause gate

use bondline_core::prelude::*;
use serde::{Deserialize, Serialize};

/// Creator-controlled stop for issuance and redemption
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseGate {
    paused: bool,
    reason: Option<String>,
}

impl PauseGate {
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Fails `AlreadyPaused` while the gate is closed
    pub fn ensure_active(&self) -> Result<()> {
        if self.paused {
            return Err(BondlineError::AlreadyPaused);
        }
        Ok(())
    }

    pub fn pause(&mut self, reason: impl Into<String>) -> Result<()> {
        self.ensure_active()?;
        self.paused = true;
        self.reason = Some(reason.into());
        Ok(())
    }

    pub fn unpause(&mut self) -> Result<()> {
        if !self.paused {
            return Err(BondlineError::NotPaused);
        }
        self.paused = false;
        self.reason = None;
        Ok(())
    }
}
