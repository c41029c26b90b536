//! Partial-completion marker.
//!
//! The withdraw and exchange steps are separate transactions. A marker is
//! written once liquidity has been removed and deleted once the swap went
//! through, so a restart can tell the operator that funds were left
//! unswapped.

use crate::errors::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Liquidity was removed but the follow-up swap has not been confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingExchange {
    pub withdraw_tx: String,
    pub recorded_at: DateTime<Utc>,
}

impl PendingExchange {
    pub fn describe(&self) -> String {
        format!(
            "liquidity removed in {} at {} but the swap never completed; funds are sitting in the wallet as ETH and tokens",
            self.withdraw_tx,
            self.recorded_at.to_rfc3339()
        )
    }
}

#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Leftover marker from a previous run, if any.
    pub fn load(&self) -> Result<Option<PendingExchange>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    pub fn record_withdraw(&self, withdraw_tx: &str) -> Result<()> {
        let entry = PendingExchange {
            withdraw_tx: withdraw_tx.to_string(),
            recorded_at: Utc::now(),
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&entry)?)?;
        debug!(path = %self.path.display(), "[JOURNAL] pending exchange recorded");
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            debug!(path = %self.path.display(), "[JOURNAL] cleared");
        }
        Ok(())
    }
}
