//! Operator notifications.

use crate::errors::Result;
use async_trait::async_trait;

pub mod telegram;

pub use telegram::TelegramNotifier;

/// Best-effort delivery of a human-readable message to an operator channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<()>;
}
