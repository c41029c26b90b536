//! Miscellaneous helper utilities.

use crate::errors::Result;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt};

/// Initialize `tracing` subscriber with env-based filter.
///
/// If `RUST_LOG` is not set, defaults to `info` level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Shared HTTP client settings for the gas station, subgraph and Telegram.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(30))
        .pool_max_idle_per_host(20)
        .build()?;
    Ok(client)
}

/// Unix timestamp `secs` from now, used as a router deadline.
pub fn deadline_after(secs: u64) -> u64 {
    let now = chrono::Utc::now().timestamp().max(0) as u64;
    now.saturating_add(secs)
}
