//! Pair price feed.
//!
//! Responsibilities:
//! • Poll the current exchange rate of the monitored pair.
//! • Report unreachable or malformed sources as errors; the trigger loop retries.

use crate::errors::Result;
use crate::models::PriceQuote;
use async_trait::async_trait;

pub mod subgraph;

pub use subgraph::SubgraphClient;

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Latest quote for the pair the source was built for.
    async fn fetch_quote(&self) -> Result<PriceQuote>;
}
