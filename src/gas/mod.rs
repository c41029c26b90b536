//! Gas price estimates.
//!
//! Responsibilities:
//! • Fetch tiered gas estimates from an external source (`station`).
//! • Convert them to wei and keep the latest snapshot in a TTL cache (`cache`).
//! • Fall back to the last known snapshot when the source is unreachable.

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub mod cache;
pub mod station;

pub use cache::{GasStorage, MemoryStorage};
pub use station::EthGasStation;

const GWEI: u64 = 1_000_000_000;

/// Tiered gas prices in wei plus the average block time in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GasSnapshot {
    pub safe_low: u64,
    pub average: u64,
    pub fast: u64,
    pub fastest: u64,
    pub block_time: f64,
}

impl GasSnapshot {
    /// No tier carries a price; `block_time` alone is not usable gas data.
    pub fn is_empty(&self) -> bool {
        self.safe_low == 0 && self.average == 0 && self.fast == 0 && self.fastest == 0
    }

    pub fn price(&self, tier: GasTier) -> u64 {
        match tier {
            GasTier::SafeLow => self.safe_low,
            GasTier::Average => self.average,
            GasTier::Fast => self.fast,
            GasTier::Fastest => self.fastest,
        }
    }
}

/// Which estimate to bid with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GasTier {
    SafeLow,
    Average,
    Fast,
    #[default]
    Fastest,
}

impl FromStr for GasTier {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "safe_low" | "safelow" => Ok(Self::SafeLow),
            "average" => Ok(Self::Average),
            "fast" => Ok(Self::Fast),
            "fastest" => Ok(Self::Fastest),
            other => Err(AppError::Config(format!("unknown gas tier '{other}'"))),
        }
    }
}

/// Gas station payload. Tiers are integers in tenths of gwei.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RawGasPrices {
    pub fast: u64,
    pub fastest: u64,
    #[serde(rename = "safeLow")]
    pub safe_low: u64,
    pub average: u64,
    #[serde(default)]
    pub block_time: f64,
}

impl RawGasPrices {
    pub fn normalize(&self) -> GasSnapshot {
        GasSnapshot {
            safe_low: tenths_gwei_to_wei(self.safe_low),
            average: tenths_gwei_to_wei(self.average),
            fast: tenths_gwei_to_wei(self.fast),
            fastest: tenths_gwei_to_wei(self.fastest),
            block_time: self.block_time,
        }
    }
}

/// Drops the tenths digit, then scales gwei to wei: 47 -> 4_000_000_000.
/// The truncation is part of the output format and must happen first.
pub fn tenths_gwei_to_wei(raw: u64) -> u64 {
    (raw / 10).saturating_mul(GWEI)
}

/// Where raw gas estimates come from.
#[async_trait]
pub trait GasSource: Send + Sync {
    async fn fetch(&self) -> Result<RawGasPrices>;
}

/// Supplies gas estimates to transaction builders.
#[async_trait]
pub trait GasPriceProvider: Send + Sync {
    /// Returns a fresh or cached snapshot. When the source fails the error is
    /// [`AppError::StaleGas`], carrying the last cached snapshot.
    async fn gas_prices(&self) -> Result<GasSnapshot>;
}

/// [`GasPriceProvider`] backed by a [`GasSource`] and a [`GasStorage`].
pub struct GasOracle {
    source: Arc<dyn GasSource>,
    storage: Arc<dyn GasStorage>,
    ttl: Duration,
    timeout: Duration,
}

impl GasOracle {
    pub fn new(
        source: Arc<dyn GasSource>,
        storage: Arc<dyn GasStorage>,
        ttl: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            source,
            storage,
            ttl,
            timeout,
        }
    }

    async fn fetch_fresh(&self) -> Result<RawGasPrices> {
        match tokio::time::timeout(self.timeout, self.source.fetch()).await {
            Ok(res) => res,
            Err(_) => Err(AppError::Other(format!(
                "gas source timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

#[async_trait]
impl GasPriceProvider for GasOracle {
    async fn gas_prices(&self) -> Result<GasSnapshot> {
        if let Some(cached) = self.storage.get() {
            return Ok(cached);
        }

        let raw = match self.fetch_fresh().await {
            Ok(raw) => raw,
            Err(e) => {
                return Err(AppError::StaleGas {
                    stale: self.storage.get_stale(),
                    source: Box::new(e),
                });
            }
        };

        let snapshot = raw.normalize();
        self.storage.set(snapshot, self.ttl);
        debug!(
            fastest = snapshot.fastest,
            fast = snapshot.fast,
            average = snapshot.average,
            safe_low = snapshot.safe_low,
            "[GAS] cache refreshed"
        );
        Ok(snapshot)
    }
}

/// Accepts a degraded snapshot when one exists.
///
/// A stale but non-empty snapshot is returned with a warning; an empty one
/// means nothing was ever cached, so the fetch error itself is returned.
pub fn accept_stale(result: Result<GasSnapshot>) -> Result<GasSnapshot> {
    match result {
        Err(AppError::StaleGas { stale, source }) if !stale.is_empty() => {
            warn!(error = %source, fastest = stale.fastest, "[GAS] using stale gas prices");
            Ok(stale)
        }
        Err(AppError::StaleGas { source, .. }) => Err(*source),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedSource {
        responses: std::sync::Mutex<Vec<Result<RawGasPrices>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(mut responses: Vec<Result<RawGasPrices>>) -> Arc<Self> {
            responses.reverse();
            Arc::new(Self {
                responses: std::sync::Mutex::new(responses),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GasSource for ScriptedSource {
        async fn fetch(&self) -> Result<RawGasPrices> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(AppError::Other("no scripted response".into())))
        }
    }

    fn raw(fast: u64) -> RawGasPrices {
        RawGasPrices {
            fast,
            fastest: fast + 10,
            safe_low: 20,
            average: 30,
            block_time: 13.5,
        }
    }

    fn oracle(source: Arc<ScriptedSource>, storage: Arc<MemoryStorage>) -> GasOracle {
        GasOracle::new(
            source,
            storage,
            Duration::from_secs(10),
            Duration::from_secs(25),
        )
    }

    #[test]
    fn conversion_truncates_before_scaling() {
        assert_eq!(tenths_gwei_to_wei(47), 4_000_000_000);
        assert_eq!(tenths_gwei_to_wei(55), 5_000_000_000);
        assert_eq!(tenths_gwei_to_wei(9), 0);
        assert_eq!(tenths_gwei_to_wei(10), GWEI);
        assert_ne!(tenths_gwei_to_wei(47), 47 * 100_000_000);
    }

    #[test]
    fn normalize_keeps_block_time() {
        let snap = raw(55).normalize();
        assert_eq!(snap.fast, 5_000_000_000);
        assert_eq!(snap.fastest, 6_000_000_000);
        assert_eq!(snap.safe_low, 2_000_000_000);
        assert_eq!(snap.average, 3_000_000_000);
        assert_eq!(snap.block_time, 13.5);
    }

    #[test]
    fn gas_tier_parsing() {
        assert_eq!("FASTEST".parse::<GasTier>().unwrap(), GasTier::Fastest);
        assert_eq!("safe_low".parse::<GasTier>().unwrap(), GasTier::SafeLow);
        assert_eq!(" fast ".parse::<GasTier>().unwrap(), GasTier::Fast);
        assert!("ludicrous".parse::<GasTier>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn miss_fetches_and_caches() {
        let source = ScriptedSource::new(vec![Ok(raw(55))]);
        let storage = Arc::new(MemoryStorage::new());
        let oracle = oracle(source.clone(), storage.clone());

        let first = oracle.gas_prices().await.unwrap();
        assert_eq!(first.fast, 5_000_000_000);
        assert_eq!(storage.get(), Some(first));

        // Second read inside the TTL never touches the source.
        let second = oracle.gas_prices().await.unwrap();
        assert_eq!(second, first);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_cache_hides_source_failure() {
        let source = ScriptedSource::new(vec![
            Ok(raw(55)),
            Err(AppError::Other("station down".into())),
        ]);
        let storage = Arc::new(MemoryStorage::new());
        let oracle = oracle(source.clone(), storage);

        let cached = oracle.gas_prices().await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;

        let again = oracle.gas_prices().await.expect("still fresh");
        assert_eq!(again, cached);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_after_expiry_returns_stale_with_error() {
        let source = ScriptedSource::new(vec![
            Ok(raw(55)),
            Err(AppError::Other("station down".into())),
        ]);
        let storage = Arc::new(MemoryStorage::new());
        let oracle = oracle(source.clone(), storage);

        let cached = oracle.gas_prices().await.unwrap();
        tokio::time::advance(Duration::from_secs(11)).await;

        match oracle.gas_prices().await {
            Err(AppError::StaleGas { stale, source }) => {
                assert_eq!(stale, cached);
                assert!(source.to_string().contains("station down"));
            }
            other => panic!("expected StaleGas, got {other:?}"),
        }
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_with_empty_cache_carries_zero_snapshot() {
        let source = ScriptedSource::new(vec![Err(AppError::Other("station down".into()))]);
        let oracle = oracle(source, Arc::new(MemoryStorage::new()));

        let res = oracle.gas_prices().await;
        match &res {
            Err(AppError::StaleGas { stale, .. }) => assert!(stale.is_empty()),
            other => panic!("expected StaleGas, got {other:?}"),
        }

        let err = accept_stale(res).unwrap_err();
        assert!(matches!(err, AppError::Other(ref msg) if msg == "station down"));
    }

    #[test]
    fn accept_stale_uses_non_empty_snapshot() {
        let stale = raw(55).normalize();
        let res = Err(AppError::StaleGas {
            stale,
            source: Box::new(AppError::Other("down".into())),
        });
        assert_eq!(accept_stale(res).unwrap(), stale);
    }

    #[test]
    fn block_time_alone_is_not_usable() {
        let stale = GasSnapshot {
            block_time: 13.2,
            ..GasSnapshot::default()
        };
        assert!(stale.is_empty());

        let res = Err(AppError::StaleGas {
            stale,
            source: Box::new(AppError::Other("station down".into())),
        });
        assert!(matches!(accept_stale(res), Err(AppError::Other(ref msg)) if msg == "station down"));
    }

    #[test]
    fn accept_stale_passes_other_results_through() {
        let fresh = raw(70).normalize();
        assert_eq!(accept_stale(Ok(fresh)).unwrap(), fresh);
        assert!(matches!(
            accept_stale(Err(AppError::Execution("x".into()))),
            Err(AppError::Execution(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_after_expiry() {
        let source = ScriptedSource::new(vec![Ok(raw(55)), Ok(raw(95))]);
        let oracle = oracle(source.clone(), Arc::new(MemoryStorage::new()));

        assert_eq!(oracle.gas_prices().await.unwrap().fast, 5_000_000_000);
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(oracle.gas_prices().await.unwrap().fast, 9_000_000_000);
        assert_eq!(source.calls(), 2);
    }
}
