//! Configuration loader and application settings.
//!
//! Everything is read from the environment once at startup. A value that is
//! present but malformed is a fatal error; only absent optional values fall
//! back to their defaults.

use crate::errors::{AppError, Result};
use crate::gas::GasTier;
use ethers::types::Address;
use secrecy::SecretString;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_PAIR_ID: &str = "0xb4e16d0168e52d35cacd2c6185b44281ec28c9dc"; // Uniswap V2 USDC/ETH
pub const DEFAULT_SUBGRAPH_URL: &str =
    "https://api.thegraph.com/subgraphs/name/uniswap/uniswap-v2";
pub const DEFAULT_ROUTER: &str = "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D"; // mainnet
pub const DEFAULT_WETH: &str = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2";
pub const DEFAULT_TOKEN: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"; // USDC
pub const DEFAULT_STATE_FILE: &str = "exit_bot_state.json";

/// Consolidated application configuration.
#[derive(Debug)]
pub struct AppConfig {
    /// RPC endpoint for the Ethereum node.
    pub rpc_url: Url,
    /// Hex-encoded signing key.
    pub private_key: SecretString,
    pub telegram: TelegramConfig,
    /// Trigger level for the pair's `token0Price`.
    pub threshold: f64,
    pub pair: PairConfig,
    pub subgraph_url: Url,
    pub gas: GasConfig,
    pub timing: TimingConfig,
    /// Partial-completion journal location.
    pub state_file: PathBuf,
}

#[derive(Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub channel_id: i64,
    /// Bot API server; a self-hosted one can replace api.telegram.org.
    pub api_url: Url,
}

/// Contracts involved in the withdraw and exchange steps.
#[derive(Debug, Clone)]
pub struct PairConfig {
    /// Subgraph id of the pair; also the LP token contract.
    pub pair_id: String,
    pub pair_address: Address,
    pub router: Address,
    pub weth: Address,
    pub token: Address,
}

#[derive(Debug, Clone)]
pub struct GasConfig {
    pub station_url: Url,
    pub tier: GasTier,
    pub gas_limit: u64,
    pub cache_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct TimingConfig {
    /// Request timeout for every outbound HTTP call.
    pub http_timeout: Duration,
    /// Pause before re-polling after a failed price fetch.
    pub retry_delay: Duration,
    /// Pause after every completed iteration.
    pub cooldown: Duration,
    /// Router deadline, relative to submission time.
    pub tx_deadline_secs: u64,
}

impl AppConfig {
    /// Load configuration from process environment variables.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let rpc_url = env.parse_required::<Url>("ETH_RPC_URL")?;
        let private_key = SecretString::new(env.required("PRIVATE_KEY")?);
        let telegram = TelegramConfig {
            bot_token: SecretString::new(env.required("TG_BOT_TOKEN")?),
            channel_id: env.parse_required("TG_CHANNEL_ID")?,
            api_url: env.parse_or("TG_API_URL", crate::notify::telegram::TELEGRAM_API)?,
        };

        let threshold: f64 = env.parse_required("ETH_THRESHOLD")?;
        if !threshold.is_finite() {
            return Err(AppError::Config(format!(
                "ETH_THRESHOLD must be a finite number, got {threshold}"
            )));
        }

        let pair_id = env
            .optional("PAIR_ID")
            .unwrap_or_else(|| DEFAULT_PAIR_ID.to_string())
            .to_lowercase();
        let pair = PairConfig {
            pair_address: parse_value("PAIR_ID", &pair_id)?,
            pair_id,
            router: env.parse_or("ROUTER_ADDRESS", DEFAULT_ROUTER)?,
            weth: env.parse_or("WETH_ADDRESS", DEFAULT_WETH)?,
            token: env.parse_or("TOKEN_ADDRESS", DEFAULT_TOKEN)?,
        };

        let gas = GasConfig {
            station_url: env.parse_or("GAS_STATION_URL", crate::gas::station::ETH_GAS_STATION_URL)?,
            tier: env.parse_or("GAS_TIER", "fastest")?,
            gas_limit: env.parse_or("GAS_LIMIT", "200000")?,
            cache_ttl: Duration::from_secs(env.parse_or("GAS_CACHE_TTL_SECS", "10")?),
        };
        if gas.gas_limit == 0 {
            return Err(AppError::Config("GAS_LIMIT must be greater than zero".into()));
        }

        let timing = TimingConfig {
            http_timeout: Duration::from_secs(env.parse_or("HTTP_TIMEOUT_SECS", "25")?),
            retry_delay: Duration::from_millis(env.parse_or("RETRY_DELAY_MS", "100")?),
            cooldown: Duration::from_millis(env.parse_or("COOLDOWN_MS", "100")?),
            tx_deadline_secs: env.parse_or("TX_DEADLINE_SECS", "3600")?,
        };
        if timing.http_timeout.is_zero() {
            return Err(AppError::Config(
                "HTTP_TIMEOUT_SECS must be greater than zero".into(),
            ));
        }

        Ok(Self {
            rpc_url,
            private_key,
            telegram,
            threshold,
            pair,
            subgraph_url: env.parse_or("SUBGRAPH_URL", DEFAULT_SUBGRAPH_URL)?,
            gas,
            timing,
            state_file: PathBuf::from(
                env.optional("STATE_FILE")
                    .unwrap_or_else(|| DEFAULT_STATE_FILE.to_string()),
            ),
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Present and non-blank.
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.optional(key)
            .ok_or_else(|| AppError::Config(format!("{key} must be set")))
    }

    fn parse_required<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        parse_value(key, &self.required(key)?)
    }

    fn parse_or<T>(&self, key: &str, default: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => parse_value(key, &raw),
            None => parse_value(key, default),
        }
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| AppError::Config(format!("{key}: invalid value '{raw}': {e}")))
}
