//! ETH Gas Station HTTP client.

use super::{GasSource, RawGasPrices};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

pub const ETH_GAS_STATION_URL: &str = "https://ethgasstation.info/api/ethgasAPI.json";

/// Unauthenticated client for the `ethgasAPI.json` endpoint.
#[derive(Clone)]
pub struct EthGasStation {
    client: Client,
    url: String,
}

impl EthGasStation {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: crate::utils::http_client(timeout)?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl GasSource for EthGasStation {
    async fn fetch(&self) -> Result<RawGasPrices> {
        let res = self.client.get(&self.url).send().await?;
        if res.status() != StatusCode::OK {
            return Err(AppError::Status {
                endpoint: "gas station",
                status: res.status().as_u16(),
            });
        }
        let raw: RawGasPrices = res.json().await?;
        debug!(?raw, "[GAS] fetched raw gas prices");
        Ok(raw)
    }
}
