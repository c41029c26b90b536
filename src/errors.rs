use crate::gas::GasSnapshot;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse float error: {0}")]
    ParseFloat(#[from] std::num::ParseFloatError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Never built with the request URL attached: bot API URLs embed the token.
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    #[error("{endpoint} answered with unexpected status {status}")]
    Status { endpoint: &'static str, status: u16 },

    #[error("Subgraph error: {0}")]
    Subgraph(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ethers::providers::ProviderError),

    #[error("Contract error: {0}")]
    Contract(
        #[from]
        ethers::contract::ContractError<ethers::providers::Provider<ethers::providers::Http>>,
    ),

    #[error("Wallet error: {0}")]
    Wallet(#[from] ethers::signers::WalletError),

    #[error("Serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Gas station fetch failed; `stale` is the last cached snapshot, which is
    /// all-zero when nothing was ever cached.
    #[error("Gas station unavailable: {source}")]
    StaleGas {
        stale: GasSnapshot,
        #[source]
        source: Box<AppError>,
    },

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Other: {0}")]
    Other(String),
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Http(e.without_url())
    }
}
