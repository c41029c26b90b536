//! DEX integration for Uniswap V2.
//!
//! The trigger loop only sees the [`Executor`] trait: two opaque on-chain
//! operations that return the hash of a mined, non-reverted transaction or fail.

use crate::errors::Result;
use async_trait::async_trait;
use ethers::contract::abigen;

pub mod client;

pub use client::UniswapV2;

abigen!(
    UniswapV2Router02,
    r"[
        function removeLiquidityETH(address token, uint256 liquidity, uint256 amountTokenMin, uint256 amountETHMin, address to, uint256 deadline) returns (uint256 amountToken, uint256 amountETH)
        function swapExactETHForTokens(uint256 amountOutMin, address[] path, address to, uint256 deadline) payable returns (uint256[] amounts)
    ]",
);

abigen!(
    UniswapV2Pair,
    r"[
        function balanceOf(address owner) view returns (uint256)
    ]",
);

/// The two dependent operations performed once the trigger fires.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Pull the liquidity position out of the pool. Returns the tx hash.
    async fn withdraw(&self) -> Result<String>;

    /// Swap the withdrawn ETH into the pair's other token. Returns the tx hash.
    async fn exchange(&self) -> Result<String>;
}
