//! Core library for the uniswap-exit-bot project.
//!
//! Watches a Uniswap V2 pair price and, once it reaches the configured
//! threshold, removes the operator's liquidity and swaps the ETH proceeds.
//! The binary (`main.rs`) wires the concrete clients into [`trigger::TriggerLoop`].

pub mod config;
pub mod dex;
pub mod errors;
pub mod gas;
pub mod journal;
pub mod models;
pub mod notify;
pub mod price;
pub mod trigger;
pub mod utils;
