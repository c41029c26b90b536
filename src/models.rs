//! Shared data structures used throughout the application.

/// Both sides of the monitored pair's exchange rate, as reported by one poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceQuote {
    /// token1 per token0 (USDC per ETH for the default pair).
    pub price0: f64,
    /// token0 per token1.
    pub price1: f64,
}

/// Decision derived from a single quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSignal {
    Act,
    Wait,
}

impl TradeSignal {
    /// `Act` when `price0` is at or above the threshold.
    pub fn evaluate(quote: &PriceQuote, threshold: f64) -> Self {
        if quote.price0 >= threshold {
            Self::Act
        } else {
            Self::Wait
        }
    }
}
