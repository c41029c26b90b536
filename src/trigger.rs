//! Price-triggered execution loop.
//!
//! Each iteration polls the pair price. At or above the threshold it removes
//! liquidity and then swaps the proceeds; anything below just waits. Every
//! iteration ends with a fixed cooldown, a failed poll with the retry delay.
//! Failed operations are reported to the operator and the loop carries on.

use crate::dex::Executor;
use crate::journal::Journal;
use crate::models::{PriceQuote, TradeSignal};
use crate::notify::Notifier;
use crate::price::PriceSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Fixed delays between iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// After a failed price poll.
    pub retry_delay: Duration,
    /// After every other iteration, successful or not.
    pub cooldown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_millis(100),
            cooldown: Duration::from_millis(100),
        }
    }
}

/// What a single iteration did.
#[derive(Debug, Clone, PartialEq)]
pub enum Iteration {
    PriceUnavailable,
    Waiting { quote: PriceQuote },
    Executed { withdraw_tx: String, exchange_tx: String },
    WithdrawFailed,
    ExchangeFailed { withdraw_tx: String },
}

impl Iteration {
    pub fn delay(&self, policy: &RetryPolicy) -> Duration {
        match self {
            Self::PriceUnavailable => policy.retry_delay,
            _ => policy.cooldown,
        }
    }
}

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub polls: u64,
    pub price_failures: u64,
    pub triggers: u64,
    pub completed: u64,
    pub failed: u64,
}

impl LoopStats {
    fn record(&mut self, outcome: &Iteration) {
        self.polls += 1;
        match outcome {
            Iteration::PriceUnavailable => self.price_failures += 1,
            Iteration::Waiting { .. } => {}
            Iteration::Executed { .. } => {
                self.triggers += 1;
                self.completed += 1;
            }
            Iteration::WithdrawFailed | Iteration::ExchangeFailed { .. } => {
                self.triggers += 1;
                self.failed += 1;
            }
        }
    }
}

pub struct TriggerLoop {
    price: Arc<dyn PriceSource>,
    executor: Arc<dyn Executor>,
    notifier: Arc<dyn Notifier>,
    threshold: f64,
    policy: RetryPolicy,
    journal: Option<Journal>,
}

impl TriggerLoop {
    pub fn new(
        price: Arc<dyn PriceSource>,
        executor: Arc<dyn Executor>,
        notifier: Arc<dyn Notifier>,
        threshold: f64,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            price,
            executor,
            notifier,
            threshold,
            policy,
            journal: None,
        }
    }

    /// Track withdraw-without-swap in `journal`.
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Report a withdraw left without its swap by a previous run.
    ///
    /// The marker is kept; it is cleared by the next completed swap.
    pub async fn report_unfinished(&self) {
        let Some(journal) = &self.journal else {
            return;
        };
        match journal.load() {
            Ok(Some(pending)) => {
                error!(withdraw_tx = %pending.withdraw_tx, "[EXEC] previous run did not finish the swap");
                self.send(format!("unfinished exit: {}", pending.describe())).await;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, path = %journal.path().display(), "[JOURNAL] unreadable"),
        }
    }

    /// Poll forever until `shutdown` turns true or its sender goes away.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> LoopStats {
        let mut stats = LoopStats::default();
        info!(threshold = self.threshold, policy = ?self.policy, "[INIT] trigger loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            let outcome = self.run_once().await;
            stats.record(&outcome);

            tokio::select! {
                _ = tokio::time::sleep(outcome.delay(&self.policy)) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(?stats, "[SHUTDOWN] trigger loop stopped");
        stats
    }

    /// One poll and, if triggered, one withdraw/exchange attempt.
    pub async fn run_once(&self) -> Iteration {
        let quote = match self.price.fetch_quote().await {
            Ok(q) => q,
            Err(e) => {
                warn!(error = %e, "[PRICE] fetch failed");
                return Iteration::PriceUnavailable;
            }
        };

        match TradeSignal::evaluate(&quote, self.threshold) {
            TradeSignal::Wait => {
                debug!(price0 = quote.price0, threshold = self.threshold, "[PRICE] below threshold");
                Iteration::Waiting { quote }
            }
            TradeSignal::Act => {
                info!(price0 = quote.price0, threshold = self.threshold, "[EXEC] threshold reached");
                self.execute().await
            }
        }
    }

    async fn execute(&self) -> Iteration {
        let withdraw_tx = match self.executor.withdraw().await {
            Ok(tx) => tx,
            Err(e) => {
                error!(error = %e, "[EXEC] remove liquidity failed");
                self.send(format!("remove liquidity {e}")).await;
                return Iteration::WithdrawFailed;
            }
        };
        info!(tx = %withdraw_tx, "[EXEC] liquidity removed");
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.record_withdraw(&withdraw_tx) {
                warn!(error = %e, "[JOURNAL] could not record pending swap");
            }
        }

        let exchange_tx = match self.executor.exchange().await {
            Ok(tx) => tx,
            Err(e) => {
                error!(error = %e, withdraw_tx = %withdraw_tx, "[EXEC] swap failed");
                self.send(format!("swap {e}")).await;
                return Iteration::ExchangeFailed { withdraw_tx };
            }
        };
        info!(tx = %exchange_tx, "[EXEC] swap completed");
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.clear() {
                warn!(error = %e, "[JOURNAL] could not clear pending swap");
            }
        }

        Iteration::Executed {
            withdraw_tx,
            exchange_tx,
        }
    }

    /// Delivery failures are logged and otherwise ignored.
    async fn send(&self, message: String) {
        if let Err(e) = self.notifier.notify(&message).await {
            warn!(error = %e, "[NOTIFY] delivery failed");
        }
    }
}
