use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use uniswap_exit_bot::{
    config::AppConfig,
    dex::UniswapV2,
    gas::{self, EthGasStation, GasOracle, GasPriceProvider, MemoryStorage},
    journal::Journal,
    notify::TelegramNotifier,
    price::SubgraphClient,
    trigger::{RetryPolicy, TriggerLoop},
    utils,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    utils::init_logging();

    // Configuration: any malformed value stops the process here.
    let cfg = AppConfig::load().context("invalid configuration")?;
    tracing::info!(
        threshold = cfg.threshold,
        pair = %cfg.pair.pair_id,
        gas_tier = ?cfg.gas.tier,
        "[INIT] uniswap-exit-bot starting"
    );

    // Gas price cache ------------------------------------------------------
    let station = Arc::new(EthGasStation::new(
        cfg.gas.station_url.as_str(),
        cfg.timing.http_timeout,
    )?);
    let gas_oracle = Arc::new(GasOracle::new(
        station,
        Arc::new(MemoryStorage::new()),
        cfg.gas.cache_ttl,
        cfg.timing.http_timeout,
    ));
    // Warm the cache; a failure here only means the first trade fetches again.
    if let Err(e) = gas::accept_stale(gas_oracle.gas_prices().await) {
        tracing::warn!(error = %e, "[GAS] initial fetch failed");
    }

    // Collaborators --------------------------------------------------------
    let dex = UniswapV2::connect(
        &cfg.rpc_url,
        &cfg.private_key,
        &cfg.pair,
        &cfg.gas,
        gas_oracle,
        cfg.timing.tx_deadline_secs,
    )
    .await
    .context("failed to connect to the Ethereum node")?;
    let price = SubgraphClient::new(
        cfg.subgraph_url.clone(),
        cfg.pair.pair_id.clone(),
        cfg.timing.http_timeout,
    )?;
    let notifier = TelegramNotifier::new(
        cfg.telegram.bot_token,
        cfg.telegram.channel_id,
        cfg.timing.http_timeout,
    )?
    .with_api_base(cfg.telegram.api_url.as_str());

    let trigger = TriggerLoop::new(
        Arc::new(price),
        Arc::new(dex),
        Arc::new(notifier),
        cfg.threshold,
        RetryPolicy {
            retry_delay: cfg.timing.retry_delay,
            cooldown: cfg.timing.cooldown,
        },
    )
    .with_journal(Journal::new(cfg.state_file));
    trigger.report_unfinished().await;

    // Ctrl-C flips the shutdown flag; the loop exits at its next boundary.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("[SHUTDOWN] signal received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                // Keep the sender alive; dropping it would stop the loop.
                tracing::warn!(error = %e, "[SHUTDOWN] cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        }
    });

    trigger.run(shutdown_rx).await;
    Ok(())
}
