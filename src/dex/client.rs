use super::{Executor, UniswapV2Pair, UniswapV2Router02};
use crate::config::{GasConfig, PairConfig};
use crate::errors::{AppError, Result};
use crate::gas::{GasPriceProvider, GasTier, accept_stale};
use async_trait::async_trait;
use ethers::{
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{
        Address, BlockNumber, Bytes, TransactionReceipt, TransactionRequest, U64, U256,
        transaction::eip2718::TypedTransaction,
    },
};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Signs and submits router transactions from a local key.
pub struct UniswapV2 {
    provider: Arc<Provider<Http>>,
    wallet: LocalWallet,
    router: UniswapV2Router02<Provider<Http>>,
    pair: UniswapV2Pair<Provider<Http>>,
    weth: Address,
    token: Address,
    gas: Arc<dyn GasPriceProvider>,
    tier: GasTier,
    gas_limit: u64,
    deadline_secs: u64,
}

impl UniswapV2 {
    /// Connects to the node and loads the signing key.
    ///
    /// Fails if the node does not answer a chain-id request or the key is invalid.
    pub async fn connect(
        rpc_url: &Url,
        private_key: &SecretString,
        pair: &PairConfig,
        gas_cfg: &GasConfig,
        gas: Arc<dyn GasPriceProvider>,
        deadline_secs: u64,
    ) -> Result<Self> {
        let provider = Arc::new(Provider::<Http>::try_from(rpc_url.as_str())?);
        let chain_id = provider.get_chainid().await?.as_u64(); // sanity-check
        let wallet = private_key
            .expose_secret()
            .parse::<LocalWallet>()?
            .with_chain_id(chain_id);
        info!(chain_id, owner = ?wallet.address(), "[DEX] connected");

        Ok(Self {
            router: UniswapV2Router02::new(pair.router, provider.clone()),
            pair: UniswapV2Pair::new(pair.pair_address, provider.clone()),
            provider,
            wallet,
            weth: pair.weth,
            token: pair.token,
            gas,
            tier: gas_cfg.tier,
            gas_limit: gas_cfg.gas_limit,
            deadline_secs,
        })
    }

    pub fn owner(&self) -> Address {
        self.wallet.address()
    }

    async fn gas_price(&self) -> Result<u64> {
        let snapshot = accept_stale(self.gas.gas_prices().await)?;
        match snapshot.price(self.tier) {
            0 => Err(AppError::Execution(format!(
                "gas station reported a zero {:?} price",
                self.tier
            ))),
            price => Ok(price),
        }
    }

    async fn pending_nonce(&self) -> Result<U256> {
        let nonce = self
            .provider
            .get_transaction_count(self.owner(), Some(BlockNumber::Pending.into()))
            .await?;
        Ok(nonce)
    }

    /// Signs, sends and waits for one confirmation.
    ///
    /// Later steps read chain state (LP balance, ETH balance), so a step only
    /// counts as done once it is mined and did not revert.
    async fn submit(&self, tx: TypedTransaction, method: &str) -> Result<String> {
        let signature = self.wallet.sign_transaction(&tx).await?;
        let raw = tx.rlp_signed(&signature);
        let pending = self.provider.send_raw_transaction(raw).await?;
        let tx_hash = format!("{:?}", pending.tx_hash());
        info!(%tx_hash, method, "[DEX] transaction sent, awaiting receipt");

        let receipt = pending.confirmations(1).await?;
        confirmed(receipt, method, &tx_hash)
    }
}

/// Maps a receipt to the transaction hash, failing on a dropped or reverted tx.
pub(crate) fn confirmed(
    receipt: Option<TransactionReceipt>,
    method: &str,
    tx_hash: &str,
) -> Result<String> {
    let receipt = receipt.ok_or_else(|| {
        AppError::Execution(format!("{method} {tx_hash} was dropped before being mined"))
    })?;
    if receipt.status != Some(U64::one()) {
        return Err(AppError::Execution(format!(
            "{method} {tx_hash} reverted in block {}",
            receipt.block_number.unwrap_or_default()
        )));
    }
    Ok(format!("{:?}", receipt.transaction_hash))
}

/// Legacy (EIP-155) transaction to the router.
#[allow(clippy::too_many_arguments)]
pub(crate) fn legacy_tx(
    from: Address,
    to: Address,
    nonce: U256,
    gas_limit: u64,
    gas_price: u64,
    value: U256,
    data: Bytes,
    chain_id: u64,
) -> TypedTransaction {
    TransactionRequest::new()
        .from(from)
        .to(to)
        .nonce(nonce)
        .gas(gas_limit)
        .gas_price(gas_price)
        .value(value)
        .data(data)
        .chain_id(chain_id)
        .into()
}

/// Balance left to swap after reserving the swap's own gas.
pub(crate) fn spendable(balance: U256, gas_limit: u64, gas_price: u64) -> Result<U256> {
    let reserve = U256::from(gas_limit) * U256::from(gas_price);
    match balance.checked_sub(reserve) {
        Some(value) if !value.is_zero() => Ok(value),
        _ => Err(AppError::Execution(format!(
            "insufficient ETH: balance {balance} wei, gas reserve {reserve} wei"
        ))),
    }
}

fn calldata(data: Option<Bytes>, method: &str) -> Result<Bytes> {
    data.ok_or_else(|| AppError::Execution(format!("failed to encode {method} call")))
}

#[async_trait]
impl Executor for UniswapV2 {
    /// `removeLiquidityETH` for the wallet's full LP balance.
    async fn withdraw(&self) -> Result<String> {
        let owner = self.owner();
        let liquidity = self.pair.balance_of(owner).call().await?;
        if liquidity.is_zero() {
            return Err(AppError::Execution("no LP tokens to withdraw".into()));
        }
        let nonce = self.pending_nonce().await?;
        let gas_price = self.gas_price().await?;
        let deadline = U256::from(crate::utils::deadline_after(self.deadline_secs));

        let data = calldata(
            self.router
                .remove_liquidity_eth(self.token, liquidity, U256::zero(), U256::zero(), owner, deadline)
                .calldata(),
            "removeLiquidityETH",
        )?;
        debug!(%liquidity, %nonce, gas_price, "[DEX] removing liquidity");

        let tx = legacy_tx(
            owner,
            self.router.address(),
            nonce,
            self.gas_limit,
            gas_price,
            U256::zero(),
            data,
            self.wallet.chain_id(),
        );
        self.submit(tx, "removeLiquidityETH").await
    }

    /// `swapExactETHForTokens` with everything but the gas reserve.
    async fn exchange(&self) -> Result<String> {
        let owner = self.owner();
        let nonce = self.pending_nonce().await?;
        let balance = self.provider.get_balance(owner, None).await?;
        let gas_price = self.gas_price().await?;
        let value = spendable(balance, self.gas_limit, gas_price)?;
        let deadline = U256::from(crate::utils::deadline_after(self.deadline_secs));

        let data = calldata(
            self.router
                .swap_exact_eth_for_tokens(U256::zero(), vec![self.weth, self.token], owner, deadline)
                .calldata(),
            "swapExactETHForTokens",
        )?;
        debug!(%value, %nonce, gas_price, "[DEX] swapping ETH");

        let tx = legacy_tx(
            owner,
            self.router.address(),
            nonce,
            self.gas_limit,
            gas_price,
            value,
            data,
            self.wallet.chain_id(),
        );
        self.submit(tx, "swapExactETHForTokens").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn offline_router() -> UniswapV2Router02<Provider<Http>> {
        let provider = Arc::new(Provider::<Http>::try_from("http://localhost:8545").unwrap());
        UniswapV2Router02::new(Address::repeat_byte(0x11), provider)
    }

    #[test]
    fn remove_liquidity_selector() {
        let data = offline_router()
            .remove_liquidity_eth(
                Address::repeat_byte(0x22),
                U256::from(1000u64),
                U256::zero(),
                U256::zero(),
                Address::repeat_byte(0x33),
                U256::from(1_700_000_000u64),
            )
            .calldata()
            .unwrap();
        assert_eq!(&data[..4], &[0x02u8, 0x75, 0x1c, 0xec]);
        // selector + six static words
        assert_eq!(data.len(), 4 + 6 * 32);
    }

    #[test]
    fn swap_selector_and_path() {
        let weth = Address::repeat_byte(0x44);
        let usdc = Address::repeat_byte(0x55);
        let data = offline_router()
            .swap_exact_eth_for_tokens(U256::zero(), vec![weth, usdc], Address::repeat_byte(0x33), U256::one())
            .calldata()
            .unwrap();
        assert_eq!(&data[..4], &[0x7fu8, 0xf3, 0x6a, 0xb5]);
        // head (4 words) + array length + two addresses
        assert_eq!(data.len(), 4 + 7 * 32);
        assert_eq!(&data[data.len() - 20..], usdc.as_bytes());
    }

    #[test]
    fn spendable_reserves_gas() {
        let one_eth = U256::exp10(18);
        let value = spendable(one_eth, 200_000, 5_000_000_000).unwrap();
        assert_eq!(value, one_eth - U256::exp10(15));
    }

    #[test]
    fn spendable_rejects_dust() {
        assert!(spendable(U256::from(1_000u64), 200_000, 5_000_000_000).is_err());
        assert!(spendable(U256::from(1_000_000_000_000_000u64), 200_000, 5_000_000_000).is_err());
    }

    fn receipt(status: u64) -> TransactionReceipt {
        TransactionReceipt {
            transaction_hash: ethers::types::H256::repeat_byte(0xab),
            block_number: Some(U64::from(19_000_000u64)),
            status: Some(U64::from(status)),
            ..Default::default()
        }
    }

    #[test]
    fn mined_receipt_yields_hash() {
        let hash = confirmed(Some(receipt(1)), "removeLiquidityETH", "0xab").unwrap();
        assert_eq!(hash, format!("{:?}", ethers::types::H256::repeat_byte(0xab)));
    }

    #[test]
    fn reverted_receipt_is_an_error() {
        let err = confirmed(Some(receipt(0)), "removeLiquidityETH", "0xab").unwrap_err();
        match err {
            AppError::Execution(msg) => {
                assert!(msg.contains("removeLiquidityETH"));
                assert!(msg.contains("reverted in block 19000000"));
            }
            other => panic!("expected execution error, got {other:?}"),
        }
    }

    #[test]
    fn dropped_tx_is_an_error() {
        let err = confirmed(None, "swapExactETHForTokens", "0xab").unwrap_err();
        assert!(matches!(err, AppError::Execution(ref m) if m.contains("dropped")));
    }

    #[tokio::test]
    async fn signed_tx_recovers_owner() {
        let wallet = KEY.parse::<LocalWallet>().unwrap().with_chain_id(1u64);
        let tx = legacy_tx(
            wallet.address(),
            Address::repeat_byte(0x11),
            U256::from(7u64),
            200_000,
            5_000_000_000,
            U256::zero(),
            Bytes::from(vec![0x02, 0x75, 0x1c, 0xec]),
            1,
        );
        let signature = wallet.sign_transaction(&tx).await.unwrap();
        assert_eq!(signature.recover(tx.sighash()).unwrap(), wallet.address());
        assert_eq!(tx.gas(), Some(&U256::from(200_000u64)));
        assert_eq!(tx.nonce(), Some(&U256::from(7u64)));
        assert!(!tx.rlp_signed(&signature).is_empty());
    }
}
