use async_trait::async_trait;
use ethers::{
    prelude::{JsonRpcClient, *},
    providers::{Http, MiddlewareError, Provider, RpcError},
    signers::{LocalWallet, Signer},
    types::{
        transaction::eip2718::TypedTransaction, Address, BlockId, Bytes, Eip1559TransactionRequest,
        NameOrAddress, TransactionRequest, H256, U256, U64,
    },
};
use parking_lot::Mutex;
use std::{collections::HashMap, time::Duration};
use tracing::{debug, info, warn};

use super::traits::{ChainReader, RawTransaction, ReceiptSummary, TransactionStatus, WalletSession};
use crate::core::abi::decode_revert_reason;
use crate::core::config::BridgeConfig;
use crate::core::errors::{BridgeError, BridgeResult};

/// EIP-1193 code for a request the user declined.
const USER_REJECTED_CODE: i64 = 4001;

#[derive(Clone)]
pub struct EthereumClient<P: JsonRpcClient + Clone = Http> {
    provider: Provider<P>,
    network_name: String,
    chain_id: u64,
}

impl EthereumClient<Http> {
    /// Connects and checks that the endpoint serves `chain_id`.
    pub async fn connect(rpc_url: &str, chain_id: u64, timeout: Duration) -> BridgeResult<Self> {
        let rpc_url_clean = rpc_url.trim();
        let parsed_url = reqwest::Url::parse(rpc_url_clean).map_err(|e| {
            BridgeError::Config(format!(
                "Invalid RPC URL '{}': {}. Please check bridge.toml or BRIDGE_RPC_{}.",
                rpc_url_clean, e, chain_id
            ))
        })?;

        info!("Connecting to chain {} at {}", chain_id, parsed_url);
        // Allow proxy environment vars.
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Ok(proxy) = std::env::var("HTTPS_PROXY").or_else(|_| std::env::var("HTTP_PROXY")) {
            if let Ok(p) = reqwest::Proxy::all(proxy) {
                builder = builder.proxy(p);
            }
        }
        let client = builder
            .build()
            .map_err(|e| BridgeError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let provider = Provider::new(Http::new_with_client(parsed_url.clone(), client));

        let remote_chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| {
                BridgeError::Rpc(format!("Failed to get chain ID from {}. Error: {}", parsed_url, e))
            })?
            .as_u64();
        if remote_chain_id != chain_id {
            return Err(BridgeError::Config(format!(
                "RPC {} serves chain {}, expected {}",
                parsed_url, remote_chain_id, chain_id
            )));
        }

        let network_name = network_name(chain_id);
        info!("Connected to {} (Chain ID: {})", network_name, chain_id);
        Ok(Self { provider, network_name, chain_id })
    }
}

/// One client per chain that has an RPC endpoint configured. Chains without one are skipped.
pub async fn connect_clients(config: &BridgeConfig, chain_ids: &[u64]) -> BridgeResult<Vec<EthereumClient>> {
    let mut clients = Vec::with_capacity(chain_ids.len());
    for &chain_id in chain_ids {
        match config.network_for_chain(chain_id) {
            Some(network) => {
                clients.push(EthereumClient::connect(&network.rpc_url, chain_id, config.bridge.http_timeout()).await?)
            }
            None => warn!(chain_id, "No RPC endpoint configured, chain disabled"),
        }
    }
    Ok(clients)
}

fn network_name(chain_id: u64) -> String {
    match chain_id {
        1 => "ethereum".to_string(),
        10 => "optimism".to_string(),
        8453 => "base".to_string(),
        42161 => "arbitrum".to_string(),
        _ => format!("evm-{}", chain_id),
    }
}

impl<P> EthereumClient<P>
where
    P: JsonRpcClient + Clone + Send + Sync,
{
    /// Wraps an existing provider. Useful for testing with a `MockProvider`.
    pub fn new_with_provider(provider: Provider<P>, chain_id: u64) -> EthereumClient<P> {
        EthereumClient { provider, network_name: network_name(chain_id), chain_id }
    }

    pub fn provider(&self) -> &Provider<P> {
        &self.provider
    }

    pub fn network_name(&self) -> &str {
        &self.network_name
    }

    pub async fn get_gas_price(&self) -> BridgeResult<U256> {
        let v = self
            .provider
            .get_gas_price()
            .await
            .map_err(|e| BridgeError::Rpc(format!("Failed to get gas price: {}", e)))?;
        debug!("get_gas_price got = 0x{:x}", v);
        Ok(v)
    }

    /// Poll for a receipt until it shows up. Unbounded; the orchestrator applies the timeout.
    pub async fn poll_receipt(&self, tx_hash: H256, interval: Duration) -> BridgeResult<ReceiptSummary> {
        loop {
            match self.provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    let block_number = receipt.block_number.map(|b| b.as_u64());
                    if receipt.status == Some(U64::from(1)) {
                        debug!(tx_hash = ?tx_hash, ?block_number, "Transaction confirmed");
                        return Ok(ReceiptSummary {
                            tx_hash,
                            status: TransactionStatus::Confirmed,
                            block_number,
                            revert_reason: None,
                        });
                    }
                    let revert_reason = self.replay_for_revert_reason(tx_hash, block_number).await;
                    warn!(tx_hash = ?tx_hash, ?revert_reason, "Transaction reverted");
                    return Ok(ReceiptSummary {
                        tx_hash,
                        status: TransactionStatus::Reverted,
                        block_number,
                        revert_reason,
                    });
                }
                Ok(None) => {
                    debug!(tx_hash = ?tx_hash, "Receipt not available yet");
                }
                Err(e) => {
                    // Keep polling: a flaky node should not turn into a false failure.
                    warn!("Failed to get transaction receipt for {:?}: {}", tx_hash, e);
                }
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Re-run a reverted transaction as `eth_call` at its block to recover the revert message.
    async fn replay_for_revert_reason(&self, tx_hash: H256, block: Option<u64>) -> Option<String> {
        let tx = self.provider.get_transaction(tx_hash).await.ok()??;
        let request: TypedTransaction = TransactionRequest::new()
            .from(tx.from)
            .to(tx.to?)
            .data(tx.input.clone())
            .value(tx.value)
            .into();
        let block = block.map(|b| BlockId::Number(b.into()));
        match self.provider.call(&request, block).await {
            Ok(_) => None,
            Err(e) => {
                let data = RpcError::as_error_response(&e)?.as_revert_data()?;
                decode_revert_reason(&data)
            }
        }
    }
}

#[async_trait]
impl<P> ChainReader for EthereumClient<P>
where
    P: JsonRpcClient + Clone + 'static + Send + Sync,
{
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn call(&self, to: Address, data: Bytes) -> BridgeResult<Bytes> {
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        self.provider.call(&tx, None).await.map_err(|e| {
            BridgeError::Rpc(format!("eth_call to {:?} on chain {} failed: {}", to, self.chain_id, e))
        })
    }
}

/// Wallet session backed by a local private key and one provider per chain.
pub struct LocalWalletSession<P: JsonRpcClient + Clone = Http> {
    wallet: LocalWallet,
    clients: HashMap<u64, EthereumClient<P>>,
    active_chain: Mutex<u64>,
    poll_interval: Duration,
}

impl<P> LocalWalletSession<P>
where
    P: JsonRpcClient + Clone + 'static + Send + Sync,
{
    pub fn new(
        wallet: LocalWallet,
        clients: Vec<EthereumClient<P>>,
        initial_chain_id: u64,
        poll_interval: Duration,
    ) -> BridgeResult<Self> {
        let clients: HashMap<u64, EthereumClient<P>> =
            clients.into_iter().map(|c| (c.chain_id, c)).collect();
        if !clients.contains_key(&initial_chain_id) {
            return Err(BridgeError::UnsupportedChain(initial_chain_id));
        }
        Ok(Self { wallet, clients, active_chain: Mutex::new(initial_chain_id), poll_interval })
    }

    fn client(&self, chain_id: u64) -> BridgeResult<&EthereumClient<P>> {
        self.clients.get(&chain_id).ok_or(BridgeError::UnsupportedChain(chain_id))
    }
}

#[async_trait]
impl<P> WalletSession for LocalWalletSession<P>
where
    P: JsonRpcClient + Clone + 'static + Send + Sync,
{
    fn address(&self) -> Address {
        self.wallet.address()
    }

    async fn active_chain_id(&self) -> BridgeResult<u64> {
        Ok(*self.active_chain.lock())
    }

    async fn switch_chain(&self, chain_id: u64) -> BridgeResult<()> {
        self.client(chain_id)?;
        *self.active_chain.lock() = chain_id;
        info!(chain_id, "Switched active chain");
        Ok(())
    }

    async fn send_transaction(&self, tx: &RawTransaction) -> BridgeResult<H256> {
        let active = *self.active_chain.lock();
        if active != tx.chain_id {
            return Err(BridgeError::WrongChain { expected: tx.chain_id, active });
        }
        let client = self.client(tx.chain_id)?;
        info!(to = ?tx.to, value = %tx.value, chain_id = tx.chain_id, "Sending transaction");

        // Derive simple EIP-1559 fee settings from gas_price as fallback.
        let gas_price = client.get_gas_price().await?;
        let max_fee_per_gas = gas_price.saturating_mul(U256::from(2u64));
        let max_priority_fee_per_gas =
            (gas_price / U256::from(10u64)).max(U256::from(1_000_000_000u64)); // >= 1 gwei

        let request = Eip1559TransactionRequest {
            to: Some(NameOrAddress::Address(tx.to)),
            data: Some(tx.data.clone()),
            value: Some(tx.value),
            chain_id: Some(U64::from(tx.chain_id)),
            max_fee_per_gas: Some(max_fee_per_gas),
            max_priority_fee_per_gas: Some(max_priority_fee_per_gas),
            ..Default::default()
        };

        let signer = self.wallet.clone().with_chain_id(tx.chain_id);
        let middleware = SignerMiddleware::new(client.provider().clone(), signer);
        let pending = middleware.send_transaction(request, None).await.map_err(|e| {
            match MiddlewareError::as_error_response(&e) {
                Some(rpc) if rpc.code == USER_REJECTED_CODE => {
                    BridgeError::UserRejected(rpc.message.clone())
                }
                Some(rpc) => match rpc.as_revert_data().as_deref().and_then(decode_revert_reason) {
                    Some(reason) => BridgeError::Wallet(format!("Transaction would revert: {}", reason)),
                    None => BridgeError::Wallet(format!("Failed to send transaction: {}", rpc.message)),
                },
                None => BridgeError::Wallet(format!("Failed to send transaction: {}", e)),
            }
        })?;

        let tx_hash = pending.tx_hash();
        info!(tx_hash = ?tx_hash, "Transaction sent");
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, chain_id: u64, tx_hash: H256) -> BridgeResult<ReceiptSummary> {
        self.client(chain_id)?.poll_receipt(tx_hash, self.poll_interval).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::erc20;
    use crate::core::abi::abi_word_uint256;
    use ethers::providers::MockProvider;

    fn mock_client(chain_id: u64) -> (MockProvider, EthereumClient<MockProvider>) {
        let mock = MockProvider::new();
        let client = EthereumClient::new_with_provider(Provider::new(mock.clone()), chain_id);
        (mock, client)
    }

    #[tokio::test(flavor = "current_thread")]
    async fn chain_reader_decodes_balance() {
        let (mock, client) = mock_client(10);
        mock.push::<Bytes, Bytes>(Bytes::from(abi_word_uint256(U256::from(1234u64)).to_vec())).unwrap();

        let token: Address = "0x1111111111111111111111111111111111111111".parse().unwrap();
        let owner: Address = "0x2222222222222222222222222222222222222222".parse().unwrap();
        let balance = erc20::balance_of(&client, token, owner).await.unwrap();
        assert_eq!(balance, U256::from(1234u64));
        assert_eq!(ChainReader::chain_id(&client), 10);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn poll_receipt_reports_confirmation() {
        let (mock, client) = mock_client(1);
        let receipt = TransactionReceipt {
            transaction_hash: H256::repeat_byte(0xab),
            status: Some(U64::from(1)),
            block_number: Some(U64::from(42)),
            ..Default::default()
        };
        mock.push(receipt).unwrap();

        let summary = client
            .poll_receipt(H256::repeat_byte(0xab), Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(summary.status, TransactionStatus::Confirmed);
        assert_eq!(summary.block_number, Some(42));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn session_rejects_unknown_chain_switch() {
        let (_mock, client) = mock_client(1);
        let wallet: LocalWallet =
            "0x1111111111111111111111111111111111111111111111111111111111111111".parse().unwrap();
        let session =
            LocalWalletSession::new(wallet, vec![client], 1, Duration::from_millis(1)).unwrap();
        assert!(matches!(
            session.switch_chain(10).await,
            Err(BridgeError::UnsupportedChain(10))
        ));
        assert_eq!(session.active_chain_id().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn session_refuses_transaction_for_other_chain() {
        let (_mock, client) = mock_client(1);
        let wallet: LocalWallet =
            "0x1111111111111111111111111111111111111111111111111111111111111111".parse().unwrap();
        let session =
            LocalWalletSession::new(wallet, vec![client], 1, Duration::from_millis(1)).unwrap();
        let tx = RawTransaction {
            to: Address::zero(),
            data: Bytes::default(),
            value: U256::zero(),
            chain_id: 10,
        };
        assert!(matches!(
            session.send_transaction(&tx).await,
            Err(BridgeError::WrongChain { expected: 10, active: 1 })
        ));
    }
}
