// tests/util.rs
// Shared test helpers: in-memory chains and a scripted wallet.
#![allow(dead_code)]

use async_trait::async_trait;
use defi_bridge_router::blockchain::erc20;
use defi_bridge_router::blockchain::{
    ChainReader, ChainReaders, RawTransaction, ReceiptSummary, TransactionStatus, WalletSession,
};
use defi_bridge_router::bridge::connext::{ConnextAdapter, ConnextClient};
use defi_bridge_router::bridge::layerzero::LayerZeroAdapter;
use defi_bridge_router::bridge::wormhole::WormholeAdapter;
use defi_bridge_router::bridge::{Adapters, QuoteAggregator, TransferOrchestrator};
use defi_bridge_router::core::abi::{abi_pack, abi_word_address, abi_word_uint256, selector_from_signature};
use defi_bridge_router::core::{BridgeConfig, BridgeError, BridgeResult};
use defi_bridge_router::registry::ChainRegistry;
use ethers::types::{Address, Bytes, H256, U256};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const SLIPPAGE_BPS: u32 = 50;

pub fn units(whole: u64) -> U256 {
    U256::from(whole) * U256::exp10(18)
}

pub fn sender() -> Address {
    Address::repeat_byte(0x51)
}

pub fn recipient() -> Address {
    Address::repeat_byte(0x52)
}

/// Answers `eth_call` from a table keyed by exact calldata, falling back to the selector.
pub struct FakeChain {
    chain_id: u64,
    exact: Mutex<HashMap<(Address, Vec<u8>), Bytes>>,
    by_selector: Mutex<HashMap<(Address, [u8; 4]), Bytes>>,
    failure: Mutex<Option<String>>,
    calls: AtomicUsize,
    selector_calls: Mutex<HashMap<[u8; 4], usize>>,
}

impl FakeChain {
    pub fn new(chain_id: u64) -> Arc<Self> {
        Arc::new(Self {
            chain_id,
            exact: Mutex::new(HashMap::new()),
            by_selector: Mutex::new(HashMap::new()),
            failure: Mutex::new(None),
            calls: AtomicUsize::new(0),
            selector_calls: Mutex::new(HashMap::new()),
        })
    }

    /// Respond to `signature(args...)` on `to` with a single uint256.
    pub fn set_uint(&self, to: Address, signature: &str, args: &[Address], value: U256) {
        let words: Vec<[u8; 32]> = args.iter().map(|a| abi_word_address(*a)).collect();
        let data = abi_pack(selector_from_signature(signature), &words);
        self.exact.lock().insert((to, data), Bytes::from(abi_word_uint256(value).to_vec()));
    }

    /// Respond to any call of `signature` on `to` with the given uint256 words.
    pub fn set_words(&self, to: Address, signature: &str, values: &[U256]) {
        let mut out = Vec::with_capacity(32 * values.len());
        for v in values {
            out.extend_from_slice(&abi_word_uint256(*v));
        }
        self.by_selector.lock().insert((to, selector_from_signature(signature)), Bytes::from(out));
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, value: U256) {
        self.set_uint(token, erc20::ALLOWANCE, &[owner, spender], value);
    }

    pub fn set_balance(&self, token: Address, account: Address, value: U256) {
        self.set_uint(token, erc20::BALANCE_OF, &[account], value);
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock() = Some(message.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_of(&self, signature: &str) -> usize {
        self.selector_calls.lock().get(&selector_from_signature(signature)).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn call(&self, to: Address, data: Bytes) -> BridgeResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&data[..4]);
        *self.selector_calls.lock().entry(selector).or_insert(0) += 1;

        if let Some(message) = self.failure.lock().clone() {
            return Err(BridgeError::Rpc(message));
        }
        if let Some(out) = self.exact.lock().get(&(to, data.to_vec())) {
            return Ok(out.clone());
        }
        if let Some(out) = self.by_selector.lock().get(&(to, selector)) {
            return Ok(out.clone());
        }
        Err(BridgeError::Rpc(format!("execution reverted: no fake response for {:?} 0x{}", to, hex::encode(&data))))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptMode {
    Confirm,
    Revert(String),
    Hang,
}

/// Wallet that records what it is asked to sign. Confirmed approvals are
/// written back to the origin `FakeChain` so allowance re-reads see them.
pub struct FakeWallet {
    address: Address,
    active_chain: Mutex<u64>,
    chains: HashMap<u64, Arc<FakeChain>>,
    sent: Mutex<Vec<RawTransaction>>,
    reject_next: Mutex<bool>,
    receipt_mode: Mutex<ReceiptMode>,
}

impl FakeWallet {
    pub fn new(active_chain: u64, chains: &[Arc<FakeChain>]) -> Arc<Self> {
        Arc::new(Self {
            address: sender(),
            active_chain: Mutex::new(active_chain),
            chains: chains.iter().map(|c| (c.chain_id, c.clone())).collect(),
            sent: Mutex::new(Vec::new()),
            reject_next: Mutex::new(false),
            receipt_mode: Mutex::new(ReceiptMode::Confirm),
        })
    }

    pub fn sent(&self) -> Vec<RawTransaction> {
        self.sent.lock().clone()
    }

    pub fn reject_next(&self) {
        *self.reject_next.lock() = true;
    }

    pub fn set_receipt_mode(&self, mode: ReceiptMode) {
        *self.receipt_mode.lock() = mode;
    }

    fn apply_approval(&self, tx: &RawTransaction) {
        let approve = selector_from_signature(erc20::APPROVE);
        if tx.data.len() != 68 || tx.data[..4] != approve {
            return;
        }
        let spender = Address::from_slice(&tx.data[16..36]);
        let amount = U256::from_big_endian(&tx.data[36..68]);
        if let Some(chain) = self.chains.get(&tx.chain_id) {
            chain.set_allowance(tx.to, self.address, spender, amount);
        }
    }
}

#[async_trait]
impl WalletSession for FakeWallet {
    fn address(&self) -> Address {
        self.address
    }

    async fn active_chain_id(&self) -> BridgeResult<u64> {
        Ok(*self.active_chain.lock())
    }

    async fn switch_chain(&self, chain_id: u64) -> BridgeResult<()> {
        if !self.chains.contains_key(&chain_id) {
            return Err(BridgeError::UnsupportedChain(chain_id));
        }
        *self.active_chain.lock() = chain_id;
        Ok(())
    }

    async fn send_transaction(&self, tx: &RawTransaction) -> BridgeResult<H256> {
        if std::mem::take(&mut *self.reject_next.lock()) {
            return Err(BridgeError::UserRejected("User denied transaction signature".into()));
        }
        let active = *self.active_chain.lock();
        if active != tx.chain_id {
            return Err(BridgeError::WrongChain { expected: tx.chain_id, active });
        }
        let mut sent = self.sent.lock();
        sent.push(tx.clone());
        Ok(H256::from_low_u64_be(sent.len() as u64))
    }

    async fn wait_for_receipt(&self, _chain_id: u64, tx_hash: H256) -> BridgeResult<ReceiptSummary> {
        let mode = self.receipt_mode.lock().clone();
        let tx = self.sent.lock().get(tx_hash.to_low_u64_be() as usize - 1).cloned();
        let is_approval = tx.as_ref().map(|t| t.data.len() == 68).unwrap_or(false);
        match mode {
            ReceiptMode::Hang if !is_approval => std::future::pending().await,
            ReceiptMode::Revert(reason) if !is_approval => Ok(ReceiptSummary {
                tx_hash,
                status: TransactionStatus::Reverted,
                block_number: Some(100),
                revert_reason: Some(reason),
            }),
            _ => {
                if let Some(tx) = tx {
                    self.apply_approval(&tx);
                }
                Ok(ReceiptSummary {
                    tx_hash,
                    status: TransactionStatus::Confirmed,
                    block_number: Some(100),
                    revert_reason: None,
                })
            }
        }
    }
}

pub fn readers(chains: &[Arc<FakeChain>]) -> ChainReaders {
    let mut readers = ChainReaders::new();
    for chain in chains {
        readers.insert(chain.clone());
    }
    readers
}

pub fn adapters(connext_url: &str) -> Adapters {
    Adapters::new(
        ConnextAdapter::new(ConnextClient::new(connext_url, Duration::from_secs(5))),
        LayerZeroAdapter::new(200_000),
        WormholeAdapter::new(),
    )
}

/// Made-up lockbox, xERC-20, Base token, Wormhole and LayerZero entries over the
/// built-in table. Loaded through the config parser like an operator's `[registry]`.
const FIXTURE_REGISTRY: &str = r#"
[[registry.tokens]]
chain_id = 1
symbol = "alUSD"
address = "0xbc6da0fe9ad5f3b0d58160288917aa56653660e9"
decimals = 18
xerc20 = "0x00000000000000000000000000000000000000a1"
lockbox = "0x00000000000000000000000000000000000000a2"

[[registry.tokens]]
chain_id = 8453
symbol = "alUSD"
address = "0x00000000000000000000000000000000000000b1"
decimals = 18

[[registry.routes]]
origin = 1
destination = 8453
symbol = "alUSD"
protocols = ["wormhole"]

[[registry.routes]]
origin = 8453
destination = 1
symbol = "alUSD"
protocols = ["wormhole"]

[[registry.routes]]
origin = 10
destination = 1
symbol = "ALCX"
protocols = ["layerzero"]

[[registry.routes]]
origin = 1
destination = 42161
symbol = "ALCX"
protocols = ["layerzero"]

[[registry.deployments]]
protocol = "wormhole"
chain_id = 1
symbol = "alUSD"
contract = "0x00000000000000000000000000000000000000d1"

[[registry.deployments]]
protocol = "wormhole"
chain_id = 8453
symbol = "alUSD"
contract = "0x00000000000000000000000000000000000000d2"

[[registry.deployments]]
protocol = "layerzero"
chain_id = 1
symbol = "ALCX"
contract = "0x00000000000000000000000000000000000000e1"

# On L2s the OFT is the token itself.
[[registry.deployments]]
protocol = "layerzero"
chain_id = 10
symbol = "ALCX"
contract = "0xe974b9b31dbff4369b94a1bab5e228f35ed44125"

[[registry.deployments]]
protocol = "layerzero"
chain_id = 42161
symbol = "ALCX"
contract = "0x27b58d226fe8f792730a795764945cf146815aa7"
"#;

pub fn fixture_registry() -> ChainRegistry {
    let config = BridgeConfig::from_toml_str(FIXTURE_REGISTRY).unwrap();
    ChainRegistry::builtin().with_overlay(&config.registry).unwrap()
}

pub fn aggregator(chains: &[Arc<FakeChain>], connext_url: &str) -> QuoteAggregator {
    QuoteAggregator::new(Arc::new(fixture_registry()), readers(chains), adapters(connext_url), SLIPPAGE_BPS)
}

pub fn orchestrator(
    chains: &[Arc<FakeChain>],
    wallet: Arc<FakeWallet>,
    receipt_timeout: Duration,
) -> TransferOrchestrator {
    // Connext is never reached from the routes these tests drive.
    let aggregator = Arc::new(aggregator(chains, "http://127.0.0.1:9"));
    TransferOrchestrator::new(aggregator, wallet, receipt_timeout)
}
