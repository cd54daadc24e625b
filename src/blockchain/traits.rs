use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::errors::{BridgeError, BridgeResult};

/// An unsigned transaction ready to hand to a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub chain_id: u64,
}

/// Final status of a mined transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionStatus {
    Confirmed,
    Reverted,
}

/// The parts of a receipt the bridge flow cares about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub tx_hash: H256,
    pub status: TransactionStatus,
    pub block_number: Option<u64>,
    pub revert_reason: Option<String>,
}

/// Read-only access to one chain (`eth_call`).
#[async_trait]
pub trait ChainReader: Send + Sync {
    fn chain_id(&self) -> u64;

    async fn call(&self, to: Address, data: Bytes) -> BridgeResult<Bytes>;
}

/// The connected wallet. Signing and submission only ever happen through this seam.
#[async_trait]
pub trait WalletSession: Send + Sync {
    /// Address that signs and owns the bridged funds.
    fn address(&self) -> Address;

    async fn active_chain_id(&self) -> BridgeResult<u64>;

    async fn switch_chain(&self, chain_id: u64) -> BridgeResult<()>;

    /// Sign and broadcast. Returns the transaction hash.
    async fn send_transaction(&self, tx: &RawTransaction) -> BridgeResult<H256>;

    /// Resolve once the transaction is mined. Callers bound the wait.
    async fn wait_for_receipt(&self, chain_id: u64, tx_hash: H256) -> BridgeResult<ReceiptSummary>;
}

/// One reader per supported chain.
#[derive(Clone, Default)]
pub struct ChainReaders {
    readers: HashMap<u64, Arc<dyn ChainReader>>,
}

impl ChainReaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reader: Arc<dyn ChainReader>) -> Self {
        self.insert(reader);
        self
    }

    pub fn insert(&mut self, reader: Arc<dyn ChainReader>) {
        self.readers.insert(reader.chain_id(), reader);
    }

    pub fn get(&self, chain_id: u64) -> BridgeResult<&dyn ChainReader> {
        self.readers
            .get(&chain_id)
            .map(|r| r.as_ref())
            .ok_or_else(|| BridgeError::Config(format!("No RPC reader configured for chain {}", chain_id)))
    }

    pub fn chain_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.readers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl std::fmt::Debug for ChainReaders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainReaders").field("chains", &self.chain_ids()).finish()
    }
}
