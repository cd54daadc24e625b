//! ERC-20 allowance checks with an explicit, caller-invalidated cache.

use ethers::types::{Address, U256};
use std::collections::HashMap;
use tracing::debug;

use crate::blockchain::erc20;
use crate::blockchain::traits::{ChainReaders, RawTransaction};
use crate::core::errors::BridgeResult;
use crate::core::validation::parse_amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowanceState {
    pub owner: Address,
    pub token: Address,
    pub spender: Address,
    pub current_allowance: U256,
    pub required_amount: U256,
}

impl AllowanceState {
    pub fn needs_approval(&self) -> bool {
        self.current_allowance < self.required_amount
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct AllowanceKey {
    chain_id: u64,
    owner: Address,
    token: Address,
    spender: Address,
}

/// Reads are cached until an approval confirms; the orchestrator then
/// invalidates the entry so the next decision sees the chain again.
#[derive(Debug)]
pub struct AllowanceManager {
    readers: ChainReaders,
    cache: HashMap<AllowanceKey, U256>,
}

impl AllowanceManager {
    pub fn new(readers: ChainReaders) -> Self {
        Self { readers, cache: HashMap::new() }
    }

    pub async fn allowance_state(
        &mut self,
        chain_id: u64,
        owner: Address,
        token: Address,
        spender: Address,
        required_amount: U256,
    ) -> BridgeResult<AllowanceState> {
        let key = AllowanceKey { chain_id, owner, token, spender };
        let current_allowance = match self.cache.get(&key) {
            Some(cached) => *cached,
            None => {
                let reader = self.readers.get(chain_id)?;
                let fresh = erc20::allowance(reader, token, owner, spender).await?;
                self.cache.insert(key, fresh);
                fresh
            }
        };
        let state = AllowanceState { owner, token, spender, current_allowance, required_amount };
        debug!(chain_id, %current_allowance, %required_amount, needs_approval = state.needs_approval(), "Allowance");
        Ok(state)
    }

    /// True when `owner` must approve `spender` for `amount` (a decimal string) first.
    pub async fn check_allowance(
        &mut self,
        chain_id: u64,
        owner: Address,
        token: Address,
        spender: Address,
        amount: &str,
        decimals: u8,
    ) -> BridgeResult<bool> {
        let required = parse_amount(amount, decimals)?;
        Ok(self.allowance_state(chain_id, owner, token, spender, required).await?.needs_approval())
    }

    /// Unsigned `approve`. `None` approves the maximum amount.
    pub fn build_approval(chain_id: u64, token: Address, spender: Address, amount: Option<U256>) -> RawTransaction {
        RawTransaction {
            to: token,
            data: erc20::approve_calldata(spender, amount.unwrap_or(U256::MAX)),
            value: U256::zero(),
            chain_id,
        }
    }

    pub fn invalidate(&mut self, chain_id: u64, owner: Address, token: Address, spender: Address) {
        self.cache.remove(&AllowanceKey { chain_id, owner, token, spender });
    }

    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_approval_iff_allowance_below_requirement() {
        let mut state = AllowanceState {
            owner: Address::repeat_byte(1),
            token: Address::repeat_byte(2),
            spender: Address::repeat_byte(3),
            current_allowance: U256::from(50u64),
            required_amount: U256::from(100u64),
        };
        assert!(state.needs_approval());
        state.current_allowance = U256::from(100u64);
        assert!(!state.needs_approval());
        state.current_allowance = U256::MAX;
        assert!(!state.needs_approval());
    }

    #[test]
    fn unlimited_approval_targets_token() {
        let token = Address::repeat_byte(0x0a);
        let tx = AllowanceManager::build_approval(10, token, Address::repeat_byte(0x0b), None);
        assert_eq!(tx.to, token);
        assert_eq!(tx.chain_id, 10);
        assert!(tx.value.is_zero());
        assert!(tx.data[36..].iter().all(|&b| b == 0xff));
    }
}
