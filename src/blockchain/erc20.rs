//! ERC-20 and xERC-20 calls used by the bridge flow.

use ethers::types::{Address, Bytes, U256};
use tracing::debug;

use super::traits::ChainReader;
use crate::core::abi::{abi_pack, abi_word_address, abi_word_uint256, decode_uint256_at, selector_from_signature};
use crate::core::errors::BridgeResult;

pub const ALLOWANCE: &str = "allowance(address,address)";
pub const BALANCE_OF: &str = "balanceOf(address)";
pub const APPROVE: &str = "approve(address,uint256)";
pub const MINTING_CURRENT_LIMIT_OF: &str = "mintingCurrentLimitOf(address)";
pub const BURNING_CURRENT_LIMIT_OF: &str = "burningCurrentLimitOf(address)";

async fn call_uint(
    reader: &dyn ChainReader,
    token: Address,
    signature: &str,
    args: &[Address],
) -> BridgeResult<U256> {
    let words: Vec<[u8; 32]> = args.iter().map(|a| abi_word_address(*a)).collect();
    let data = abi_pack(selector_from_signature(signature), &words);
    let out = reader.call(token, Bytes::from(data)).await?;
    let value = decode_uint256_at(&out, 0)?;
    debug!(chain_id = reader.chain_id(), token = ?token, call = signature, %value, "erc20 read");
    Ok(value)
}

pub async fn allowance(
    reader: &dyn ChainReader,
    token: Address,
    owner: Address,
    spender: Address,
) -> BridgeResult<U256> {
    call_uint(reader, token, ALLOWANCE, &[owner, spender]).await
}

pub async fn balance_of(reader: &dyn ChainReader, token: Address, account: Address) -> BridgeResult<U256> {
    call_uint(reader, token, BALANCE_OF, &[account]).await
}

/// Remaining amount `bridge` may mint on an xERC-20 token in the current window.
pub async fn minting_current_limit_of(
    reader: &dyn ChainReader,
    token: Address,
    bridge: Address,
) -> BridgeResult<U256> {
    call_uint(reader, token, MINTING_CURRENT_LIMIT_OF, &[bridge]).await
}

/// Remaining amount `bridge` may burn on an xERC-20 token in the current window.
pub async fn burning_current_limit_of(
    reader: &dyn ChainReader,
    token: Address,
    bridge: Address,
) -> BridgeResult<U256> {
    call_uint(reader, token, BURNING_CURRENT_LIMIT_OF, &[bridge]).await
}

pub fn approve_calldata(spender: Address, amount: U256) -> Bytes {
    Bytes::from(abi_pack(
        selector_from_signature(APPROVE),
        &[abi_word_address(spender), abi_word_uint256(amount)],
    ))
}
