use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, U256};

use crate::core::errors::{BridgeError, BridgeResult};

/// Selector of the standard `Error(string)` revert payload.
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Compute the first 4 bytes (function selector) from a signature string, e.g. "transfer(address,uint256)".
pub fn selector_from_signature(signature: &str) -> [u8; 4] {
    let out = ethers::utils::keccak256(signature.as_bytes());
    [out[0], out[1], out[2], out[3]]
}

/// Encode an address into a 32-byte ABI word (left-padded).
pub fn abi_word_address(addr: Address) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(addr.as_bytes());
    out
}

/// Encode an unsigned integer into a 32-byte big-endian ABI word.
pub fn abi_word_uint256(value: U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    out
}

/// Pack a selector and static ABI words contiguously into calldata.
pub fn abi_pack(selector: [u8; 4], words: &[[u8; 32]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + 32 * words.len());
    out.extend_from_slice(&selector);
    for w in words {
        out.extend_from_slice(w);
    }
    out
}

/// Selector followed by the standard ABI encoding of `args`.
/// Needed for calls with dynamic members (bytes, tuples).
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut out = selector_from_signature(signature).to_vec();
    out.extend(abi::encode(args));
    out
}

/// Decode the `index`-th static uint256 word of a return payload.
pub fn decode_uint256_at(data: &[u8], index: usize) -> BridgeResult<U256> {
    let start = index * 32;
    let word = data.get(start..start + 32).ok_or_else(|| {
        BridgeError::Rpc(format!(
            "return data too short: {} bytes, wanted word {}",
            data.len(),
            index
        ))
    })?;
    Ok(U256::from_big_endian(word))
}

/// Extract the message from an `Error(string)` revert payload.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    if data.len() < 4 || data[..4] != ERROR_STRING_SELECTOR {
        return None;
    }
    match abi::decode(&[ParamType::String], &data[4..]).ok()?.pop()? {
        Token::String(reason) => Some(reason),
        _ => None,
    }
}
