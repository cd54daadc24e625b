//! LayerZero OFT: `quoteSend` for the native fee, `send` with a slippage floor.

use ethers::abi::Token as AbiToken;
use ethers::types::{Bytes, U256};
use tracing::debug;

use super::types::{quote_unavailable, AdapterQuote, ApprovalRequirement, QuoteContext};
use crate::blockchain::traits::{ChainReaders, RawTransaction};
use crate::core::abi::{abi_word_address, decode_uint256_at, encode_call};
use crate::core::errors::BridgeResult;
use crate::core::validation::min_amount_after_slippage;
use crate::registry::Protocol;

pub const QUOTE_SEND: &str = "quoteSend((uint32,bytes32,uint256,uint256,bytes,bytes,bytes),bool)";
pub const SEND: &str = "send((uint32,bytes32,uint256,uint256,bytes,bytes,bytes),(uint256,uint256),address)";

/// OFTs move amounts at 6 shared decimals; anything finer is dust left with the sender.
pub const SHARED_DECIMALS: u8 = 6;

const OPTIONS_TYPE_3: u16 = 3;
const EXECUTOR_WORKER_ID: u8 = 1;
const OPTION_TYPE_LZRECEIVE: u8 = 1;

/// Type-3 options carrying a single executor `lzReceive` gas option.
pub fn lz_receive_options(gas: u64) -> Vec<u8> {
    let gas = u128::from(gas).to_be_bytes();
    let option_len = (1 + gas.len()) as u16;
    let mut out = Vec::with_capacity(2 + 1 + 2 + option_len as usize);
    out.extend_from_slice(&OPTIONS_TYPE_3.to_be_bytes());
    out.push(EXECUTOR_WORKER_ID);
    out.extend_from_slice(&option_len.to_be_bytes());
    out.push(OPTION_TYPE_LZRECEIVE);
    out.extend_from_slice(&gas);
    out
}

pub fn remove_dust(amount: U256, decimals: u8) -> U256 {
    if decimals <= SHARED_DECIMALS {
        return amount;
    }
    let rate = U256::exp10((decimals - SHARED_DECIMALS) as usize);
    amount - amount % rate
}

#[derive(Debug, Clone)]
pub struct LayerZeroAdapter {
    receive_gas: u64,
}

impl LayerZeroAdapter {
    pub fn new(receive_gas: u64) -> Self {
        Self { receive_gas }
    }

    fn send_param(&self, ctx: &QuoteContext<'_>, min_amount: U256) -> AbiToken {
        AbiToken::Tuple(vec![
            AbiToken::Uint(U256::from(ctx.destination_remote_id)),
            AbiToken::FixedBytes(abi_word_address(ctx.request.recipient).to_vec()),
            AbiToken::Uint(ctx.amount),
            AbiToken::Uint(min_amount),
            AbiToken::Bytes(lz_receive_options(self.receive_gas)),
            AbiToken::Bytes(Vec::new()),
            AbiToken::Bytes(Vec::new()),
        ])
    }

    pub async fn quote(&self, ctx: &QuoteContext<'_>, readers: &ChainReaders) -> BridgeResult<AdapterQuote> {
        let expected_output = remove_dust(ctx.amount, ctx.origin_token.decimals);
        let min_amount = min_amount_after_slippage(expected_output, ctx.max_slippage_bps);
        let send_param = self.send_param(ctx, min_amount);

        let origin = readers.get(ctx.request.origin_chain_id)?;
        let quote_data = encode_call(QUOTE_SEND, &[send_param.clone(), AbiToken::Bool(false)]);
        let out = origin
            .call(ctx.origin_contract, Bytes::from(quote_data))
            .await
            .map_err(|e| quote_unavailable(Protocol::LayerZero, e))?;
        let native_fee = decode_uint256_at(&out, 0).map_err(|e| quote_unavailable(Protocol::LayerZero, e))?;
        debug!(eid = ctx.destination_remote_id, %native_fee, %min_amount, "LayerZero quoteSend");

        let data = encode_call(
            SEND,
            &[
                send_param,
                AbiToken::Tuple(vec![AbiToken::Uint(native_fee), AbiToken::Uint(U256::zero())]),
                AbiToken::Address(ctx.request.sender),
            ],
        );

        // An OFT that is its own token burns directly; an adapter has to pull the tokens first.
        let approval = (ctx.origin_contract != ctx.origin_token.address).then(|| ApprovalRequirement {
            token: ctx.origin_token.address,
            spender: ctx.origin_contract,
            amount: ctx.amount,
        });

        Ok(AdapterQuote {
            fee: native_fee,
            expected_output,
            raw_transaction: RawTransaction {
                to: ctx.origin_contract,
                data: Bytes::from(data),
                value: native_fee,
                chain_id: ctx.request.origin_chain_id,
            },
            approval,
        })
    }
}
