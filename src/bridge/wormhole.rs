//! Wormhole token gateway: `bridgeCost` on the origin gateway, then `bridge`.

use ethers::abi::Token as AbiToken;
use ethers::types::{Bytes, U256};
use tracing::debug;

use super::types::{quote_unavailable, AdapterQuote, ApprovalRequirement, QuoteContext};
use crate::blockchain::traits::{ChainReaders, RawTransaction};
use crate::core::abi::{decode_uint256_at, encode_call};
use crate::core::errors::BridgeResult;
use crate::registry::Protocol;

pub const BRIDGE_COST: &str = "bridgeCost(uint16)";
pub const BRIDGE: &str = "bridge(uint16,address,uint256)";

#[derive(Debug, Clone, Default)]
pub struct WormholeAdapter;

impl WormholeAdapter {
    pub fn new() -> Self {
        Self
    }

    pub async fn quote(&self, ctx: &QuoteContext<'_>, readers: &ChainReaders) -> BridgeResult<AdapterQuote> {
        let destination_chain = AbiToken::Uint(U256::from(ctx.destination_remote_id));
        let origin = readers.get(ctx.request.origin_chain_id)?;
        let out = origin
            .call(ctx.origin_contract, Bytes::from(encode_call(BRIDGE_COST, &[destination_chain.clone()])))
            .await
            .map_err(|e| quote_unavailable(Protocol::Wormhole, e))?;
        let fee = decode_uint256_at(&out, 0).map_err(|e| quote_unavailable(Protocol::Wormhole, e))?;
        debug!(wormhole_chain = ctx.destination_remote_id, %fee, "Wormhole bridgeCost");

        let data = encode_call(
            BRIDGE,
            &[destination_chain, AbiToken::Address(ctx.request.recipient), AbiToken::Uint(ctx.amount)],
        );
        let token = ctx.origin_token.bridged_address();

        Ok(AdapterQuote {
            fee,
            // The gateway burns and mints one-to-one.
            expected_output: ctx.amount,
            raw_transaction: RawTransaction {
                to: ctx.origin_contract,
                data: Bytes::from(data),
                value: fee,
                chain_id: ctx.request.origin_chain_id,
            },
            approval: Some(ApprovalRequirement { token, spender: ctx.origin_contract, amount: ctx.amount }),
        })
    }
}
