//! Connext: relayer fee and received amount from the SDK server, `xcall` on the origin connext.

use ethers::abi::Token as AbiToken;
use ethers::types::{Address, Bytes, U256};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::types::{AdapterQuote, ApprovalRequirement, QuoteContext};
use crate::blockchain::traits::RawTransaction;
use crate::core::abi::encode_call;
use crate::core::errors::{BridgeError, BridgeResult};

pub const XCALL: &str = "xcall(uint32,address,address,address,uint256,uint256,bytes)";

/// Ethers-v5 style serialized BigNumber: `{"type":"BigNumber","hex":"0x.."}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HexBigNumber {
    #[serde(rename = "type")]
    pub kind: String,
    pub hex: String,
}

impl HexBigNumber {
    pub fn to_u256(&self) -> BridgeResult<U256> {
        let digits = self.hex.trim_start_matches("0x");
        if digits.is_empty() {
            return Ok(U256::zero());
        }
        U256::from_str_radix(digits, 16)
            .map_err(|e| BridgeError::QuoteUnavailable(format!("Invalid BigNumber hex {:?}: {}", self.hex, e)))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayerFeeRequest {
    origin_domain: String,
    destination_domain: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AmountReceivedRequest {
    origin_domain: String,
    destination_domain: String,
    origin_token_address: String,
    amount: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AmountReceivedResponse {
    amount_received: HexBigNumber,
}

/// HTTP client for the Connext SDK server.
#[derive(Debug, Clone)]
pub struct ConnextClient {
    client: Client,
    base_url: String,
}

impl ConnextClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder().timeout(timeout).build().unwrap_or_else(|_| Client::new());

        Self { client, base_url: base_url.into().trim_end_matches('/').to_string() }
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(&self, path: &str, body: &B) -> BridgeResult<R> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| BridgeError::QuoteUnavailable(format!("Connext API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::QuoteUnavailable(format!("Connext API error {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| BridgeError::QuoteUnavailable(format!("Failed to parse Connext response: {}", e)))
    }

    /// Relayer fee in origin native wei.
    pub async fn estimate_relayer_fee(&self, origin_domain: u32, destination_domain: u32) -> BridgeResult<U256> {
        let body = RelayerFeeRequest {
            origin_domain: origin_domain.to_string(),
            destination_domain: destination_domain.to_string(),
        };
        let fee: HexBigNumber = self.post("estimateRelayerFee", &body).await?;
        fee.to_u256()
    }

    /// Amount the recipient gets after router and AMM fees, in destination base units.
    pub async fn calculate_amount_received(
        &self,
        origin_domain: u32,
        destination_domain: u32,
        origin_token: Address,
        amount: U256,
    ) -> BridgeResult<U256> {
        let body = AmountReceivedRequest {
            origin_domain: origin_domain.to_string(),
            destination_domain: destination_domain.to_string(),
            origin_token_address: format!("{:?}", origin_token),
            amount: amount.to_string(),
        };
        let response: AmountReceivedResponse = self.post("calculateAmountReceived", &body).await?;
        response.amount_received.to_u256()
    }
}

#[derive(Debug, Clone)]
pub struct ConnextAdapter {
    client: ConnextClient,
}

impl ConnextAdapter {
    pub fn new(client: ConnextClient) -> Self {
        Self { client }
    }

    pub async fn quote(&self, ctx: &QuoteContext<'_>) -> BridgeResult<AdapterQuote> {
        let asset = ctx.origin_token.bridged_address();
        let (fee, expected_output) = futures::try_join!(
            self.client.estimate_relayer_fee(ctx.origin_remote_id, ctx.destination_remote_id),
            self.client.calculate_amount_received(
                ctx.origin_remote_id,
                ctx.destination_remote_id,
                asset,
                ctx.amount
            ),
        )?;
        debug!(
            origin = ctx.request.origin_chain_id,
            destination = ctx.request.destination_chain_id,
            %fee,
            %expected_output,
            "Connext estimate"
        );

        Ok(AdapterQuote {
            fee,
            expected_output,
            raw_transaction: RawTransaction {
                to: ctx.origin_contract,
                data: xcall_calldata(ctx, asset),
                value: fee,
                chain_id: ctx.request.origin_chain_id,
            },
            approval: Some(ApprovalRequirement { token: asset, spender: ctx.origin_contract, amount: ctx.amount }),
        })
    }
}

/// Slippage goes through as basis points; Connext enforces it on the destination swap.
fn xcall_calldata(ctx: &QuoteContext<'_>, asset: Address) -> Bytes {
    Bytes::from(encode_call(
        XCALL,
        &[
            AbiToken::Uint(U256::from(ctx.destination_remote_id)),
            AbiToken::Address(ctx.request.recipient),
            AbiToken::Address(asset),
            AbiToken::Address(ctx.request.sender),
            AbiToken::Uint(ctx.amount),
            AbiToken::Uint(U256::from(ctx.max_slippage_bps)),
            AbiToken::Bytes(Vec::new()),
        ],
    ))
}
