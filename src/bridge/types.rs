use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::blockchain::traits::RawTransaction;
use crate::core::errors::{BlockReason, BridgeError, BridgeResult};
use crate::core::validation::{format_amount, is_zero_amount, parse_address};
use crate::registry::{Protocol, Token};

/// What the user asked to move. Replaced wholesale whenever an input changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub origin_chain_id: u64,
    pub destination_chain_id: u64,
    /// Token selected on the origin chain (canonical or xERC-20 address).
    pub token_address: Address,
    /// Human decimal amount, e.g. "100" or "0.5".
    pub amount: String,
    pub sender: Address,
    pub recipient: Address,
}

impl TransferRequest {
    pub fn new(
        origin_chain_id: u64,
        destination_chain_id: u64,
        token_address: Address,
        amount: impl Into<String>,
        sender: Address,
        recipient: Address,
    ) -> Self {
        Self {
            origin_chain_id,
            destination_chain_id,
            token_address,
            amount: amount.into(),
            sender,
            recipient,
        }
    }

    /// Build a request from user-entered strings, validating every address.
    pub fn parse(
        origin_chain_id: u64,
        destination_chain_id: u64,
        token_address: &str,
        amount: &str,
        sender: &str,
        recipient: &str,
    ) -> BridgeResult<Self> {
        Ok(Self::new(
            origin_chain_id,
            destination_chain_id,
            parse_address(token_address)?,
            amount.trim(),
            parse_address(sender)?,
            parse_address(recipient)?,
        ))
    }

    pub fn is_zero_amount(&self) -> bool {
        is_zero_amount(&self.amount)
    }

    /// Same transfer with a different amount.
    pub fn with_amount(&self, amount: impl Into<String>) -> Self {
        Self { amount: amount.into(), ..self.clone() }
    }
}

/// An ERC-20 approval the sender must hold before the bridge call can pull funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequirement {
    pub token: Address,
    pub spender: Address,
    pub amount: U256,
}

/// Executable plan for one request. Never mutated; a new request gets a new quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub request: TransferRequest,
    pub protocol: Protocol,
    /// Native fee in wei, paid as the transaction value.
    pub fee: U256,
    pub fee_symbol: String,
    /// Destination-side amount in base units.
    pub expected_output: U256,
    pub decimals: u8,
    pub raw_transaction: RawTransaction,
    pub approval: Option<ApprovalRequirement>,
    pub is_destination_bridge_limit_exceeded: bool,
    pub is_to_mainnet_lockbox_balance_exceeded: bool,
    pub is_origin_liquidity_exceeded: bool,
    pub is_wrap_needed: bool,
}

impl Quote {
    pub fn is_valid_for(&self, request: &TransferRequest) -> bool {
        self.request == *request
    }

    /// First reason the bridge transaction must not be sent, if any.
    pub fn blocking_reason(&self) -> Option<BlockReason> {
        if self.is_wrap_needed {
            Some(BlockReason::WrapRequired)
        } else if self.is_destination_bridge_limit_exceeded {
            Some(BlockReason::DestinationBridgeLimitExceeded)
        } else if self.is_to_mainnet_lockbox_balance_exceeded {
            Some(BlockReason::LockboxBalanceExceeded)
        } else if self.is_origin_liquidity_exceeded {
            Some(BlockReason::OriginLiquidityExceeded)
        } else {
            None
        }
    }

    pub fn expected_output_amount(&self) -> String {
        format_amount(self.expected_output, self.decimals)
    }

    /// Native fees are always 18-decimal on the supported chains.
    pub fn fee_display(&self) -> String {
        format!("{} {}", format_amount(self.fee, 18), self.fee_symbol)
    }
}

/// Everything an adapter needs about one resolved route.
#[derive(Debug, Clone)]
pub struct QuoteContext<'a> {
    pub request: &'a TransferRequest,
    pub origin_token: &'a Token,
    pub destination_token: &'a Token,
    /// Request amount in origin base units.
    pub amount: U256,
    pub origin_contract: Address,
    pub destination_contract: Address,
    pub origin_remote_id: u32,
    pub destination_remote_id: u32,
    pub destination_is_mainnet: bool,
    pub max_slippage_bps: u32,
}

/// What a protocol adapter returns for a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterQuote {
    pub fee: U256,
    pub expected_output: U256,
    pub raw_transaction: RawTransaction,
    pub approval: Option<ApprovalRequirement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitCheck {
    /// Origin burn capacity covers the amount.
    pub origin_liquidity_ok: bool,
    /// Destination mint capacity covers the amount.
    pub destination_limit_ok: bool,
    /// Mainnet lockbox can release the amount (always true off-mainnet).
    pub lockbox_balance_ok: bool,
}

impl LimitCheck {
    pub const fn unlimited() -> Self {
        Self { origin_liquidity_ok: true, destination_limit_ok: true, lockbox_balance_ok: true }
    }
}

/// Keep configuration errors as they are and surface transport failures as
/// `QuoteUnavailable` tagged with the protocol that hit them.
pub(crate) fn quote_unavailable(protocol: Protocol, err: BridgeError) -> BridgeError {
    match err {
        BridgeError::Rpc(msg) | BridgeError::QuoteUnavailable(msg) => {
            BridgeError::QuoteUnavailable(format!("{}: {}", protocol, msg))
        }
        other => other,
    }
}
