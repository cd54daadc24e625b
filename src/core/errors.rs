//! Bridge error types and their classification.

use ethers::types::{Address, H256};
use thiserror::Error;

/// Why a bridge submission was refused before reaching the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// The destination token cannot mint the requested amount right now.
    DestinationBridgeLimitExceeded,
    /// The mainnet lockbox does not hold enough collateral to release the amount.
    LockboxBalanceExceeded,
    /// The origin token cannot burn the requested amount through this bridge right now.
    OriginLiquidityExceeded,
    /// The canonical token must be wrapped into its bridged representation first.
    WrapRequired,
    /// No quote matching the current request is available.
    NoQuote,
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockReason::DestinationBridgeLimitExceeded => {
                write!(f, "destination bridge mint limit exceeded")
            }
            BlockReason::LockboxBalanceExceeded => {
                write!(f, "mainnet lockbox balance is lower than the amount")
            }
            BlockReason::OriginLiquidityExceeded => {
                write!(f, "origin bridge burn limit exceeded")
            }
            BlockReason::WrapRequired => write!(f, "token must be wrapped before bridging"),
            BlockReason::NoQuote => write!(f, "no valid quote for the current request"),
        }
    }
}

/// Coarse classification used by callers to decide how to present and recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Unsupported chain/token/route or bad input. Fatal for the request.
    Configuration,
    /// Network or RPC failure. Quote refresh may retry automatically.
    Transient,
    /// Liquidity or limit violation detected before submission.
    Limit,
    /// The user declined to sign.
    UserRejected,
    /// The transaction reverted on-chain.
    Reverted,
    /// Receipt wait timed out; the transaction may still land.
    UnknownOutcome,
    /// Any other wallet/provider failure.
    Wallet,
}

#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    #[error("Unsupported chain: {0}")]
    UnsupportedChain(u64),

    #[error("Unsupported token {token:?} on chain {chain_id}")]
    UnsupportedToken { chain_id: u64, token: Address },

    #[error("No bridge route for {symbol} from chain {origin} to chain {destination}")]
    RouteUnsupported { origin: u64, destination: u64, symbol: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Quote unavailable: {0}")]
    QuoteUnavailable(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Submission blocked: {0}")]
    SubmissionBlocked(BlockReason),

    #[error("Wallet is on chain {active}, expected chain {expected}")]
    WrongChain { expected: u64, active: u64 },

    #[error("User rejected the request: {0}")]
    UserRejected(String),

    #[error("Transaction {tx_hash:?} reverted: {}", .reason.as_deref().unwrap_or("no reason returned"))]
    Reverted { tx_hash: H256, reason: Option<String> },

    #[error("Receipt for {tx_hash:?} not received in time, outcome unknown. Check {explorer_url}")]
    ReceiptTimeout { tx_hash: H256, explorer_url: String },

    #[error("Wallet error: {0}")]
    Wallet(String),
}

impl BridgeError {
    pub fn class(&self) -> ErrorClass {
        match self {
            BridgeError::UnsupportedChain(_)
            | BridgeError::UnsupportedToken { .. }
            | BridgeError::RouteUnsupported { .. }
            | BridgeError::InvalidInput(_)
            | BridgeError::Config(_) => ErrorClass::Configuration,
            BridgeError::QuoteUnavailable(_) | BridgeError::Rpc(_) => ErrorClass::Transient,
            BridgeError::SubmissionBlocked(_) => ErrorClass::Limit,
            BridgeError::UserRejected(_) => ErrorClass::UserRejected,
            BridgeError::Reverted { .. } => ErrorClass::Reverted,
            BridgeError::ReceiptTimeout { .. } => ErrorClass::UnknownOutcome,
            BridgeError::WrongChain { .. } | BridgeError::Wallet(_) => ErrorClass::Wallet,
        }
    }

    /// Transient failures that an automatic quote refresh may retry.
    /// Transaction submission is never retried automatically.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    pub fn is_route_unsupported(&self) -> bool {
        matches!(self, BridgeError::RouteUnsupported { .. })
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
