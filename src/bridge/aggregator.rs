//! Route resolution and quote composition, plus latest-request-wins bookkeeping.

use ethers::types::U256;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::adapter::Adapters;
use super::limits::is_wrap_needed;
use super::types::{Quote, QuoteContext, TransferRequest};
use crate::blockchain::traits::ChainReaders;
use crate::core::errors::{BridgeError, BridgeResult};
use crate::core::validation::parse_amount;
use crate::registry::{ChainRegistry, Protocol, Token};

pub struct QuoteAggregator {
    registry: Arc<ChainRegistry>,
    readers: ChainReaders,
    adapters: Adapters,
    max_slippage_bps: u32,
}

impl QuoteAggregator {
    pub fn new(registry: Arc<ChainRegistry>, readers: ChainReaders, adapters: Adapters, max_slippage_bps: u32) -> Self {
        Self { registry, readers, adapters, max_slippage_bps }
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub fn readers(&self) -> &ChainReaders {
        &self.readers
    }

    /// `Ok(None)` for a zero amount, without touching the network.
    /// Limit and wrap conditions come back as quote flags, never as errors.
    pub async fn get_quote(&self, request: &TransferRequest) -> BridgeResult<Option<Quote>> {
        if request.is_zero_amount() {
            debug!("Zero amount, no quote");
            return Ok(None);
        }
        if request.origin_chain_id == request.destination_chain_id {
            return Err(BridgeError::InvalidInput("Origin and destination chain must differ".into()));
        }
        if request.recipient.is_zero() {
            return Err(BridgeError::InvalidInput("Recipient must not be the zero address".into()));
        }

        self.registry.chain(request.origin_chain_id)?;
        let destination = self.registry.chain(request.destination_chain_id)?;
        let origin_token = self.registry.token(request.origin_chain_id, request.token_address)?;
        let destination_token = self
            .registry
            .token_by_symbol(request.destination_chain_id, &origin_token.symbol)
            .map_err(|_| BridgeError::RouteUnsupported {
                origin: request.origin_chain_id,
                destination: request.destination_chain_id,
                symbol: origin_token.symbol.clone(),
            })?;
        let amount = parse_amount(&request.amount, origin_token.decimals)?;

        let candidates = self.registry.route_candidates(
            request.origin_chain_id,
            request.destination_chain_id,
            &origin_token.symbol,
        )?;

        let mut last_unsupported = None;
        for protocol in candidates {
            let resolved =
                self.context(protocol, request, origin_token, destination_token, amount, destination.is_mainnet);
            let ctx = match resolved {
                Ok(ctx) => ctx,
                Err(e) => {
                    warn!(%protocol, "Skipping candidate: {}", e);
                    last_unsupported = Some(e);
                    continue;
                }
            };
            match self.quote_with(protocol, &ctx).await {
                Ok(quote) => {
                    info!(
                        %protocol,
                        origin = request.origin_chain_id,
                        destination = request.destination_chain_id,
                        token = %origin_token.symbol,
                        amount = %request.amount,
                        fee = %quote.fee,
                        expected_output = %quote.expected_output,
                        "Quote ready"
                    );
                    return Ok(Some(quote));
                }
                Err(e) if e.is_route_unsupported() => {
                    warn!(%protocol, "Protocol does not serve route: {}", e);
                    last_unsupported = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_unsupported.unwrap_or_else(|| BridgeError::RouteUnsupported {
            origin: request.origin_chain_id,
            destination: request.destination_chain_id,
            symbol: origin_token.symbol.clone(),
        }))
    }

    /// Missing deployments or remote ids mean this protocol does not serve the route.
    fn context<'a>(
        &self,
        protocol: Protocol,
        request: &'a TransferRequest,
        origin_token: &'a Token,
        destination_token: &'a Token,
        amount: U256,
        destination_is_mainnet: bool,
    ) -> BridgeResult<QuoteContext<'a>> {
        let unsupported = |_: BridgeError| BridgeError::RouteUnsupported {
            origin: request.origin_chain_id,
            destination: request.destination_chain_id,
            symbol: origin_token.symbol.clone(),
        };
        Ok(QuoteContext {
            request,
            origin_token,
            destination_token,
            amount,
            origin_contract: self
                .registry
                .bridge_contract(protocol, request.origin_chain_id, &origin_token.symbol)
                .map_err(unsupported)?,
            destination_contract: self
                .registry
                .bridge_contract(protocol, request.destination_chain_id, &destination_token.symbol)
                .map_err(unsupported)?,
            origin_remote_id: self.registry.remote_id(protocol, request.origin_chain_id).map_err(unsupported)?,
            destination_remote_id: self
                .registry
                .remote_id(protocol, request.destination_chain_id)
                .map_err(unsupported)?,
            destination_is_mainnet,
            max_slippage_bps: self.max_slippage_bps,
        })
    }

    async fn quote_with(&self, protocol: Protocol, ctx: &QuoteContext<'_>) -> BridgeResult<Quote> {
        let adapter = self.adapters.get(protocol);
        let (quoted, limits, wrap_needed) = futures::try_join!(
            adapter.quote(ctx, &self.readers),
            adapter.check_limits(ctx, &self.readers),
            is_wrap_needed(ctx, &self.readers),
        )?;
        let fee_symbol = self.registry.chain(ctx.request.origin_chain_id)?.native_symbol.clone();

        Ok(Quote {
            request: ctx.request.clone(),
            protocol,
            fee: quoted.fee,
            fee_symbol,
            expected_output: quoted.expected_output,
            decimals: ctx.destination_token.decimals,
            raw_transaction: quoted.raw_transaction,
            approval: quoted.approval,
            is_destination_bridge_limit_exceeded: !limits.destination_limit_ok,
            is_to_mainnet_lockbox_balance_exceeded: !limits.lockbox_balance_ok,
            is_origin_liquidity_exceeded: !limits.origin_liquidity_ok,
            is_wrap_needed: wrap_needed,
        })
    }
}

/// What the caller currently sees for the latest request.
#[derive(Debug, Clone, Default)]
pub enum QuoteState {
    #[default]
    Empty,
    Loading,
    Ready(Quote),
    Failed(BridgeError),
}

/// Handle for one issued quote request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteTicket {
    pub seq: u64,
    pub request: TransferRequest,
}

/// Applies quote results only for the most recently issued ticket.
#[derive(Debug, Default)]
pub struct QuoteBoard {
    latest_seq: u64,
    state: QuoteState,
}

impl QuoteBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supersedes every outstanding ticket.
    pub fn issue(&mut self, request: TransferRequest) -> QuoteTicket {
        self.latest_seq += 1;
        self.state = QuoteState::Loading;
        QuoteTicket { seq: self.latest_seq, request }
    }

    /// Returns false and drops the result when a newer ticket exists.
    pub fn apply(&mut self, ticket: &QuoteTicket, result: BridgeResult<Option<Quote>>) -> bool {
        if ticket.seq != self.latest_seq {
            debug!(seq = ticket.seq, latest = self.latest_seq, "Discarding stale quote result");
            return false;
        }
        self.state = match result {
            Ok(Some(quote)) => QuoteState::Ready(quote),
            Ok(None) => QuoteState::Empty,
            Err(e) => QuoteState::Failed(e),
        };
        true
    }

    pub fn current(&self) -> &QuoteState {
        &self.state
    }

    /// The ready quote, if it was computed for exactly `request`.
    pub fn quote_for(&self, request: &TransferRequest) -> Option<&Quote> {
        match &self.state {
            QuoteState::Ready(quote) if quote.is_valid_for(request) => Some(quote),
            _ => None,
        }
    }

    /// Forget the current result and invalidate outstanding tickets.
    pub fn clear(&mut self) {
        self.latest_seq += 1;
        self.state = QuoteState::Empty;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::Address;

    fn request(amount: &str) -> TransferRequest {
        TransferRequest::new(1, 10, Address::repeat_byte(0xaa), amount, Address::repeat_byte(1), Address::repeat_byte(2))
    }

    #[test]
    fn newer_ticket_wins() {
        let mut board = QuoteBoard::new();
        let first = board.issue(request("10"));
        let second = board.issue(request("20"));
        assert!(matches!(board.current(), QuoteState::Loading));

        assert!(board.apply(&second, Ok(None)));
        assert!(!board.apply(&first, Err(BridgeError::QuoteUnavailable("late".into()))));
        assert!(matches!(board.current(), QuoteState::Empty));
    }

    #[test]
    fn clear_invalidates_outstanding_ticket() {
        let mut board = QuoteBoard::new();
        let ticket = board.issue(request("10"));
        board.clear();
        assert!(!board.apply(&ticket, Ok(None)));
        assert!(board.quote_for(&request("10")).is_none());
    }

    #[test]
    fn failure_is_kept_for_latest_ticket() {
        let mut board = QuoteBoard::new();
        let ticket = board.issue(request("10"));
        assert!(board.apply(&ticket, Err(BridgeError::Rpc("down".into()))));
        match board.current() {
            QuoteState::Failed(e) => assert!(e.is_retryable()),
            other => panic!("unexpected state {:?}", other),
        }
    }
}
