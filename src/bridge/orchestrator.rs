//! Transfer state machine: chain switch, approval, submission, receipt.
//!
//! Every operation takes `&mut self`, so approval and submission can never
//! overlap and at most one bridge transaction is in flight per instance.

use chrono::{DateTime, Utc};
use ethers::types::{Address, H256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::aggregator::{QuoteAggregator, QuoteBoard, QuoteState, QuoteTicket};
use super::allowance::AllowanceManager;
use super::types::{ApprovalRequirement, Quote, TransferRequest};
use crate::blockchain::traits::{ReceiptSummary, TransactionStatus, WalletSession};
use crate::core::errors::{BlockReason, BridgeError, BridgeResult, ErrorClass};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureInfo {
    pub class: ErrorClass,
    pub message: String,
}

impl From<&BridgeError> for FailureInfo {
    fn from(err: &BridgeError) -> Self {
        Self { class: err.class(), message: err.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferPhase {
    Idle,
    AwaitingChainSwitch,
    AwaitingApproval,
    AwaitingBridgeSubmission,
    AwaitingReceipt,
    Settled,
    Failed(FailureInfo),
}

impl TransferPhase {
    pub fn name(&self) -> &'static str {
        match self {
            TransferPhase::Idle => "idle",
            TransferPhase::AwaitingChainSwitch => "awaiting_chain_switch",
            TransferPhase::AwaitingApproval => "awaiting_approval",
            TransferPhase::AwaitingBridgeSubmission => "awaiting_bridge_submission",
            TransferPhase::AwaitingReceipt => "awaiting_receipt",
            TransferPhase::Settled => "settled",
            TransferPhase::Failed(_) => "failed",
        }
    }

    fn is_settled_or_in_flight(&self) -> bool {
        matches!(self, TransferPhase::AwaitingReceipt | TransferPhase::Settled | TransferPhase::Failed(_))
    }
}

impl std::fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferPhase::Failed(info) => write!(f, "failed ({:?}): {}", info.class, info.message),
            other => f.write_str(other.name()),
        }
    }
}

/// The single action offered to the user in the current phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SwitchChain { chain_id: u64 },
    Approve(ApprovalRequirement),
    /// Deposit the canonical token into its lockbox first. Handled outside this crate.
    Wrap { token: Address, lockbox: Option<Address> },
    Submit,
}

/// One user-initiated transfer.
#[derive(Debug, Clone)]
pub struct TransferExecution {
    pub id: Uuid,
    pub phase: TransferPhase,
    pub submitted_tx_hash: Option<H256>,
    pub receipt: Option<ReceiptSummary>,
    pub started_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl TransferExecution {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: TransferPhase::Idle,
            submitted_tx_hash: None,
            receipt: None,
            started_at: Utc::now(),
            settled_at: None,
        }
    }
}

/// A quote request detached from the orchestrator so inputs can change while it runs.
pub struct QuoteJob {
    ticket: QuoteTicket,
    aggregator: Arc<QuoteAggregator>,
}

impl QuoteJob {
    pub fn ticket(&self) -> &QuoteTicket {
        &self.ticket
    }

    pub async fn run(self) -> (QuoteTicket, BridgeResult<Option<Quote>>) {
        let result = self.aggregator.get_quote(&self.ticket.request).await;
        (self.ticket, result)
    }
}

pub struct TransferOrchestrator {
    aggregator: Arc<QuoteAggregator>,
    allowances: AllowanceManager,
    wallet: Arc<dyn WalletSession>,
    receipt_timeout: Duration,
    request: Option<TransferRequest>,
    quotes: QuoteBoard,
    execution: TransferExecution,
    last_error: Option<BridgeError>,
}

impl TransferOrchestrator {
    pub fn new(aggregator: Arc<QuoteAggregator>, wallet: Arc<dyn WalletSession>, receipt_timeout: Duration) -> Self {
        let allowances = AllowanceManager::new(aggregator.readers().clone());
        Self {
            aggregator,
            allowances,
            wallet,
            receipt_timeout,
            request: None,
            quotes: QuoteBoard::new(),
            execution: TransferExecution::new(),
            last_error: None,
        }
    }

    pub fn phase(&self) -> &TransferPhase {
        &self.execution.phase
    }

    pub fn request(&self) -> Option<&TransferRequest> {
        self.request.as_ref()
    }

    pub fn quote_state(&self) -> &QuoteState {
        self.quotes.current()
    }

    /// The quote for the current request, never one computed for older inputs.
    pub fn quote(&self) -> Option<&Quote> {
        self.request.as_ref().and_then(|r| self.quotes.quote_for(r))
    }

    pub fn execution(&self) -> &TransferExecution {
        &self.execution
    }

    /// Most recent error or notice, including ones that did not move the phase
    /// (user rejection, blocked submission, receipt timeout).
    pub fn last_error(&self) -> Option<&BridgeError> {
        self.last_error.as_ref()
    }

    fn set_phase(&mut self, phase: TransferPhase) {
        if self.execution.phase != phase {
            debug!(
                transfer = %self.execution.id,
                from = self.execution.phase.name(),
                to = phase.name(),
                "Phase change"
            );
            self.execution.phase = phase;
        }
    }

    fn fail(&mut self, err: BridgeError) -> BridgeError {
        error!(transfer = %self.execution.id, class = ?err.class(), "Transfer failed: {}", err);
        self.set_phase(TransferPhase::Failed(FailureInfo::from(&err)));
        self.last_error = Some(err.clone());
        err
    }

    /// A declined signature leaves the phase untouched; anything else fails the transfer.
    fn wallet_error(&mut self, err: BridgeError) -> BridgeError {
        if err.class() == ErrorClass::UserRejected {
            warn!(transfer = %self.execution.id, "User rejected: {}", err);
            self.last_error = Some(err.clone());
            err
        } else {
            self.fail(err)
        }
    }

    fn blocked(&mut self, reason: BlockReason) -> BridgeError {
        let err = BridgeError::SubmissionBlocked(reason);
        warn!(transfer = %self.execution.id, "{}", err);
        self.last_error = Some(err.clone());
        err
    }

    /// Replace the request. Any change drops the quote and starts a new execution.
    pub fn set_request(&mut self, request: Option<TransferRequest>) -> BridgeResult<()> {
        if self.execution.phase == TransferPhase::AwaitingReceipt {
            return Err(BridgeError::InvalidInput("A bridge transaction is awaiting its receipt".into()));
        }
        if self.request == request {
            return Ok(());
        }
        self.request = request;
        self.quotes.clear();
        self.allowances.invalidate_all();
        self.execution = TransferExecution::new();
        self.last_error = None;
        Ok(())
    }

    /// Issue a quote request for the current inputs. Results of earlier jobs are dropped.
    pub fn quote_job(&mut self) -> Option<QuoteJob> {
        let request = self.request.clone()?;
        Some(QuoteJob { ticket: self.quotes.issue(request), aggregator: self.aggregator.clone() })
    }

    /// Returns false when the result belongs to a superseded request.
    pub fn apply_quote(&mut self, ticket: &QuoteTicket, result: BridgeResult<Option<Quote>>) -> bool {
        if self.request.as_ref() != Some(&ticket.request) {
            debug!(seq = ticket.seq, "Quote for an outdated request discarded");
            return false;
        }
        self.quotes.apply(ticket, result)
    }

    pub async fn refresh_quote(&mut self) -> BridgeResult<()> {
        let Some(job) = self.quote_job() else {
            return Ok(());
        };
        let (ticket, result) = job.run().await;
        let failure = result.as_ref().err().cloned();
        self.apply_quote(&ticket, result);
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Derive the phase from the request, quote, active chain and allowance.
    /// In-flight and terminal phases are left alone.
    pub async fn evaluate(&mut self) -> TransferPhase {
        if !self.execution.phase.is_settled_or_in_flight() {
            match self.derive_phase().await {
                Ok(phase) => self.set_phase(phase),
                Err(err) => {
                    self.fail(err);
                }
            }
        }
        self.execution.phase.clone()
    }

    async fn derive_phase(&mut self) -> BridgeResult<TransferPhase> {
        let Some(request) = self.request.clone() else {
            return Ok(TransferPhase::Idle);
        };
        if request.is_zero_amount() {
            return Ok(TransferPhase::Idle);
        }
        if request.sender != self.wallet.address() {
            return Err(BridgeError::Wallet(format!(
                "Connected account {:?} is not the sender {:?}",
                self.wallet.address(),
                request.sender
            )));
        }
        let active_chain_id = self.wallet.active_chain_id().await?;
        if active_chain_id != request.origin_chain_id {
            // Only the switch is offered here; a quote outage shows up in the quote state.
            if self.quotes.quote_for(&request).is_none() {
                if let Err(err) = self.refresh_quote().await {
                    debug!(transfer = %self.execution.id, "Quote before chain switch failed: {}", err);
                }
            }
            return Ok(TransferPhase::AwaitingChainSwitch);
        }

        if self.quotes.quote_for(&request).is_none() {
            self.refresh_quote().await?;
        }
        let Some(quote) = self.quotes.quote_for(&request).cloned() else {
            return Ok(TransferPhase::Idle);
        };

        if let Some(approval) = quote.approval {
            let state = self
                .allowances
                .allowance_state(
                    request.origin_chain_id,
                    request.sender,
                    approval.token,
                    approval.spender,
                    approval.amount,
                )
                .await?;
            if state.needs_approval() {
                return Ok(TransferPhase::AwaitingApproval);
            }
        }
        Ok(TransferPhase::AwaitingBridgeSubmission)
    }

    pub fn available_action(&self) -> Option<Action> {
        let request = self.request.as_ref()?;
        match self.execution.phase {
            TransferPhase::AwaitingChainSwitch => Some(Action::SwitchChain { chain_id: request.origin_chain_id }),
            TransferPhase::AwaitingApproval => self.quote().and_then(|q| q.approval).map(Action::Approve),
            TransferPhase::AwaitingBridgeSubmission => match self.quote()?.blocking_reason() {
                None => Some(Action::Submit),
                Some(BlockReason::WrapRequired) => {
                    let registry = self.aggregator.registry();
                    let token = registry.token(request.origin_chain_id, request.token_address).ok()?;
                    Some(Action::Wrap { token: token.address, lockbox: token.lockbox })
                }
                Some(_) => None,
            },
            _ => None,
        }
    }

    /// Perform whatever the current phase offers, then re-evaluate.
    pub async fn proceed(&mut self) -> BridgeResult<TransferPhase> {
        match self.evaluate().await {
            TransferPhase::AwaitingChainSwitch => self.switch_chain().await?,
            TransferPhase::AwaitingApproval => self.approve().await?,
            TransferPhase::AwaitingBridgeSubmission => {
                if self.submit_bridge().await?.is_some() {
                    self.await_receipt().await?;
                }
            }
            _ => {}
        }
        Ok(self.execution.phase.clone())
    }

    async fn switch_chain(&mut self) -> BridgeResult<()> {
        let Some(chain_id) = self.request.as_ref().map(|r| r.origin_chain_id) else {
            return Ok(());
        };
        let switched = self.wallet.switch_chain(chain_id).await;
        if let Err(err) = switched {
            return Err(self.wallet_error(err));
        }
        info!(transfer = %self.execution.id, chain_id, "Switched chain");
        self.evaluate().await;
        Ok(())
    }

    /// Approve the maximum amount, wait for it, then re-read the allowance.
    async fn approve(&mut self) -> BridgeResult<()> {
        let (Some(request), Some(approval)) = (self.request.clone(), self.quote().and_then(|q| q.approval)) else {
            return Err(self.blocked(BlockReason::NoQuote));
        };
        let chain_id = request.origin_chain_id;
        let tx = AllowanceManager::build_approval(chain_id, approval.token, approval.spender, None);

        let sent = self.wallet.send_transaction(&tx).await;
        let tx_hash = match sent {
            Ok(tx_hash) => tx_hash,
            Err(err) => return Err(self.wallet_error(err)),
        };
        info!(transfer = %self.execution.id, tx_hash = ?tx_hash, spender = ?approval.spender, "Approval submitted");

        let outcome = timeout(self.receipt_timeout, self.wallet.wait_for_receipt(chain_id, tx_hash)).await;
        match outcome {
            Ok(Ok(receipt)) if receipt.status == TransactionStatus::Confirmed => {
                info!(transfer = %self.execution.id, tx_hash = ?tx_hash, "Approval confirmed");
            }
            Ok(Ok(receipt)) => {
                return Err(self.fail(BridgeError::Reverted { tx_hash, reason: receipt.revert_reason }));
            }
            Ok(Err(err)) => return Err(self.fail(err)),
            Err(_) => {
                // The allowance read below decides whether the approval landed.
                warn!(transfer = %self.execution.id, tx_hash = ?tx_hash, "Approval receipt timed out");
                let explorer_url = self.explorer_url(chain_id, tx_hash);
                self.last_error = Some(BridgeError::ReceiptTimeout { tx_hash, explorer_url });
            }
        }

        self.allowances.invalidate(chain_id, request.sender, approval.token, approval.spender);
        if self.evaluate().await == TransferPhase::AwaitingApproval {
            warn!(transfer = %self.execution.id, "Allowance still below the required amount");
        }
        Ok(())
    }

    /// Send the current quote's transaction. `Ok(None)` when one is already in flight.
    pub async fn submit_bridge(&mut self) -> BridgeResult<Option<H256>> {
        if self.execution.phase == TransferPhase::AwaitingReceipt {
            info!(transfer = %self.execution.id, "Bridge transaction already in flight, ignoring submit");
            return Ok(None);
        }
        let Some(quote) = self.quote().cloned() else {
            return Err(self.blocked(BlockReason::NoQuote));
        };
        if let Some(reason) = quote.blocking_reason() {
            return Err(self.blocked(reason));
        }
        if self.execution.phase != TransferPhase::AwaitingBridgeSubmission {
            return Err(BridgeError::InvalidInput(format!("Cannot submit while {}", self.execution.phase)));
        }

        let sent = self.wallet.send_transaction(&quote.raw_transaction).await;
        let tx_hash = match sent {
            Ok(tx_hash) => tx_hash,
            Err(err) => return Err(self.wallet_error(err)),
        };
        info!(
            transfer = %self.execution.id,
            protocol = %quote.protocol,
            tx_hash = ?tx_hash,
            "Bridge transaction submitted"
        );
        self.execution.submitted_tx_hash = Some(tx_hash);
        self.set_phase(TransferPhase::AwaitingReceipt);
        Ok(Some(tx_hash))
    }

    /// Bounded wait for the bridge receipt. A timeout is an unknown outcome:
    /// the phase goes back to submission with a fresh quote and the error
    /// carries the explorer link.
    pub async fn await_receipt(&mut self) -> BridgeResult<TransferPhase> {
        if self.execution.phase != TransferPhase::AwaitingReceipt {
            return Ok(self.execution.phase.clone());
        }
        let (Some(tx_hash), Some(request)) = (self.execution.submitted_tx_hash, self.request.clone()) else {
            return Err(self.fail(BridgeError::Wallet("No submitted transaction to wait for".into())));
        };
        let chain_id = request.origin_chain_id;

        let outcome = timeout(self.receipt_timeout, self.wallet.wait_for_receipt(chain_id, tx_hash)).await;
        match outcome {
            Ok(Ok(receipt)) if receipt.status == TransactionStatus::Confirmed => {
                info!(
                    transfer = %self.execution.id,
                    tx_hash = ?tx_hash,
                    block = ?receipt.block_number,
                    "Bridge transaction confirmed"
                );
                self.execution.receipt = Some(receipt);
                self.execution.settled_at = Some(Utc::now());
                self.request = Some(request.with_amount(""));
                self.quotes.clear();
                // The bridge spent part of the allowance.
                self.allowances.invalidate_all();
                self.set_phase(TransferPhase::Settled);
                Ok(TransferPhase::Settled)
            }
            Ok(Ok(receipt)) => {
                let err = BridgeError::Reverted { tx_hash, reason: receipt.revert_reason.clone() };
                self.execution.receipt = Some(receipt);
                Err(self.fail(err))
            }
            Ok(Err(err)) => Err(self.fail(err)),
            Err(_) => {
                let explorer_url = self.explorer_url(chain_id, tx_hash);
                let notice = BridgeError::ReceiptTimeout { tx_hash, explorer_url };
                warn!(transfer = %self.execution.id, "{}", notice);
                self.execution.submitted_tx_hash = None;
                self.quotes.clear();
                self.set_phase(TransferPhase::AwaitingBridgeSubmission);
                self.evaluate().await;
                if !matches!(self.execution.phase, TransferPhase::Failed(_)) {
                    self.last_error = Some(notice.clone());
                }
                Err(notice)
            }
        }
    }

    /// The external wrap flow finished: the old quote's wrap flag is stale.
    pub async fn confirm_wrap(&mut self) -> TransferPhase {
        self.quotes.clear();
        self.evaluate().await
    }

    /// From `Failed`, drop every cached quote and allowance and evaluate from scratch.
    pub async fn retry(&mut self) -> TransferPhase {
        if !matches!(self.execution.phase, TransferPhase::Failed(_)) {
            return self.execution.phase.clone();
        }
        info!(transfer = %self.execution.id, "Retrying transfer");
        self.quotes.clear();
        self.allowances.invalidate_all();
        self.execution = TransferExecution::new();
        self.last_error = None;
        self.set_phase(TransferPhase::AwaitingChainSwitch);
        self.evaluate().await
    }

    /// Leave `Settled` or `Failed` for a new transfer. The amount and cached allowances are cleared.
    pub fn reset(&mut self) {
        if !matches!(self.execution.phase, TransferPhase::Settled | TransferPhase::Failed(_)) {
            return;
        }
        self.request = self.request.take().map(|r| r.with_amount(""));
        self.quotes.clear();
        self.allowances.invalidate_all();
        self.execution = TransferExecution::new();
        self.last_error = None;
    }

    fn explorer_url(&self, chain_id: u64, tx_hash: H256) -> String {
        self.aggregator
            .registry()
            .chain(chain_id)
            .map(|chain| chain.explorer_tx_url(tx_hash))
            .unwrap_or_default()
    }
}
