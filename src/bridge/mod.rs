//! Quoting and executing cross-chain transfers.

pub mod adapter;
pub mod aggregator;
pub mod allowance;
pub mod connext;
pub mod layerzero;
pub mod limits;
pub mod orchestrator;
pub mod types;
pub mod wormhole;

pub use adapter::{Adapters, ProtocolAdapter};
pub use aggregator::{QuoteAggregator, QuoteBoard, QuoteState, QuoteTicket};
pub use allowance::{AllowanceManager, AllowanceState};
pub use orchestrator::{Action, FailureInfo, QuoteJob, TransferExecution, TransferOrchestrator, TransferPhase};
pub use types::{AdapterQuote, ApprovalRequirement, LimitCheck, Quote, QuoteContext, TransferRequest};
