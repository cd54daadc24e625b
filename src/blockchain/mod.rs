pub mod erc20;
pub mod ethereum;
pub mod traits;

pub use ethereum::{EthereumClient, LocalWalletSession};
pub use traits::{ChainReader, ChainReaders, RawTransaction, ReceiptSummary, TransactionStatus, WalletSession};
