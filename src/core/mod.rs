pub mod abi;
pub mod config;
pub mod errors;
pub mod validation;

pub use config::{BridgeConfig, BridgeSettings, NetworkConfig};
pub use errors::{BlockReason, BridgeError, BridgeResult, ErrorClass};
