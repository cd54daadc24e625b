use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::core::errors::{BridgeError, BridgeResult};
use crate::registry::RegistryOverlay;

/// Blockchain network configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    pub name: String,
    pub rpc_url: String,
    pub chain_id: u64,
}

/// Bridge behaviour settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeSettings {
    /// Maximum tolerated slippage in basis points
    #[serde(default = "BridgeSettings::default_max_slippage_bps")]
    pub max_slippage_bps: u32,

    /// Connext SDK server used for relayer fee and received amount estimates
    #[serde(default = "BridgeSettings::default_connext_api_url")]
    pub connext_api_url: String,

    /// HTTP timeout for estimator calls (seconds)
    #[serde(default = "BridgeSettings::default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Upper bound on waiting for a transaction receipt (seconds)
    #[serde(default = "BridgeSettings::default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,

    /// Receipt polling interval (milliseconds)
    #[serde(default = "BridgeSettings::default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,

    /// Interval between automatic quote refreshes (seconds)
    #[serde(default = "BridgeSettings::default_quote_refresh_secs")]
    pub quote_refresh_secs: u64,

    /// Gas forwarded to `lzReceive` on the destination chain
    #[serde(default = "BridgeSettings::default_lz_receive_gas")]
    pub lz_receive_gas: u64,
}

impl BridgeSettings {
    fn default_max_slippage_bps() -> u32 { 50 }
    fn default_connext_api_url() -> String { "https://sdk-server.mainnet.connext.ninja".to_string() }
    fn default_http_timeout_secs() -> u64 { 15 }
    fn default_receipt_timeout_secs() -> u64 { 300 }
    fn default_receipt_poll_interval_ms() -> u64 { 2_000 }
    fn default_quote_refresh_secs() -> u64 { 30 }
    fn default_lz_receive_gas() -> u64 { 200_000 }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn quote_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.quote_refresh_secs)
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            max_slippage_bps: Self::default_max_slippage_bps(),
            connext_api_url: Self::default_connext_api_url(),
            http_timeout_secs: Self::default_http_timeout_secs(),
            receipt_timeout_secs: Self::default_receipt_timeout_secs(),
            receipt_poll_interval_ms: Self::default_receipt_poll_interval_ms(),
            quote_refresh_secs: Self::default_quote_refresh_secs(),
            lz_receive_gas: Self::default_lz_receive_gas(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    #[serde(default = "BridgeConfig::default_networks")]
    pub networks: HashMap<String, NetworkConfig>,

    #[serde(default)]
    pub bridge: BridgeSettings,

    /// Tokens, routes and deployments added to the built-in registry
    #[serde(default)]
    pub registry: RegistryOverlay,
}

impl BridgeConfig {
    fn default_networks() -> HashMap<String, NetworkConfig> {
        let mut networks = HashMap::with_capacity(4);
        for (key, name, rpc_url, chain_id) in [
            ("eth", "Ethereum Mainnet", "https://eth.llamarpc.com", 1u64),
            ("optimism", "Optimism", "https://mainnet.optimism.io", 10),
            ("arbitrum", "Arbitrum One", "https://arb1.arbitrum.io/rpc", 42161),
            ("base", "Base", "https://mainnet.base.org", 8453),
        ] {
            networks.insert(
                key.to_string(),
                NetworkConfig { name: name.to_string(), rpc_url: rpc_url.to_string(), chain_id },
            );
        }
        networks
    }

    /// Parse a TOML document. Missing sections fall back to defaults.
    pub fn from_toml_str(content: &str) -> BridgeResult<Self> {
        toml::from_str(content).map_err(|e| BridgeError::Config(format!("Invalid config: {}", e)))
    }

    /// Read a TOML file and apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> BridgeResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides()?;
        info!(path = %path.display(), networks = config.networks.len(), "Loaded bridge config");
        Ok(config)
    }

    /// Load from `CONFIG_PATH` (default `bridge.toml`), or fall back to defaults.
    pub fn load_or_default() -> Self {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "bridge.toml".to_string());
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load {}: {}. Using default configuration", path, e);
                let mut config = Self::default();
                if let Err(e) = config.apply_env_overrides() {
                    warn!("Ignoring invalid environment override: {}", e);
                }
                config
            }
        }
    }

    /// Environment overrides: `BRIDGE_MAX_SLIPPAGE_BPS`, `CONNEXT_API_URL`,
    /// `BRIDGE_RECEIPT_TIMEOUT_SECS` and `BRIDGE_RPC_<CHAIN_ID>`.
    pub fn apply_env_overrides(&mut self) -> BridgeResult<()> {
        if let Ok(v) = std::env::var("BRIDGE_MAX_SLIPPAGE_BPS") {
            self.bridge.max_slippage_bps = v.trim().parse().map_err(|_| {
                BridgeError::Config(format!("BRIDGE_MAX_SLIPPAGE_BPS is not a number: {}", v))
            })?;
        }
        if let Ok(v) = std::env::var("CONNEXT_API_URL") {
            self.bridge.connext_api_url = v.trim().to_string();
        }
        if let Ok(v) = std::env::var("BRIDGE_RECEIPT_TIMEOUT_SECS") {
            self.bridge.receipt_timeout_secs = v.trim().parse().map_err(|_| {
                BridgeError::Config(format!("BRIDGE_RECEIPT_TIMEOUT_SECS is not a number: {}", v))
            })?;
        }
        for network in self.networks.values_mut() {
            if let Ok(url) = std::env::var(format!("BRIDGE_RPC_{}", network.chain_id)) {
                network.rpc_url = url.trim().to_string();
            }
        }
        self.validate()
    }

    pub fn validate(&self) -> BridgeResult<()> {
        if self.bridge.max_slippage_bps > 10_000 {
            return Err(BridgeError::Config(format!(
                "max_slippage_bps must be <= 10000, got {}",
                self.bridge.max_slippage_bps
            )));
        }
        if self.bridge.receipt_timeout_secs == 0 {
            return Err(BridgeError::Config("receipt_timeout_secs must be positive".into()));
        }
        reqwest::Url::parse(&self.bridge.connext_api_url).map_err(|e| {
            BridgeError::Config(format!(
                "Invalid connext_api_url '{}': {}",
                self.bridge.connext_api_url, e
            ))
        })?;
        Ok(())
    }

    pub fn network_for_chain(&self, chain_id: u64) -> Option<&NetworkConfig> {
        self.networks.values().find(|n| n.chain_id == chain_id)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self { networks: Self::default_networks(), bridge: BridgeSettings::default(), registry: RegistryOverlay::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = BridgeConfig::from_toml_str("").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.bridge.max_slippage_bps, 50);
        assert!(config.network_for_chain(42161).is_some());
    }

    #[test]
    fn partial_bridge_section_keeps_other_defaults() {
        let config = BridgeConfig::from_toml_str(
            r#"
            [bridge]
            max_slippage_bps = 30

            [networks.eth]
            name = "Local"
            rpc_url = "http://127.0.0.1:8545"
            chain_id = 1
            "#,
        )
        .unwrap();
        assert_eq!(config.bridge.max_slippage_bps, 30);
        assert_eq!(config.bridge.receipt_timeout_secs, 300);
        assert_eq!(config.networks.len(), 1);
        assert_eq!(config.network_for_chain(1).unwrap().rpc_url, "http://127.0.0.1:8545");
    }

    #[test]
    fn registry_section_parses_into_overlay() {
        let config = BridgeConfig::from_toml_str(
            r#"
            [[registry.tokens]]
            chain_id = 8453
            symbol = "alUSD"
            address = "0x00000000000000000000000000000000000000b1"
            decimals = 18

            [[registry.routes]]
            origin = 1
            destination = 8453
            symbol = "alUSD"
            protocols = ["wormhole"]

            [[registry.deployments]]
            protocol = "wormhole"
            chain_id = 8453
            symbol = "alUSD"
            contract = "0x00000000000000000000000000000000000000d2"
            "#,
        )
        .unwrap();
        let overlay = &config.registry;
        assert_eq!(overlay.tokens.len(), 1);
        assert_eq!(overlay.tokens[0].xerc20, None);
        assert_eq!(overlay.routes[0].protocols, vec![crate::registry::Protocol::Wormhole]);
        assert_eq!(overlay.deployments[0].chain_id, 8453);
    }

    #[test]
    fn validate_rejects_out_of_range_slippage() {
        let mut config = BridgeConfig::default();
        config.bridge.max_slippage_bps = 10_001;
        assert!(matches!(config.validate(), Err(BridgeError::Config(_))));
    }
}
