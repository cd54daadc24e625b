use defi_bridge_router::core::{BridgeConfig, BridgeError};
use serial_test::serial;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

const OVERRIDE_VARS: [&str; 5] = [
    "BRIDGE_MAX_SLIPPAGE_BPS",
    "CONNEXT_API_URL",
    "BRIDGE_RECEIPT_TIMEOUT_SECS",
    "BRIDGE_RPC_10",
    "CONFIG_PATH",
];

fn clear_overrides() {
    for var in OVERRIDE_VARS {
        std::env::remove_var(var);
    }
}

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn load_reads_file_and_keeps_defaults() {
    clear_overrides();
    let file = write_config(
        r#"
        [bridge]
        max_slippage_bps = 25
        receipt_timeout_secs = 120

        [networks.optimism]
        name = "Optimism"
        rpc_url = "http://127.0.0.1:9545"
        chain_id = 10
        "#,
    );

    let config = BridgeConfig::load(file.path()).unwrap();
    assert_eq!(config.bridge.max_slippage_bps, 25);
    assert_eq!(config.bridge.receipt_timeout(), Duration::from_secs(120));
    assert_eq!(config.bridge.lz_receive_gas, 200_000);
    assert_eq!(config.network_for_chain(10).unwrap().rpc_url, "http://127.0.0.1:9545");
    assert!(config.network_for_chain(1).is_none());
}

#[test]
#[serial]
fn env_overrides_win_over_file() {
    clear_overrides();
    let file = write_config(
        r#"
        [bridge]
        max_slippage_bps = 25
        "#,
    );
    std::env::set_var("BRIDGE_MAX_SLIPPAGE_BPS", "75");
    std::env::set_var("CONNEXT_API_URL", "http://localhost:8080");
    std::env::set_var("BRIDGE_RPC_10", "http://op.local:8545");

    let config = BridgeConfig::load(file.path()).unwrap();
    clear_overrides();

    assert_eq!(config.bridge.max_slippage_bps, 75);
    assert_eq!(config.bridge.connext_api_url, "http://localhost:8080");
    assert_eq!(config.network_for_chain(10).unwrap().rpc_url, "http://op.local:8545");
}

#[test]
#[serial]
fn invalid_override_is_a_config_error() {
    clear_overrides();
    let file = write_config("");
    std::env::set_var("BRIDGE_RECEIPT_TIMEOUT_SECS", "soon");

    let result = BridgeConfig::load(file.path());
    clear_overrides();
    assert!(matches!(result, Err(BridgeError::Config(_))));
}

#[test]
#[serial]
fn malformed_toml_is_rejected() {
    clear_overrides();
    let file = write_config("[bridge\nmax_slippage_bps = ");
    assert!(matches!(BridgeConfig::load(file.path()), Err(BridgeError::Config(_))));
}

#[test]
#[serial]
fn missing_file_falls_back_to_defaults() {
    clear_overrides();
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var("CONFIG_PATH", dir.path().join("absent.toml"));

    let config = BridgeConfig::load_or_default();
    clear_overrides();
    assert_eq!(config, BridgeConfig::default());
}
