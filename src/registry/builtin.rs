use ethers::types::Address;
use std::collections::HashMap;

use super::{Chain, ChainRegistry, Deployment, Protocol, Route, Token};

const ETHEREUM: u64 = 1;
const OPTIMISM: u64 = 10;
const BASE: u64 = 8453;
const ARBITRUM: u64 = 42161;

fn addr(hex: &str) -> Address {
    hex.parse().expect("builtin address literal should parse")
}

fn chain(id: u64, name: &str, native_symbol: &str, explorer_url: &str) -> Chain {
    Chain {
        id,
        name: name.to_string(),
        native_symbol: native_symbol.to_string(),
        explorer_url: explorer_url.to_string(),
        is_mainnet: id == ETHEREUM,
    }
}

fn token(chain_id: u64, symbol: &str, address: &str) -> Token {
    Token {
        chain_id,
        symbol: symbol.to_string(),
        address: addr(address),
        decimals: 18,
        xerc20: None,
        lockbox: None,
    }
}

fn all_pairs(chains: &[u64], symbol: &str, protocol: Protocol) -> Vec<Route> {
    let mut routes = Vec::new();
    for &origin in chains {
        for &destination in chains {
            if origin != destination {
                routes.push(Route {
                    origin,
                    destination,
                    symbol: symbol.to_string(),
                    protocols: vec![protocol],
                });
            }
        }
    }
    routes
}

fn deployment(protocol: Protocol, chain_id: u64, symbol: &str, contract: &str) -> Deployment {
    Deployment { protocol, chain_id, symbol: symbol.to_string(), contract: addr(contract) }
}

pub(super) fn registry() -> ChainRegistry {
    let chains = vec![
        chain(ETHEREUM, "Ethereum", "ETH", "https://etherscan.io"),
        chain(OPTIMISM, "Optimism", "ETH", "https://optimistic.etherscan.io"),
        chain(ARBITRUM, "Arbitrum One", "ETH", "https://arbiscan.io"),
        chain(BASE, "Base", "ETH", "https://basescan.org"),
    ];

    // Canonical token addresses only. Bridged representations and lockboxes come
    // from the config overlay.
    let tokens = vec![
        token(ETHEREUM, "alUSD", "0xbc6da0fe9ad5f3b0d58160288917aa56653660e9"),
        token(OPTIMISM, "alUSD", "0xcb8fa9a76b8e203d8c3797bf438d8fb81ea3326a"),
        token(ARBITRUM, "alUSD", "0xcb8fa9a76b8e203d8c3797bf438d8fb81ea3326a"),
        token(ETHEREUM, "alETH", "0x0100546f2cd4c9d97f798ffc9755e47865ff7ee6"),
        token(OPTIMISM, "alETH", "0x3e29d3a9316dab217754d13b28646b76607c5f04"),
        token(ARBITRUM, "alETH", "0x17573150d67d820542efb24210371545a4868b03"),
        token(ETHEREUM, "ALCX", "0xdbdb4d16eda451d0503b854cf79d55697f90c8df"),
        token(OPTIMISM, "ALCX", "0xe974b9b31dbff4369b94a1bab5e228f35ed44125"),
        token(ARBITRUM, "ALCX", "0x27b58d226fe8f792730a795764945cf146815aa7"),
    ];

    let connext_chains = [ETHEREUM, OPTIMISM, ARBITRUM];
    let mut routes = all_pairs(&connext_chains, "alUSD", Protocol::Connext);
    routes.extend(all_pairs(&connext_chains, "alETH", Protocol::Connext));

    let mut deployments = Vec::new();
    for (chain_id, connext) in [
        (ETHEREUM, "0x8898b472c54c31894e3b9bb83cea802a5d0e63c6"),
        (OPTIMISM, "0x8f7492de823025b4cfaab1d34c58963f2af5deda"),
        (ARBITRUM, "0xee9dec2712cce65174b561151701bf54b99c24c8"),
    ] {
        for symbol in ["alUSD", "alETH"] {
            deployments.push(deployment(Protocol::Connext, chain_id, symbol, connext));
        }
    }

    let mut remote_ids = HashMap::new();
    for (chain_id, connext_domain, lz_eid, wormhole_id) in [
        (ETHEREUM, 6_648_936u32, 30_101u32, 2u32),
        (OPTIMISM, 1_869_640_809, 30_111, 24),
        (ARBITRUM, 1_634_886_255, 30_110, 23),
        (BASE, 1_650_553_709, 30_184, 30),
    ] {
        remote_ids.insert((Protocol::Connext, chain_id), connext_domain);
        remote_ids.insert((Protocol::LayerZero, chain_id), lz_eid);
        remote_ids.insert((Protocol::Wormhole, chain_id), wormhole_id);
    }

    ChainRegistry { chains, tokens, routes, deployments, remote_ids }
}
