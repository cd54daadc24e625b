//! Static chain, token and route configuration.
//!
//! Every lookup is pure. Unconfigured chains, tokens or routes surface as
//! configuration errors so a request fails before any network call.

mod builtin;

use ethers::types::{Address, H256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::core::errors::{BridgeError, BridgeResult};

/// The closed set of bridge protocols the router knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Connext,
    LayerZero,
    Wormhole,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Connext => "connext",
            Protocol::LayerZero => "layerzero",
            Protocol::Wormhole => "wormhole",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    pub id: u64,
    pub name: String,
    pub native_symbol: String,
    pub explorer_url: String,
    /// The chain holding the canonical asset and its lockboxes.
    pub is_mainnet: bool,
}

impl Chain {
    pub fn explorer_tx_url(&self, tx_hash: H256) -> String {
        format!("{}/tx/{:?}", self.explorer_url.trim_end_matches('/'), tx_hash)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub chain_id: u64,
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
    /// Bridged xERC-20 representation when it differs from `address`.
    /// Holding only `address` means the user has to wrap through `lockbox` first.
    pub xerc20: Option<Address>,
    /// Custodian holding the canonical asset that backs the xERC-20 supply.
    pub lockbox: Option<Address>,
}

impl Token {
    /// The token the bridge contract actually moves.
    pub fn bridged_address(&self) -> Address {
        self.xerc20.unwrap_or(self.address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub origin: u64,
    pub destination: u64,
    pub symbol: String,
    /// Candidate protocols in preference order. Normally exactly one.
    pub protocols: Vec<Protocol>,
}

/// A protocol contract for one token on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub protocol: Protocol,
    pub chain_id: u64,
    pub symbol: String,
    pub contract: Address,
}

/// Tokens, routes and deployments layered over the built-in table, usually from
/// the `[registry]` config section. Entries replace built-in ones with the same key
/// (chain and symbol; origin, destination and symbol; protocol, chain and symbol).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryOverlay {
    #[serde(default)]
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub deployments: Vec<Deployment>,
}

impl RegistryOverlay {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.routes.is_empty() && self.deployments.is_empty()
    }
}

fn upsert<T: Clone>(items: &mut Vec<T>, item: &T, same_key: impl Fn(&T, &T) -> bool) {
    match items.iter_mut().find(|existing| same_key(existing, item)) {
        Some(existing) => *existing = item.clone(),
        None => items.push(item.clone()),
    }
}

#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: Vec<Chain>,
    tokens: Vec<Token>,
    routes: Vec<Route>,
    deployments: Vec<Deployment>,
    /// Protocol-specific identifier for a chain (Connext domain, LayerZero eid, Wormhole chain id).
    remote_ids: HashMap<(Protocol, u64), u32>,
}

impl ChainRegistry {
    pub fn new(
        chains: Vec<Chain>,
        tokens: Vec<Token>,
        routes: Vec<Route>,
        deployments: Vec<Deployment>,
        remote_ids: HashMap<(Protocol, u64), u32>,
    ) -> BridgeResult<Self> {
        let registry = Self { chains, tokens, routes, deployments, remote_ids };
        registry.validate()?;
        Ok(registry)
    }

    /// Chains, canonical tokens and the Connext routes between them. Lockboxes,
    /// xERC-20 representations and the Wormhole and LayerZero deployments are
    /// supplied through [`RegistryOverlay`].
    pub fn builtin() -> Self {
        builtin::registry()
    }

    /// Merge `overlay` into this table and validate the result.
    pub fn with_overlay(mut self, overlay: &RegistryOverlay) -> BridgeResult<Self> {
        for token in &overlay.tokens {
            self.chain(token.chain_id)?;
            upsert(&mut self.tokens, token, |a, b| a.chain_id == b.chain_id && a.symbol == b.symbol);
        }
        for route in &overlay.routes {
            upsert(&mut self.routes, route, |a, b| {
                a.origin == b.origin && a.destination == b.destination && a.symbol == b.symbol
            });
        }
        for deployment in &overlay.deployments {
            self.chain(deployment.chain_id)?;
            upsert(&mut self.deployments, deployment, |a, b| {
                a.protocol == b.protocol && a.chain_id == b.chain_id && a.symbol == b.symbol
            });
        }
        self.validate()?;
        if !overlay.is_empty() {
            debug!(
                tokens = overlay.tokens.len(),
                routes = overlay.routes.len(),
                deployments = overlay.deployments.len(),
                "Applied registry overlay"
            );
        }
        Ok(self)
    }

    /// Every route must connect configured chains and name a token present on both
    /// sides. Deployments are resolved per candidate at quote time so a missing one
    /// falls through to the next protocol.
    pub fn validate(&self) -> BridgeResult<()> {
        for route in &self.routes {
            if route.protocols.is_empty() {
                return Err(BridgeError::Config(format!(
                    "Route {} {} -> {} has no protocol",
                    route.symbol, route.origin, route.destination
                )));
            }
            for chain_id in [route.origin, route.destination] {
                self.chain(chain_id)?;
                self.token_by_symbol(chain_id, &route.symbol)?;
            }
        }
        Ok(())
    }

    pub fn list_chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn chain(&self, chain_id: u64) -> BridgeResult<&Chain> {
        self.chains
            .iter()
            .find(|c| c.id == chain_id)
            .ok_or(BridgeError::UnsupportedChain(chain_id))
    }

    pub fn tokens_for_chain(&self, chain_id: u64) -> BridgeResult<Vec<&Token>> {
        self.chain(chain_id)?;
        Ok(self.tokens.iter().filter(|t| t.chain_id == chain_id).collect())
    }

    /// Look a token up by the address a user selects (canonical or xERC-20).
    pub fn token(&self, chain_id: u64, address: Address) -> BridgeResult<&Token> {
        self.chain(chain_id)?;
        self.tokens
            .iter()
            .find(|t| t.chain_id == chain_id && (t.address == address || t.xerc20 == Some(address)))
            .ok_or(BridgeError::UnsupportedToken { chain_id, token: address })
    }

    pub fn token_by_symbol(&self, chain_id: u64, symbol: &str) -> BridgeResult<&Token> {
        self.chain(chain_id)?;
        self.tokens
            .iter()
            .find(|t| t.chain_id == chain_id && t.symbol.eq_ignore_ascii_case(symbol))
            .ok_or_else(|| BridgeError::Config(format!("Token {} is not configured on chain {}", symbol, chain_id)))
    }

    /// Address of the same asset on `destination`.
    pub fn corresponding_token(
        &self,
        origin: u64,
        token_address: Address,
        destination: u64,
    ) -> BridgeResult<Address> {
        let token = self.token(origin, token_address)?;
        self.chain(destination)?;
        self.tokens
            .iter()
            .find(|t| t.chain_id == destination && t.symbol == token.symbol)
            .map(|t| t.address)
            .ok_or(BridgeError::RouteUnsupported {
                origin,
                destination,
                symbol: token.symbol.clone(),
            })
    }

    pub fn route_candidates(&self, origin: u64, destination: u64, symbol: &str) -> BridgeResult<Vec<Protocol>> {
        self.chain(origin)?;
        self.chain(destination)?;
        self.routes
            .iter()
            .find(|r| r.origin == origin && r.destination == destination && r.symbol == symbol)
            .map(|r| r.protocols.clone())
            .ok_or_else(|| BridgeError::RouteUnsupported {
                origin,
                destination,
                symbol: symbol.to_string(),
            })
    }

    pub fn bridge_contract(&self, protocol: Protocol, chain_id: u64, symbol: &str) -> BridgeResult<Address> {
        self.deployments
            .iter()
            .find(|d| d.protocol == protocol && d.chain_id == chain_id && d.symbol == symbol)
            .map(|d| d.contract)
            .ok_or_else(|| {
                BridgeError::Config(format!("No {} deployment for {} on chain {}", protocol, symbol, chain_id))
            })
    }

    pub fn remote_id(&self, protocol: Protocol, chain_id: u64) -> BridgeResult<u32> {
        self.remote_ids
            .get(&(protocol, chain_id))
            .copied()
            .ok_or_else(|| BridgeError::Config(format!("No {} identifier for chain {}", protocol, chain_id)))
    }

    /// The chain holding lockboxes, if any.
    pub fn mainnet(&self) -> Option<&Chain> {
        self.chains.iter().find(|c| c.is_mainnet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        s.parse().unwrap()
    }

    #[test]
    fn builtin_table_is_consistent() {
        let registry = ChainRegistry::builtin();
        registry.validate().unwrap();
        assert_eq!(registry.list_chains().len(), 4);
        assert_eq!(registry.mainnet().map(|c| c.id), Some(1));
    }

    #[test]
    fn unknown_chain_and_token_are_rejected() {
        let registry = ChainRegistry::builtin();
        assert!(matches!(registry.tokens_for_chain(56), Err(BridgeError::UnsupportedChain(56))));
        let stray = addr("0x9999999999999999999999999999999999999999");
        assert!(matches!(
            registry.token(1, stray),
            Err(BridgeError::UnsupportedToken { chain_id: 1, .. })
        ));
    }

    #[test]
    fn corresponding_token_maps_by_symbol() {
        let registry = ChainRegistry::builtin();
        let al_usd_mainnet = registry.token_by_symbol(1, "alUSD").unwrap().address;
        let al_usd_op = registry.token_by_symbol(10, "alUSD").unwrap().address;
        assert_eq!(registry.corresponding_token(1, al_usd_mainnet, 10).unwrap(), al_usd_op);
        assert_eq!(registry.corresponding_token(10, al_usd_op, 1).unwrap(), al_usd_mainnet);
    }

    fn base_wormhole_overlay() -> RegistryOverlay {
        let al_usd = ChainRegistry::builtin().token_by_symbol(1, "alUSD").unwrap().clone();
        RegistryOverlay {
            tokens: vec![
                Token {
                    xerc20: Some(Address::repeat_byte(0xa1)),
                    lockbox: Some(Address::repeat_byte(0xa2)),
                    ..al_usd
                },
                Token {
                    chain_id: 8453,
                    symbol: "alUSD".into(),
                    address: Address::repeat_byte(0xb1),
                    decimals: 18,
                    xerc20: None,
                    lockbox: None,
                },
            ],
            routes: vec![Route { origin: 1, destination: 8453, symbol: "alUSD".into(), protocols: vec![Protocol::Wormhole] }],
            deployments: [(1, 0xd1), (8453, 0xd2)]
                .into_iter()
                .map(|(chain_id, byte)| Deployment {
                    protocol: Protocol::Wormhole,
                    chain_id,
                    symbol: "alUSD".into(),
                    contract: Address::repeat_byte(byte),
                })
                .collect(),
        }
    }

    #[test]
    fn overlay_replaces_token_and_adds_route() {
        let builtin = ChainRegistry::builtin();
        let token_count = builtin.tokens.len();
        let registry = builtin.with_overlay(&base_wormhole_overlay()).unwrap();

        assert_eq!(registry.tokens.len(), token_count + 1);
        let token = registry.token_by_symbol(1, "alUSD").unwrap();
        assert_eq!(token.lockbox, Some(Address::repeat_byte(0xa2)));
        assert_eq!(registry.token(1, Address::repeat_byte(0xa1)).unwrap().symbol, "alUSD");
        assert_eq!(token.bridged_address(), Address::repeat_byte(0xa1));
        assert_eq!(registry.route_candidates(1, 8453, "alUSD").unwrap(), vec![Protocol::Wormhole]);
        assert_eq!(registry.bridge_contract(Protocol::Wormhole, 8453, "alUSD").unwrap(), Address::repeat_byte(0xd2));
    }

    #[test]
    fn overlay_route_without_token_is_rejected() {
        let overlay = RegistryOverlay {
            routes: vec![Route { origin: 1, destination: 8453, symbol: "alETH".into(), protocols: vec![Protocol::Wormhole] }],
            ..Default::default()
        };
        let err = ChainRegistry::builtin().with_overlay(&overlay).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)), "{:?}", err);
    }

    #[test]
    fn overlay_deployment_on_unknown_chain_is_rejected() {
        let overlay = RegistryOverlay {
            deployments: vec![Deployment {
                protocol: Protocol::Wormhole,
                chain_id: 56,
                symbol: "alUSD".into(),
                contract: Address::repeat_byte(0xd3),
            }],
            ..Default::default()
        };
        assert!(matches!(
            ChainRegistry::builtin().with_overlay(&overlay),
            Err(BridgeError::UnsupportedChain(56))
        ));
    }

    #[test]
    fn builtin_table_carries_only_connext_routes() {
        let registry = ChainRegistry::builtin();
        assert_eq!(registry.route_candidates(1, 10, "alUSD").unwrap(), vec![Protocol::Connext]);
        assert_eq!(registry.route_candidates(42161, 1, "alETH").unwrap(), vec![Protocol::Connext]);
        assert!(registry.routes.iter().all(|r| r.protocols == vec![Protocol::Connext]));
        assert!(registry.tokens.iter().all(|t| t.xerc20.is_none() && t.lockbox.is_none()));
        assert!(matches!(
            registry.route_candidates(1, 8453, "alUSD"),
            Err(BridgeError::RouteUnsupported { .. })
        ));
        assert!(registry.tokens_for_chain(8453).unwrap().is_empty());
    }

    #[test]
    fn explorer_link_uses_full_hash() {
        let registry = ChainRegistry::builtin();
        let url = registry.chain(10).unwrap().explorer_tx_url(H256::repeat_byte(0x01));
        assert_eq!(url, format!("https://optimistic.etherscan.io/tx/0x{}", "01".repeat(32)));
    }

    #[test]
    fn builtin_routes_have_deployments() {
        let registry = ChainRegistry::builtin();
        for route in &registry.routes {
            for protocol in &route.protocols {
                for chain_id in [route.origin, route.destination] {
                    registry.bridge_contract(*protocol, chain_id, &route.symbol).unwrap();
                    registry.remote_id(*protocol, chain_id).unwrap();
                }
            }
        }
    }

    #[test]
    fn new_rejects_route_to_unknown_chain() {
        let base = ChainRegistry::builtin();
        let mut routes = base.routes.clone();
        routes.push(Route {
            origin: 10,
            destination: 56,
            symbol: "alUSD".into(),
            protocols: vec![Protocol::Connext],
        });
        let err = ChainRegistry::new(
            base.chains.clone(),
            base.tokens.clone(),
            routes,
            base.deployments.clone(),
            base.remote_ids.clone(),
        )
        .unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedChain(56)));
    }
}
