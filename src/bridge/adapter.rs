use tracing::debug;

use super::connext::{ConnextAdapter, ConnextClient};
use super::layerzero::LayerZeroAdapter;
use super::limits::check_xerc20_limits;
use super::types::{AdapterQuote, LimitCheck, QuoteContext};
use super::wormhole::WormholeAdapter;
use crate::blockchain::traits::ChainReaders;
use crate::core::config::BridgeSettings;
use crate::core::errors::BridgeResult;
use crate::registry::Protocol;

/// One variant per supported protocol. Selected once per route from the registry.
#[derive(Debug, Clone)]
pub enum ProtocolAdapter {
    Connext(ConnextAdapter),
    LayerZero(LayerZeroAdapter),
    Wormhole(WormholeAdapter),
}

impl ProtocolAdapter {
    pub fn protocol(&self) -> Protocol {
        match self {
            ProtocolAdapter::Connext(_) => Protocol::Connext,
            ProtocolAdapter::LayerZero(_) => Protocol::LayerZero,
            ProtocolAdapter::Wormhole(_) => Protocol::Wormhole,
        }
    }

    /// Fee, expected output and unsigned transaction. Read-only.
    pub async fn quote(&self, ctx: &QuoteContext<'_>, readers: &ChainReaders) -> BridgeResult<AdapterQuote> {
        match self {
            ProtocolAdapter::Connext(adapter) => adapter.quote(ctx).await,
            ProtocolAdapter::LayerZero(adapter) => adapter.quote(ctx, readers).await,
            ProtocolAdapter::Wormhole(adapter) => adapter.quote(ctx, readers).await,
        }
    }

    pub async fn check_limits(&self, ctx: &QuoteContext<'_>, readers: &ChainReaders) -> BridgeResult<LimitCheck> {
        match self {
            ProtocolAdapter::Connext(_) | ProtocolAdapter::Wormhole(_) => {
                check_xerc20_limits(self.protocol(), ctx, readers).await
            }
            // OFT burn/mint has no rate limit.
            ProtocolAdapter::LayerZero(_) => {
                debug!("LayerZero route has no bridge limits");
                Ok(LimitCheck::unlimited())
            }
        }
    }
}

/// The configured adapter for every protocol.
#[derive(Debug, Clone)]
pub struct Adapters {
    connext: ProtocolAdapter,
    layerzero: ProtocolAdapter,
    wormhole: ProtocolAdapter,
}

impl Adapters {
    pub fn new(connext: ConnextAdapter, layerzero: LayerZeroAdapter, wormhole: WormholeAdapter) -> Self {
        Self {
            connext: ProtocolAdapter::Connext(connext),
            layerzero: ProtocolAdapter::LayerZero(layerzero),
            wormhole: ProtocolAdapter::Wormhole(wormhole),
        }
    }

    pub fn from_settings(settings: &BridgeSettings) -> Self {
        Self::new(
            ConnextAdapter::new(ConnextClient::new(settings.connext_api_url.clone(), settings.http_timeout())),
            LayerZeroAdapter::new(settings.lz_receive_gas),
            WormholeAdapter::new(),
        )
    }

    pub fn get(&self, protocol: Protocol) -> &ProtocolAdapter {
        match protocol {
            Protocol::Connext => &self.connext,
            Protocol::LayerZero => &self.layerzero,
            Protocol::Wormhole => &self.wormhole,
        }
    }
}
