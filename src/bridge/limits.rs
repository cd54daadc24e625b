//! xERC-20 rate limits and lockbox collateral shared by Connext and Wormhole routes.

use tracing::{debug, warn};

use super::types::{quote_unavailable, LimitCheck, QuoteContext};
use crate::blockchain::erc20;
use crate::blockchain::traits::ChainReaders;
use crate::core::errors::{BridgeError, BridgeResult};
use crate::registry::Protocol;

/// Read burn capacity on the origin token, mint capacity on the destination
/// token and, when bridging back to mainnet, the lockbox's canonical balance.
pub async fn check_xerc20_limits(
    protocol: Protocol,
    ctx: &QuoteContext<'_>,
    readers: &ChainReaders,
) -> BridgeResult<LimitCheck> {
    let origin = readers.get(ctx.request.origin_chain_id)?;
    let destination = readers.get(ctx.request.destination_chain_id)?;

    let burn_limit =
        erc20::burning_current_limit_of(origin, ctx.origin_token.bridged_address(), ctx.origin_contract)
            .await
            .map_err(|e| quote_unavailable(protocol, e))?;
    let mint_limit = erc20::minting_current_limit_of(
        destination,
        ctx.destination_token.bridged_address(),
        ctx.destination_contract,
    )
    .await
    .map_err(|e| quote_unavailable(protocol, e))?;

    let lockbox_balance_ok = match (ctx.destination_is_mainnet, ctx.destination_token.lockbox) {
        (true, Some(lockbox)) => {
            let collateral = erc20::balance_of(destination, ctx.destination_token.address, lockbox)
                .await
                .map_err(|e| quote_unavailable(protocol, e))?;
            collateral >= ctx.amount
        }
        _ => true,
    };

    let check = LimitCheck {
        origin_liquidity_ok: burn_limit >= ctx.amount,
        destination_limit_ok: mint_limit >= ctx.amount,
        lockbox_balance_ok,
    };
    if check != LimitCheck::unlimited() {
        warn!(
            %protocol,
            amount = %ctx.amount,
            %burn_limit,
            %mint_limit,
            lockbox_balance_ok,
            "Bridge limits do not cover the requested amount"
        );
    } else {
        debug!(%protocol, %burn_limit, %mint_limit, "Bridge limits ok");
    }
    Ok(check)
}

/// The sender holds the canonical token but the bridge moves its xERC-20 wrapper.
pub async fn is_wrap_needed(ctx: &QuoteContext<'_>, readers: &ChainReaders) -> BridgeResult<bool> {
    let Some(xerc20) = ctx.origin_token.xerc20 else {
        return Ok(false);
    };
    let origin = readers.get(ctx.request.origin_chain_id)?;
    let wrapped = erc20::balance_of(origin, xerc20, ctx.request.sender).await.map_err(|e| match e {
        BridgeError::Rpc(msg) => BridgeError::QuoteUnavailable(format!("xERC-20 balance: {}", msg)),
        other => other,
    })?;
    Ok(wrapped < ctx.amount)
}
