// src/main.rs
//! Bridge router entry point
//! Lists the route table, prints quotes and drives transfers from the command line.
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use defi_bridge_router::blockchain::ethereum::connect_clients;
use defi_bridge_router::blockchain::{ChainReaders, EthereumClient, LocalWalletSession, WalletSession};
use defi_bridge_router::bridge::{
    Action, Adapters, Quote, QuoteAggregator, TransferOrchestrator, TransferPhase, TransferRequest,
};
use defi_bridge_router::cli::{Cli, Commands, RouteArgs};
use defi_bridge_router::core::validation::parse_address;
use defi_bridge_router::core::{BridgeConfig, ErrorClass};
use defi_bridge_router::registry::ChainRegistry;
use ethers::signers::LocalWallet;
use ethers::types::Address;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging()?;

    info!("Starting bridge router v{}", env!("CARGO_PKG_VERSION"));

    let config = BridgeConfig::load_or_default();
    let registry = Arc::new(ChainRegistry::builtin().with_overlay(&config.registry)?);

    match cli.command {
        Commands::Chains => {
            for chain in registry.list_chains() {
                println!("{:>6}  {:<14} {}  {}", chain.id, chain.name, chain.native_symbol, chain.explorer_url);
            }
        }
        Commands::Tokens { chain } => {
            for token in registry.tokens_for_chain(chain)? {
                let bridged = token.xerc20.map(|x| format!(" (xERC-20 {:?})", x)).unwrap_or_default();
                println!("{:<6} {:?} decimals={}{}", token.symbol, token.address, token.decimals, bridged);
            }
        }
        Commands::Quote { route, sender, watch } => {
            let sender = parse_address(&sender)?;
            let clients = connect(&config, &registry).await?;
            let aggregator = build_aggregator(&config, registry.clone(), &clients);
            let request = build_request(&registry, &route, sender)?;

            if !watch {
                print_quote(aggregator.get_quote(&request).await?.as_ref());
                return Ok(());
            }
            let mut ticker = tokio::time::interval(config.bridge.quote_refresh_interval());
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = tokio::signal::ctrl_c() => break,
                }
                match aggregator.get_quote(&request).await {
                    Ok(quote) => print_quote(quote.as_ref()),
                    // Quote refresh may retry transient failures; anything else is final.
                    Err(e) if e.is_retryable() => warn!("Quote refresh failed, retrying: {}", e),
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Commands::Transfer { route } => {
            let key = std::env::var("PRIVATE_KEY").context("PRIVATE_KEY is required for transfers")?;
            let wallet: LocalWallet = key.trim().parse().map_err(|e| anyhow!("Invalid PRIVATE_KEY: {}", e))?;
            let clients = connect(&config, &registry).await?;
            let aggregator = Arc::new(build_aggregator(&config, registry.clone(), &clients));
            let session = LocalWalletSession::new(
                wallet,
                clients.iter().map(|c| c.as_ref().clone()).collect(),
                route.origin,
                config.bridge.receipt_poll_interval(),
            )?;
            let sender = session.address();
            let request = build_request(&registry, &route, sender)?;

            let mut orchestrator =
                TransferOrchestrator::new(aggregator, Arc::new(session), config.bridge.receipt_timeout());
            orchestrator.set_request(Some(request))?;
            run_transfer(&mut orchestrator).await?;
        }
    }

    Ok(())
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,hyper=info,h2=info"));

    let subscriber = FmtSubscriber::builder().with_env_filter(filter).with_max_level(tracing::Level::TRACE).finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn connect(config: &BridgeConfig, registry: &ChainRegistry) -> Result<Vec<Arc<EthereumClient>>> {
    let chain_ids: Vec<u64> = registry.list_chains().iter().map(|c| c.id).collect();
    let clients = connect_clients(config, &chain_ids).await?;
    Ok(clients.into_iter().map(Arc::new).collect())
}

fn build_aggregator(
    config: &BridgeConfig,
    registry: Arc<ChainRegistry>,
    clients: &[Arc<EthereumClient>],
) -> QuoteAggregator {
    let mut readers = ChainReaders::new();
    for client in clients {
        readers.insert(client.clone());
    }
    QuoteAggregator::new(registry, readers, Adapters::from_settings(&config.bridge), config.bridge.max_slippage_bps)
}

/// Accepts a token symbol or an origin-chain address.
fn build_request(registry: &ChainRegistry, route: &RouteArgs, sender: Address) -> Result<TransferRequest> {
    let token_address = if route.token.starts_with("0x") {
        parse_address(&route.token)?
    } else {
        registry.token_by_symbol(route.origin, &route.token)?.address
    };
    let recipient = match route.recipient.as_deref() {
        Some(r) => parse_address(r)?,
        None => sender,
    };
    Ok(TransferRequest::new(route.origin, route.destination, token_address, route.amount.trim(), sender, recipient))
}

fn print_quote(quote: Option<&Quote>) {
    let Some(quote) = quote else {
        println!("No quote: amount is zero");
        return;
    };
    println!("protocol:        {}", quote.protocol);
    println!("fee:             {}", quote.fee_display());
    println!("expected output: {}", quote.expected_output_amount());
    println!("to:              {:?} (chain {})", quote.raw_transaction.to, quote.raw_transaction.chain_id);
    println!("calldata:        0x{}", hex::encode(&quote.raw_transaction.data));
    if let Some(approval) = quote.approval {
        println!("approval:        {:?} for spender {:?}", approval.token, approval.spender);
    }
    if let Some(reason) = quote.blocking_reason() {
        println!("blocked:         {}", reason);
    }
}

async fn run_transfer(orchestrator: &mut TransferOrchestrator) -> Result<()> {
    loop {
        match orchestrator.evaluate().await {
            TransferPhase::Settled => {
                let tx_hash = orchestrator.execution().submitted_tx_hash;
                println!("Transfer settled: {:?}", tx_hash);
                return Ok(());
            }
            TransferPhase::Failed(info) => bail!("Transfer failed ({:?}): {}", info.class, info.message),
            TransferPhase::Idle => bail!("Nothing to transfer"),
            _ => {}
        }

        if let Some(quote) = orchestrator.quote() {
            print_quote(Some(quote));
        }
        match orchestrator.available_action() {
            Some(Action::Wrap { token, lockbox }) => {
                bail!("Wrap {:?} through lockbox {:?} before bridging", token, lockbox)
            }
            None => match orchestrator.quote().and_then(|q| q.blocking_reason()) {
                Some(reason) => bail!("Submission blocked: {}", reason),
                None => bail!("No action available in phase {}", orchestrator.phase()),
            },
            Some(action) => {
                info!(?action, "Proceeding");
                if let Err(e) = orchestrator.proceed().await {
                    if e.class() == ErrorClass::UnknownOutcome {
                        // Resubmitting could send twice; the user has to check first.
                        bail!("{}", e);
                    }
                    return Err(e.into());
                }
            }
        }
    }
}
