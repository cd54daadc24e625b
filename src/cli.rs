use clap::{Args, Parser, Subcommand};

/// Cross-chain bridge router CLI (library-facing definitions)
#[derive(Debug, Parser)]
#[command(name = "bridge-router", about = "Quote and execute cross-chain token transfers", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List supported chains
    Chains,
    /// List tokens configured on a chain
    Tokens {
        #[arg(long)]
        chain: u64,
    },
    /// Compute a quote without sending anything
    Quote {
        #[command(flatten)]
        route: RouteArgs,
        /// Account that would send the tokens
        #[arg(long)]
        sender: String,
        /// Keep refreshing the quote at the configured interval
        #[arg(long)]
        watch: bool,
    },
    /// Execute a transfer with the key in PRIVATE_KEY
    Transfer {
        #[command(flatten)]
        route: RouteArgs,
    },
}

#[derive(Debug, Clone, Args)]
pub struct RouteArgs {
    /// Origin chain id
    #[arg(long = "from")]
    pub origin: u64,
    /// Destination chain id
    #[arg(long = "to")]
    pub destination: u64,
    /// Token symbol or origin-chain address
    #[arg(long)]
    pub token: String,
    /// Decimal amount, e.g. 100 or 0.5
    #[arg(long)]
    pub amount: String,
    /// Recipient on the destination chain (defaults to the sender)
    #[arg(long)]
    pub recipient: Option<String>,
}
