//! Gasless Swap CLI
//!
//! Runs the counterparty relay backend, or drives the user side of a gasless
//! swap against a clearing node and relay.

use alloy_primitives::Address;
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use gasless_client::config::{DEFAULT_CLEARNODE_URL, DEFAULT_RELAY_URL};
use gasless_client::{ClientConfig, SwapClient, TransportConfig};
use gasless_core::chain::{ChainId, EvmBroadcaster, EvmConfig};
use gasless_core::route::{MockRouteProvider, QuoteRequest, RouteProvider};
use gasless_core::tokens::{self, Token, USDC};
use gasless_core::{LocalWallet, SwapQuote, WalletSigner};
use gasless_relay::{ClearnodeSink, RelayConfig, RelayServer, RelayService, SwapExecutor};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;
use zeroize::Zeroizing;

#[derive(Parser)]
#[command(name = "gasless")]
#[command(about = "Gasless stablecoin swap relay and client", version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the counterparty relay backend
    Serve {
        /// Backend signing key (hex); pays gas and co-signs updates
        #[arg(long, env = "BACKEND_PRIVATE_KEY", hide_env_values = true)]
        private_key: String,

        /// HTTP port
        #[arg(short, long, env = "PORT", default_value_t = 3001)]
        port: u16,

        /// RPC endpoints, comma separated, tried in order
        #[arg(long, env = "RPC_URL", value_delimiter = ',')]
        rpc_url: Vec<String>,

        /// Chain the backend executes on
        #[arg(long, default_value_t = ChainId::BASE.0)]
        chain_id: u64,

        /// Clearing node WebSocket URL
        #[arg(long, env = "CLEARNODE_WS_URL", default_value = DEFAULT_CLEARNODE_URL)]
        clearnode_url: String,

        /// Per-request timeout in seconds
        #[arg(long, default_value_t = 30)]
        request_timeout: u64,
    },

    /// Quote a stablecoin swap against the fixed-price provider
    Quote {
        /// USDC amount, e.g. `5` or `2.5`
        amount: String,

        /// Destination token symbol
        #[arg(long, default_value = "ETH")]
        to: String,

        /// Slippage in basis points
        #[arg(long, default_value_t = 50)]
        slippage_bps: u32,

        /// USDC per ETH
        #[arg(long, default_value_t = 2500)]
        price: u128,

        /// Print the full quote as JSON
        #[arg(long)]
        json: bool,
    },

    /// Authenticate, open a session and propose a swap
    Swap {
        /// USDC amount, e.g. `5` or `2.5`
        amount: String,

        /// User wallet key (hex)
        #[arg(long, env = "USER_PRIVATE_KEY", hide_env_values = true)]
        private_key: String,

        /// Clearing node WebSocket URL
        #[arg(long, env = "CLEARNODE_WS_URL", default_value = DEFAULT_CLEARNODE_URL)]
        clearnode_url: String,

        /// Relay base URL
        #[arg(long, env = "RELAY_URL", default_value = DEFAULT_RELAY_URL)]
        relay_url: String,

        /// Relay backend address; fetched from the relay's health endpoint when omitted
        #[arg(long)]
        counterparty: Option<String>,

        /// Destination token symbol
        #[arg(long, default_value = "ETH")]
        to: String,

        /// Slippage in basis points
        #[arg(long, default_value_t = 50)]
        slippage_bps: u32,

        /// Chain the wallet operates on
        #[arg(long, default_value_t = ChainId::BASE.0)]
        chain_id: u64,
    },

    /// Show version, supported tokens and defaults
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .pretty()
        .init();

    match cli.command {
        Commands::Serve {
            private_key,
            port,
            rpc_url,
            chain_id,
            clearnode_url,
            request_timeout,
        } => {
            let key = Zeroizing::new(private_key);
            serve(&key, port, rpc_url, chain_id, clearnode_url, request_timeout).await?;
        }
        Commands::Quote {
            amount,
            to,
            slippage_bps,
            price,
            json,
        } => {
            quote(&amount, &to, slippage_bps, price, json).await?;
        }
        Commands::Swap {
            amount,
            private_key,
            clearnode_url,
            relay_url,
            counterparty,
            to,
            slippage_bps,
            chain_id,
        } => {
            let key = Zeroizing::new(private_key);
            let args = SwapArgs {
                amount,
                clearnode_url,
                relay_url,
                counterparty,
                to,
                slippage_bps,
                chain_id,
            };
            swap(&key, args).await?;
        }
        Commands::Info => show_info(),
    }

    Ok(())
}

// ============================================================================
// Serve
// ============================================================================

async fn serve(
    private_key: &str,
    port: u16,
    rpc_urls: Vec<String>,
    chain_id: u64,
    clearnode_url: String,
    request_timeout: u64,
) -> Result<()> {
    let wallet = Arc::new(LocalWallet::from_private_key_hex(private_key, chain_id)?);

    let mut evm = match ChainId(chain_id) {
        ChainId::BASE => EvmConfig::base(),
        ChainId::BASE_SEPOLIA => EvmConfig::base_sepolia(),
        _ => EvmConfig::custom(chain_id, Vec::new()),
    };
    if !rpc_urls.is_empty() {
        evm.rpc_urls = rpc_urls;
    }
    if evm.rpc_urls.is_empty() {
        bail!("chain {} has no default RPC endpoint, pass --rpc-url", chain_id);
    }
    let broadcaster = Arc::new(EvmBroadcaster::new(evm, wallet.clone())?);

    let sink = ClearnodeSink::connect(TransportConfig::new(clearnode_url)).await;

    let service = RelayService::new(wallet, SwapExecutor::new(broadcaster), Arc::new(sink));
    let config = RelayConfig::default().with_request_timeout(request_timeout);

    RelayServer::new(Arc::new(service), config)
        .serve(SocketAddr::from(([0, 0, 0, 0], port)))
        .await
}

// ============================================================================
// Quote
// ============================================================================

fn destination(symbol: &str) -> Result<Token> {
    tokens::token_by_symbol(symbol).with_context(|| format!("unknown token {}", symbol))
}

async fn fetch_quote(
    provider: &MockRouteProvider,
    amount: &str,
    to: Token,
    slippage_bps: u32,
) -> Result<SwapQuote> {
    let from_amount = parse_units(amount, USDC.decimals)?;
    let request =
        QuoteRequest::new(USDC.address, to.address, from_amount).with_slippage_bps(slippage_bps);
    provider
        .get_route(&request)
        .await?
        .with_context(|| format!("USDC -> {} is not relayed", to.symbol))
}

async fn quote(amount: &str, to: &str, slippage_bps: u32, price: u128, json: bool) -> Result<()> {
    let to = destination(to)?;
    let provider = MockRouteProvider::default().with_price(price);
    let quote = fetch_quote(&provider, amount, to, slippage_bps).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&quote)?);
        return Ok(());
    }

    println!("Quote:");
    println!(
        "  {} USDC -> {} {}",
        format_units(quote.from_amount, USDC.decimals),
        format_units(quote.to_amount, to.decimals),
        to.symbol
    );
    println!("  Route: {}", quote.route.id);
    println!("  Slippage: {}%", quote.price_impact);
    Ok(())
}

// ============================================================================
// Swap
// ============================================================================

struct SwapArgs {
    amount: String,
    clearnode_url: String,
    relay_url: String,
    counterparty: Option<String>,
    to: String,
    slippage_bps: u32,
    chain_id: u64,
}

async fn relay_backend_address(relay_url: &str) -> Result<Address> {
    let health: serde_json::Value = reqwest::get(format!("{}/health", relay_url.trim_end_matches('/')))
        .await
        .context("relay unreachable")?
        .error_for_status()?
        .json()
        .await?;
    let address = health["backendAddress"]
        .as_str()
        .context("relay health response has no backendAddress")?;
    Ok(Address::from_str(address)?)
}

async fn swap(private_key: &str, args: SwapArgs) -> Result<()> {
    let to = destination(&args.to)?;
    let wallet = Arc::new(LocalWallet::from_private_key_hex(private_key, args.chain_id)?);
    let counterparty = match &args.counterparty {
        Some(address) => Address::from_str(address).context("invalid --counterparty")?,
        None => relay_backend_address(&args.relay_url).await?,
    };

    let quote = fetch_quote(&MockRouteProvider::default(), &args.amount, to, args.slippage_bps).await?;

    let config = ClientConfig::default()
        .with_transport(TransportConfig::new(&args.clearnode_url))
        .with_relay_url(&args.relay_url)
        .with_request_timeout(Duration::from_secs(30));

    info!(wallet = %wallet.address(), counterparty = %counterparty, "Connecting");
    let client = SwapClient::connect(config, wallet).await?;

    let outcome = async {
        client.authenticate().await?;
        let session_id = client.create_session(counterparty, "usdc").await?;
        info!(session_id = %session_id, "Session open");
        client.propose_swap(&quote).await
    }
    .await;
    client.disconnect().await;

    let result = outcome?;
    match (result.success, result.tx_hash) {
        (true, Some(tx_hash)) => {
            println!(
                "Swapped {} USDC for at least {} {}",
                format_units(quote.from_amount, USDC.decimals),
                format_units(quote.to_amount, to.decimals),
                to.symbol
            );
            println!("Transaction: {}", tx_hash);
            Ok(())
        }
        _ => bail!(
            "swap failed: {}",
            result.error.unwrap_or_else(|| "unknown error".to_string())
        ),
    }
}

// ============================================================================
// Info
// ============================================================================

fn show_info() {
    println!("Gasless Swap v{}", gasless_core::VERSION);
    println!();
    println!("Supported Tokens ({}):", ChainId::BASE);
    for token in tokens::BASE_TOKENS {
        println!("  - {:<5} {} ({} decimals)", token.symbol, token.address, token.decimals);
    }
    println!();
    println!("Relayed Pairs:");
    println!("  - USDC -> WETH");
    println!("  - USDC -> ETH");
    println!();
    println!("Defaults:");
    println!("  Clearing node: {}", DEFAULT_CLEARNODE_URL);
    println!("  Relay: {}", DEFAULT_RELAY_URL);
    println!("  Session protocol: {}", gasless_core::SESSION_PROTOCOL);
    println!(
        "  Request timeout: {}s",
        gasless_core::DEFAULT_REQUEST_TIMEOUT_MS / 1000
    );
}

// ============================================================================
// Amounts
// ============================================================================

/// Decimal string to base units
fn parse_units(amount: &str, decimals: u8) -> Result<u128> {
    let amount = amount.trim();
    let (whole, frac) = amount.split_once('.').unwrap_or((amount, ""));
    if whole.is_empty() && frac.is_empty() {
        bail!("empty amount");
    }
    if !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
        bail!("invalid amount {}", amount);
    }
    if frac.len() > decimals as usize {
        bail!("{} has more than {} decimals", amount, decimals);
    }

    let scale = 10u128
        .checked_pow(decimals as u32)
        .context("too many decimals")?;
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse()? };
    let frac: u128 = if frac.is_empty() {
        0
    } else {
        format!("{:0<width$}", frac, width = decimals as usize).parse()?
    };

    whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac))
        .context("amount too large")
}

/// Base units to a trimmed decimal string
fn format_units(value: u128, decimals: u8) -> String {
    let scale = 10u128.pow(decimals as u32);
    let (whole, frac) = (value / scale, value % scale);
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0>width$}", frac, width = decimals as usize);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}
