//! `reap-agent` command line.
//!
//! The signing key is read from `REAP_AGENT_PRIVATE_KEY`; everything else comes from an
//! optional TOML file, `REAP_AGENT_*` variables and flags, in increasing precedence.

use clap::{Parser, Subcommand};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use reap_agent::chain::Wallet;
use reap_agent::config::validation::validate_config;
use reap_agent::config::{load_config, ConfigError};
use reap_agent::observability::logging::init_logging;
use reap_agent::{ReapAgent, TransactionIntent};

#[derive(Parser)]
#[command(name = "reap-agent")]
#[command(about = "Agent client for the Reap protocol", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the JSON-RPC endpoint.
    #[arg(long)]
    rpc_url: Option<String>,

    /// Override the builder service URL.
    #[arg(long)]
    builder_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register the agent's on-chain identity
    Register {
        #[arg(long, default_value = "ipfs://default")]
        profile_uri: String,
    },
    /// Stock the shelf with products matching a query
    Stock {
        query: String,
        /// Preview the builder's transactions without sending them
        #[arg(long)]
        dry_run: bool,
    },
    /// Buy a single product
    Buy { product_id: String },
    /// Buy several products in one batch
    Cart {
        #[arg(required = true)]
        product_ids: Vec<String>,
    },
    /// Look up a product (read-only)
    Product { product_id: String },
    /// Check whether a coordinate is on the Holocron index
    Holocron { coordinate: String },
    /// Register and index a coordinate unless already indexed
    Sync {
        coordinate: String,
        /// Registration transaction as a JSON intent
        #[arg(long)]
        registration: Option<String>,
    },
    /// Fetch a URL, paying any x402 challenge
    Fetch {
        url: String,
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
        /// JSON request body
        #[arg(long)]
        json: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(rpc_url) = cli.rpc_url {
        config.chain.rpc_url = rpc_url;
    }
    if let Some(builder_url) = cli.builder_url {
        config.builder.base_url = builder_url;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    init_logging(&config.observability.log_level);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling in-flight batch");
            on_interrupt.cancel();
        }
    });

    let wallet = Wallet::from_env()?;
    let agent = ReapAgent::connect(&config, wallet)
        .await?
        .with_cancellation(cancel);

    match cli.command {
        Commands::Register { profile_uri } => {
            print_json(&agent.register_identity(&profile_uri).await?)?;
        }
        Commands::Stock { query, dry_run } => {
            print_json(&agent.stock_shelf(&query, dry_run).await?)?;
        }
        Commands::Buy { product_id } => {
            print_json(&agent.buy_product(&product_id).await?)?;
        }
        Commands::Cart { product_ids } => {
            print_json(&agent.buy_cart(&product_ids).await?)?;
        }
        Commands::Product { product_id } => {
            print_json(&agent.get_product(&product_id).await?)?;
        }
        Commands::Holocron { coordinate } => {
            print_json(&agent.check_holocron(&coordinate).await?)?;
        }
        Commands::Sync {
            coordinate,
            registration,
        } => {
            let registration = registration
                .map(|raw| serde_json::from_str::<TransactionIntent>(&raw))
                .transpose()?;
            print_json(&agent.smart_sync(&coordinate, registration).await?)?;
        }
        Commands::Fetch { url, method, json } => {
            let method = Method::from_bytes(method.to_uppercase().as_bytes())?;
            let mut request = agent.http().request(method, &url);
            if let Some(body) = json {
                request = request.json(&serde_json::from_str::<Value>(&body)?);
            }

            let negotiated = agent.fetch(request.build()?).await?;
            tracing::info!(outcome = ?negotiated.outcome, "Fetch complete");

            let response = negotiated.into_response();
            let status = response.status();
            let body = response.text().await?;
            if !status.is_success() {
                eprintln!("Error: resource returned status {}", status);
            }
            println!("{}", body);
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
