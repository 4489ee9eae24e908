#![forbid(unsafe_code)]
//! proofchain node: loads config, builds the ledger, serves the HTTP API.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use proofchain::api::{run_api_server, ApiNode};
use proofchain::config::{load_config_from, DEFAULT_CONFIG_PATH};
use proofchain::node::Ledger;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Port for the HTTP API (overrides network.api_port)
    #[arg(long)]
    port: Option<u16>,
    /// Extra peer to register at startup, as url,ip,location
    #[arg(long = "peer")]
    peers: Vec<String>,
    /// Proof-of-work difficulty in leading zero hex digits (overrides miner.difficulty)
    #[arg(long)]
    difficulty: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = load_config_from(&cli.config)?;
    if let Some(port) = cli.port {
        config.network.api_port = port;
    }
    if let Some(difficulty) = cli.difficulty {
        config.miner.difficulty = difficulty;
    }
    config.network.bootstrap_peers.extend(cli.peers);
    config.validate()?;

    let node_id = uuid::Uuid::new_v4().simple().to_string();
    let ledger = Arc::new(Ledger::from_config(&config, node_id.clone()).await?);

    let miner_address = config.miner.address.clone().unwrap_or(node_id);
    let peer_count = ledger.nodes().await.len();
    info!(
        node_id = %ledger.node_id(),
        miner = %miner_address,
        difficulty = config.miner.difficulty,
        peers = peer_count,
        "starting proofchain node"
    );

    let api_node = Arc::new(ApiNode::with_miner_address(ledger, miner_address));
    run_api_server(api_node, config.network.api_port).await?;

    Ok(())
}
