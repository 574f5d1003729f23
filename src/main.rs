//! KratOs Peer Seeds Service
//!
//! HTTP front-end that lets new nodes bootstrap without trusting DNS: it
//! answers with a signed, compressed snapshot of currently reachable peers.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   KRATOS PEER SEEDS                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Identity (seed.key)       ←── secp256k1 key, hex on disk  │
//! │  Address Book              ←── peers + recrawl queue       │
//! │  Connect Executor          ←── background TCP probes       │
//! │  HTTP API (8080)           ←── /peers /lookup /recrawls    │
//! │                                /force /metrics             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

mod api;
mod config;
mod crawler;
mod identity;
mod types;

use api::{ApiState, Metrics, SeedEncoder};
use config::SeedServerConfig;
use crawler::{AddressBook, ConnectExecutor, Crawler};

/// KratOs Peer Seeds - signed peer lists over HTTP
#[derive(Parser, Debug)]
#[command(name = "kratos-peer-seeds")]
#[command(author = "KratOs Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Signed peer seed HTTP service for KratOs network bootstrap", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "peer-seeds.toml")]
    config: PathBuf,

    /// Data directory for the signing key
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,

    /// Path to signing key file (defaults to <data-dir>/seed.key)
    #[arg(long)]
    key_file: Option<PathBuf>,

    /// HTTP API port
    #[arg(long)]
    api_port: Option<u16>,

    /// Prefix all routes are mounted under
    #[arg(long)]
    base_path: Option<String>,

    /// Network name embedded in signed peer lists
    #[arg(long)]
    network: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into())
        )
        .init();

    info!("🌱 KratOs Peer Seeds v{}", env!("CARGO_PKG_VERSION"));

    // Identity must be in place before anything listens
    let key_path = args
        .key_file
        .clone()
        .unwrap_or_else(|| args.data_dir.join("seed.key"));
    let identity = identity::load_or_create_identity(&key_path).await?;
    info!("📝 Seed public key: {}", hex::encode(identity.public_key_bytes()));

    // Load configuration
    let config = if args.config.exists() {
        SeedServerConfig::load(&args.config)?
    } else {
        warn!("Config file not found, using defaults");
        SeedServerConfig::default()
    };

    // Override config with CLI args
    let config = config
        .with_api_port(args.api_port)
        .with_base_path(args.base_path)
        .with_network_name(args.network);

    config.validate()?;

    info!("⚙️  Configuration:");
    info!("   API: {}:{}{}", config.bind_address, config.api_port, config.base_path);
    info!("   Network: {}", config.network_name);
    info!("   Default port: {}", config.default_port);
    info!("   Max peers per response: {}", config.max_peers_in_response);

    let shared_config = Arc::new(config);

    // Address book and its connect executor
    let (executor, connect_rx) = ConnectExecutor::channel(shared_config.connect_queue_size);
    let book = Arc::new(AddressBook::new(
        executor,
        shared_config.default_port,
        shared_config.recrawl_interval_secs,
    ));
    for record in shared_config.static_peer_records()? {
        book.insert(record).await;
    }
    info!("📦 Address book seeded with {} peers", book.len().await);

    let dispatcher_handle = tokio::spawn(crawler::run_dispatcher(
        connect_rx,
        book.clone(),
        Duration::from_secs(shared_config.connect_timeout_secs),
        shared_config.max_concurrent_connects,
    ));

    let recrawl_handle = tokio::spawn(crawler::run_recrawl_loop(
        book.clone(),
        shared_config.maintenance_interval_secs,
    ));

    let crawler: Arc<dyn Crawler> = book.clone();
    let state = Arc::new(ApiState {
        config: shared_config.clone(),
        crawler,
        encoder: SeedEncoder::new(
            identity,
            shared_config.network_name.clone(),
            shared_config.cache_max_age_secs,
        ),
        metrics: Arc::new(Metrics::new()),
    });

    let api_handle = tokio::spawn(api::run_api_server(state, shutdown_signal()));

    info!("✅ All services started");
    info!("   Press Ctrl+C to shutdown gracefully");

    tokio::select! {
        result = api_handle => {
            match result {
                Ok(Ok(())) => info!("🛑 HTTP API drained"),
                Ok(Err(e)) => error!("HTTP API exited: {:?}", e),
                Err(e) => error!("HTTP API task failed: {:?}", e),
            }
        }
        result = dispatcher_handle => {
            error!("Connect dispatcher exited: {:?}", result);
        }
        result = recrawl_handle => {
            error!("Recrawl loop exited: {:?}", result);
        }
    }

    book.close();

    info!("👋 KratOs Peer Seeds shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("🛑 Shutdown signal received");
}
