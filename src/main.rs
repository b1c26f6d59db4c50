//! Wallet sync daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────────┐
//!                 │                     WALLET ENGINE                        │
//!                 │                                                          │
//!                 │  ┌───────────┐   ┌──────────┐   ┌─────────────────────┐  │
//!                 │  │ scheduler │──▶│ fetchers │──▶│ providers (racer +  │──┼──▶ explorers
//!                 │  │  (poll)   │   │          │   │ validator + codecs) │──┼──▶ RPC gateways
//!                 │  └───────────┘   └────┬─────┘   └─────────────────────┘──┼──▶ aggregator
//!                 │                       │ Fact                             │
//!                 │                       ▼                                  │
//!                 │                ┌─────────────┐    ┌──────────────┐       │
//!                 │                │ reconciler  │───▶│ notification │       │
//!                 │                │ + snapshot  │    │     sink     │       │
//!                 │                └──────┬──────┘    └──────────────┘       │
//!                 │                       │ Arc<Snapshot>                    │
//!                 │          ┌────────────┼───────────────┐                  │
//!                 │          ▼            ▼               ▼                  │
//!                 │   ┌────────────┐ ┌─────────┐  ┌──────────────┐           │
//!   submit_spend ─┼──▶│ spend path │ │  admin  │  │ persistence  │           │
//!                 │   │nonce+bcast │ │   API   │  │  (flusher)   │           │
//!                 │   └────────────┘ └─────────┘  └──────────────┘           │
//!                 └──────────────────────────────────────────────────────────┘
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use wallet_sync::admin::{self, AdminState};
use wallet_sync::blockchain::client::HttpTransport;
use wallet_sync::config::load_config;
use wallet_sync::fetchers::{fetch_block_height, FactKind, FetchContext};
use wallet_sync::lifecycle::signals::shutdown_signal;
use wallet_sync::observability::{logging, metrics};
use wallet_sync::persistence::{JsonFileStore, SnapshotStore};
use wallet_sync::providers::ProviderSet;
use wallet_sync::{EngineDeps, WalletEngine};

#[derive(Parser)]
#[command(name = "wallet-sync")]
#[command(about = "Multi-provider wallet state synchronization", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "wallet-sync.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine until SIGINT/SIGTERM
    Run,
    /// Race the configured providers once and print the block height
    Height,
    /// Print the persisted snapshot
    Snapshot,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    logging::init_logging(&config.observability);

    match cli.command {
        Commands::Run => {
            tracing::info!(version = env!("CARGO_PKG_VERSION"), wallet = %config.wallet.id, "wallet-sync starting");

            if config.observability.metrics_enabled {
                match config.observability.metrics_address.parse() {
                    Ok(addr) => metrics::init_metrics(addr),
                    Err(_) => tracing::error!(
                        metrics_address = %config.observability.metrics_address,
                        "Failed to parse metrics address"
                    ),
                }
            }

            let engine = Arc::new(WalletEngine::new(&config, EngineDeps::from_config(&config)?).await?);
            engine.start();

            let admin_task = if config.admin.enabled {
                let addr = config.admin.bind_address.parse()?;
                let router = admin::setup_admin_router(AdminState {
                    engine: engine.clone(),
                    api_key: Arc::from(config.admin.api_key.as_str()),
                });
                let liveness = wallet_sync::Liveness::new();
                liveness.set_alive();
                let stop = liveness.clone();
                Some((tokio::spawn(admin::serve(router, addr, liveness)), stop))
            } else {
                None
            };

            shutdown_signal().await;
            engine.stop().await?;
            if let Some((task, stop)) = admin_task {
                stop.clear();
                if let Ok(Err(e)) = task.await {
                    tracing::error!(error = %e, "Admin API failed");
                }
            }
            tracing::info!("Shutdown complete");
        }
        Commands::Height => {
            let transport = Arc::new(HttpTransport::new(config.providers.timeout_secs)?);
            let providers = ProviderSet::from_config(&config.providers, transport);
            let address = config.wallet.address.parse()?;
            let ctx = FetchContext::new(address, config.wallet.native_currency.clone(), Vec::new(), providers);

            let fact = fetch_block_height(&ctx).await?;
            if let FactKind::BlockHeight(height) = fact.kind {
                println!("{height} (from {})", fact.source);
            }
        }
        Commands::Snapshot => {
            let store = JsonFileStore::new(&config.persistence.dir);
            match store.load(&config.wallet.id).await? {
                Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
                None => eprintln!("No snapshot saved for wallet '{}'", config.wallet.id),
            }
        }
    }

    Ok(())
}
