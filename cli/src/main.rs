//! ChainScan CLI — runs the block scanner against a JSON-RPC node and
//! persists what it finds.
//!
//! # Commands
//! ```text
//! chainscan run      [--config chainscan.yaml]
//! chainscan status   [--config chainscan.yaml]
//! chainscan reset    [--config chainscan.yaml]
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use chainscan_core::{BlockScanner, CheckpointManager, CheckpointStore, Manager};
use chainscan_rpc::{EvmHeaderSource, HttpTransport};
use chainscan_storage::SqliteStorage;

mod config;
mod consumer;
mod logging;

use config::AppConfig;
use consumer::HeaderConsumer;

#[derive(Parser)]
#[command(
    name = "chainscan",
    about = "Block scanner for the marketplace indexer — ChainScan CLI",
    long_about = "
ChainScan walks an EVM chain from its last checkpoint to the head, stores
every block header in SQLite and then tracks the head.

ENVIRONMENT VARIABLES:
  RUST_LOG    Log filter, overrides --log-level and the config file
",
    version
)]
struct Cli {
    /// Path to a YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit JSON logs
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the chain until Ctrl-C
    Run,
    /// Print the stored checkpoint and header count
    Status,
    /// Delete the stored checkpoint; the next run starts from the default height
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.log.level = level;
    }
    config.log.json |= cli.json_logs;
    logging::init_tracing(&config.log);

    match cli.command {
        Commands::Run => cmd_run(config).await,
        Commands::Status => cmd_status(config).await,
        Commands::Reset => cmd_reset(config).await,
    }
}

async fn open_storage(config: &AppConfig) -> Result<Arc<SqliteStorage>> {
    let storage = SqliteStorage::open(&config.storage.path)
        .await
        .with_context(|| format!("opening database {}", config.storage.path))?;
    Ok(Arc::new(storage))
}

fn checkpoint_manager(config: &AppConfig, store: Arc<dyn CheckpointStore>) -> CheckpointManager {
    CheckpointManager::new(
        store,
        config.scanner.chain.clone(),
        config.scanner.scanner_id.clone(),
        config.storage.checkpoint_interval,
    )
}

async fn cmd_run(config: AppConfig) -> Result<()> {
    let storage = open_storage(&config).await?;
    let checkpoints = checkpoint_manager(&config, storage.clone());

    let transport = HttpTransport::new(config.rpc.url.clone(), config.rpc.client_config())
        .context("building HTTP transport")?;
    let source = EvmHeaderSource::new(transport).with_confirmations(config.rpc.confirmations);

    info!(
        chain = %config.scanner.chain,
        rpc = %config.rpc.url,
        db = %config.storage.path,
        "chainscan starting"
    );

    let (scanner, handle) =
        BlockScanner::new(config.scanner.clone(), Arc::new(source), Arc::new(checkpoints.reader()))
            .context("invalid scanner configuration")?;
    let consumer = HeaderConsumer::new(
        config.scanner.chain.clone(),
        storage,
        checkpoints,
        handle.headers,
        handle.state_changes,
    );
    // Kept alive for the run: there is no live block subscription feeding it yet.
    let _observed = handle.observed;

    let mut manager = Manager::new();
    manager.start(scanner);
    manager.start(consumer);

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "can not listen for Ctrl-C; stopping");
            }
            info!("interrupted");
        }
        closed = manager.next_closed() => {
            warn!(service = closed.unwrap_or("none"), "service exited early; stopping");
        }
    }

    let closed = manager.shutdown().await;
    info!(services = ?closed, "chainscan stopped");
    Ok(())
}

async fn cmd_status(config: AppConfig) -> Result<()> {
    let storage = open_storage(&config).await?;
    let checkpoints = checkpoint_manager(&config, storage.clone());

    let chain = &config.scanner.chain;
    match checkpoints.load().await? {
        Some(cp) => println!(
            "checkpoint  {chain}/{}: #{} {} (saved at {})",
            cp.scanner_id, cp.block_number, cp.block_hash, cp.updated_at
        ),
        None => println!(
            "checkpoint  {chain}/{}: none (next run starts at #{})",
            config.scanner.scanner_id, config.scanner.default_start_block
        ),
    }
    println!("headers     {}", storage.header_count(chain).await?);
    if let Some(latest) = storage.latest_header(chain).await? {
        println!("latest      #{} {}", latest.number, latest.hash);
    }
    Ok(())
}

async fn cmd_reset(config: AppConfig) -> Result<()> {
    let storage = open_storage(&config).await?;
    checkpoint_manager(&config, storage).reset().await?;
    println!(
        "checkpoint {}/{} deleted",
        config.scanner.chain, config.scanner.scanner_id
    );
    Ok(())
}
