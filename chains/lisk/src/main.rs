use lisk_project::config::LiskConfig;
use lisk_project::modules::build_modules;
use lisk_project::utils::{EvmExecutor, GasManager};

use anyhow::Result;
use clap::Parser;
use core_logic::{
    setup_logger, CsvWalletLoader, DelayPolicy, MemoryResultSink, NonceAllocator, ResultSink,
    SqliteResultStore, WalletLoader, WalletScheduler, WalletState,
};
use dotenv::dotenv;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "chains/lisk/config.toml")]
    config: String,
    #[arg(short, long, env = "WALLETS_FILE", default_value = "wallets.csv")]
    wallets: String,
    #[arg(long, env = "RESULTS_DB", default_value = "lisk.db")]
    results_db: String,
    /// Mirror INFO logs to the console.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    let _log_guard = setup_logger(args.verbose);
    // Keep guard alive for file logging
    std::mem::forget(_log_guard);

    info!("Loading config from: {}", args.config);
    let config = match LiskConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {:#}", e);
            return Ok(());
        }
    };
    info!(
        "Configuration loaded for {} (chain ID: {})",
        config.chain_name, config.chain_id
    );

    let wallets = match CsvWalletLoader::new(&args.wallets).load_wallets().await {
        Ok(w) => w,
        Err(e) => {
            error!("Failed to load wallets from {}: {:#}", args.wallets, e);
            return Ok(());
        }
    };
    info!("Loaded {} wallets from {}", wallets.len(), args.wallets);

    let sink: Arc<dyn ResultSink> =
        match SqliteResultStore::new(&args.results_db, config.explorer_tx_url.clone()).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!(
                    "Results database unavailable ({:#}); keeping results in memory",
                    e
                );
                Arc::new(MemoryResultSink::new())
            }
        };

    let nonces = Arc::new(NonceAllocator::new());
    let gas = GasManager::new().with_max_gas_price(config.max_gas_price_gwei);
    let executor = Arc::new(EvmExecutor::new(
        config.rpc_url.clone(),
        config.chain_id,
        nonces,
        gas,
        config.confirmation_timeout(),
    ));

    let module_set = build_modules(&config, executor)?;
    if module_set.modules.is_empty() {
        error!("No modules enabled. Check enabled_modules in {}", args.config);
        return Ok(());
    }
    info!(
        "Modules: {}",
        module_set
            .modules
            .iter()
            .map(|m| m.name())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let delays = Arc::new(DelayPolicy::new(config.delays)?);
    let mut scheduler =
        WalletScheduler::new(config.orchestrator(), module_set.modules, delays, sink.clone());
    if let Some(pre_pass) = module_set.pre_pass {
        scheduler = scheduler.with_pre_pass(pre_pass);
    }

    let report = Arc::new(scheduler).run_until_ctrl_c(wallets).await;

    info!(
        "Run finished in {:.1}s: {} wallets completed, {} aborted, {} invocations",
        report.elapsed.as_secs_f64(),
        report.completed(),
        report.aborted(),
        report.total_invocations()
    );
    for wallet in &report.wallets {
        if let WalletState::Aborted(reason) = &wallet.state {
            warn!("Wallet {} aborted: {}", wallet.address, reason);
        }
    }

    match sink.statistics().await {
        Ok(stats) => info!(
            "Total: {} | Successful: {} | Failed: {} | Success rate: {:.1}% | Top network: {} | Top module: {}",
            stats.total,
            stats.successful,
            stats.failed,
            stats.success_rate,
            stats.most_used_network.as_deref().unwrap_or("-"),
            stats.most_used_module.as_deref().unwrap_or("-")
        ),
        Err(e) => error!("Failed to compute statistics: {:#}", e),
    }

    Ok(())
}
