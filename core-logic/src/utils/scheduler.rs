use crate::config::OrchestratorConfig;
use crate::error::SchedulerError;
use crate::model::{ModuleInvocationResult, ModuleKind, Network, OutcomeRecord, WalletRecord};
use crate::traits::{ModuleAdapter, ResultSink};
use crate::utils::delay::{DelayKind, DelayPolicy};
use futures::FutureExt;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::signal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletState {
    Completed,
    Aborted(SchedulerError),
}

#[derive(Debug, Clone)]
pub struct WalletReport {
    pub address: String,
    /// `None` when the wallet was never started.
    pub ordinal: Option<u64>,
    pub invocations: u32,
    pub state: WalletState,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub wallets: Vec<WalletReport>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn completed(&self) -> usize {
        self.wallets
            .iter()
            .filter(|w| w.state == WalletState::Completed)
            .count()
    }

    pub fn aborted(&self) -> usize {
        self.wallets.len() - self.completed()
    }

    pub fn total_invocations(&self) -> u64 {
        self.wallets.iter().map(|w| w.invocations as u64).sum()
    }

    pub fn wallet(&self, address: &str) -> Option<&WalletReport> {
        self.wallets.iter().find(|w| w.address == address)
    }
}

#[derive(Default)]
struct WalletProgress {
    ordinal: AtomicU64,
    invocations: AtomicU32,
}

/// Drives every wallet through its module loop on a fixed-size worker pool.
///
/// Each wallet is owned by one worker from start to finish, so a wallet's
/// transactions are strictly sequential. The ordinal counter is the only
/// state shared across workers.
pub struct WalletScheduler {
    config: OrchestratorConfig,
    modules: Vec<Arc<dyn ModuleAdapter>>,
    pre_pass: Option<Arc<dyn ModuleAdapter>>,
    delays: Arc<DelayPolicy>,
    sink: Arc<dyn ResultSink>,
    ordinals: Mutex<u64>,
    rng: Mutex<StdRng>,
}

impl WalletScheduler {
    pub fn new(
        config: OrchestratorConfig,
        modules: Vec<Arc<dyn ModuleAdapter>>,
        delays: Arc<DelayPolicy>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            config,
            modules,
            pre_pass: None,
            delays,
            sink,
            ordinals: Mutex::new(0),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Module run once per wallet before the main loop.
    pub fn with_pre_pass(mut self, module: Arc<dyn ModuleAdapter>) -> Self {
        self.pre_pass = Some(module);
        self
    }

    /// Fixes the shuffle and destination-pick sequence.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Runs all wallets, cancelling outstanding work on Ctrl+C.
    pub async fn run_until_ctrl_c(self: Arc<Self>, wallets: Vec<WalletRecord>) -> RunReport {
        let token = CancellationToken::new();
        let cloned_token = token.clone();

        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    warn!("🛑 Received Ctrl+C. Finishing in-flight transactions...");
                    cloned_token.cancel();
                }
                Err(err) => {
                    error!("Unable to listen for shutdown signal: {}", err);
                }
            }
        });

        self.run(wallets, token).await
    }

    pub async fn run(self: Arc<Self>, wallets: Vec<WalletRecord>, token: CancellationToken) -> RunReport {
        let start_time = Instant::now();
        let total = wallets.len();
        let queue = Arc::new(tokio::sync::Mutex::new(VecDeque::from(wallets)));
        let workers = self.config.worker_amount.min(total);

        info!("Starting {} workers for {} wallets", workers, total);

        let mut set = JoinSet::new();
        for i in 0..workers {
            let id = i + 1;
            let span = tracing::info_span!("worker", worker_id = format!("{:03}", id));
            let scheduler = Arc::clone(&self);
            let queue = Arc::clone(&queue);
            let child_token = token.clone();

            set.spawn(
                async move {
                    let mut reports = Vec::new();
                    while !child_token.is_cancelled() {
                        let next = queue.lock().await.pop_front();
                        let Some(wallet) = next else {
                            break;
                        };
                        reports.push(scheduler.run_wallet(wallet, &child_token).await);
                    }
                    reports
                }
                .instrument(span),
            );
        }

        let mut reports = Vec::with_capacity(total);
        while let Some(res) = set.join_next().await {
            match res {
                Ok(worker_reports) => reports.extend(worker_reports),
                Err(e) => {
                    error!("A worker task panicked or failed to join: {:?}", e);
                }
            }
        }

        // Left in the queue only when cancelled.
        for wallet in queue.lock().await.drain(..) {
            reports.push(WalletReport {
                address: wallet.address.clone(),
                ordinal: None,
                invocations: 0,
                state: WalletState::Aborted(SchedulerError::Cancelled),
            });
        }

        let report = RunReport {
            wallets: reports,
            elapsed: start_time.elapsed(),
        };

        info!(
            "Total Time: {:.1}s | Completed: {} | Aborted: {} | Invocations: {}",
            report.elapsed.as_secs_f64(),
            report.completed(),
            report.aborted(),
            report.total_invocations()
        );

        report
    }

    async fn run_wallet(&self, wallet: WalletRecord, token: &CancellationToken) -> WalletReport {
        let progress = WalletProgress::default();
        let span = tracing::info_span!("wallet", address = %wallet.short_address());

        let outcome = AssertUnwindSafe(self.drive_wallet(&wallet, &progress, token).instrument(span))
            .catch_unwind()
            .await;

        let ordinal = match progress.ordinal.load(Ordering::Relaxed) {
            0 => None,
            n => Some(n),
        };
        let state = match outcome {
            Ok(Ok(())) => WalletState::Completed,
            Ok(Err(e)) => {
                if e == SchedulerError::Cancelled {
                    warn!("[W:{}] {} stopped: {}", fmt_ordinal(ordinal), wallet.short_address(), e);
                } else {
                    error!("[W:{}] {} aborted: {}", fmt_ordinal(ordinal), wallet.short_address(), e);
                }
                WalletState::Aborted(e)
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(
                    "[W:{}] {} aborted after panic: {}",
                    fmt_ordinal(ordinal),
                    wallet.short_address(),
                    reason
                );
                WalletState::Aborted(SchedulerError::WalletLoopAborted { reason })
            }
        };

        WalletReport {
            address: wallet.address.clone(),
            ordinal,
            invocations: progress.invocations.load(Ordering::Relaxed),
            state,
        }
    }

    async fn drive_wallet(
        &self,
        wallet: &WalletRecord,
        progress: &WalletProgress,
        token: &CancellationToken,
    ) -> Result<(), SchedulerError> {
        self.pause(DelayKind::PreStart, token).await?;

        let ordinal = self.next_ordinal();
        progress.ordinal.store(ordinal, Ordering::Relaxed);
        info!(
            "[W:{:03}] {} planning to process {} contracts",
            ordinal,
            wallet.short_address(),
            wallet.contracts_count
        );

        if let Some(pre_pass) = &self.pre_pass {
            if self.run_pre_pass(pre_pass.as_ref(), wallet, ordinal).await {
                self.pause(DelayKind::PostSpecialModule, token).await?;
            }
        }

        if ordinal > 1 {
            self.pause(DelayKind::BetweenWallets, token).await?;
        }

        let target = wallet.contracts_count;
        let mut done = 0u32;
        let mut empty_passes = 0u32;

        while done < target {
            let mut order = self.modules.clone();
            self.shuffle(&mut order);
            let mut invoked_this_pass = 0u32;

            for module in order {
                if done >= target {
                    break;
                }
                if token.is_cancelled() {
                    return Err(SchedulerError::Cancelled);
                }

                let Some(destination) = self.pick_destination(module.as_ref(), wallet, ordinal).await
                else {
                    continue;
                };

                self.pause(DelayKind::BetweenTransactions, token).await?;

                let amount = self.config.amounts.for_module(module.name());
                let result = module
                    .process_transaction(wallet, &destination, &amount, ordinal)
                    .await;
                self.record(wallet, ordinal, &destination, result).await;

                done += 1;
                invoked_this_pass += 1;
                progress.invocations.store(done, Ordering::Relaxed);

                if done < target {
                    self.pause(DelayKind::BetweenModules, token).await?;
                }
            }

            if invoked_this_pass > 0 {
                empty_passes = 0;
                continue;
            }

            empty_passes += 1;
            if empty_passes >= self.config.max_empty_passes {
                return Err(SchedulerError::NoEligibleModules {
                    passes: empty_passes,
                });
            }
            warn!(
                "[W:{:03}] No module had an eligible destination (empty pass {}/{})",
                ordinal, empty_passes, self.config.max_empty_passes
            );
            self.pause(DelayKind::BetweenModules, token).await?;
        }

        info!(
            "[W:{:03}] {} completed {} contracts",
            ordinal,
            wallet.short_address(),
            done
        );
        Ok(())
    }

    /// Runs the pre-pass module. Returns whether it broadcast a transaction.
    async fn run_pre_pass(&self, module: &dyn ModuleAdapter, wallet: &WalletRecord, ordinal: u64) -> bool {
        let Some(destination) = self.pick_destination(module, wallet, ordinal).await else {
            warn!("[W:{:03}] {} has no destination, skipping", ordinal, module.name());
            return false;
        };

        let amount = self.config.amounts.for_module(module.name());
        let result = module
            .process_transaction(wallet, &destination, &amount, ordinal)
            .await;
        let broadcast = result.tx_hash.is_some();

        if !result.success {
            warn!(
                "[W:{:03}] {} failed, continuing: {}",
                ordinal,
                module.name(),
                result.error.as_deref().unwrap_or("-")
            );
        }
        // A no-op pass (nothing to do) leaves no record.
        if broadcast || !result.success {
            self.record(wallet, ordinal, &destination, result).await;
        }
        broadcast
    }

    async fn pick_destination(
        &self,
        module: &dyn ModuleAdapter,
        wallet: &WalletRecord,
        ordinal: u64,
    ) -> Option<Network> {
        let kind = module.kind();
        let candidates: Vec<Network> = module
            .available_destinations(ordinal, wallet.proxy.as_ref())
            .await
            .into_iter()
            .filter(|n| n.is_eligible(kind, self.config.source_chain_id))
            .collect();

        if candidates.is_empty() {
            debug!("[W:{:03}] {} has no eligible destinations", ordinal, module.name());
            return None;
        }

        match (kind, wallet.bridge_chain_id) {
            (ModuleKind::Bridge, Some(pinned)) => {
                let found = candidates.into_iter().find(|n| n.id == pinned);
                if found.is_none() {
                    info!(
                        "[W:{:03}] {} does not offer pinned chain {}, skipping",
                        ordinal,
                        module.name(),
                        pinned
                    );
                }
                found
            }
            _ => Some(self.choose(candidates)),
        }
    }

    async fn record(
        &self,
        wallet: &WalletRecord,
        ordinal: u64,
        destination: &Network,
        result: ModuleInvocationResult,
    ) {
        let outcome = OutcomeRecord::new(&wallet.address, destination, result);
        let detail = match (&outcome.tx_hash, &outcome.error) {
            (_, Some(err)) => err.clone(),
            (Some(hash), None) => hash.clone(),
            (None, None) => "-".to_string(),
        };

        info!(
            target: "outcome",
            "[W:{:03}][{}] {} [{}] -> {} ({}) | {}",
            ordinal,
            wallet.short_address(),
            if outcome.success { "SUCCESS" } else { "FAILED" },
            outcome.module,
            outcome.network_name,
            outcome.network_id,
            detail
        );

        if let Err(e) = self.sink.record(&outcome).await {
            warn!("[W:{:03}] Failed to store outcome: {:#}", ordinal, e);
        }
    }

    async fn pause(&self, kind: DelayKind, token: &CancellationToken) -> Result<(), SchedulerError> {
        if self.delays.wait(kind, token).await {
            Ok(())
        } else {
            Err(SchedulerError::Cancelled)
        }
    }

    fn next_ordinal(&self) -> u64 {
        let mut counter = lock(&self.ordinals);
        *counter += 1;
        *counter
    }

    fn shuffle(&self, modules: &mut [Arc<dyn ModuleAdapter>]) {
        modules.shuffle(&mut *lock(&self.rng));
    }

    fn choose(&self, mut candidates: Vec<Network>) -> Network {
        let idx = lock(&self.rng).gen_range(0..candidates.len());
        candidates.swap_remove(idx)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn fmt_ordinal(ordinal: Option<u64>) -> String {
    ordinal.map_or_else(|| "---".to_string(), |n| format!("{:03}", n))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
