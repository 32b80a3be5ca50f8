use crate::config::{AmountPolicy, ProxyConfig};
use crate::model::{ModuleInvocationResult, ModuleKind, Network, OutcomeRecord, RunStatistics, WalletRecord};
use anyhow::Result;
use async_trait::async_trait;

/// A protocol integration the scheduler can invoke.
///
/// Implementations own the whole transaction lifecycle, nonce handling
/// included. Every failure must come back as a failed
/// [`ModuleInvocationResult`]; nothing is allowed to propagate.
#[async_trait]
pub trait ModuleAdapter: Send + Sync {
    /// Stable identifier used in logs, results and amount-policy lookup.
    fn name(&self) -> &str;

    /// Fixed per implementation. Bridge modules honour a wallet's pinned chain.
    fn kind(&self) -> ModuleKind;

    /// Destinations usable right now. Discovery errors are logged by the
    /// adapter and come back as an empty list.
    async fn available_destinations(
        &self,
        wallet_number: u64,
        proxy: Option<&ProxyConfig>,
    ) -> Vec<Network>;

    /// Build, sign, submit and confirm exactly one unit of work.
    async fn process_transaction(
        &self,
        wallet: &WalletRecord,
        destination: &Network,
        amount: &AmountPolicy,
        wallet_number: u64,
    ) -> ModuleInvocationResult;
}

/// Append-only store for outcome records.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn record(&self, outcome: &OutcomeRecord) -> Result<()>;

    async fn statistics(&self) -> Result<RunStatistics>;
}

#[async_trait]
pub trait WalletLoader: Send + Sync {
    type Wallet;

    /// Load wallets from a source, skipping rows that cannot be used.
    async fn load_wallets(&self) -> Result<Vec<Self::Wallet>>;
}
