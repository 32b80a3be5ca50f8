//! Data shared between the scheduler, module adapters and result sinks.

use crate::config::ProxyConfig;
use crate::error::ModuleError;
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// One account to drive through the module loop.
///
/// The signing key is wiped on drop and never shows up in `Debug` output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct WalletRecord {
    #[zeroize(skip)]
    pub address: String,
    private_key: String,
    #[zeroize(skip)]
    pub proxy: Option<ProxyConfig>,
    /// Number of module invocations to complete for this wallet.
    #[zeroize(skip)]
    pub contracts_count: u32,
    /// Destination that bridge-class modules must use when present.
    #[zeroize(skip)]
    pub bridge_chain_id: Option<u64>,
}

impl WalletRecord {
    pub fn new(address: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            private_key: private_key.into(),
            proxy: None,
            contracts_count: 1,
            bridge_chain_id: None,
        }
    }

    pub fn with_proxy(mut self, proxy: Option<ProxyConfig>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_contracts_count(mut self, count: u32) -> Self {
        self.contracts_count = count;
        self
    }

    pub fn with_bridge_chain_id(mut self, chain_id: Option<u64>) -> Self {
        self.bridge_chain_id = chain_id;
        self
    }

    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    /// `0x1234…abcd` form for log lines.
    pub fn short_address(&self) -> String {
        if self.address.len() <= 12 || !self.address.is_ascii() {
            return self.address.clone();
        }
        format!(
            "{}…{}",
            &self.address[..6],
            &self.address[self.address.len() - 4..]
        )
    }
}

impl fmt::Debug for WalletRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletRecord")
            .field("address", &self.address)
            .field("private_key", &"[REDACTED]")
            .field("proxy", &self.proxy.as_ref().map(|p| &p.url))
            .field("contracts_count", &self.contracts_count)
            .field("bridge_chain_id", &self.bridge_chain_id)
            .finish()
    }
}

/// Whether a module moves value across chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    Bridge,
    Local,
}

impl ModuleKind {
    pub fn is_bridge(self) -> bool {
        matches!(self, ModuleKind::Bridge)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub id: u64,
    pub name: String,
    pub rpc_url: String,
    pub currency_address: String,
    pub is_enabled: bool,
    pub supports_deposits: bool,
}

impl Network {
    /// Enabled, deposit-capable, and for bridges not the chain we are leaving.
    pub fn is_eligible(&self, kind: ModuleKind, source_chain_id: u64) -> bool {
        self.is_enabled
            && self.supports_deposits
            && !(kind.is_bridge() && self.id == source_chain_id)
    }
}

/// What an adapter hands back after one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInvocationResult {
    pub module: String,
    pub success: bool,
    /// Set whenever a transaction reached the network, even if it reverted.
    pub tx_hash: Option<String>,
    pub error: Option<String>,
}

impl ModuleInvocationResult {
    pub fn success(module: impl Into<String>, tx_hash: Option<String>) -> Self {
        Self {
            module: module.into(),
            success: true,
            tx_hash,
            error: None,
        }
    }

    pub fn failure(
        module: impl Into<String>,
        error: impl Into<String>,
        tx_hash: Option<String>,
    ) -> Self {
        Self {
            module: module.into(),
            success: false,
            tx_hash,
            error: Some(error.into()),
        }
    }

    pub fn from_error(module: impl Into<String>, err: &ModuleError) -> Self {
        Self::failure(module, err.to_string(), err.tx_hash().map(str::to_string))
    }

    pub fn from_outcome(module: impl Into<String>, outcome: Result<Option<String>, ModuleError>) -> Self {
        match outcome {
            Ok(tx_hash) => Self::success(module, tx_hash),
            Err(e) => Self::from_error(module, &e),
        }
    }

    /// Outcome of a run of transactions where `sent` holds the hash of the
    /// last one that reached the chain. A later failure keeps that hash
    /// unless the failing step has its own.
    pub fn from_sequence(
        module: impl Into<String>,
        sent: Option<String>,
        outcome: Result<(), ModuleError>,
    ) -> Self {
        match outcome {
            Ok(()) => Self::success(module, sent),
            Err(e) => Self::failure(
                module,
                e.to_string(),
                e.tx_hash().map(str::to_string).or(sent),
            ),
        }
    }
}

/// One persisted invocation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeRecord {
    pub timestamp: DateTime<Local>,
    pub wallet_address: String,
    pub network_name: String,
    pub network_id: u64,
    pub module: String,
    pub success: bool,
    pub tx_hash: Option<String>,
    pub error: Option<String>,
}

impl OutcomeRecord {
    pub fn new(wallet_address: &str, network: &Network, result: ModuleInvocationResult) -> Self {
        Self {
            timestamp: Local::now(),
            wallet_address: wallet_address.to_string(),
            network_name: network.name.clone(),
            network_id: network.id,
            module: result.module,
            success: result.success,
            tx_hash: result.tx_hash,
            error: result.error,
        }
    }

    pub fn status(&self) -> &'static str {
        if self.success {
            "Success"
        } else {
            "Failed"
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStatistics {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    /// Percentage in `[0, 100]`.
    pub success_rate: f64,
    pub most_used_network: Option<String>,
    pub most_used_module: Option<String>,
}

impl RunStatistics {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a OutcomeRecord>) -> Self {
        let mut stats = RunStatistics::default();
        let mut networks: HashMap<&str, u64> = HashMap::new();
        let mut modules: HashMap<&str, u64> = HashMap::new();

        for record in records {
            stats.total += 1;
            if record.success {
                stats.successful += 1;
            } else {
                stats.failed += 1;
            }
            *networks.entry(record.network_name.as_str()).or_default() += 1;
            *modules.entry(record.module.as_str()).or_default() += 1;
        }

        stats.success_rate = if stats.total > 0 {
            (stats.successful as f64 / stats.total as f64) * 100.0
        } else {
            0.0
        };
        stats.most_used_network = most_frequent(networks);
        stats.most_used_module = most_frequent(modules);
        stats
    }
}

// Ties go to the lexicographically smallest key so the result is stable.
fn most_frequent(counts: HashMap<&str, u64>) -> Option<String> {
    counts
        .into_iter()
        .max_by(|(ka, ca), (kb, cb)| ca.cmp(cb).then_with(|| kb.cmp(ka)))
        .map(|(k, _)| k.to_string())
}
