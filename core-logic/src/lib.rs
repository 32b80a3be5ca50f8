//! # Core Logic - Multi-Wallet Transaction Orchestration
//!
//! Chain-agnostic pieces shared by the chain crates: the wallet scheduler,
//! nonce bookkeeping, pacing delays, result storage and logging.
//!
//! ## Modules
//!
//! - [`config`] - Delay ranges, amount policies, proxy parsing
//! - [`database`] - SQLite results store
//! - [`error`] - Typed error handling with thiserror
//! - [`model`] - Wallets, networks and outcome records
//! - [`sink`] - In-memory result sink
//! - [`traits`] - Module adapter, result sink and wallet loader seams
//! - `utils` - Scheduler, nonce allocator, delay policy, logger, wallet loader

pub mod config;
pub mod database;
pub mod error;
pub mod model;
pub mod sink;
pub mod traits;
pub(crate) mod utils;

pub use config::{
    AmountPolicies, AmountPolicy, DelayRange, DelaysConfig, OrchestratorConfig, ProxyConfig,
};
pub use database::SqliteResultStore;
pub use error::{
    ConfigError, CoreError, DatabaseError, ModuleError, NonceError, SchedulerError, WalletError,
};
pub use model::{
    ModuleInvocationResult, ModuleKind, Network, OutcomeRecord, RunStatistics, WalletRecord,
};
pub use sink::MemoryResultSink;
pub use traits::{ModuleAdapter, ResultSink, WalletLoader};

pub use utils::{
    setup_logger, CsvWalletLoader, DelayKind, DelayPolicy, NonceAllocator, RunReport,
    WalletReport, WalletScheduler, WalletState, OUTCOME_TARGET,
};
