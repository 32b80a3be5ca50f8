//! # Core Error Types
//!
//! Centralized error definitions for the core-logic crate.
//! Adapter-side failures are folded into [`ModuleError`] and never cross the
//! adapter boundary as errors; the scheduler turns them into outcome records.

use thiserror::Error;

/// Unified error type for core-logic operations.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Config(ConfigError),

    #[error("Database error: {0}")]
    Database(DatabaseError),

    #[error(transparent)]
    Wallet(WalletError),

    #[error(transparent)]
    Nonce(NonceError),

    #[error(transparent)]
    Scheduler(SchedulerError),
}

impl From<ConfigError> for CoreError {
    fn from(e: ConfigError) -> Self {
        CoreError::Config(e)
    }
}

impl From<DatabaseError> for CoreError {
    fn from(e: DatabaseError) -> Self {
        CoreError::Database(e)
    }
}

impl From<WalletError> for CoreError {
    fn from(e: WalletError) -> Self {
        CoreError::Wallet(e)
    }
}

impl From<NonceError> for CoreError {
    fn from(e: NonceError) -> Self {
        CoreError::Nonce(e)
    }
}

impl From<SchedulerError> for CoreError {
    fn from(e: SchedulerError) -> Self {
        CoreError::Scheduler(e)
    }
}

/// Configuration-related errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Invalid RPC URL format: '{url}'")]
    InvalidRpcUrl { url: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid proxy '{raw}': expected login:password@ip:port")]
    InvalidProxy { raw: String },

    #[error("I/O error reading {path}: {msg}")]
    IoError { path: String, msg: String },
}

/// Wallet-list errors
#[derive(Error, Debug, Clone)]
pub enum WalletError {
    #[error("Wallet file has no header row: {path}")]
    MissingHeader { path: String },

    #[error("Wallet file is missing column '{column}'")]
    MissingColumn { column: String },

    #[error("Row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },

    #[error("No usable wallets in {path}")]
    NoWalletsFound { path: String },
}

/// Database-related errors
#[derive(Error, Debug, Clone)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {msg}")]
    ConnectionFailed { msg: String },

    #[error("Query failed: {msg}")]
    QueryFailed { msg: String },
}

/// Nonce bookkeeping errors.
///
/// `StateMismatch` means a caller tried to release or commit a nonce that is
/// not the address's outstanding reservation. The allocator state is left
/// untouched when it is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NonceError {
    #[error("Nonce state mismatch for {address}: outstanding {expected:?}, got {got}")]
    StateMismatch {
        address: String,
        expected: Option<u64>,
        got: u64,
    },

    #[error("Nonce {outstanding} is still reserved for {address}")]
    AlreadyReserved { address: String, outstanding: u64 },

    #[error("No nonce state for {address}")]
    NotSeeded { address: String },

    #[error("Failed to fetch starting nonce for {address}: {msg}")]
    SeedFailed { address: String, msg: String },
}

/// Failure of a single module invocation.
#[derive(Error, Debug, Clone)]
pub enum ModuleError {
    #[error("Destination discovery failed for {module}: {reason}")]
    DiscoveryFailure { module: String, reason: String },

    #[error("Transaction build failed: {reason}")]
    TransactionBuildFailure { reason: String },

    #[error("Broadcast failed: {reason}")]
    BroadcastFailure { reason: String },

    #[error("Confirmation failed for {tx_hash}: {reason}")]
    ConfirmationFailure { tx_hash: String, reason: String },

    #[error("Timed out after {waited_secs}s waiting on {}", tx_hash.as_deref().unwrap_or("-"))]
    Timeout {
        tx_hash: Option<String>,
        waited_secs: u64,
    },

    #[error(transparent)]
    NonceStateMismatch(#[from] NonceError),
}

impl ModuleError {
    pub fn build(reason: impl std::fmt::Display) -> Self {
        ModuleError::TransactionBuildFailure {
            reason: reason.to_string(),
        }
    }

    pub fn broadcast(reason: impl std::fmt::Display) -> Self {
        ModuleError::BroadcastFailure {
            reason: reason.to_string(),
        }
    }

    /// Transaction hash if the failure happened after broadcast.
    pub fn tx_hash(&self) -> Option<&str> {
        match self {
            ModuleError::ConfirmationFailure { tx_hash, .. } => Some(tx_hash),
            ModuleError::Timeout { tx_hash, .. } => tx_hash.as_deref(),
            _ => None,
        }
    }
}

/// Terminal reasons for a wallet that did not complete.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("No eligible modules after {passes} consecutive empty passes")]
    NoEligibleModules { passes: u32 },

    #[error("Wallet loop aborted: {reason}")]
    WalletLoopAborted { reason: String },

    #[error("Cancelled before completion")]
    Cancelled,
}
