//! # Utilities Module
//!
//! Internal utility modules for the core-logic crate.
//! These modules are marked as `pub(crate)` to enforce API boundaries.

pub(crate) mod delay;
pub(crate) mod logger;
pub(crate) mod nonce_allocator;
pub(crate) mod scheduler;
pub(crate) mod wallet_loader;

pub use delay::{DelayKind, DelayPolicy};
pub use logger::{setup_logger, OUTCOME_TARGET};
pub use nonce_allocator::NonceAllocator;
pub use scheduler::{RunReport, WalletReport, WalletScheduler, WalletState};
pub use wallet_loader::CsvWalletLoader;
