use crate::config::{DelayRange, DelaysConfig};
use crate::error::ConfigError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Points in a wallet run where the scheduler pauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DelayKind {
    PreStart,
    PostSpecialModule,
    BetweenWallets,
    BetweenTransactions,
    BetweenModules,
}

impl DelayKind {
    pub const ALL: [DelayKind; 5] = [
        DelayKind::PreStart,
        DelayKind::PostSpecialModule,
        DelayKind::BetweenWallets,
        DelayKind::BetweenTransactions,
        DelayKind::BetweenModules,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DelayKind::PreStart => "pre-start",
            DelayKind::PostSpecialModule => "post-special-module",
            DelayKind::BetweenWallets => "between-wallets",
            DelayKind::BetweenTransactions => "between-transactions",
            DelayKind::BetweenModules => "between-modules",
        }
    }
}

/// Draws randomized pauses from the configured ranges.
///
/// Sampling does no I/O. Build with [`DelayPolicy::from_seed`] for
/// reproducible sequences.
#[derive(Debug)]
pub struct DelayPolicy {
    ranges: DelaysConfig,
    rng: Mutex<StdRng>,
}

impl DelayPolicy {
    pub fn new(ranges: DelaysConfig) -> Result<Self, ConfigError> {
        ranges.validate()?;
        Ok(Self {
            ranges,
            rng: Mutex::new(StdRng::from_entropy()),
        })
    }

    pub fn from_seed(ranges: DelaysConfig, seed: u64) -> Result<Self, ConfigError> {
        ranges.validate()?;
        Ok(Self {
            ranges,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        })
    }

    /// Resets the generator. Subsequent samples repeat for equal seeds.
    pub fn reseed(&self, seed: u64) {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *rng = StdRng::seed_from_u64(seed);
    }

    pub fn range(&self, kind: DelayKind) -> DelayRange {
        match kind {
            DelayKind::PreStart => self.ranges.pre_start,
            DelayKind::PostSpecialModule => self.ranges.post_special_module,
            DelayKind::BetweenWallets => self.ranges.between_wallets,
            DelayKind::BetweenTransactions => self.ranges.between_transactions,
            DelayKind::BetweenModules => self.ranges.between_modules,
        }
    }

    /// Uniform draw from the inclusive range for `kind`.
    pub fn sample(&self, kind: DelayKind) -> Duration {
        let range = self.range(kind);
        let secs = if range.min >= range.max {
            range.min
        } else {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            rng.gen_range(range.min..=range.max)
        };
        Duration::from_secs_f64(secs)
    }

    /// Sleeps for a sampled duration. Returns `false` if `token` fired first.
    pub async fn wait(&self, kind: DelayKind, token: &CancellationToken) -> bool {
        let duration = self.sample(kind);
        if duration.is_zero() {
            return !token.is_cancelled();
        }

        debug!("Sleeping {:.1}s ({})", duration.as_secs_f64(), kind.label());
        tokio::select! {
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
