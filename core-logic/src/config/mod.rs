use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyConfig {
    /// Parses `login:password@ip:port`, with or without an `http://` prefix.
    /// A bare `ip:port` is accepted as an unauthenticated proxy.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidProxy {
            raw: raw.to_string(),
        };

        let trimmed = raw.trim();
        let stripped = trimmed
            .strip_prefix("http://")
            .or_else(|| trimmed.strip_prefix("https://"))
            .unwrap_or(trimmed);

        let (credentials, endpoint) = match stripped.rsplit_once('@') {
            Some((creds, host)) => (Some(creds), host),
            None => (None, stripped),
        };

        let (host, port) = endpoint.rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() || port.parse::<u16>().is_err() {
            return Err(invalid());
        }

        let (username, password) = match credentials {
            Some(creds) => {
                let (user, pass) = creds.split_once(':').ok_or_else(invalid)?;
                if user.is_empty() {
                    return Err(invalid());
                }
                (Some(user.to_string()), Some(pass.to_string()))
            }
            None => (None, None),
        };

        Ok(Self {
            url: format!("http://{}:{}", host, port),
            username,
            password,
        })
    }

    /// Full proxy URL with embedded credentials.
    pub fn as_url(&self) -> String {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => self.url.replacen("http://", &format!("http://{}:{}@", u, p), 1),
            _ => self.url.clone(),
        }
    }
}

/// Inclusive `[min, max]` range in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min: f64,
    pub max: f64,
}

impl DelayRange {
    pub const ZERO: DelayRange = DelayRange { min: 0.0, max: 0.0 };

    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                reason: "bounds must be finite".to_string(),
            });
        }
        if self.min < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                reason: format!("min {} is negative", self.min),
            });
        }
        if self.min > self.max {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                reason: format!("min {} is greater than max {}", self.min, self.max),
            });
        }
        Ok(())
    }
}

/// Ranges for the five pacing points of a wallet run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelaysConfig {
    pub pre_start: DelayRange,
    pub post_special_module: DelayRange,
    pub between_wallets: DelayRange,
    pub between_transactions: DelayRange,
    pub between_modules: DelayRange,
}

impl DelaysConfig {
    /// All delays disabled. Useful for dry runs and tests.
    pub fn zero() -> Self {
        Self {
            pre_start: DelayRange::ZERO,
            post_special_module: DelayRange::ZERO,
            between_wallets: DelayRange::ZERO,
            between_transactions: DelayRange::ZERO,
            between_modules: DelayRange::ZERO,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pre_start.validate("delays.pre_start")?;
        self.post_special_module
            .validate("delays.post_special_module")?;
        self.between_wallets.validate("delays.between_wallets")?;
        self.between_transactions
            .validate("delays.between_transactions")?;
        self.between_modules.validate("delays.between_modules")
    }
}

impl Default for DelaysConfig {
    fn default() -> Self {
        Self {
            pre_start: DelayRange::new(0.0, 30.0),
            post_special_module: DelayRange::new(10.0, 90.0),
            between_wallets: DelayRange::new(66.0, 222.0),
            between_transactions: DelayRange::new(3.0, 8.0),
            between_modules: DelayRange::new(10.0, 90.0),
        }
    }
}

/// Fraction of the spendable balance a module should move, as `[min_pct, max_pct]`.
/// Opaque to the scheduler; only adapters interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmountPolicy {
    pub min_pct: f64,
    pub max_pct: f64,
}

impl AmountPolicy {
    pub fn new(min_pct: f64, max_pct: f64) -> Self {
        Self { min_pct, max_pct }
    }

    pub fn validate(&self, field: &str) -> Result<(), ConfigError> {
        let in_unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if !in_unit(self.min_pct) || !in_unit(self.max_pct) || self.min_pct > self.max_pct {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                reason: format!(
                    "expected 0 <= min_pct <= max_pct <= 1, got [{}, {}]",
                    self.min_pct, self.max_pct
                ),
            });
        }
        Ok(())
    }
}

impl Default for AmountPolicy {
    fn default() -> Self {
        Self::new(0.01, 0.01)
    }
}

/// Per-module amount policies with a fallback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AmountPolicies {
    #[serde(default)]
    pub default: AmountPolicy,
    #[serde(flatten)]
    pub per_module: HashMap<String, AmountPolicy>,
}

impl AmountPolicies {
    pub fn for_module(&self, module: &str) -> AmountPolicy {
        self.per_module
            .get(module)
            .or_else(|| {
                self.per_module
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(module))
                    .map(|(_, policy)| policy)
            })
            .copied()
            .unwrap_or(self.default)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.default.validate("amounts.default")?;
        for (name, policy) in &self.per_module {
            policy.validate(&format!("amounts.{}", name))?;
        }
        Ok(())
    }
}

/// Chain-agnostic knobs for the wallet scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Id of the chain every transaction is sent from.
    pub source_chain_id: u64,
    pub worker_amount: usize,
    #[serde(default = "default_max_empty_passes")]
    pub max_empty_passes: u32,
    pub delays: DelaysConfig,
    #[serde(default)]
    pub amounts: AmountPolicies,
}

fn default_max_empty_passes() -> u32 {
    3
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_amount == 0 {
            return Err(ConfigError::InvalidValue {
                field: "worker_amount".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_empty_passes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_empty_passes".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        self.delays.validate()?;
        self.amounts.validate()
    }
}
