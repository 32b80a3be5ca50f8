use anyhow::{Context, Result};
use config::{Config, File};
use core_logic::{
    AmountPolicies, ConfigError, DelaysConfig, Network, OrchestratorConfig,
};
use crate::utils::CHAIN_REGISTRY_URL;
use serde::Deserialize;
use std::time::Duration;

pub const NATIVE_TOKEN: &str = "0x0000000000000000000000000000000000000000";

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModuleId {
    Dmail,
    Safe,
    Ionic,
    Relay,
    LayerSwap,
    SuperBridge,
    Jumper,
}

impl ModuleId {
    /// Name the module reports in logs and results.
    pub fn label(self) -> &'static str {
        match self {
            ModuleId::Dmail => "Dmail",
            ModuleId::Safe => "Safe",
            ModuleId::Ionic => "Ionic",
            ModuleId::Relay => "Relay",
            ModuleId::LayerSwap => "LayerSwap",
            ModuleId::SuperBridge => "SuperBridge",
            ModuleId::Jumper => "Jumper",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LiskConfig {
    pub rpc_url: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_chain_name")]
    pub chain_name: String,
    #[serde(default = "default_explorer_tx_url")]
    pub explorer_tx_url: String,
    pub worker_amount: usize,
    #[serde(default = "default_max_empty_passes")]
    pub max_empty_passes: u32,
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,
    /// Upper bound on the legacy gas price, in gwei.
    #[serde(default)]
    pub max_gas_price_gwei: Option<f64>,
    /// Unwrap leftover WETH before each wallet's loop.
    #[serde(default = "default_true")]
    pub weth_unwrap: bool,
    #[serde(default = "default_modules")]
    pub enabled_modules: Vec<ModuleId>,
    #[serde(default)]
    pub delays: DelaysConfig,
    #[serde(default)]
    pub amounts: AmountPolicies,
    #[serde(default)]
    pub relay: RelaySettings,
    #[serde(default)]
    pub dmail: DmailSettings,
    #[serde(default)]
    pub safe: SafeSettings,
    #[serde(default)]
    pub ionic: IonicSettings,
    #[serde(default)]
    pub layerswap: LayerSwapSettings,
    #[serde(default)]
    pub superbridge: SuperBridgeSettings,
    #[serde(default)]
    pub jumper: JumperSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelaySettings {
    #[serde(default = "default_relay_api")]
    pub api_url: String,
    #[serde(default = "default_status_delay")]
    pub status_check_delay_secs: u64,
    #[serde(default = "default_status_checks")]
    pub max_status_checks: u32,
    #[serde(default)]
    pub slippage: Option<String>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            api_url: default_relay_api(),
            status_check_delay_secs: default_status_delay(),
            max_status_checks: default_status_checks(),
            slippage: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct DmailSettings {
    pub min_messages: u32,
    pub max_messages: u32,
}

impl Default for DmailSettings {
    fn default() -> Self {
        Self {
            min_messages: 1,
            max_messages: 1,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct SafeSettings {
    pub min_salt_nonce: u64,
    pub max_salt_nonce: u64,
}

impl Default for SafeSettings {
    fn default() -> Self {
        Self {
            min_salt_nonce: 1,
            max_salt_nonce: 9_999_999_999_999_999,
        }
    }
}

/// Lending markets the supply module may pick from.
#[derive(Debug, Deserialize, Clone)]
pub struct IonicSettings {
    pub markets: Vec<IonicMarket>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IonicMarket {
    pub symbol: String,
    /// Underlying ERC-20.
    pub token: String,
    /// The market contract `mint` is called on.
    pub market: String,
    /// Smallest token balance, in whole tokens, worth supplying.
    #[serde(default)]
    pub min_balance: f64,
}

impl Default for IonicSettings {
    fn default() -> Self {
        Self {
            markets: vec![IonicMarket {
                symbol: "USDT".to_string(),
                token: "0x05D032ac25d322df992303dCa074EE7392C117b9".to_string(),
                market: "0x0D72f18BC4b4A2F0370Af6D799045595d806636F".to_string(),
                min_balance: 0.01,
            }],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LayerSwapSettings {
    #[serde(default = "default_layerswap_api")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// LayerSwap's name for the chain we bridge from.
    #[serde(default = "default_layerswap_source")]
    pub source_network: String,
    #[serde(default = "default_layerswap_destinations")]
    pub destinations: Vec<LayerSwapDestination>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LayerSwapDestination {
    pub name: String,
    pub network: String,
    pub chain_id: u64,
}

impl Default for LayerSwapSettings {
    fn default() -> Self {
        Self {
            api_url: default_layerswap_api(),
            api_key: None,
            source_network: default_layerswap_source(),
            destinations: default_layerswap_destinations(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SuperBridgeSettings {
    #[serde(default = "default_superbridge_api")]
    pub api_url: String,
    #[serde(default = "default_registry_url")]
    pub registry_url: String,
    #[serde(default = "default_superbridge_destinations")]
    pub destinations: Vec<u64>,
    /// Destination gas price in wei when its RPC cannot be reached.
    #[serde(default = "default_superbridge_gas_price")]
    pub fallback_gas_price: u64,
}

impl Default for SuperBridgeSettings {
    fn default() -> Self {
        Self {
            api_url: default_superbridge_api(),
            registry_url: default_registry_url(),
            destinations: default_superbridge_destinations(),
            fallback_gas_price: default_superbridge_gas_price(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct JumperSettings {
    #[serde(default = "default_jumper_tools")]
    pub tools_url: String,
    #[serde(default = "default_lifi_api")]
    pub api_url: String,
    #[serde(default = "default_registry_url")]
    pub registry_url: String,
    #[serde(default = "default_native_token")]
    pub to_token: String,
    #[serde(default = "default_jumper_slippage")]
    pub slippage: f64,
}

impl Default for JumperSettings {
    fn default() -> Self {
        Self {
            tools_url: default_jumper_tools(),
            api_url: default_lifi_api(),
            registry_url: default_registry_url(),
            to_token: default_native_token(),
            slippage: default_jumper_slippage(),
        }
    }
}

fn default_chain_id() -> u64 {
    1135
}

fn default_chain_name() -> String {
    "Lisk".to_string()
}

fn default_explorer_tx_url() -> String {
    "https://blockscout.lisk.com/tx/".to_string()
}

fn default_max_empty_passes() -> u32 {
    3
}

fn default_confirmation_timeout() -> u64 {
    180
}

fn default_true() -> bool {
    true
}

fn default_modules() -> Vec<ModuleId> {
    vec![
        ModuleId::Dmail,
        ModuleId::Relay,
        ModuleId::Ionic,
        ModuleId::Safe,
        ModuleId::Jumper,
        ModuleId::LayerSwap,
        ModuleId::SuperBridge,
    ]
}

fn default_relay_api() -> String {
    "https://api.relay.link".to_string()
}

fn default_status_delay() -> u64 {
    10
}

fn default_status_checks() -> u32 {
    30
}

fn default_registry_url() -> String {
    CHAIN_REGISTRY_URL.to_string()
}

fn default_native_token() -> String {
    NATIVE_TOKEN.to_string()
}

fn default_layerswap_api() -> String {
    "https://api.layerswap.io/api".to_string()
}

fn default_layerswap_source() -> String {
    "LISK_MAINNET".to_string()
}

fn default_layerswap_destinations() -> Vec<LayerSwapDestination> {
    [
        ("arbitrum", "ARBITRUM_MAINNET", 42161),
        ("optimism", "OPTIMISM_MAINNET", 10),
        ("base", "BASE_MAINNET", 8453),
        ("zksync", "ZKSYNCERA_MAINNET", 324),
        ("scroll", "SCROLL_MAINNET", 534352),
    ]
    .into_iter()
    .map(|(name, network, chain_id)| LayerSwapDestination {
        name: name.to_string(),
        network: network.to_string(),
        chain_id,
    })
    .collect()
}

fn default_superbridge_api() -> String {
    "https://api.superbridge.app".to_string()
}

fn default_superbridge_destinations() -> Vec<u64> {
    vec![8453, 10, 34443, 7777777, 130]
}

fn default_superbridge_gas_price() -> u64 {
    3_294_362
}

fn default_jumper_tools() -> String {
    "https://api.jumper.exchange/p/lifi/tools".to_string()
}

fn default_lifi_api() -> String {
    "https://li.quest/v1".to_string()
}

fn default_jumper_slippage() -> f64 {
    0.005
}

impl LiskConfig {
    pub fn load(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(path))
            .build()
            .with_context(|| format!("Failed to read config {}", path))?;

        let config: LiskConfig = settings
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!(e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.rpc_url.starts_with("http://") && !self.rpc_url.starts_with("https://") {
            return Err(ConfigError::InvalidRpcUrl {
                url: self.rpc_url.clone(),
            });
        }
        if self.confirmation_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "confirmation_timeout_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if let Some(cap) = self.max_gas_price_gwei {
            if !cap.is_finite() || cap <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: "max_gas_price_gwei".to_string(),
                    reason: format!("expected a positive number, got {}", cap),
                });
            }
        }
        if self.dmail.min_messages == 0 || self.dmail.min_messages > self.dmail.max_messages {
            return Err(ConfigError::InvalidValue {
                field: "dmail".to_string(),
                reason: format!(
                    "expected 1 <= min_messages <= max_messages, got [{}, {}]",
                    self.dmail.min_messages, self.dmail.max_messages
                ),
            });
        }
        if self.safe.min_salt_nonce > self.safe.max_salt_nonce {
            return Err(ConfigError::InvalidValue {
                field: "safe".to_string(),
                reason: "min_salt_nonce is greater than max_salt_nonce".to_string(),
            });
        }
        for market in &self.ionic.markets {
            if !market.min_balance.is_finite() || market.min_balance < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("ionic.markets.{}", market.symbol),
                    reason: format!("min_balance must be >= 0, got {}", market.min_balance),
                });
            }
        }
        if !(self.jumper.slippage > 0.0 && self.jumper.slippage < 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "jumper.slippage".to_string(),
                reason: format!("expected a fraction in (0, 1), got {}", self.jumper.slippage),
            });
        }
        if self.relay.max_status_checks == 0 {
            return Err(ConfigError::InvalidValue {
                field: "relay.max_status_checks".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        self.orchestrator().validate()
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            source_chain_id: self.chain_id,
            worker_amount: self.worker_amount,
            max_empty_passes: self.max_empty_passes,
            delays: self.delays,
            amounts: self.amounts.clone(),
        }
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    /// The chain every transaction is sent from.
    pub fn source_network(&self) -> Network {
        Network {
            id: self.chain_id,
            name: self.chain_name.clone(),
            rpc_url: self.rpc_url.clone(),
            currency_address: NATIVE_TOKEN.to_string(),
            is_enabled: true,
            supports_deposits: true,
        }
    }
}
