use crate::config::{RelaySettings, NATIVE_TOKEN};
use crate::utils::{balance_share, build_http_client, format_ether, EvmExecutor, TxCall};
use async_trait::async_trait;
use core_logic::{
    AmountPolicy, ModuleAdapter, ModuleError, ModuleInvocationResult, ModuleKind, Network,
    ProxyConfig, WalletRecord,
};
use ethers::prelude::*;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct ChainsResponse {
    chains: Vec<RelayChain>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelayChain {
    id: u64,
    name: String,
    #[serde(default)]
    http_rpc_url: String,
    currency: RelayCurrency,
    #[serde(default)]
    disabled: bool,
    #[serde(default = "default_true")]
    deposit_enabled: bool,
}

#[derive(Debug, Deserialize)]
struct RelayCurrency {
    address: String,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    steps: Vec<QuoteStep>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteStep {
    request_id: Option<String>,
    items: Vec<QuoteItem>,
}

#[derive(Debug, Deserialize)]
struct QuoteItem {
    data: QuoteTx,
}

#[derive(Debug, Deserialize)]
struct QuoteTx {
    to: String,
    data: String,
    #[serde(default)]
    value: Option<String>,
}

/// The deposit transaction a quote asks us to send.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayQuote {
    pub request_id: String,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayStatus {
    Success,
    Failed,
    Pending(String),
}

/// Destinations from a `/chains` body: enabled, deposit-capable and not
/// the chain we bridge from.
pub fn parse_chains(body: &str, source_chain_id: u64) -> Result<Vec<Network>, ModuleError> {
    let parsed: ChainsResponse =
        serde_json::from_str(body).map_err(|e| ModuleError::DiscoveryFailure {
            module: "Relay".to_string(),
            reason: format!("unexpected chains response: {}", e),
        })?;

    Ok(parsed
        .chains
        .into_iter()
        .map(|chain| Network {
            id: chain.id,
            name: chain.name,
            rpc_url: chain.http_rpc_url,
            currency_address: chain.currency.address,
            is_enabled: !chain.disabled,
            supports_deposits: chain.deposit_enabled,
        })
        .filter(|network| network.is_eligible(ModuleKind::Bridge, source_chain_id))
        .collect())
}

pub fn parse_quote(body: &Value) -> Result<RelayQuote, ModuleError> {
    if body.get("errorCode").is_some() {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error");
        return Err(ModuleError::build(format!("quote rejected: {}", message)));
    }

    let parsed: QuoteResponse = serde_json::from_value(body.clone())
        .map_err(|e| ModuleError::build(format!("unexpected quote response: {}", e)))?;
    let step = parsed
        .steps
        .into_iter()
        .next()
        .ok_or_else(|| ModuleError::build("quote has no steps"))?;
    let request_id = step
        .request_id
        .ok_or_else(|| ModuleError::build("quote step has no request id"))?;
    let tx = step
        .items
        .into_iter()
        .next()
        .ok_or_else(|| ModuleError::build("quote step has no items"))?
        .data;

    let value = match tx.value.as_deref() {
        Some(v) if !v.is_empty() => U256::from_dec_str(v).map_err(ModuleError::build)?,
        _ => U256::zero(),
    };

    Ok(RelayQuote {
        request_id,
        to: tx.to.parse().map_err(ModuleError::build)?,
        data: tx.data.parse().map_err(ModuleError::build)?,
        value,
    })
}

pub fn parse_status(body: &Value) -> RelayStatus {
    match body.get("status").and_then(Value::as_str) {
        Some("success") => RelayStatus::Success,
        Some("failed") | Some("refund") => RelayStatus::Failed,
        Some(other) => RelayStatus::Pending(other.to_string()),
        None => RelayStatus::Pending("unknown".to_string()),
    }
}

/// Pause between status checks; none after the last one.
pub fn status_wait(attempt: u32, max_checks: u32, delay: Duration) -> Option<Duration> {
    (attempt < max_checks).then_some(delay)
}

/// Bridges a slice of the native balance to another chain through Relay.
pub struct RelayBridgeModule {
    executor: Arc<EvmExecutor>,
    settings: RelaySettings,
}

impl RelayBridgeModule {
    pub fn new(executor: Arc<EvmExecutor>, settings: RelaySettings) -> Self {
        Self { executor, settings }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.settings.api_url.trim_end_matches('/'), path)
    }

    async fn fetch_chains(&self, proxy: Option<&ProxyConfig>) -> Result<Vec<Network>, ModuleError> {
        let discovery = |reason: String| ModuleError::DiscoveryFailure {
            module: self.name().to_string(),
            reason,
        };

        let client = build_http_client(proxy)?;
        let body = client
            .get(self.endpoint("chains"))
            .send()
            .await
            .map_err(|e| discovery(e.to_string()))?
            .text()
            .await
            .map_err(|e| discovery(e.to_string()))?;
        parse_chains(&body, self.executor.chain_id())
    }

    async fn route_enabled(
        &self,
        client: &reqwest::Client,
        destination: &Network,
    ) -> Result<bool, ModuleError> {
        let body: Value = client
            .get(self.endpoint("config/v2"))
            .query(&[
                ("originChainId", self.executor.chain_id().to_string()),
                ("destinationChainId", destination.id.to_string()),
            ])
            .send()
            .await
            .map_err(ModuleError::build)?
            .json()
            .await
            .map_err(ModuleError::build)?;
        Ok(body.get("enabled").and_then(Value::as_bool).unwrap_or(false))
    }

    async fn quote(
        &self,
        client: &reqwest::Client,
        user: Address,
        destination: &Network,
        amount: U256,
    ) -> Result<RelayQuote, ModuleError> {
        let user = format!("{:#x}", user);
        let mut payload = json!({
            "user": user,
            "originChainId": self.executor.chain_id(),
            "destinationChainId": destination.id,
            "originCurrency": NATIVE_TOKEN,
            "destinationCurrency": destination.currency_address,
            "recipient": user,
            "tradeType": "EXACT_INPUT",
            "amount": amount.to_string(),
            "useExternalLiquidity": false,
        });
        if let Some(slippage) = self.settings.slippage.as_deref().filter(|s| !s.is_empty()) {
            payload["slippageTolerance"] = json!(slippage);
        }

        let body: Value = client
            .post(self.endpoint("quote"))
            .json(&payload)
            .send()
            .await
            .map_err(ModuleError::build)?
            .json()
            .await
            .map_err(ModuleError::build)?;
        parse_quote(&body)
    }

    async fn monitor(
        &self,
        client: &reqwest::Client,
        request_id: &str,
        tx_hash: &str,
        wallet_number: u64,
    ) -> Result<(), ModuleError> {
        let max_checks = self.settings.max_status_checks;
        let delay = Duration::from_secs(self.settings.status_check_delay_secs);

        for attempt in 1..=max_checks {
            let status = match client
                .get(self.endpoint("intents/status/v2"))
                .query(&[("requestId", request_id)])
                .send()
                .await
            {
                Ok(resp) => match resp.json::<Value>().await {
                    Ok(body) => parse_status(&body),
                    Err(e) => RelayStatus::Pending(e.to_string()),
                },
                Err(e) => RelayStatus::Pending(e.to_string()),
            };

            match status {
                RelayStatus::Success => return Ok(()),
                RelayStatus::Failed => {
                    return Err(ModuleError::ConfirmationFailure {
                        tx_hash: tx_hash.to_string(),
                        reason: "relay reported the fill as failed".to_string(),
                    })
                }
                RelayStatus::Pending(state) => {
                    info!(
                        "[W:{:03}] Relay status {} ({}/{})",
                        wallet_number, state, attempt, max_checks
                    );
                }
            }
            if let Some(wait) = status_wait(attempt, max_checks, delay) {
                tokio::time::sleep(wait).await;
            }
        }

        Err(ModuleError::Timeout {
            tx_hash: Some(tx_hash.to_string()),
            waited_secs: delay.as_secs() * u64::from(max_checks.saturating_sub(1)),
        })
    }

    async fn bridge(
        &self,
        wallet: &WalletRecord,
        destination: &Network,
        amount: &AmountPolicy,
        wallet_number: u64,
    ) -> Result<Option<String>, ModuleError> {
        let client = build_http_client(wallet.proxy.as_ref())?;

        if !self.route_enabled(&client, destination).await? {
            return Err(ModuleError::build(format!(
                "bridge to {} unavailable",
                destination.name
            )));
        }

        let user = self.executor.signer(wallet)?.address();
        let balance = self
            .executor
            .provider(wallet.proxy.as_ref())?
            .get_balance(user, None)
            .await
            .map_err(ModuleError::build)?;
        let value = balance_share(balance, amount, &mut rand::thread_rng());
        if value.is_zero() {
            return Err(ModuleError::build("nothing to bridge"));
        }

        info!(
            "[W:{:03}] Bridging {} ETH to {}",
            wallet_number,
            format_ether(value),
            destination.name
        );

        let quote = self.quote(&client, user, destination, value).await?;
        let call = TxCall::new(quote.to, quote.data).with_value(quote.value);
        let tx_hash = self.executor.execute(wallet, call).await?;

        self.monitor(&client, &quote.request_id, &tx_hash, wallet_number)
            .await?;
        Ok(Some(tx_hash))
    }
}

#[async_trait]
impl ModuleAdapter for RelayBridgeModule {
    fn name(&self) -> &str {
        "Relay"
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Bridge
    }

    async fn available_destinations(
        &self,
        wallet_number: u64,
        proxy: Option<&ProxyConfig>,
    ) -> Vec<Network> {
        match self.fetch_chains(proxy).await {
            Ok(chains) => chains,
            Err(e) => {
                warn!("[W:{:03}] {}", wallet_number, e);
                Vec::new()
            }
        }
    }

    async fn process_transaction(
        &self,
        wallet: &WalletRecord,
        destination: &Network,
        amount: &AmountPolicy,
        wallet_number: u64,
    ) -> ModuleInvocationResult {
        let outcome = self.bridge(wallet, destination, amount, wallet_number).await;
        ModuleInvocationResult::from_outcome(self.name(), outcome)
    }
}
