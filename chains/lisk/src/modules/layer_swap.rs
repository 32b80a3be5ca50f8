use crate::config::{LayerSwapDestination, LayerSwapSettings, NATIVE_TOKEN};
use crate::utils::{balance_share, build_http_client, format_ether, to_ether, EvmExecutor, TxCall};
use async_trait::async_trait;
use core_logic::{
    AmountPolicy, ModuleAdapter, ModuleError, ModuleInvocationResult, ModuleKind, Network,
    ProxyConfig, WalletRecord,
};
use ethers::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

const API_KEY_HEADER: &str = "X-LS-APIKEY";

/// Deposit a prepared swap asks us to send.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSwapDeposit {
    pub to: Address,
    pub data: Bytes,
}

/// `available_routes` answers with a non-empty `data` when a route exists.
pub fn route_available(body: &Value) -> bool {
    match body.get("data") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(_) => true,
    }
}

/// Whether `amount` ether lies within the quoted `[min_amount, max_amount]`.
pub fn within_limits(body: &Value, amount: f64) -> bool {
    let Some(data) = body.get("data") else {
        return false;
    };
    let min = data.get("min_amount").and_then(Value::as_f64).unwrap_or(0.0);
    let max = data
        .get("max_amount")
        .and_then(Value::as_f64)
        .unwrap_or(f64::INFINITY);
    min <= amount && amount <= max
}

pub fn parse_swap_id(body: &Value) -> Result<String, ModuleError> {
    body.pointer("/data/swap_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ModuleError::build(format!("swap not created: {}", error_message(body))))
}

pub fn parse_deposit(body: &Value) -> Result<LayerSwapDeposit, ModuleError> {
    let data = body
        .get("data")
        .ok_or_else(|| ModuleError::build(format!("deposit not prepared: {}", error_message(body))))?;
    let to = data
        .get("to_address")
        .and_then(Value::as_str)
        .ok_or_else(|| ModuleError::build("deposit has no to_address"))?
        .parse()
        .map_err(ModuleError::build)?;
    let calldata = match data.get("data").and_then(Value::as_str) {
        Some(raw) if !raw.is_empty() => raw.parse().map_err(ModuleError::build)?,
        _ => Bytes::default(),
    };
    Ok(LayerSwapDeposit { to, data: calldata })
}

fn error_message(body: &Value) -> String {
    body.pointer("/error/message")
        .and_then(Value::as_str)
        .unwrap_or("unexpected response")
        .to_string()
}

pub fn destination_network(destination: &LayerSwapDestination) -> Network {
    let mut name = destination.name.clone();
    if let Some(first) = name.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    Network {
        id: destination.chain_id,
        name,
        rpc_url: String::new(),
        currency_address: NATIVE_TOKEN.to_string(),
        is_enabled: true,
        supports_deposits: true,
    }
}

/// Bridges native ETH through a LayerSwap deposit.
pub struct LayerSwapModule {
    executor: Arc<EvmExecutor>,
    settings: LayerSwapSettings,
}

impl LayerSwapModule {
    pub fn new(executor: Arc<EvmExecutor>, settings: LayerSwapSettings) -> Self {
        Self { executor, settings }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.settings.api_url.trim_end_matches('/'), path)
    }

    fn with_key(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.settings.api_key.as_deref() {
            Some(key) if !key.is_empty() => request.header(API_KEY_HEADER, key),
            _ => request,
        }
    }

    async fn has_route(
        &self,
        client: &reqwest::Client,
        destination: &LayerSwapDestination,
    ) -> Result<bool, ModuleError> {
        let resp = client
            .get(self.endpoint("available_routes"))
            .query(&[
                ("source", self.settings.source_network.as_str()),
                ("destination", destination.network.as_str()),
                ("sourceAsset", "ETH"),
                ("destinationAsset", "ETH"),
            ])
            .send()
            .await
            .map_err(ModuleError::build)?;
        if !resp.status().is_success() {
            return Ok(false);
        }
        let body: Value = resp.json().await.map_err(ModuleError::build)?;
        Ok(route_available(&body))
    }

    fn route_body(&self, destination: &LayerSwapDestination) -> Value {
        json!({
            "source": self.settings.source_network,
            "source_asset": "ETH",
            "destination": destination.network,
            "destination_asset": "ETH",
            "refuel": false,
        })
    }

    async fn bridge(
        &self,
        wallet: &WalletRecord,
        destination: &Network,
        amount: &AmountPolicy,
        wallet_number: u64,
    ) -> Result<Option<String>, ModuleError> {
        let route = self
            .settings
            .destinations
            .iter()
            .find(|d| d.chain_id == destination.id)
            .ok_or_else(|| {
                ModuleError::build(format!("no LayerSwap network for chain {}", destination.id))
            })?;
        let client = build_http_client(wallet.proxy.as_ref())?;

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
        let amount_eth = to_ether(value);

        let rate: Value = client
            .post(self.endpoint("swap_rate"))
            .json(&self.route_body(route))
            .send()
            .await
            .map_err(ModuleError::build)?
            .json()
            .await
            .map_err(ModuleError::build)?;
        if !within_limits(&rate, amount_eth) {
            return Err(ModuleError::build(format!(
                "bridge amount {} ETH out of limits",
                format_ether(value)
            )));
        }

        let mut swap = self.route_body(route);
        swap["amount"] = json!(amount_eth);
        swap["destination_address"] = json!(format!("{:#x}", user));
        let created: Value = self
            .with_key(client.post(self.endpoint("swaps")))
            .json(&swap)
            .send()
            .await
            .map_err(ModuleError::build)?
            .json()
            .await
            .map_err(ModuleError::build)?;
        let swap_id = parse_swap_id(&created)?;

        let prepared: Value = self
            .with_key(
                client.get(self.endpoint(&format!("swaps/{}/prepare_src_transaction", swap_id))),
            )
            .query(&[("from_address", format!("{:#x}", user))])
            .send()
            .await
            .map_err(ModuleError::build)?
            .json()
            .await
            .map_err(ModuleError::build)?;
        let deposit = parse_deposit(&prepared)?;

        info!(
            "[W:{:03}] Bridging {} ETH to {} via LayerSwap",
            wallet_number,
            format_ether(value),
            destination.name
        );
        let call = TxCall::new(deposit.to, deposit.data).with_value(value);
        self.executor.execute(wallet, call).await.map(Some)
    }
}

#[async_trait]
impl ModuleAdapter for LayerSwapModule {
    fn name(&self) -> &str {
        "LayerSwap"
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Bridge
    }

    async fn available_destinations(
        &self,
        wallet_number: u64,
        proxy: Option<&ProxyConfig>,
    ) -> Vec<Network> {
        let client = match build_http_client(proxy) {
            Ok(client) => client,
            Err(e) => {
                warn!("[W:{:03}] {}", wallet_number, e);
                return Vec::new();
            }
        };

        let source = self.executor.chain_id();
        let mut networks = Vec::new();
        for destination in &self.settings.destinations {
            if destination.chain_id == source
                || destination.network.eq_ignore_ascii_case(&self.settings.source_network)
            {
                continue;
            }
            match self.has_route(&client, destination).await {
                Ok(true) => networks.push(destination_network(destination)),
                Ok(false) => {}
                Err(e) => warn!(
                    "[W:{:03}] LayerSwap route check for {} failed: {}",
                    wallet_number, destination.name, e
                ),
            }
        }
        networks
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
