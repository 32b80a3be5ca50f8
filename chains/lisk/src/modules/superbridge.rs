use crate::config::{SuperBridgeSettings, NATIVE_TOKEN};
use crate::utils::{
    balance_share, build_http_client, build_provider, fetch_registry, format_ether,
    parse_quantity, EvmExecutor, GasManager, RegistryChain, TxCall,
};
use async_trait::async_trait;
use core_logic::{
    AmountPolicy, ModuleAdapter, ModuleError, ModuleInvocationResult, ModuleKind, Network,
    ProxyConfig, WalletRecord,
};
use ethers::prelude::*;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

const ROUTES_PATH: &str = "api/v2/bridge/routes";

/// First route's initiating transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct SuperBridgeRoute {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas_estimate: Option<U256>,
}

/// Registry entries for the chains SuperBridge serves, in `ids` order.
pub fn supported_networks(registry: &HashMap<u64, RegistryChain>, ids: &[u64]) -> Vec<Network> {
    ids.iter()
        .filter_map(|id| registry.get(id))
        .map(|chain| Network {
            id: chain.id,
            name: chain.name.clone(),
            rpc_url: chain.rpc_url.clone(),
            currency_address: NATIVE_TOKEN.to_string(),
            is_enabled: true,
            supports_deposits: true,
        })
        .collect()
}

pub fn parse_route(body: &Value) -> Result<SuperBridgeRoute, ModuleError> {
    if body.to_string().contains("AmountTooSmall") {
        return Err(ModuleError::build("amount too small for SuperBridge"));
    }

    let result = body
        .pointer("/results/0/result")
        .ok_or_else(|| ModuleError::build("no bridge routes available"))?;
    let tx = result
        .get("initiatingTransaction")
        .ok_or_else(|| ModuleError::build("route has no initiating transaction"))?;

    let field = |name: &str| {
        tx.get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| ModuleError::build(format!("initiating transaction has no {}", name)))
    };

    let gas_estimate = match result.pointer("/steps/0/estimatedGasLimit") {
        Some(Value::Number(n)) => n.as_u64().map(U256::from),
        Some(Value::String(s)) => Some(parse_quantity(s)?),
        _ => None,
    };

    Ok(SuperBridgeRoute {
        to: field("to")?.parse().map_err(ModuleError::build)?,
        data: field("data")?.parse().map_err(ModuleError::build)?,
        value: match tx.get("value") {
            Some(Value::String(s)) => parse_quantity(s)?,
            Some(Value::Number(n)) => n.as_u64().map(U256::from).unwrap_or_default(),
            _ => U256::zero(),
        },
        gas_estimate,
    })
}

/// Bridges native ETH over the OP-stack routes SuperBridge quotes.
pub struct SuperBridgeModule {
    executor: Arc<EvmExecutor>,
    settings: SuperBridgeSettings,
}

impl SuperBridgeModule {
    pub fn new(executor: Arc<EvmExecutor>, settings: SuperBridgeSettings) -> Self {
        Self { executor, settings }
    }

    async fn destination_gas_price(&self, destination: &Network, proxy: Option<&ProxyConfig>) -> U256 {
        let fallback = U256::from(self.settings.fallback_gas_price);
        if destination.rpc_url.is_empty() {
            return fallback;
        }
        let price = match build_provider(&destination.rpc_url, proxy) {
            Ok(provider) => provider.get_gas_price().await.map_err(ModuleError::build),
            Err(e) => Err(e),
        };
        price.unwrap_or_else(|e| {
            debug!("{} gas price unavailable: {}", destination.name, e);
            fallback
        })
    }

    async fn bridge(
        &self,
        wallet: &WalletRecord,
        destination: &Network,
        amount: &AmountPolicy,
        wallet_number: u64,
    ) -> Result<Option<String>, ModuleError> {
        let proxy = wallet.proxy.as_ref();
        let client = build_http_client(proxy)?;
        let provider = self.executor.provider(proxy)?;

        let user = self.executor.signer(wallet)?.address();
        let balance = provider
            .get_balance(user, None)
            .await
            .map_err(ModuleError::build)?;
        let value = balance_share(balance, amount, &mut rand::thread_rng());
        if value.is_zero() {
            return Err(ModuleError::build("nothing to bridge"));
        }

        let from_gas_price = provider.get_gas_price().await.map_err(ModuleError::build)?;
        let to_gas_price = self.destination_gas_price(destination, proxy).await;
        let user = format!("{:#x}", user);
        let payload = json!({
            "host": "superbridge.app",
            "amount": value.to_string(),
            "fromChainId": self.executor.chain_id().to_string(),
            "toChainId": destination.id.to_string(),
            "fromTokenAddress": NATIVE_TOKEN,
            "toTokenAddress": NATIVE_TOKEN,
            "fromTokenDecimals": 18,
            "toTokenDecimals": 18,
            "fromGasPrice": from_gas_price.to_string(),
            "toGasPrice": to_gas_price.to_string(),
            "graffiti": "superbridge",
            "recipient": user,
            "sender": user,
            "forceViaL1": false,
        });

        let resp = client
            .post(format!(
                "{}/{}",
                self.settings.api_url.trim_end_matches('/'),
                ROUTES_PATH
            ))
            .header("origin", "https://superbridge.app")
            .header("referer", "https://superbridge.app/")
            .json(&payload)
            .send()
            .await
            .map_err(ModuleError::build)?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ModuleError::build(format!(
                "route request failed ({}): {}",
                status, text
            )));
        }
        let body: Value = resp.json().await.map_err(ModuleError::build)?;
        let route = parse_route(&body)?;

        info!(
            "[W:{:03}] Bridging {} ETH to {} via SuperBridge",
            wallet_number,
            format_ether(route.value),
            destination.name
        );
        let mut call = TxCall::new(route.to, route.data).with_value(route.value);
        if let Some(estimate) = route.gas_estimate {
            call = call.with_gas_limit(GasManager::new().buffered_limit(estimate));
        }
        self.executor.execute(wallet, call).await.map(Some)
    }
}

#[async_trait]
impl ModuleAdapter for SuperBridgeModule {
    fn name(&self) -> &str {
        "SuperBridge"
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Bridge
    }

    async fn available_destinations(
        &self,
        wallet_number: u64,
        proxy: Option<&ProxyConfig>,
    ) -> Vec<Network> {
        let registry = match build_http_client(proxy) {
            Ok(client) => fetch_registry(&client, &self.settings.registry_url).await,
            Err(e) => Err(e),
        };
        match registry {
            Ok(registry) => supported_networks(&registry, &self.settings.destinations)
                .into_iter()
                .filter(|n| n.is_eligible(self.kind(), self.executor.chain_id()))
                .collect(),
            Err(e) => {
                warn!("[W:{:03}] SuperBridge discovery failed: {}", wallet_number, e);
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
