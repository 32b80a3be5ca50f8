use crate::config::{JumperSettings, NATIVE_TOKEN};
use crate::utils::{
    balance_share, build_http_client, fetch_registry, format_ether, parse_quantity, EvmExecutor,
    RegistryChain, TxCall,
};
use async_trait::async_trait;
use core_logic::{
    AmountPolicy, ModuleAdapter, ModuleError, ModuleInvocationResult, ModuleKind, Network,
    ProxyConfig, WalletRecord,
};
use ethers::prelude::*;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

const INTEGRATOR: &str = "jumper.exchange";
/// Ethereum mainnet is never offered as a destination.
const EXCLUDED_CHAIN: u64 = 1;

/// Chains some LI.FI bridge connects to `source`, in either direction.
pub fn linked_chains(tools: &Value, source: u64) -> BTreeSet<u64> {
    let mut linked = BTreeSet::new();
    let bridges = tools.get("bridges").and_then(Value::as_array);
    for bridge in bridges.into_iter().flatten() {
        let routes = bridge.get("supportedChains").and_then(Value::as_array);
        for route in routes.into_iter().flatten() {
            let from = route.get("fromChainId").and_then(Value::as_u64);
            let to = route.get("toChainId").and_then(Value::as_u64);
            match (from, to) {
                (Some(f), Some(t)) if f == source => {
                    linked.insert(t);
                }
                (Some(f), Some(t)) if t == source => {
                    linked.insert(f);
                }
                _ => {}
            }
        }
    }
    linked.remove(&source);
    linked.remove(&EXCLUDED_CHAIN);
    linked
}

/// Linked chains whose native currency is ETH.
pub fn eth_networks(
    linked: &BTreeSet<u64>,
    registry: &HashMap<u64, RegistryChain>,
    currency_address: &str,
) -> Vec<Network> {
    linked
        .iter()
        .filter_map(|id| registry.get(id))
        .filter(|chain| chain.native_symbol == "ETH")
        .map(|chain| Network {
            id: chain.id,
            name: chain.name.clone(),
            rpc_url: chain.rpc_url.clone(),
            currency_address: currency_address.to_string(),
            is_enabled: true,
            supports_deposits: true,
        })
        .collect()
}

/// First step of the cheapest route.
pub fn first_step(routes: &Value) -> Result<Value, ModuleError> {
    routes
        .pointer("/routes/0/steps/0")
        .cloned()
        .ok_or_else(|| ModuleError::build("no available routes"))
}

/// The transaction LI.FI built for a step. `value` defaults to `fallback`.
pub fn parse_step_transaction(body: &Value, fallback: U256) -> Result<TxCall, ModuleError> {
    let request = body.get("transactionRequest").ok_or_else(|| {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("step has no transaction request");
        ModuleError::build(message)
    })?;

    let to: Address = request
        .get("to")
        .and_then(Value::as_str)
        .ok_or_else(|| ModuleError::build("transaction request has no target"))?
        .parse()
        .map_err(ModuleError::build)?;
    let data: Bytes = request
        .get("data")
        .and_then(Value::as_str)
        .ok_or_else(|| ModuleError::build("transaction request has no data"))?
        .parse()
        .map_err(ModuleError::build)?;
    let value = match request.get("value").and_then(Value::as_str) {
        Some(raw) => parse_quantity(raw)?,
        None => fallback,
    };

    Ok(TxCall::new(to, data).with_value(value))
}

/// Bridges native ETH along the cheapest LI.FI route.
pub struct JumperModule {
    executor: Arc<EvmExecutor>,
    settings: JumperSettings,
}

impl JumperModule {
    pub fn new(executor: Arc<EvmExecutor>, settings: JumperSettings) -> Self {
        Self { executor, settings }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.settings.api_url.trim_end_matches('/'), path)
    }

    async fn discover(&self, proxy: Option<&ProxyConfig>) -> Result<Vec<Network>, ModuleError> {
        let client = build_http_client(proxy)?;
        let tools: Value = client
            .get(&self.settings.tools_url)
            .header("referer", "https://jumper.exchange/")
            .send()
            .await
            .map_err(ModuleError::build)?
            .json()
            .await
            .map_err(ModuleError::build)?;

        let linked = linked_chains(&tools, self.executor.chain_id());
        if linked.is_empty() {
            return Ok(Vec::new());
        }
        let registry = fetch_registry(&client, &self.settings.registry_url).await?;
        Ok(eth_networks(&linked, &registry, &self.settings.to_token))
    }

    async fn bridge(
        &self,
        wallet: &WalletRecord,
        destination: &Network,
        amount: &AmountPolicy,
        wallet_number: u64,
    ) -> Result<Option<String>, ModuleError> {
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

        let request = json!({
            "fromAddress": format!("{:#x}", user),
            "fromAmount": value.to_string(),
            "fromChainId": self.executor.chain_id(),
            "fromTokenAddress": NATIVE_TOKEN,
            "toChainId": destination.id,
            "toTokenAddress": self.settings.to_token,
            "options": {
                "integrator": INTEGRATOR,
                "order": "CHEAPEST",
                "slippage": self.settings.slippage,
                "maxPriceImpact": 0.4,
                "allowSwitchChain": true,
            },
        });
        let routes: Value = client
            .post(self.endpoint("advanced/routes"))
            .header("x-lifi-integrator", INTEGRATOR)
            .json(&request)
            .send()
            .await
            .map_err(ModuleError::build)?
            .json()
            .await
            .map_err(ModuleError::build)?;
        let step = first_step(&routes)
            .map_err(|_| ModuleError::build(format!("no available routes to {}", destination.name)))?;

        let built: Value = client
            .post(self.endpoint("advanced/stepTransaction"))
            .header("x-lifi-integrator", INTEGRATOR)
            .json(&step)
            .send()
            .await
            .map_err(ModuleError::build)?
            .json()
            .await
            .map_err(ModuleError::build)?;
        let call = parse_step_transaction(&built, value)?;

        info!(
            "[W:{:03}] Bridging {} ETH to {} via Jumper",
            wallet_number,
            format_ether(call.value),
            destination.name
        );
        self.executor.execute(wallet, call).await.map(Some)
    }
}

#[async_trait]
impl ModuleAdapter for JumperModule {
    fn name(&self) -> &str {
        "Jumper"
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Bridge
    }

    async fn available_destinations(
        &self,
        wallet_number: u64,
        proxy: Option<&ProxyConfig>,
    ) -> Vec<Network> {
        match self.discover(proxy).await {
            Ok(networks) => networks,
            Err(e) => {
                warn!("[W:{:03}] Jumper discovery failed: {}", wallet_number, e);
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
