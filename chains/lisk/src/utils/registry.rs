use core_logic::ModuleError;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

pub const CHAIN_REGISTRY_URL: &str = "https://chainid.network/chains.json";

/// One entry of the public chain registry, reduced to what discovery needs.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryChain {
    pub id: u64,
    pub name: String,
    /// First RPC endpoint that needs no API key, or empty.
    pub rpc_url: String,
    pub native_symbol: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryEntry {
    chain_id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    rpc: Vec<String>,
    #[serde(default)]
    native_currency: Option<NativeCurrency>,
}

#[derive(Debug, Deserialize)]
struct NativeCurrency {
    #[serde(default)]
    symbol: String,
}

/// Registry entries keyed by chain id. Malformed entries are skipped.
pub fn parse_registry(body: &str) -> Result<HashMap<u64, RegistryChain>, ModuleError> {
    let entries: Vec<Value> = serde_json::from_str(body)
        .map_err(|e| ModuleError::build(format!("unexpected chain registry: {}", e)))?;

    Ok(entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value::<RegistryEntry>(entry).ok())
        .map(|entry| {
            let rpc_url = entry
                .rpc
                .iter()
                .find(|url| url.starts_with("http") && !url.contains("${"))
                .cloned()
                .unwrap_or_default();
            let chain = RegistryChain {
                id: entry.chain_id,
                name: entry.name,
                rpc_url,
                native_symbol: entry.native_currency.map(|c| c.symbol).unwrap_or_default(),
            };
            (chain.id, chain)
        })
        .collect())
}

pub async fn fetch_registry(
    client: &Client,
    url: &str,
) -> Result<HashMap<u64, RegistryChain>, ModuleError> {
    let body = client
        .get(url)
        .send()
        .await
        .map_err(|e| ModuleError::build(format!("chain registry unreachable: {}", e)))?
        .text()
        .await
        .map_err(ModuleError::build)?;
    parse_registry(&body)
}
