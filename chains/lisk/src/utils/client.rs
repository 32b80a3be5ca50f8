use core_logic::{ModuleError, ProxyConfig};
use ethers::prelude::*;
use reqwest::Client;
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client routed through the wallet's proxy, if it has one.
pub fn build_http_client(proxy: Option<&ProxyConfig>) -> Result<Client, ModuleError> {
    let mut client_builder = Client::builder().timeout(HTTP_TIMEOUT);
    if let Some(proxy_conf) = proxy {
        let mut proxy = reqwest::Proxy::all(&proxy_conf.url).map_err(ModuleError::build)?;
        if let (Some(u), Some(p)) = (&proxy_conf.username, &proxy_conf.password) {
            proxy = proxy.basic_auth(u, p);
        }
        client_builder = client_builder.proxy(proxy);
    }
    client_builder.build().map_err(ModuleError::build)
}

pub fn build_provider(
    rpc_url: &str,
    proxy: Option<&ProxyConfig>,
) -> Result<Provider<Http>, ModuleError> {
    let client = build_http_client(proxy)?;
    let url = reqwest::Url::parse(rpc_url).map_err(ModuleError::build)?;
    Ok(Provider::new(Http::new_with_client(url, client)))
}
