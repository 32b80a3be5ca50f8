use lisk_project::config::{LiskConfig, ModuleId};
use std::io::Write;

fn write_config(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

#[test]
fn test_minimal_config_uses_defaults() {
    let file = write_config(
        r#"
rpc_url = "https://rpc.api.lisk.com"
worker_amount = 2
"#,
    );

    let config = LiskConfig::load(file.path().to_str().unwrap()).unwrap();

    assert_eq!(config.chain_id, 1135);
    assert_eq!(config.max_empty_passes, 3);
    assert!(config.weth_unwrap);
    assert_eq!(
        config.enabled_modules,
        vec![
            ModuleId::Dmail,
            ModuleId::Relay,
            ModuleId::Ionic,
            ModuleId::Safe,
            ModuleId::Jumper,
            ModuleId::LayerSwap,
            ModuleId::SuperBridge,
        ]
    );
    assert_eq!(config.ionic.markets.len(), 1);
    assert_eq!(config.superbridge.destinations, vec![8453, 10, 34443, 7777777, 130]);
    assert_eq!(config.relay.max_status_checks, 30);
    assert_eq!(config.orchestrator().source_chain_id, 1135);
    assert_eq!(config.source_network().id, 1135);
}

#[test]
fn test_full_config_round_trips_sections() {
    let file = write_config(
        r#"
rpc_url = "https://rpc.api.lisk.com"
worker_amount = 4
weth_unwrap = false
enabled_modules = ["relay"]

[delays.pre_start]
min = 0.0
max = 0.0
[delays.post_special_module]
min = 1.0
max = 2.0
[delays.between_wallets]
min = 3.0
max = 4.0
[delays.between_transactions]
min = 5.0
max = 6.0
[delays.between_modules]
min = 7.0
max = 8.0

[amounts.relay]
min_pct = 0.1
max_pct = 0.2

[dmail]
min_messages = 2
max_messages = 5
"#,
    );

    let config = LiskConfig::load(file.path().to_str().unwrap()).unwrap();

    assert!(!config.weth_unwrap);
    assert_eq!(config.enabled_modules, vec![ModuleId::Relay]);
    assert_eq!(config.delays.between_modules.max, 8.0);
    assert_eq!(config.dmail.max_messages, 5);

    let relay = config.amounts.for_module("Relay");
    assert_eq!(relay.min_pct, 0.1);
    assert_eq!(relay.max_pct, 0.2);
    assert_eq!(config.amounts.for_module("Dmail"), config.amounts.default);
}

#[test]
fn test_protocol_sections_load() {
    let file = write_config(
        r#"
rpc_url = "https://rpc.api.lisk.com"
worker_amount = 1
enabled_modules = ["ionic", "layerswap", "superbridge", "jumper"]

[[ionic.markets]]
symbol = "USDC"
token = "0xF242275d3a6527d877f2c927a82D9b057609cc71"
market = "0x7682C12F6D1af845479649c77A9E7729F0180D78"
min_balance = 5.0

[layerswap]
api_key = "secret"

[[layerswap.destinations]]
name = "base"
network = "BASE_MAINNET"
chain_id = 8453

[jumper]
slippage = 0.01
"#,
    );

    let config = LiskConfig::load(file.path().to_str().unwrap()).unwrap();

    assert_eq!(
        config.enabled_modules,
        vec![
            ModuleId::Ionic,
            ModuleId::LayerSwap,
            ModuleId::SuperBridge,
            ModuleId::Jumper
        ]
    );
    assert_eq!(config.ionic.markets[0].symbol, "USDC");
    assert_eq!(config.ionic.markets[0].min_balance, 5.0);
    assert_eq!(config.layerswap.api_key.as_deref(), Some("secret"));
    assert_eq!(config.layerswap.destinations.len(), 1);
    assert_eq!(config.layerswap.destinations[0].chain_id, 8453);
    assert_eq!(config.layerswap.source_network, "LISK_MAINNET");
    assert_eq!(config.jumper.slippage, 0.01);
    assert_eq!(config.jumper.api_url, "https://li.quest/v1");
}

#[test]
fn test_invalid_values_are_rejected() {
    let bad_rpc = write_config(
        r#"
rpc_url = "rpc.api.lisk.com"
worker_amount = 1
"#,
    );
    assert!(LiskConfig::load(bad_rpc.path().to_str().unwrap()).is_err());

    let no_workers = write_config(
        r#"
rpc_url = "https://rpc.api.lisk.com"
worker_amount = 0
"#,
    );
    assert!(LiskConfig::load(no_workers.path().to_str().unwrap()).is_err());

    let inverted_delay = write_config(
        r#"
rpc_url = "https://rpc.api.lisk.com"
worker_amount = 1

[delays.pre_start]
min = 10.0
max = 1.0
[delays.post_special_module]
min = 0.0
max = 0.0
[delays.between_wallets]
min = 0.0
max = 0.0
[delays.between_transactions]
min = 0.0
max = 0.0
[delays.between_modules]
min = 0.0
max = 0.0
"#,
    );
    assert!(LiskConfig::load(inverted_delay.path().to_str().unwrap()).is_err());

    let bad_slippage = write_config(
        r#"
rpc_url = "https://rpc.api.lisk.com"
worker_amount = 1

[jumper]
slippage = 1.5
"#,
    );
    assert!(LiskConfig::load(bad_slippage.path().to_str().unwrap()).is_err());
}

#[test]
fn test_missing_file_is_an_error() {
    assert!(LiskConfig::load("/nonexistent/lisk-config.toml").is_err());
}
