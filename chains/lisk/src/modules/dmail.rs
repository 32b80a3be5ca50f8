use crate::config::DmailSettings;
use crate::utils::{EvmExecutor, TxCall};
use async_trait::async_trait;
use core_logic::{
    AmountPolicy, ModuleAdapter, ModuleError, ModuleInvocationResult, ModuleKind, Network,
    ProxyConfig, WalletRecord,
};
use ethers::prelude::*;
use rand::seq::SliceRandom;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::info;

pub const DMAIL_ADDRESS: &str = "0x64812F1212f6276068A0726f4695a6637DA3E4F8";

const DMAIL_ABI: &str = r#"[
    {"type":"function","name":"send_mail","stateMutability":"nonpayable","inputs":[{"name":"to","type":"string"},{"name":"path","type":"string"}],"outputs":[]}
]"#;

const DOMAINS: [&str; 4] = ["gmail.com", "yahoo.com", "outlook.com", "icloud.com"];

const WORDS: [&str; 24] = [
    "river", "orbit", "maple", "signal", "harbor", "lantern", "copper", "meadow", "falcon",
    "ember", "canyon", "velvet", "summit", "glacier", "pepper", "willow", "quartz", "tundra",
    "marble", "cobalt", "saffron", "thunder", "juniper", "atlas",
];

/// Lowercase hex SHA-256 digest, the form the mail contract stores.
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

pub fn random_email<R: Rng + ?Sized>(rng: &mut R) -> String {
    let word = WORDS.choose(rng).copied().unwrap_or("mail");
    let domain = DOMAINS.choose(rng).copied().unwrap_or("gmail.com");
    format!("{}{}@{}", word, rng.gen_range(1..=999_999), domain)
}

pub fn random_text<R: Rng + ?Sized>(rng: &mut R) -> String {
    let len = rng.gen_range(6..=18);
    let mut text = (0..len)
        .filter_map(|_| WORDS.choose(rng).copied())
        .collect::<Vec<_>>()
        .join(" ");
    text.push('.');
    text
}

/// Sends one or more hashed messages through the on-chain mail contract.
pub struct DmailModule {
    executor: Arc<EvmExecutor>,
    source: Network,
    contract: Address,
    base: BaseContract,
    settings: DmailSettings,
}

impl DmailModule {
    pub fn new(
        executor: Arc<EvmExecutor>,
        source: Network,
        settings: DmailSettings,
    ) -> anyhow::Result<Self> {
        let abi: abi::Abi = serde_json::from_str(DMAIL_ABI)?;
        Ok(Self {
            executor,
            source,
            contract: DMAIL_ADDRESS.parse()?,
            base: BaseContract::from(abi),
            settings,
        })
    }

    fn calldata(&self) -> Result<Bytes, ModuleError> {
        let (to, path) = {
            let mut rng = rand::thread_rng();
            (
                sha256_hex(&random_email(&mut rng)),
                sha256_hex(&random_text(&mut rng)),
            )
        };
        self.base
            .encode("send_mail", (to, path))
            .map_err(ModuleError::build)
    }

    /// `sent` tracks the last confirmed message so a later failure still
    /// reports it.
    async fn send_messages(
        &self,
        wallet: &WalletRecord,
        wallet_number: u64,
        sent: &mut Option<String>,
    ) -> Result<(), ModuleError> {
        let count = rand::thread_rng()
            .gen_range(self.settings.min_messages..=self.settings.max_messages);

        for i in 1..=count {
            info!("[W:{:03}] Sending Dmail message {}/{}", wallet_number, i, count);
            let call = TxCall::new(self.contract, self.calldata()?);
            *sent = Some(self.executor.execute(wallet, call).await?);
        }
        Ok(())
    }
}

#[async_trait]
impl ModuleAdapter for DmailModule {
    fn name(&self) -> &str {
        "Dmail"
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Local
    }

    async fn available_destinations(
        &self,
        _wallet_number: u64,
        _proxy: Option<&ProxyConfig>,
    ) -> Vec<Network> {
        vec![self.source.clone()]
    }

    async fn process_transaction(
        &self,
        wallet: &WalletRecord,
        _destination: &Network,
        _amount: &AmountPolicy,
        wallet_number: u64,
    ) -> ModuleInvocationResult {
        let mut sent = None;
        let outcome = self.send_messages(wallet, wallet_number, &mut sent).await;
        ModuleInvocationResult::from_sequence(self.name(), sent, outcome)
    }
}
