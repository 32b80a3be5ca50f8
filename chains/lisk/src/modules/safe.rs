use crate::config::SafeSettings;
use crate::utils::{EvmExecutor, TxCall};
use async_trait::async_trait;
use core_logic::{
    AmountPolicy, ModuleAdapter, ModuleError, ModuleInvocationResult, ModuleKind, Network,
    ProxyConfig, WalletRecord,
};
use ethers::abi::{self, Token};
use ethers::prelude::*;
use rand::Rng;
use std::sync::Arc;
use tracing::info;

pub const SAFE_PROXY_FACTORY: &str = "0x4e1dcf7ad4e460cfd30791ccc4f9c8a4f820ec67";
pub const SAFE_SINGLETON: &str = "0x41675C099F32341bf84BFc5382aF534df5C7461a";
pub const SAFE_TO_L2_SETUP: &str = "0xbd89a1ce4dde368ffab0ec35506eece0b1ffdc54";
pub const SAFE_L2_SINGLETON: &str = "0x29fcb43b46531bca003ddc8fcb67ffe91900c762";
pub const SAFE_FALLBACK_HANDLER: &str = "0xfd0732dc9e303f09fcef3a7388ad10a83459ec99";

/// `setup(address[],uint256,address,bytes,address,address,uint256,address)`
const SETUP_SELECTOR: [u8; 4] = [0xb6, 0x3e, 0x80, 0x0d];
/// `setupToL2(address)`
const SETUP_TO_L2_SELECTOR: [u8; 4] = [0xfe, 0x51, 0xf6, 0x43];

const FACTORY_ABI: &str = r#"[
    {"type":"function","name":"createProxyWithNonce","stateMutability":"nonpayable","inputs":[{"name":"_singleton","type":"address"},{"name":"initializer","type":"bytes"},{"name":"saltNonce","type":"uint256"}],"outputs":[{"name":"proxy","type":"address"}]}
]"#;

fn parse_address(raw: &str) -> Result<Address, ModuleError> {
    raw.parse()
        .map_err(|e| ModuleError::build(format!("bad address {}: {}", raw, e)))
}

/// Initializer for a 1-of-1 Safe owned by `owner`, migrated to the L2
/// singleton during setup.
pub fn setup_initializer(owner: Address) -> Result<Bytes, ModuleError> {
    let mut to_l2 = SETUP_TO_L2_SELECTOR.to_vec();
    to_l2.extend(abi::encode(&[Token::Address(parse_address(SAFE_L2_SINGLETON)?)]));

    let params = abi::encode(&[
        Token::Array(vec![Token::Address(owner)]),
        Token::Uint(U256::one()),
        Token::Address(parse_address(SAFE_TO_L2_SETUP)?),
        Token::Bytes(to_l2),
        Token::Address(parse_address(SAFE_FALLBACK_HANDLER)?),
        Token::Address(Address::zero()),
        Token::Uint(U256::zero()),
        Token::Address(Address::zero()),
    ]);

    let mut initializer = SETUP_SELECTOR.to_vec();
    initializer.extend(params);
    Ok(initializer.into())
}

/// Deploys a fresh Safe proxy for the wallet with a random salt.
pub struct SafeModule {
    executor: Arc<EvmExecutor>,
    source: Network,
    factory: Address,
    base: BaseContract,
    settings: SafeSettings,
}

impl SafeModule {
    pub fn new(
        executor: Arc<EvmExecutor>,
        source: Network,
        settings: SafeSettings,
    ) -> anyhow::Result<Self> {
        let abi: abi::Abi = serde_json::from_str(FACTORY_ABI)?;
        Ok(Self {
            executor,
            source,
            factory: SAFE_PROXY_FACTORY.parse()?,
            base: BaseContract::from(abi),
            settings,
        })
    }

    async fn deploy(
        &self,
        wallet: &WalletRecord,
        wallet_number: u64,
    ) -> Result<Option<String>, ModuleError> {
        let owner = self.executor.signer(wallet)?.address();
        let salt = rand::thread_rng()
            .gen_range(self.settings.min_salt_nonce..=self.settings.max_salt_nonce);
        info!("[W:{:03}] Creating Safe with salt {}", wallet_number, salt);

        let data = self
            .base
            .encode(
                "createProxyWithNonce",
                (
                    parse_address(SAFE_SINGLETON)?,
                    setup_initializer(owner)?,
                    U256::from(salt),
                ),
            )
            .map_err(ModuleError::build)?;

        self.executor
            .execute(wallet, TxCall::new(self.factory, data))
            .await
            .map(Some)
    }
}

#[async_trait]
impl ModuleAdapter for SafeModule {
    fn name(&self) -> &str {
        "Safe"
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
        let outcome = self.deploy(wallet, wallet_number).await;
        ModuleInvocationResult::from_outcome(self.name(), outcome)
    }
}
