use crate::utils::{EvmExecutor, GasManager, TxCall};
use async_trait::async_trait;
use core_logic::{
    AmountPolicy, ModuleAdapter, ModuleError, ModuleInvocationResult, ModuleKind, Network,
    ProxyConfig, WalletRecord,
};
use ethers::prelude::*;
use std::sync::Arc;
use tracing::info;

pub const WETH_ADDRESS: &str = "0x4200000000000000000000000000000000000006";

const WETH_ABI: &str = r#"[
    {"type":"function","name":"withdraw","stateMutability":"nonpayable","inputs":[{"name":"wad","type":"uint256"}],"outputs":[]},
    {"type":"function","name":"balanceOf","stateMutability":"view","inputs":[{"name":"owner","type":"address"}],"outputs":[{"name":"","type":"uint256"}]}
]"#;

/// Unwraps the whole WETH balance back to ETH. Runs once per wallet before
/// the main loop; a zero balance is a successful no-op.
pub struct WethModule {
    executor: Arc<EvmExecutor>,
    source: Network,
    contract: Address,
    abi: abi::Abi,
}

impl WethModule {
    pub fn new(executor: Arc<EvmExecutor>, source: Network) -> anyhow::Result<Self> {
        Ok(Self {
            executor,
            source,
            contract: WETH_ADDRESS.parse()?,
            abi: serde_json::from_str(WETH_ABI)?,
        })
    }

    async fn unwrap_all(
        &self,
        wallet: &WalletRecord,
        wallet_number: u64,
    ) -> Result<Option<String>, ModuleError> {
        let owner = self.executor.signer(wallet)?.address();
        let provider = Arc::new(self.executor.provider(wallet.proxy.as_ref())?);
        let contract = Contract::new(self.contract, self.abi.clone(), provider);

        let balance: U256 = contract
            .method::<_, U256>("balanceOf", owner)
            .map_err(ModuleError::build)?
            .call()
            .await
            .map_err(|e| ModuleError::build(format!("WETH balance check failed: {}", e)))?;

        if balance.is_zero() {
            info!("[W:{:03}] No WETH to unwrap", wallet_number);
            return Ok(None);
        }

        let amount = ethers::utils::format_units(balance, "ether")
            .unwrap_or_else(|_| balance.to_string());
        info!("[W:{:03}] Unwrapping {} WETH", wallet_number, amount);

        let data = contract
            .encode("withdraw", balance)
            .map_err(ModuleError::build)?;
        let call =
            TxCall::new(self.contract, data).with_gas_limit(GasManager::LIMIT_WETH_WITHDRAW);
        self.executor.execute(wallet, call).await.map(Some)
    }
}

#[async_trait]
impl ModuleAdapter for WethModule {
    fn name(&self) -> &str {
        "Weth"
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
        let outcome = self.unwrap_all(wallet, wallet_number).await;
        ModuleInvocationResult::from_outcome(self.name(), outcome)
    }
}
