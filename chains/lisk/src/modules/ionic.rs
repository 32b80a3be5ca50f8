use crate::config::{IonicMarket, IonicSettings};
use crate::utils::{balance_share, EvmExecutor, TxCall};
use async_trait::async_trait;
use core_logic::{
    AmountPolicy, ModuleAdapter, ModuleError, ModuleInvocationResult, ModuleKind, Network,
    ProxyConfig, WalletRecord,
};
use ethers::prelude::*;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::{debug, info};

const ERC20_ABI: &str = r#"[
    {"type":"function","name":"balanceOf","stateMutability":"view","inputs":[{"name":"account","type":"address"}],"outputs":[{"name":"","type":"uint256"}]},
    {"type":"function","name":"decimals","stateMutability":"view","inputs":[],"outputs":[{"name":"","type":"uint8"}]},
    {"type":"function","name":"allowance","stateMutability":"view","inputs":[{"name":"owner","type":"address"},{"name":"spender","type":"address"}],"outputs":[{"name":"","type":"uint256"}]},
    {"type":"function","name":"approve","stateMutability":"nonpayable","inputs":[{"name":"spender","type":"address"},{"name":"amount","type":"uint256"}],"outputs":[{"name":"","type":"bool"}]}
]"#;

const MARKET_ABI: &str = r#"[
    {"type":"function","name":"mint","stateMutability":"nonpayable","inputs":[{"name":"mintAmount","type":"uint256"}],"outputs":[{"name":"","type":"uint256"}]}
]"#;

/// Whether `balance` (raw units) reaches `min_balance` whole tokens.
pub fn meets_minimum(balance: U256, min_balance: f64, decimals: u8) -> bool {
    let scaled = (min_balance * 10f64.powi(i32::from(decimals))).round();
    let floor = if scaled >= u128::MAX as f64 {
        U256::from(u128::MAX)
    } else {
        U256::from(scaled.max(0.0) as u128)
    };
    !balance.is_zero() && balance >= floor
}

/// Allowance to grant before supplying `amount`: twice the amount, or
/// nothing when the current allowance already covers it.
pub fn approval_needed(allowance: U256, amount: U256) -> Option<U256> {
    (allowance < amount).then(|| amount.saturating_mul(U256::from(2u64)))
}

struct Holding<'a> {
    market: &'a IonicMarket,
    token: Address,
    pool: Address,
    balance: U256,
    decimals: u8,
}

/// Supplies a share of an ERC-20 balance to an Ionic lending market.
pub struct IonicModule {
    executor: Arc<EvmExecutor>,
    source: Network,
    erc20: abi::Abi,
    market: BaseContract,
    settings: IonicSettings,
}

impl IonicModule {
    pub fn new(
        executor: Arc<EvmExecutor>,
        source: Network,
        settings: IonicSettings,
    ) -> anyhow::Result<Self> {
        let market: abi::Abi = serde_json::from_str(MARKET_ABI)?;
        for m in &settings.markets {
            m.token.parse::<Address>()?;
            m.market.parse::<Address>()?;
        }
        Ok(Self {
            executor,
            source,
            erc20: serde_json::from_str(ERC20_ABI)?,
            market: BaseContract::from(market),
            settings,
        })
    }

    fn token_contract(
        &self,
        token: Address,
        provider: Arc<Provider<Http>>,
    ) -> Contract<Provider<Http>> {
        Contract::new(token, self.erc20.clone(), provider)
    }

    async fn holdings(
        &self,
        owner: Address,
        provider: Arc<Provider<Http>>,
        wallet_number: u64,
    ) -> Result<Vec<Holding<'_>>, ModuleError> {
        let mut held = Vec::new();
        for market in &self.settings.markets {
            let token: Address = market.token.parse().map_err(ModuleError::build)?;
            let pool: Address = market.market.parse().map_err(ModuleError::build)?;
            let contract = self.token_contract(token, provider.clone());

            let balance: U256 = contract
                .method::<_, U256>("balanceOf", owner)
                .map_err(ModuleError::build)?
                .call()
                .await
                .map_err(|e| ModuleError::build(format!("{} balance check failed: {}", market.symbol, e)))?;
            let decimals: u8 = contract
                .method::<_, u8>("decimals", ())
                .map_err(ModuleError::build)?
                .call()
                .await
                .map_err(ModuleError::build)?;

            debug!(
                "[W:{:03}] {} balance {}",
                wallet_number,
                market.symbol,
                ethers::utils::format_units(balance, u32::from(decimals))
                    .unwrap_or_else(|_| balance.to_string())
            );
            if meets_minimum(balance, market.min_balance, decimals) {
                held.push(Holding {
                    market,
                    token,
                    pool,
                    balance,
                    decimals,
                });
            }
        }
        Ok(held)
    }

    async fn supply(
        &self,
        wallet: &WalletRecord,
        amount: &AmountPolicy,
        wallet_number: u64,
        sent: &mut Option<String>,
    ) -> Result<(), ModuleError> {
        let owner = self.executor.signer(wallet)?.address();
        let provider = Arc::new(self.executor.provider(wallet.proxy.as_ref())?);

        let held = self.holdings(owner, provider.clone(), wallet_number).await?;
        let holding = held
            .choose(&mut rand::thread_rng())
            .ok_or_else(|| ModuleError::build("no tokens available for supply"))?;

        let value = balance_share(holding.balance, amount, &mut rand::thread_rng());
        if value.is_zero() {
            return Err(ModuleError::build("supply amount rounds to zero"));
        }

        let token = self.token_contract(holding.token, provider);
        let allowance: U256 = token
            .method::<_, U256>("allowance", (owner, holding.pool))
            .map_err(ModuleError::build)?
            .call()
            .await
            .map_err(ModuleError::build)?;

        if let Some(grant) = approval_needed(allowance, value) {
            info!(
                "[W:{:03}] Approving {} for Ionic",
                wallet_number, holding.market.symbol
            );
            let data = token
                .encode("approve", (holding.pool, grant))
                .map_err(ModuleError::build)?;
            *sent = Some(
                self.executor
                    .execute(wallet, TxCall::new(holding.token, data))
                    .await?,
            );
        }

        info!(
            "[W:{:03}] Supplying {} {} to Ionic",
            wallet_number,
            ethers::utils::format_units(value, u32::from(holding.decimals))
                .unwrap_or_else(|_| value.to_string()),
            holding.market.symbol
        );
        let data = self
            .market
            .encode("mint", value)
            .map_err(ModuleError::build)?;
        *sent = Some(
            self.executor
                .execute(wallet, TxCall::new(holding.pool, data))
                .await?,
        );
        Ok(())
    }
}

#[async_trait]
impl ModuleAdapter for IonicModule {
    fn name(&self) -> &str {
        "Ionic"
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
        amount: &AmountPolicy,
        wallet_number: u64,
    ) -> ModuleInvocationResult {
        let mut sent = None;
        let outcome = self.supply(wallet, amount, wallet_number, &mut sent).await;
        ModuleInvocationResult::from_sequence(self.name(), sent, outcome)
    }
}
