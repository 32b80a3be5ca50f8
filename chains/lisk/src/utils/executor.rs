use crate::utils::client::build_provider;
use crate::utils::gas::GasManager;
use core_logic::{ModuleError, NonceAllocator, ProxyConfig, WalletRecord};
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// One contract call to sign and send.
#[derive(Debug, Clone)]
pub struct TxCall {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    /// Fixed limit; estimated and buffered when absent.
    pub gas_limit: Option<U256>,
}

impl TxCall {
    pub fn new(to: Address, data: Bytes) -> Self {
        Self {
            to,
            data,
            value: U256::zero(),
            gas_limit: None,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_gas_limit(mut self, limit: U256) -> Self {
        self.gas_limit = Some(limit);
        self
    }
}

/// Signs, sends and confirms transactions on the source chain.
///
/// Nonces come from a shared [`NonceAllocator`]: reserved before the
/// transaction is built, released if it never reaches the network and
/// committed once the node accepts it.
pub struct EvmExecutor {
    rpc_url: String,
    chain_id: u64,
    nonces: Arc<NonceAllocator>,
    gas: GasManager,
    confirmation_timeout: Duration,
}

impl EvmExecutor {
    pub fn new(
        rpc_url: impl Into<String>,
        chain_id: u64,
        nonces: Arc<NonceAllocator>,
        gas: GasManager,
        confirmation_timeout: Duration,
    ) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            chain_id,
            nonces,
            gas,
            confirmation_timeout,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn provider(&self, proxy: Option<&ProxyConfig>) -> Result<Provider<Http>, ModuleError> {
        build_provider(&self.rpc_url, proxy)
    }

    pub fn signer(&self, wallet: &WalletRecord) -> Result<LocalWallet, ModuleError> {
        let signer = wallet
            .private_key()
            .trim()
            .parse::<LocalWallet>()
            .map_err(|e| ModuleError::build(format!("invalid private key: {}", e)))?
            .with_chain_id(self.chain_id);

        if !format!("{:#x}", signer.address()).eq_ignore_ascii_case(wallet.address.trim()) {
            warn!(
                "Key for {} derives {:#x}; using the derived address",
                wallet.short_address(),
                signer.address()
            );
        }
        Ok(signer)
    }

    /// Runs the full lifecycle and returns the confirmed transaction hash.
    pub async fn execute(
        &self,
        wallet: &WalletRecord,
        call: TxCall,
    ) -> Result<String, ModuleError> {
        let signer = self.signer(wallet)?;
        let from = signer.address();
        let key = format!("{:#x}", from);
        let client = SignerMiddleware::new(self.provider(wallet.proxy.as_ref())?, signer);

        let rpc = &client;
        let nonce = self
            .nonces
            .reserve_or_seed(&key, move || async move {
                rpc.get_transaction_count(from, Some(BlockNumber::Pending.into()))
                    .await
                    .map(|n| n.as_u64())
            })
            .await?;
        debug!("Reserved nonce {} for {}", nonce, key);

        let tx_hash = match self.broadcast(&client, from, &call, nonce).await {
            Ok(hash) => hash,
            Err(e) => {
                self.nonces.release(&key, nonce)?;
                if is_nonce_conflict(&e) {
                    // Chain moved on without us; re-read it next time.
                    self.nonces.forget(&key);
                }
                return Err(e);
            }
        };
        self.nonces.commit(&key, nonce)?;

        self.confirm(&client, tx_hash).await
    }

    async fn broadcast(
        &self,
        client: &SignerClient,
        from: Address,
        call: &TxCall,
        nonce: u64,
    ) -> Result<TxHash, ModuleError> {
        let mut tx: TypedTransaction = TransactionRequest::new()
            .from(from)
            .to(call.to)
            .data(call.data.clone())
            .value(call.value)
            .nonce(nonce)
            .chain_id(self.chain_id)
            .into();

        let gas_price = self.gas.gas_price(client).await?;
        tx.set_gas_price(gas_price);

        let gas_limit = match call.gas_limit {
            Some(limit) => limit,
            None => {
                let estimate = client
                    .estimate_gas(&tx, None)
                    .await
                    .map_err(|e| ModuleError::build(format!("gas estimation failed: {}", e)))?;
                self.gas.buffered_limit(estimate)
            }
        };
        tx.set_gas(gas_limit);

        let pending = client
            .send_transaction(tx, None)
            .await
            .map_err(ModuleError::broadcast)?;
        Ok(pending.tx_hash())
    }

    async fn confirm(&self, client: &SignerClient, tx_hash: TxHash) -> Result<String, ModuleError> {
        let hash = format!("{:#x}", tx_hash);
        let pending = PendingTransaction::new(tx_hash, client.provider());

        match timeout(self.confirmation_timeout, pending).await {
            Err(_) => Err(ModuleError::Timeout {
                tx_hash: Some(hash),
                waited_secs: self.confirmation_timeout.as_secs(),
            }),
            Ok(Err(e)) => Err(ModuleError::ConfirmationFailure {
                tx_hash: hash,
                reason: e.to_string(),
            }),
            Ok(Ok(None)) => Err(ModuleError::ConfirmationFailure {
                tx_hash: hash,
                reason: "dropped from mempool".to_string(),
            }),
            Ok(Ok(Some(receipt))) if receipt.status == Some(U64::from(1)) => Ok(hash),
            Ok(Ok(Some(_))) => Err(ModuleError::ConfirmationFailure {
                tx_hash: hash,
                reason: "reverted".to_string(),
            }),
        }
    }
}

fn is_nonce_conflict(err: &ModuleError) -> bool {
    match err {
        ModuleError::BroadcastFailure { reason } => {
            let reason = reason.to_ascii_lowercase();
            reason.contains("nonce too low")
                || reason.contains("already known")
                || reason.contains("replacement transaction underpriced")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_conflicts_are_detected() {
        assert!(is_nonce_conflict(&ModuleError::broadcast(
            "(code: -32000, message: nonce too low, data: None)"
        )));
        assert!(!is_nonce_conflict(&ModuleError::broadcast("insufficient funds")));
        assert!(!is_nonce_conflict(&ModuleError::build("nonce too low")));
    }

    #[test]
    fn test_tx_call_defaults() {
        let call = TxCall::new(Address::zero(), Bytes::default());
        assert_eq!(call.value, U256::zero());
        assert!(call.gas_limit.is_none());

        let call = call.with_gas_limit(U256::from(21_000u64));
        assert_eq!(call.gas_limit, Some(U256::from(21_000u64)));
    }
}
