//! L1 transport over JSON-RPC (ethers).
//!
//! One provider per chain id, created on first use and shared for the life of the process.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::{Bytes, B256};
use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, MiddlewareError, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Bytes as EthersBytes, TransactionRequest, H160, U256 as EthersU256, U64};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::errors::{Result, SxError};
use crate::network::NetworkConfig;
use crate::provider::{with_read_retry, EvmProvider, EvmTransaction, Receipt, RetryPolicy};
use crate::signer::EthWallet;

static POOL: Lazy<Mutex<HashMap<u64, Arc<EthersEvmProvider>>>> = Lazy::new(Default::default);

/// Shared provider for `chain_id`; the first caller's `url` wins.
pub fn evm_provider(chain_id: u64, url: &str) -> Result<Arc<EthersEvmProvider>> {
    let mut pool = POOL.lock();
    if let Some(provider) = pool.get(&chain_id) {
        return Ok(provider.clone());
    }
    let provider = Arc::new(EthersEvmProvider::connect(chain_id, url)?);
    info!(chain_id, url, "registered L1 provider");
    pool.insert(chain_id, provider.clone());
    Ok(provider)
}

/// Shared provider for the network's L1.
pub fn l1_provider(network: &NetworkConfig) -> Result<Arc<EthersEvmProvider>> {
    let url = network.l1.rpc_url.as_deref().ok_or_else(|| {
        SxError::Configuration(format!("no L1 rpc url configured for {}", network.name))
    })?;
    evm_provider(network.l1.chain_id, url)
}

pub struct EthersEvmProvider {
    provider: Provider<Http>,
    chain_id: u64,
    retry: RetryPolicy,
}

impl EthersEvmProvider {
    pub fn connect(chain_id: u64, url: &str) -> Result<Self> {
        let provider = Provider::<Http>::try_from(url)
            .map_err(|e| SxError::Configuration(format!("invalid rpc url {url}: {e}")))?;
        Ok(EthersEvmProvider { provider, chain_id, retry: RetryPolicy::default() })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

fn request(tx: &EvmTransaction) -> TransactionRequest {
    TransactionRequest::new()
        .to(H160::from_slice(tx.to.as_slice()))
        .data(EthersBytes::from(tx.data.to_vec()))
        .value(EthersU256::from_big_endian(&tx.value.to_be_bytes::<32>()))
}

/// Map node errors: JSON-RPC reverts become `ExecutionReverted`, everything else `Transport`.
fn classify<E: MiddlewareError>(err: E) -> SxError {
    if let Some(response) = err.as_error_response() {
        if response.code == 3 || response.message.contains("revert") {
            return SxError::reverted(response.message.clone());
        }
    }
    SxError::Transport(err.to_string())
}

#[async_trait]
impl EvmProvider for EthersEvmProvider {
    async fn chain_id(&self) -> Result<u64> {
        with_read_retry(self.retry, "eth_chainId", || async {
            self.provider.get_chainid().await.map(|id| id.as_u64()).map_err(classify)
        })
        .await
    }

    async fn send_transaction(&self, wallet: &EthWallet, tx: EvmTransaction) -> Result<Receipt> {
        let signer = LocalWallet::from_bytes(&wallet.secret_bytes())
            .map_err(|e| SxError::Signing(e.to_string()))?
            .with_chain_id(self.chain_id);
        let client = SignerMiddleware::new(self.provider.clone(), signer);

        let pending = client.send_transaction(request(&tx), None).await.map_err(classify)?;
        let hash = B256::from(pending.tx_hash().0);
        debug!(chain_id = self.chain_id, tx = %hash, "submitted L1 transaction");

        let receipt = pending.await.map_err(classify)?.ok_or_else(|| {
            SxError::Transport(format!("transaction {hash} dropped from mempool"))
        })?;
        if receipt.status == Some(U64::zero()) {
            return Err(SxError::reverted(format!("transaction {hash} reverted")));
        }
        Ok(Receipt { transaction_hash: hash })
    }

    async fn call(&self, tx: EvmTransaction) -> Result<Bytes> {
        let req: TypedTransaction = request(&tx).into();
        with_read_retry(self.retry, "eth_call", || {
            let req = req.clone();
            async move {
                self.provider
                    .call(&req, None)
                    .await
                    .map(|out| Bytes::from(out.to_vec()))
                    .map_err(classify)
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_shares_provider_per_chain() {
        let a = evm_provider(990_001, "http://127.0.0.1:8545").unwrap();
        let b = evm_provider(990_001, "http://127.0.0.1:9545").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let c = evm_provider(990_002, "http://127.0.0.1:8545").unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_invalid_url_is_configuration_error() {
        assert!(matches!(
            EthersEvmProvider::connect(1, "not a url"),
            Err(SxError::Configuration(_))
        ));
    }
}
