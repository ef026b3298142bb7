use async_trait::async_trait;
use ethers::core::types::{ H160, H256, U256 };
use ethers::signers::{ LocalWallet, Signer };
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{ AppError, Result };
use crate::providers::PaymentWallet;
use crate::rpc::RpcManager;

/// Lower-cased, 0x-prefixed form used as the user key.
pub fn normalize_address(address: &str) -> Result<String> {
    let parsed: H160 = address.trim().parse().map_err(|_| AppError::InvalidInput(format!("Invalid address: {}", address)))?;
    Ok(format!("{:?}", parsed))
}

pub fn normalize_tx_hash(hash: &str) -> Result<String> {
    let parsed: H256 = hash.trim().parse().map_err(|_| AppError::InvalidInput(format!("Invalid transaction hash: {}", hash)))?;
    Ok(format!("{:?}", parsed))
}

/// A payment the user's browser wallet already broadcast. The hash is the
/// only thing that crosses over; the chain it went to is fixed.
pub struct ClientBroadcast {
    from: String,
    chain_id: u64,
    tx_hash: String,
}

impl ClientBroadcast {
    pub fn new(from: &str, chain_id: u64, tx_hash: &str) -> Self {
        Self {
            from: from.to_string(),
            chain_id,
            tx_hash: tx_hash.to_string(),
        }
    }
}

#[async_trait]
impl PaymentWallet for ClientBroadcast {
    async fn request_accounts(&self) -> Result<Vec<String>> {
        Ok(vec![self.from.clone()])
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<()> {
        if chain_id != self.chain_id {
            return Err(
                AppError::PaymentFailed(
                    format!("transaction was sent on chain {}, not {}", self.chain_id, chain_id)
                )
            );
        }
        Ok(())
    }

    async fn send_transaction(&self, _to: &str, _value: U256) -> Result<String> {
        normalize_tx_hash(&self.tx_hash).map_err(|e| AppError::PaymentFailed(e.to_string()))
    }
}

/// Server-held key that pays through the configured RPC endpoints.
pub struct LocalSigner {
    wallet: LocalWallet,
    rpc_manager: Arc<RpcManager>,
    chain_id: RwLock<Option<u64>>,
}

impl LocalSigner {
    pub fn new(private_key: &str, rpc_manager: Arc<RpcManager>) -> Result<Self> {
        let wallet: LocalWallet = private_key
            .trim_start_matches("0x")
            .parse()
            .map_err(|_| AppError::Config("PAYER_PRIVATE_KEY is not a valid private key".to_string()))?;

        Ok(Self {
            wallet,
            rpc_manager,
            chain_id: RwLock::new(None),
        })
    }

    pub fn address(&self) -> String {
        format!("{:?}", self.wallet.address())
    }
}

#[async_trait]
impl PaymentWallet for LocalSigner {
    async fn request_accounts(&self) -> Result<Vec<String>> {
        Ok(vec![self.address()])
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<()> {
        if !self.rpc_manager.supports(chain_id) {
            return Err(AppError::UnsupportedNetwork(chain_id));
        }
        *self.chain_id.write().await = Some(chain_id);
        Ok(())
    }

    async fn send_transaction(&self, to: &str, value: U256) -> Result<String> {
        let chain_id = self.chain_id
            .read().await
            .ok_or_else(|| AppError::PaymentFailed("no network selected".to_string()))?;

        let to: H160 = to.parse().map_err(|_| AppError::PaymentFailed(format!("invalid receiver {}", to)))?;
        let provider = self.rpc_manager.get_provider(chain_id).await?;

        provider.send_native_transfer(self.wallet.clone(), to, value).await
    }
}
