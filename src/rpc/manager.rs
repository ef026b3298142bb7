use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::chains::evm::EvmProvider;
use crate::config::NetworkTable;
use crate::error::{ AppError, Result };
use crate::providers::{ ReceiptSource, TransactionReceipt };

struct ProviderPool {
    providers: Vec<Arc<EvmProvider>>,
    current_index: RwLock<usize>,
}

/// Round-robin over the RPC URLs configured for each network.
pub struct RpcManager {
    pools: HashMap<u64, ProviderPool>,
}

impl RpcManager {
    pub fn new(networks: &NetworkTable) -> Result<Self> {
        let mut pools = HashMap::new();

        for network in networks.iter() {
            let mut providers = Vec::new();
            for url in &network.rpc_urls {
                match EvmProvider::new(url, network.chain_id) {
                    Ok(provider) => providers.push(Arc::new(provider)),
                    Err(e) =>
                        tracing::warn!(
                            "Failed to create {} provider for {}: {}",
                            network.network.display_name(),
                            url,
                            e
                        ),
                }
            }

            if providers.is_empty() {
                return Err(
                    AppError::Config(
                        format!("No valid {} RPC providers configured", network.network.display_name())
                    )
                );
            }

            pools.insert(network.chain_id, ProviderPool {
                providers,
                current_index: RwLock::new(0),
            });
        }

        Ok(Self { pools })
    }

    pub fn supports(&self, chain_id: u64) -> bool {
        self.pools.contains_key(&chain_id)
    }

    pub async fn get_provider(&self, chain_id: u64) -> Result<Arc<EvmProvider>> {
        let pool = self.pools.get(&chain_id).ok_or(AppError::UnsupportedNetwork(chain_id))?;
        let mut index_guard = pool.current_index.write().await;

        let provider = pool.providers[*index_guard].clone();

        // Round-robin to next provider for next request
        *index_guard = (*index_guard + 1) % pool.providers.len();

        Ok(provider)
    }

    // Rotate to next provider (useful when current one fails)
    pub async fn rotate_provider(&self, chain_id: u64) -> Result<()> {
        let pool = self.pools.get(&chain_id).ok_or(AppError::UnsupportedNetwork(chain_id))?;
        let mut index = pool.current_index.write().await;
        *index = (*index + 1) % pool.providers.len();
        tracing::info!("Rotated provider for chain {} to index {}", chain_id, *index);
        Ok(())
    }
}

#[async_trait]
impl ReceiptSource for RpcManager {
    async fn get_transaction_receipt(
        &self,
        tx_hash: &str,
        chain_id: u64
    ) -> Result<Option<TransactionReceipt>> {
        let provider = self.get_provider(chain_id).await?;

        match provider.get_receipt(tx_hash).await {
            Ok(receipt) => Ok(receipt),
            Err(e) => {
                tracing::warn!("Receipt lookup via {} failed: {}", provider.rpc_url(), e);
                self.rotate_provider(chain_id).await?;
                Err(e)
            }
        }
    }
}
