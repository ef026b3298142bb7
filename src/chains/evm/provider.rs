use ethers::{
    prelude::*,
    providers::{ Http, Provider },
    types::{ TransactionRequest as EthTxRequest, U256 },
};
use std::sync::Arc;

use crate::error::{ AppError, Result };
use crate::providers::{ ReceiptStatus, TransactionReceipt };

#[derive(Clone)]
pub struct EvmProvider {
    provider: Arc<Provider<Http>>,
    chain_id: u64,
    rpc_url: String,
}

impl EvmProvider {
    pub fn new(rpc_url: &str, chain_id: u64) -> Result<Self> {
        let provider = Provider::<Http>
            ::try_from(rpc_url)
            .map_err(|e| AppError::Config(format!("Failed to create provider: {}", e)))?;

        Ok(Self {
            provider: Arc::new(provider),
            chain_id,
            rpc_url: rpc_url.to_string(),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// `Ok(None)` until the transaction is mined. RPC errors are transient.
    pub async fn get_receipt(&self, tx_hash: &str) -> Result<Option<TransactionReceipt>> {
        let hash: H256 = tx_hash
            .parse()
            .map_err(|_| AppError::InvalidInput(format!("Invalid transaction hash: {}", tx_hash)))?;

        let receipt = self.provider
            .get_transaction_receipt(hash).await
            .map_err(|e|
                AppError::ReconciliationTransientFailure(
                    format!("Failed to fetch receipt on chain {}: {}", self.chain_id, e)
                )
            )?;

        let Some(receipt) = receipt else {
            return Ok(None);
        };

        let status = match receipt.status {
            Some(s) if s == U64::one() => ReceiptStatus::Success,
            Some(_) => ReceiptStatus::Reverted,
            None => {
                // Pre-byzantium style receipt, nothing to decide on
                tracing::warn!(tx_hash, chain_id = self.chain_id, "Receipt has no status field");
                return Ok(None);
            }
        };

        // Receipts carry no value; the transaction itself does
        let transaction = self.provider
            .get_transaction(hash).await
            .map_err(|e|
                AppError::ReconciliationTransientFailure(
                    format!("Failed to fetch transaction on chain {}: {}", self.chain_id, e)
                )
            )?
            .ok_or_else(||
                AppError::ReconciliationTransientFailure(
                    format!("Node returned a receipt but no transaction for {} on chain {}", tx_hash, self.chain_id)
                )
            )?;

        Ok(
            Some(TransactionReceipt {
                tx_hash: tx_hash.to_string(),
                status,
                from: format!("{:?}", receipt.from),
                to: receipt.to.map(|to| format!("{:?}", to)),
                value: transaction.value,
            })
        )
    }

    /// Signs and broadcasts a native ETH transfer. Returns the hash without
    /// waiting for inclusion.
    pub async fn send_native_transfer(
        &self,
        wallet: LocalWallet,
        to: Address,
        value: U256
    ) -> Result<String> {
        let client = SignerMiddleware::new(
            self.provider.clone(),
            wallet.with_chain_id(self.chain_id)
        );

        let tx = EthTxRequest::new().to(to).value(value);

        let pending_tx = client
            .send_transaction(tx, None).await
            .map_err(|e| AppError::PaymentFailed(format!("Broadcast failed: {}", e)))?;

        Ok(format!("{:?}", pending_tx.tx_hash()))
    }
}
