use async_trait::async_trait;
use ethers::types::U256;
use serde::{ Deserialize, Serialize };

use crate::error::Result;

/// Outcome recorded on chain for a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub tx_hash: String,
    pub status: ReceiptStatus,
    /// Lower-cased sender
    pub from: String,
    /// Lower-cased recipient, `None` for contract creation
    pub to: Option<String>,
    /// Transferred native amount in wei
    pub value: U256,
}

/// Read side of the chain: receipts by hash on a given network.
#[async_trait]
pub trait ReceiptSource: Send + Sync {
    /// `Ok(None)` while the transaction has not been mined.
    async fn get_transaction_receipt(
        &self,
        tx_hash: &str,
        chain_id: u64
    ) -> Result<Option<TransactionReceipt>>;
}

/// The payer's wallet. Every call may fail or take arbitrarily long.
#[async_trait]
pub trait PaymentWallet: Send + Sync {
    /// Connected accounts, empty if the user has not authorised any
    async fn request_accounts(&self) -> Result<Vec<String>>;

    /// Ask the wallet to move to the given network
    async fn switch_chain(&self, chain_id: u64) -> Result<()>;

    /// Broadcast a native-asset transfer and return its hash
    async fn send_transaction(&self, to: &str, value: U256) -> Result<String>;
}
