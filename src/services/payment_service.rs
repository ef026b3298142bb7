use ethers::types::U256;
use ethers::utils::parse_ether;
use image::Luma;
use qrcode::QrCode;
use serde::Serialize;
use std::sync::Arc;

use crate::chains::evm::wallet::{ normalize_address, normalize_tx_hash };
use crate::config::{ NetworkTable, PaymentConfig };
use crate::db::{ NewPendingTransaction, PendingTransactionRepository };
use crate::enums::SubscriptionDuration;
use crate::error::{ AppError, Result };
use crate::providers::PaymentWallet;

/// A broadcast, not yet confirmed, subscription payment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHandle {
    pub hash: String,
    pub amount: String,
    pub duration: SubscriptionDuration,
    pub chain_id: u64,
    pub receiver: String,
    pub explorer_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentQuote {
    pub duration: SubscriptionDuration,
    pub chain_id: u64,
    pub network: String,
    pub receiver: String,
    pub amount: String,
    pub symbol: String,
    pub value_wei: String,
    /// EIP-681 request a wallet can open directly
    pub payment_uri: String,
}

fn wallet_error(e: AppError) -> AppError {
    match e {
        AppError::PaymentFailed(_) | AppError::WalletUnavailable => e,
        other => AppError::PaymentFailed(other.to_string()),
    }
}

pub struct PaymentService {
    pending: Arc<PendingTransactionRepository>,
    payment: PaymentConfig,
    networks: NetworkTable,
}

impl PaymentService {
    pub fn new(
        pending: Arc<PendingTransactionRepository>,
        payment: PaymentConfig,
        networks: NetworkTable
    ) -> Self {
        Self {
            pending,
            payment,
            networks,
        }
    }

    pub fn price_wei(&self, duration: SubscriptionDuration) -> Result<U256> {
        let price = self.payment.price(duration);
        parse_ether(price).map_err(|e| AppError::Config(format!("Invalid {} price {}: {}", duration, price, e)))
    }

    pub fn quote(&self, duration: SubscriptionDuration, chain_id: u64) -> Result<PaymentQuote> {
        let network = self.networks.lookup(chain_id).ok_or(AppError::UnsupportedNetwork(chain_id))?;
        let value = self.price_wei(duration)?;

        Ok(PaymentQuote {
            duration,
            chain_id,
            network: network.network.display_name().to_string(),
            receiver: self.payment.receiver_address.clone(),
            amount: self.payment.price(duration).to_string(),
            symbol: network.native_symbol.clone(),
            value_wei: value.to_string(),
            payment_uri: format!(
                "ethereum:{}@{}?value={}",
                self.payment.receiver_address,
                chain_id,
                value
            ),
        })
    }

    /// The quote's payment URI as a PNG QR code.
    pub fn quote_qr_png(&self, duration: SubscriptionDuration, chain_id: u64) -> Result<Vec<u8>> {
        let quote = self.quote(duration, chain_id)?;

        let code = QrCode::new(quote.payment_uri.as_bytes()).map_err(|e|
            AppError::Internal(format!("QR encoding failed: {}", e))
        )?;
        let image = code.render::<Luma<u8>>().build();

        let mut buffer = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
            .map_err(|e| AppError::Internal(format!("PNG encoding failed: {}", e)))?;

        Ok(buffer)
    }

    /// Sends the subscription price to the receiver through `wallet` and
    /// records the pending transaction before returning its handle.
    pub async fn pay(
        &self,
        address: &str,
        duration: SubscriptionDuration,
        chain_id: u64,
        wallet: Option<&dyn PaymentWallet>
    ) -> Result<PaymentHandle> {
        let wallet = wallet.ok_or(AppError::WalletUnavailable)?;
        let network = self.networks.lookup(chain_id).ok_or(AppError::UnsupportedNetwork(chain_id))?;
        let address = normalize_address(address)?;
        let value = self.price_wei(duration)?;

        wallet.switch_chain(chain_id).await.map_err(wallet_error)?;

        let accounts = wallet.request_accounts().await.map_err(wallet_error)?;
        if accounts.is_empty() {
            return Err(AppError::WalletUnavailable);
        }
        // Reconciliation only credits the sender, so pay from the subscriber
        if
            !accounts
                .iter()
                .filter_map(|account| normalize_address(account).ok())
                .any(|account| account == address)
        {
            return Err(AppError::InvalidInput(format!("Wallet is not connected as {}", address)));
        }

        let hash = wallet
            .send_transaction(&self.payment.receiver_address, value).await
            .map_err(wallet_error)?;
        let hash = normalize_tx_hash(&hash).map_err(wallet_error)?;

        if self.pending.is_processed(&hash).await? {
            return Err(AppError::InvalidInput(format!("Transaction {} already paid for a subscription", hash)));
        }
        if self.pending.delete_failed(&hash).await? {
            tracing::info!(tx_hash = %hash, user = %address, "Resubmitting a failed transaction");
        }
        if self.pending.find(&hash).await?.is_some() {
            return Err(AppError::InvalidInput(format!("Transaction {} was already submitted", hash)));
        }

        let amount = self.payment.price(duration).to_string();
        self.pending
            .create(NewPendingTransaction {
                hash: hash.clone(),
                user_address: address.clone(),
                amount: amount.clone(),
                duration,
                chain_id,
            }).await
            .map_err(|e| {
                // The payment is on chain but nothing will reconcile it
                tracing::error!(
                    tx_hash = %hash,
                    user = %address,
                    chain_id,
                    "Failed to record pending transaction: {}",
                    e
                );
                e
            })?;

        tracing::info!(
            tx_hash = %hash,
            user = %address,
            chain_id,
            %duration,
            "Subscription payment broadcast"
        );

        Ok(PaymentHandle {
            explorer_url: network.tx_explorer_url(&hash),
            hash,
            amount,
            duration,
            chain_id,
            receiver: self.payment.receiver_address.clone(),
        })
    }
}
