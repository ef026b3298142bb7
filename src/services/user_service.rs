use std::sync::Arc;

use crate::chains::evm::wallet::normalize_address;
use crate::db::entity::user;
use crate::db::UserRepository;
use crate::error::Result;

pub struct UserService {
    repository: Arc<UserRepository>,
    admin_address: Option<String>,
}

impl UserService {
    pub fn new(repository: Arc<UserRepository>, admin_address: Option<&str>) -> Self {
        Self {
            repository,
            admin_address: admin_address.and_then(|a| normalize_address(a).ok()),
        }
    }

    /// Wallet connection. Creates the user on first sight.
    pub async fn connect(&self, address: &str) -> Result<user::Model> {
        let address = normalize_address(address)?;
        let user = self.repository.get_or_create(&address).await?;
        tracing::debug!(address = %user.address, "Wallet connected");
        Ok(user)
    }

    pub async fn update_telegram_settings(
        &self,
        address: &str,
        enabled: bool,
        chat_id: Option<String>
    ) -> Result<user::Model> {
        let address = normalize_address(address)?;
        let chat_id = chat_id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty());
        self.repository.update_telegram_settings(&address, enabled, chat_id).await
    }

    /// Always `false` when no admin is configured.
    pub fn is_admin(&self, address: &str) -> bool {
        match (&self.admin_address, normalize_address(address)) {
            (Some(admin), Ok(address)) => *admin == address,
            _ => false,
        }
    }
}
