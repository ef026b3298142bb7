use sea_orm::entity::prelude::*;
use serde::{ Deserialize, Serialize };

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Lower-cased wallet address
    #[sea_orm(primary_key, auto_increment = false)]
    pub address: String,
    /// Cached flag; only authoritative together with `subscription_expiry`
    pub is_paid_user: bool,
    pub subscription_expiry: Option<DateTimeUtc>,
    pub subscription_expired_at: Option<DateTimeUtc>,
    pub telegram_notifications_enabled: bool,
    pub telegram_chat_id: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
