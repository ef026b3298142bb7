use sea_orm::entity::prelude::*;
use serde::{ Deserialize, Serialize };

pub const YIELD_DATA_KEY: &str = "yieldData";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "metadata")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    pub yield_last_updated: Option<DateTimeUtc>,
    pub updated_opportunity_id: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
