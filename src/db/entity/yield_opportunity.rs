use sea_orm::entity::prelude::*;
use serde::{ Deserialize, Serialize };

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "yield_opportunities")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub network: String,
    pub link: String,
    pub notes: String,
    pub estimated_apy: f64,
    pub tvl: f64,
    pub relative_risk: String, // "Low", "Medium", "High"
    pub category: String, // "stablecoin", "volatileAsset", "advancedStrategies"
    pub is_benchmark: bool,
    pub date_added: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
