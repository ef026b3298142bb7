use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(Metadata::Table)
                .if_not_exists()
                .col(ColumnDef::new(Metadata::Key).string_len(50).not_null().primary_key())
                .col(ColumnDef::new(Metadata::YieldLastUpdated).timestamp_with_time_zone().null())
                .col(ColumnDef::new(Metadata::UpdatedOpportunityId).uuid().null())
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Metadata::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Metadata {
    Table,
    Key,
    YieldLastUpdated,
    UpdatedOpportunityId,
}
