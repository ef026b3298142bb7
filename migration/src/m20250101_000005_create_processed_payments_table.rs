use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Outlives pending_transactions cleanup: a hash is granted at most once, ever
        manager.create_table(
            Table::create()
                .table(ProcessedPayments::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(ProcessedPayments::Hash)
                        .string_len(66)
                        .not_null()
                        .primary_key()
                )
                .col(ColumnDef::new(ProcessedPayments::UserAddress).string_len(64).not_null())
                .col(ColumnDef::new(ProcessedPayments::ChainId).big_integer().not_null())
                .col(ColumnDef::new(ProcessedPayments::Duration).string_len(10).not_null())
                .col(
                    ColumnDef::new(ProcessedPayments::ProcessedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(ProcessedPayments::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum ProcessedPayments {
    Table,
    Hash,
    UserAddress,
    ChainId,
    Duration,
    ProcessedAt,
}
