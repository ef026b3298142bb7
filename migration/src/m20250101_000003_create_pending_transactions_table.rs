use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(PendingTransactions::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(PendingTransactions::Hash)
                        .string_len(66)
                        .not_null()
                        .primary_key()
                )
                .col(ColumnDef::new(PendingTransactions::UserAddress).string_len(64).not_null())
                .col(ColumnDef::new(PendingTransactions::Amount).string_len(50).not_null())
                .col(ColumnDef::new(PendingTransactions::Duration).string_len(10).not_null())
                .col(ColumnDef::new(PendingTransactions::ChainId).big_integer().not_null())
                .col(ColumnDef::new(PendingTransactions::Status).string_len(20).not_null())
                .col(
                    ColumnDef::new(PendingTransactions::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .col(
                    ColumnDef::new(PendingTransactions::ProcessedAt)
                        .timestamp_with_time_zone()
                        .null()
                )
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_pending_transactions_status")
                .table(PendingTransactions::Table)
                .col(PendingTransactions::Status)
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_pending_transactions_user_address")
                .table(PendingTransactions::Table)
                .col(PendingTransactions::UserAddress)
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_pending_transactions_created_at")
                .table(PendingTransactions::Table)
                .col(PendingTransactions::CreatedAt)
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(PendingTransactions::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum PendingTransactions {
    Table,
    Hash,
    UserAddress,
    Amount,
    Duration,
    ChainId,
    Status,
    CreatedAt,
    ProcessedAt,
}
