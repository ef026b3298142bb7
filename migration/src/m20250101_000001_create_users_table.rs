use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(Users::Table)
                .if_not_exists()
                .col(ColumnDef::new(Users::Address).string_len(64).not_null().primary_key())
                .col(ColumnDef::new(Users::IsPaidUser).boolean().not_null().default(false))
                .col(ColumnDef::new(Users::SubscriptionExpiry).timestamp_with_time_zone().null())
                .col(
                    ColumnDef::new(Users::SubscriptionExpiredAt).timestamp_with_time_zone().null()
                )
                .col(
                    ColumnDef::new(Users::TelegramNotificationsEnabled)
                        .boolean()
                        .not_null()
                        .default(false)
                )
                .col(ColumnDef::new(Users::TelegramChatId).string().null())
                .col(
                    ColumnDef::new(Users::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .to_owned()
        ).await?;

        // The expiry sweep filters on both columns
        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_users_paid_expiry")
                .table(Users::Table)
                .col(Users::IsPaidUser)
                .col(Users::SubscriptionExpiry)
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Users::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Address,
    IsPaidUser,
    SubscriptionExpiry,
    SubscriptionExpiredAt,
    TelegramNotificationsEnabled,
    TelegramChatId,
    CreatedAt,
}
