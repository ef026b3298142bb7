use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(YieldOpportunities::Table)
                .if_not_exists()
                .col(ColumnDef::new(YieldOpportunities::Id).uuid().not_null().primary_key())
                .col(ColumnDef::new(YieldOpportunities::Name).string().not_null())
                .col(ColumnDef::new(YieldOpportunities::Network).string_len(50).not_null())
                .col(ColumnDef::new(YieldOpportunities::Link).text().not_null())
                .col(ColumnDef::new(YieldOpportunities::Notes).text().not_null())
                .col(ColumnDef::new(YieldOpportunities::EstimatedApy).double().not_null())
                .col(ColumnDef::new(YieldOpportunities::Tvl).double().not_null())
                .col(ColumnDef::new(YieldOpportunities::RelativeRisk).string_len(10).not_null())
                .col(ColumnDef::new(YieldOpportunities::Category).string_len(30).not_null())
                .col(
                    ColumnDef::new(YieldOpportunities::IsBenchmark)
                        .boolean()
                        .not_null()
                        .default(false)
                )
                .col(
                    ColumnDef::new(YieldOpportunities::DateAdded)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_yield_opportunities_category")
                .table(YieldOpportunities::Table)
                .col(YieldOpportunities::Category)
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(YieldOpportunities::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum YieldOpportunities {
    Table,
    Id,
    Name,
    Network,
    Link,
    Notes,
    EstimatedApy,
    Tvl,
    RelativeRisk,
    Category,
    IsBenchmark,
    DateAdded,
}
