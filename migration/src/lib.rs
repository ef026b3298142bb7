pub use sea_orm_migration::prelude::*;

mod m20250101_000001_create_users_table;
mod m20250101_000002_create_yield_opportunities_table;
mod m20250101_000003_create_pending_transactions_table;
mod m20250101_000004_create_metadata_table;
mod m20250101_000005_create_processed_payments_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_users_table::Migration),
            Box::new(m20250101_000002_create_yield_opportunities_table::Migration),
            Box::new(m20250101_000003_create_pending_transactions_table::Migration),
            Box::new(m20250101_000004_create_metadata_table::Migration),
            Box::new(m20250101_000005_create_processed_payments_table::Migration)
        ]
    }
}
