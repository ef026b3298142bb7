pub mod user;
pub mod yield_opportunity;
pub mod pending_transaction;
pub mod metadata;
pub mod processed_payment;

pub use user::Entity as User;
pub use yield_opportunity::Entity as YieldOpportunity;
pub use pending_transaction::Entity as PendingTransaction;
pub use metadata::Entity as Metadata;
pub use processed_payment::Entity as ProcessedPayment;
