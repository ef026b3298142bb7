pub mod config;
pub mod enums;
pub mod error;
pub mod db;
pub mod providers;
pub mod chains;
pub mod rpc;
pub mod services;
pub mod api;
pub mod scheduler;
pub mod watcher;
pub mod format;

pub use config::Config;
pub use enums::{ Category, Network, RelativeRisk, SubscriptionDuration, Tier, TxStatus };
pub use error::{ AppError, Result };
