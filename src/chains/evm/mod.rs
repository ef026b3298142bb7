pub mod provider;
pub mod wallet;

pub use provider::EvmProvider;
pub use wallet::{ ClientBroadcast, LocalSigner };
