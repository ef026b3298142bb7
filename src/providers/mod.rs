pub mod chain_provider;

pub use chain_provider::{ PaymentWallet, ReceiptSource, ReceiptStatus, TransactionReceipt };
