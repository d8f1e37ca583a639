pub mod error;
pub mod store;

pub use error::WalletError;
pub use store::Wallet;
