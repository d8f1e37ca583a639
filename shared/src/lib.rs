pub mod amount;
pub mod crypto;
pub mod error;
pub mod hash;

pub use amount::{Amount, AMOUNT_SCALE};
pub use crypto::{scheme_by_name, Dilithium3Mock, KeyPair, PqcScheme, PrivateKeyHex, PublicKeyHex};
pub use error::PrimitiveError;
pub use hash::{canonical_hash, Hash512};
