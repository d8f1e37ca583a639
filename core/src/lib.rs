pub mod block;
pub mod block_store;
pub mod error;
pub mod gossip;
pub mod ledger;
pub mod merkle;
pub mod mining;
pub mod peers;
pub mod transaction;
pub mod utxo;

pub use block::Block;
pub use block_store::{BlockStore, PeerRecord};
pub use error::LedgerError;
pub use ledger::{Ledger, MiningJob, NetworkParams, GENESIS_REWARD_MULTIPLIER};
pub use merkle::merkle_root;
pub use mining::{mine_block, proof_of_work};
pub use peers::PeerRegistry;
pub use transaction::{Transaction, TxInput, TxOutput, COINBASE_SIGNATURE_TAG};
pub use utxo::{OutPoint, UtxoRecord, UtxoStore};
