use shared::PrimitiveError;
use thiserror::Error;

/// Error taxonomy at the ledger boundary. Public operations collapse
/// this down to `bool`/`Option` (see each method's docs) and log the
/// discarded variant via `tracing` before doing so — the core never
/// raises across the HTTP collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("transaction or block failed a consensus rule: {0}")]
    Validation(String),

    #[error("double spend: output already spent")]
    DoubleSpend,

    #[error("block already exists at this height or hash")]
    AlreadyExists,

    #[error("store operation failed: {0}")]
    Persistence(String),

    #[error("unknown signature scheme: {0}")]
    Config(String),

    #[error(transparent)]
    Primitive(#[from] PrimitiveError),
}
