use thiserror::Error;

/// Error taxonomy for the wallet collaborator (§4.6). Not part of
/// consensus — the HTTP adapter maps these directly to status codes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("alias already has a wallet")]
    DuplicateAlias,

    #[error("unknown alias")]
    UnknownAlias,
}
