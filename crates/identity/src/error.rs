/// Identity derivation and signing failures.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The secret material cannot produce a key pair.
    #[error("invalid seed: {0}")]
    InvalidSeed(String),
    /// The identity has no usable secret (e.g. the anonymous ledger).
    #[error("signing: {0}")]
    Signing(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("invalid public key: {0}")]
    InvalidKey(String),
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
}
