//! `px-identity` — ledger identities.
//!
//! A ledger is identified by an address derived from a secret mnemonic
//! and a network version byte.  The same mnemonic always derives the same
//! Ed25519 key pair, and the key pair plus the version byte always derive
//! the same address:
//!
//! ```text
//! seed      = SHA-256(mnemonic)
//! key pair  = Ed25519(seed)
//! payload   = [version] ++ SHA-256(public key)[..20]
//! address   = Base58(payload ++ SHA-256(SHA-256(payload))[..4])
//! ```
//!
//! During the router handshake the ledger proves control of its mnemonic
//! by signing a timestamped [`Challenge`].

pub mod address;
pub mod challenge;
pub mod error;
pub mod keys;
pub mod ledger;

pub use address::{
    address_from_public_key, address_from_public_key_hex, derive_address, network_version_of,
    validate_address,
};
pub use challenge::Challenge;
pub use error::IdentityError;
pub use keys::{derive_key_pair, verify, KeyPair};
pub use ledger::{sign_challenge, Ledger, SignedChallenge};
