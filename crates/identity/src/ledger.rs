//! The [`Ledger`] identity and handshake challenge signing.

use px_protocol::ANONYMOUS_AUTHID;

use crate::address::derive_address;
use crate::challenge::Challenge;
use crate::error::IdentityError;
use crate::keys::derive_key_pair;

/// A participant on the network: a secret mnemonic plus the address
/// derived from it.  Immutable once constructed.
#[derive(Clone, PartialEq, Eq)]
pub struct Ledger {
    mnemonic: String,
    address: String,
}

impl Ledger {
    /// Derive a ledger from its mnemonic under `network_version`.
    pub fn from_mnemonic(
        mnemonic: impl Into<String>,
        network_version: u8,
    ) -> Result<Self, IdentityError> {
        let mnemonic = mnemonic.into();
        let address = derive_address(&mnemonic, network_version)?;
        Ok(Self { mnemonic, address })
    }

    /// The keyless anonymous ledger.  It cannot sign; sessions opened for
    /// it carry no challenge.
    pub fn anonymous() -> Self {
        Self {
            mnemonic: String::new(),
            address: ANONYMOUS_AUTHID.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// The secret mnemonic.
    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    pub fn is_anonymous(&self) -> bool {
        self.address == ANONYMOUS_AUTHID
    }

    /// Sign `challenge` with this ledger's key.
    pub fn sign_challenge(&self, challenge: &Challenge) -> Result<SignedChallenge, IdentityError> {
        sign_challenge(challenge.as_str(), self)
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("address", &self.address)
            .field("mnemonic", &"<redacted>")
            .finish()
    }
}

/// Signature and public key produced for one challenge, both lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedChallenge {
    pub signature: String,
    pub public_key: String,
}

/// Sign the UTF-8 bytes of `challenge` with the key derived from
/// `ledger`'s mnemonic.
///
/// Fails with [`IdentityError::Signing`] for the anonymous ledger; callers
/// skip signing entirely for it.
pub fn sign_challenge(challenge: &str, ledger: &Ledger) -> Result<SignedChallenge, IdentityError> {
    if ledger.is_anonymous() {
        return Err(IdentityError::Signing("anonymous ledger has no key".into()));
    }
    let keys = derive_key_pair(&ledger.mnemonic)
        .map_err(|e| IdentityError::Signing(e.to_string()))?;
    Ok(SignedChallenge {
        signature: keys.sign(challenge.as_bytes()),
        public_key: keys.public_key_hex(),
    })
}
