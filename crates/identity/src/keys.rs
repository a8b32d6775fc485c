//! Ed25519 key derivation, signing and verification.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::error::IdentityError;

/// Ed25519 public key length (32 bytes).
pub const PUBLIC_KEY_LEN: usize = 32;

/// Ed25519 signature length (64 bytes).
pub const SIGNATURE_LEN: usize = 64;

/// A key pair derived from a ledger mnemonic.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Lowercase hex public key, as presented in the handshake.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key_bytes())
    }

    /// Sign `message` and return the signature as lowercase hex.
    pub fn sign(&self, message: &[u8]) -> String {
        let signature: Signature = self.signing_key.sign(message);
        hex::encode(signature.to_bytes())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// Derive the key pair for `secret`.
///
/// The private key seed is the SHA-256 digest of the UTF-8 secret.  Empty
/// or whitespace-only secrets are rejected.
pub fn derive_key_pair(secret: &str) -> Result<KeyPair, IdentityError> {
    if secret.trim().is_empty() {
        return Err(IdentityError::InvalidSeed("secret must not be empty".into()));
    }
    let seed: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
    Ok(KeyPair {
        signing_key: SigningKey::from_bytes(&seed),
    })
}

/// Verify a hex signature over `message` against a hex public key.
///
/// Returns `Ok(false)` for a well-formed signature that does not match;
/// malformed hex or key material is an error.
pub fn verify(message: &str, signature_hex: &str, public_key_hex: &str) -> Result<bool, IdentityError> {
    let key_bytes: [u8; PUBLIC_KEY_LEN] = hex::decode(public_key_hex)
        .map_err(|e| IdentityError::InvalidKey(e.to_string()))?
        .try_into()
        .map_err(|v: Vec<u8>| {
            IdentityError::InvalidKey(format!("expected {PUBLIC_KEY_LEN} bytes, got {}", v.len()))
        })?;
    let verifying_key =
        VerifyingKey::from_bytes(&key_bytes).map_err(|e| IdentityError::InvalidKey(e.to_string()))?;

    let sig_bytes: [u8; SIGNATURE_LEN] = hex::decode(signature_hex)
        .map_err(|e| IdentityError::InvalidSignature(e.to_string()))?
        .try_into()
        .map_err(|v: Vec<u8>| {
            IdentityError::InvalidSignature(format!("expected {SIGNATURE_LEN} bytes, got {}", v.len()))
        })?;
    let signature = Signature::from_bytes(&sig_bytes);

    Ok(verifying_key.verify(message.as_bytes(), &signature).is_ok())
}
