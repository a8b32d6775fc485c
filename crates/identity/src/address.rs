//! Address derivation and validation.

use sha2::{Digest, Sha256};

use crate::error::IdentityError;
use crate::keys::{derive_key_pair, PUBLIC_KEY_LEN};

const HASH_LEN: usize = 20;
const CHECKSUM_LEN: usize = 4;
const PAYLOAD_LEN: usize = 1 + HASH_LEN;
const ADDRESS_BYTES: usize = PAYLOAD_LEN + CHECKSUM_LEN;

/// Derive the address for `secret` under `network_version`.
///
/// Pure and deterministic: the same inputs always yield the same address.
pub fn derive_address(secret: &str, network_version: u8) -> Result<String, IdentityError> {
    let keys = derive_key_pair(secret)?;
    Ok(address_from_public_key(&keys.public_key_bytes(), network_version))
}

/// Build the address for an already-derived public key.
pub fn address_from_public_key(public_key: &[u8; PUBLIC_KEY_LEN], network_version: u8) -> String {
    let digest = Sha256::digest(public_key);

    let mut bytes = Vec::with_capacity(ADDRESS_BYTES);
    bytes.push(network_version);
    bytes.extend_from_slice(&digest[..HASH_LEN]);
    let check = checksum(&bytes);
    bytes.extend_from_slice(&check);

    bs58::encode(bytes).into_string()
}

/// Same as [`address_from_public_key`] for a hex-encoded key, as carried
/// in the handshake's `publicKey` field.
pub fn address_from_public_key_hex(
    public_key_hex: &str,
    network_version: u8,
) -> Result<String, IdentityError> {
    let key: [u8; PUBLIC_KEY_LEN] = hex::decode(public_key_hex)
        .map_err(|e| IdentityError::InvalidKey(e.to_string()))?
        .try_into()
        .map_err(|v: Vec<u8>| {
            IdentityError::InvalidKey(format!("expected {PUBLIC_KEY_LEN} bytes, got {}", v.len()))
        })?;
    Ok(address_from_public_key(&key, network_version))
}

/// Read the network version byte out of an address, verifying its checksum.
pub fn network_version_of(address: &str) -> Result<u8, IdentityError> {
    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|e| IdentityError::InvalidAddress(e.to_string()))?;

    if bytes.len() != ADDRESS_BYTES {
        return Err(IdentityError::InvalidAddress(format!(
            "expected {ADDRESS_BYTES} bytes, got {}",
            bytes.len()
        )));
    }

    let (payload, check) = bytes.split_at(PAYLOAD_LEN);
    if checksum(payload) != check {
        return Err(IdentityError::InvalidAddress("checksum mismatch".into()));
    }

    Ok(payload[0])
}

/// `true` if `address` is well formed and belongs to `network_version`.
pub fn validate_address(address: &str, network_version: u8) -> bool {
    matches!(network_version_of(address), Ok(v) if v == network_version)
}

fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let once = Sha256::digest(payload);
    let twice = Sha256::digest(once);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&twice[..CHECKSUM_LEN]);
    out
}
