//! Keccak-256 digests and recoverable secp256k1 signatures
//!
//! Signatures are 65 bytes laid out as `r || s || v` with `v` in {0, 1}.
//! Recovery also accepts the legacy `v` values 27/28.

use crate::address::format_address;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{PublicKey, Secp256k1};
use sha3::{Digest, Keccak256};
use thiserror::Error;

pub use secp256k1::SecretKey;

/// Length of a recoverable signature in bytes
pub const SIGNATURE_LEN: usize = 65;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid signature length: expected 65 bytes, got {0}")]
    InvalidLength(usize),

    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    #[error("signature recovery failed: {0}")]
    Recovery(String),
}

/// Keccak-256 of `data`
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let hash = Keccak256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hash);
    out
}

/// Sign a 32-byte digest, returning `r || s || v`
pub fn sign_digest(secret_key: &SecretKey, digest: [u8; 32]) -> [u8; SIGNATURE_LEN] {
    let secp = Secp256k1::signing_only();
    let msg = secp256k1::Message::from_digest(digest);
    let (recovery_id, compact) = secp
        .sign_ecdsa_recoverable(&msg, secret_key)
        .serialize_compact();

    let mut out = [0u8; SIGNATURE_LEN];
    out[..64].copy_from_slice(&compact);
    out[64] = recovery_id.to_i32() as u8;
    out
}

/// Recover the signer address of `digest` from a 65-byte signature
pub fn recover_address(digest: [u8; 32], signature: &[u8]) -> Result<[u8; 20], SignatureError> {
    if signature.len() != SIGNATURE_LEN {
        return Err(SignatureError::InvalidLength(signature.len()));
    }

    let v = match signature[64] {
        v @ 0..=1 => v,
        v @ 27..=28 => v - 27,
        v => return Err(SignatureError::InvalidRecoveryId(v)),
    };
    let recovery_id = RecoveryId::from_i32(i32::from(v))
        .map_err(|_| SignatureError::InvalidRecoveryId(signature[64]))?;
    let signature = RecoverableSignature::from_compact(&signature[..64], recovery_id)
        .map_err(|e| SignatureError::Recovery(e.to_string()))?;

    let secp = Secp256k1::verification_only();
    let msg = secp256k1::Message::from_digest(digest);
    let public_key = secp
        .recover_ecdsa(&msg, &signature)
        .map_err(|e| SignatureError::Recovery(e.to_string()))?;

    Ok(public_key_address(&public_key))
}

/// Account address of a public key: last 20 bytes of keccak(uncompressed point)
pub fn public_key_address(public_key: &PublicKey) -> [u8; 20] {
    let uncompressed = public_key.serialize_uncompressed();
    // Skip the 0x04 tag byte
    let hash = keccak256(&uncompressed[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

/// Lower-case `0x` address controlled by `secret_key`
pub fn address_of(secret_key: &SecretKey) -> String {
    let secp = Secp256k1::signing_only();
    let public_key = PublicKey::from_secret_key(&secp, secret_key);
    format_address(&public_key_address(&public_key))
}
