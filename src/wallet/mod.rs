pub mod directory;

use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, ecdsa::Signature};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::blockchain::{EffortData, canonical_json};
use crate::error::WalletError;

pub use directory::{InMemoryWallets, Role, WalletDirectory};

/// How much detail `verify_proof` reports on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Debug,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyFailure {
    #[error("malformed public key")]
    MalformedPublicKey,
    #[error("malformed signature")]
    MalformedSignature,
    #[error("signature does not match payload and key")]
    Mismatch,
}

/// Result of a signature check. `diagnostic` is only filled in when the
/// caller asked for `Verbosity::Debug`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    pub valid: bool,
    pub diagnostic: Option<VerifyFailure>,
}

/// Generate a new secp256k1 keypair and return (priv_hex, pub_hex_compressed).
pub fn generate_keypair_hex() -> (String, String) {
    let secp = Secp256k1::new();
    let (sk, pk) = secp.generate_keypair(&mut OsRng);
    (hex::encode(sk.secret_bytes()), hex::encode(pk.serialize()))
}

/// Parse a hex public key (compressed or uncompressed) and return it as
/// lowercase compressed hex.
pub fn normalize_public_key_hex(pubkey_hex: &str) -> Result<String, WalletError> {
    let bytes = hex::decode(pubkey_hex.trim()).map_err(|_| WalletError::InvalidPublicKey)?;
    let pk = PublicKey::from_slice(&bytes).map_err(|_| WalletError::InvalidPublicKey)?;
    Ok(hex::encode(pk.serialize()))
}

/// SHA-256 of the canonical JSON encoding of an effort payload. This is the
/// message both the user and the validator sign.
pub fn payload_digest(payload: &EffortData) -> [u8; 32] {
    let encoded = canonical_json(&Value::Object(payload.clone()));
    let mut hasher = Sha256::new();
    hasher.update(encoded.as_bytes());
    hasher.finalize().into()
}

/// Sign an effort payload, returning a hex DER ECDSA signature.
pub fn sign_payload_hex(secret_hex: &str, payload: &EffortData) -> Result<String, WalletError> {
    let bytes = hex::decode(secret_hex.trim()).map_err(|_| WalletError::InvalidSecretKey)?;
    let sk = SecretKey::from_slice(&bytes).map_err(|_| WalletError::InvalidSecretKey)?;
    let secp = Secp256k1::signing_only();
    let msg = Message::from_digest(payload_digest(payload));
    let sig = secp.sign_ecdsa(&msg, &sk);
    Ok(hex::encode(sig.serialize_der()))
}

/// Verify a hex DER signature over `payload` against a hex public key.
pub fn verify_proof(
    payload: &EffortData,
    signature_hex: &str,
    pubkey_hex: &str,
    verbosity: Verbosity,
) -> Verification {
    match check_signature(payload, signature_hex, pubkey_hex) {
        Ok(()) => Verification {
            valid: true,
            diagnostic: None,
        },
        Err(failure) => Verification {
            valid: false,
            diagnostic: (verbosity == Verbosity::Debug).then_some(failure),
        },
    }
}

fn check_signature(
    payload: &EffortData,
    signature_hex: &str,
    pubkey_hex: &str,
) -> Result<(), VerifyFailure> {
    let secp = Secp256k1::verification_only();

    let pk_bytes = hex::decode(pubkey_hex.trim()).map_err(|_| VerifyFailure::MalformedPublicKey)?;
    let pk = PublicKey::from_slice(&pk_bytes).map_err(|_| VerifyFailure::MalformedPublicKey)?;

    let sig_bytes =
        hex::decode(signature_hex.trim()).map_err(|_| VerifyFailure::MalformedSignature)?;
    let mut sig = Signature::from_der(&sig_bytes).map_err(|_| VerifyFailure::MalformedSignature)?;
    // libsecp256k1 only accepts low-S; other signers are not required to emit it.
    sig.normalize_s();

    let msg = Message::from_digest(payload_digest(payload));
    secp.verify_ecdsa(&msg, &sig, &pk)
        .map_err(|_| VerifyFailure::Mismatch)
}
