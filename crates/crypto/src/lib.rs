//! Abstract sign/verify capability used by the consensus core, plus the
//! Ed25519 implementation the node runs with.
//!
//! The engine only ever talks to [`Signer`] and [`SignatureVerifier`]; any
//! scheme that can map an [`Address`] to a verification key can be dropped in.

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rand_core::{OsRng, RngCore};
use vnc_types::Address;

pub mod signing;

pub use signing::*;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("secret key must be 32 bytes of hex: {0}")]
    InvalidSecretKey(String),
    #[error("invalid hex encoding: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// Produces signatures on behalf of one address.
pub trait Signer: Send + Sync {
    fn address(&self) -> Address;
    fn sign(&self, message: &[u8]) -> Vec<u8>;
}

/// Checks that `signature` over `message` was produced by `signer`.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, signer: &Address, message: &[u8], signature: &[u8]) -> bool;
}

/// Ed25519 key pair; its address is the hex-encoded public key.
#[derive(Debug, Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Generate a new key pair from the OS RNG
    pub fn generate() -> Self {
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        Self::from_seed(secret)
    }

    /// Deterministic key pair; devnet validators and tests derive keys this way.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    pub fn from_secret_hex(secret: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(secret.trim())?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSecretKey(secret.to_string()))?;
        Ok(Self::from_seed(seed))
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }
}

impl Signer for KeyPair {
    fn address(&self) -> Address {
        Address::new(hex::encode(self.verifying_key.to_bytes()))
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }
}

/// Verifies Ed25519 signatures for hex-public-key addresses.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, signer: &Address, message: &[u8], signature: &[u8]) -> bool {
        let Ok(key_bytes) = hex::decode(signer.as_str()) else {
            return false;
        };
        let Ok(key_bytes) = <[u8; 32]>::try_from(key_bytes.as_slice()) else {
            return false;
        };
        let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        key.verify(message, &signature).is_ok()
    }
}
