//! Signing identities.
//!
//! The author's wallet lives outside this crate and is reached through the
//! [`Signer`] trait. Record identities are fresh ed25519 keypairs: the public
//! half addresses the tweet account and the secret half co-signs its creation,
//! then is dropped.

use std::fmt;

use ed25519_dalek::{PublicKey, Signature, Signer as _, Verifier};
use rand::rngs::OsRng;
use solana_program::pubkey::Pubkey;

use crate::error::{ClientError, Result};

/// Anything that can sign a submission on behalf of a public key.
pub trait Signer: Send + Sync {
    fn pubkey(&self) -> Pubkey;

    /// Signs the serialized message.
    fn try_sign_message(&self, message: &[u8]) -> Result<Signature>;
}

/// An ed25519 keypair held in memory.
pub struct Keypair(ed25519_dalek::Keypair);

impl Keypair {
    /// Generates a keypair from the operating system's CSPRNG.
    pub fn generate() -> Self {
        Self(ed25519_dalek::Keypair::generate(&mut OsRng))
    }

    /// Restores a keypair from its 64-byte secret-then-public encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ed25519_dalek::Keypair::from_bytes(bytes)
            .map(Self)
            .map_err(|e| ClientError::Config {
                message: format!("invalid keypair bytes: {e}"),
            })
    }

    pub fn to_bytes(&self) -> [u8; 64] {
        self.0.to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.0.sign(message)
    }
}

impl Signer for Keypair {
    fn pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.0.public.to_bytes())
    }

    fn try_sign_message(&self, message: &[u8]) -> Result<Signature> {
        Ok(self.sign(message))
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Keypair").field(&self.pubkey()).finish()
    }
}

/// Checks `signature` over `message` against the ed25519 key `pubkey`.
pub fn verify_signature(pubkey: &Pubkey, message: &[u8], signature: &Signature) -> bool {
    match PublicKey::from_bytes(pubkey.as_ref()) {
        Ok(key) => key.verify(message, signature).is_ok(),
        Err(_) => false,
    }
}
