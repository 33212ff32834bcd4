//! Curve25519 ECDH for session key agreement.

use hap_core::error::CryptoError;
use rand::rngs::OsRng;
use std::fmt;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::ZeroizeOnDrop;

/// Ephemeral Curve25519 key pair for ECDH.
///
/// One key pair backs exactly one handshake: `diffie_hellman` consumes it.
#[derive(ZeroizeOnDrop)]
pub struct EcdhKeyPair {
    #[zeroize(skip)]
    public: [u8; 32],
    secret: [u8; 32],
}

impl EcdhKeyPair {
    /// Generate a new random key pair.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self {
            public: public.to_bytes(),
            secret: secret.to_bytes(),
        }
    }

    /// Create from existing secret key bytes.
    pub fn from_secret(secret: &[u8; 32]) -> Self {
        let static_secret = StaticSecret::from(*secret);
        let public = PublicKey::from(&static_secret);
        Self {
            public: public.to_bytes(),
            secret: *secret,
        }
    }

    /// Get the public key (32 bytes).
    pub fn public_key(&self) -> [u8; 32] {
        self.public
    }

    /// Perform Diffie-Hellman key exchange.
    ///
    /// Returns the shared secret (32 bytes).
    /// Rejects low-order points (they produce an all-zero output).
    pub fn diffie_hellman(self, peer_public: &[u8; 32]) -> Result<[u8; 32], CryptoError> {
        let static_secret = StaticSecret::from(self.secret);
        let their_public = PublicKey::from(*peer_public);
        let shared = static_secret.diffie_hellman(&their_public);

        if !shared.was_contributory() {
            return Err(CryptoError::KeyAgreement(
                "peer public key is a low-order point".to_string(),
            ));
        }

        Ok(shared.to_bytes())
    }
}

impl fmt::Debug for EcdhKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcdhKeyPair").finish_non_exhaustive()
    }
}
