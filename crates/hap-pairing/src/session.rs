//! Per-handshake key material.

use hap_core::error::PairingError;
use hap_crypto::curve25519::EcdhKeyPair;
use hap_crypto::{EncryptionKey, SessionKeys, SharedSecret};

/// Ephemeral state owned by one pair-verify attempt.
///
/// Advances exactly twice: once when the accessory's ephemeral key is
/// agreed with ours, then once when the verify key is derived. Secrets are
/// wiped on drop.
#[derive(Debug)]
pub struct VerifySession {
    ephemeral: Option<EcdhKeyPair>,
    public_key: [u8; 32],
    peer_public_key: Option<[u8; 32]>,
    shared_secret: Option<SharedSecret>,
    encryption_key: Option<EncryptionKey>,
}

impl VerifySession {
    /// Start a session with `ephemeral` as our one-time key.
    pub fn with_ephemeral(ephemeral: EcdhKeyPair) -> Self {
        Self {
            public_key: ephemeral.public_key(),
            ephemeral: Some(ephemeral),
            peer_public_key: None,
            shared_secret: None,
            encryption_key: None,
        }
    }

    /// Our ephemeral public key.
    pub fn public_key(&self) -> [u8; 32] {
        self.public_key
    }

    /// The accessory's ephemeral public key, once agreed.
    pub fn peer_public_key(&self) -> Option<[u8; 32]> {
        self.peer_public_key
    }

    /// The verify key, once derived.
    pub fn encryption_key(&self) -> Option<&EncryptionKey> {
        self.encryption_key.as_ref()
    }

    /// Record the accessory's ephemeral key and run ECDH against it.
    ///
    /// Consumes our ephemeral secret, so this succeeds at most once.
    pub fn agree(&mut self, peer_public_key: &[u8]) -> Result<(), PairingError> {
        let peer: [u8; 32] = peer_public_key.try_into().map_err(|_| {
            PairingError::Format(format!(
                "accessory public key must be 32 bytes, got {}",
                peer_public_key.len()
            ))
        })?;

        let ephemeral = self.ephemeral.take().ok_or_else(|| {
            PairingError::Protocol("accessory public key already agreed".to_string())
        })?;

        let shared = ephemeral.diffie_hellman(&peer)?;
        self.peer_public_key = Some(peer);
        self.shared_secret = Some(SharedSecret::new(shared));
        Ok(())
    }

    /// Derive the verify key from the shared secret.
    pub fn derive_encryption_key(&mut self) -> Result<&EncryptionKey, PairingError> {
        if self.encryption_key.is_some() {
            return Err(PairingError::Protocol(
                "encryption key already derived".to_string(),
            ));
        }
        let shared = self.shared_secret.as_ref().ok_or_else(|| {
            PairingError::Protocol("no shared secret to derive from".to_string())
        })?;

        let key = shared.derive_verify_key()?;
        Ok(self.encryption_key.insert(key))
    }

    /// Finish the session, deriving the keys the caller keeps.
    pub fn into_session_keys(mut self) -> Result<SessionKeys, PairingError> {
        let shared = self
            .shared_secret
            .take()
            .ok_or_else(|| PairingError::Protocol("no shared secret".to_string()))?;
        let verify_key = self
            .encryption_key
            .take()
            .ok_or_else(|| PairingError::Protocol("no encryption key".to_string()))?;

        Ok(SessionKeys::derive(&shared, verify_key)?)
    }
}
