//! The controller's long-term identity.
//!
//! A controller is known to accessories by an identifier string and an
//! Ed25519 key pair. Both are fixed at pair-setup time, so the same pair
//! must be presented on every pair-verify.

use hap_core::error::{ParseError, Result};
use hap_crypto::ed25519::IdentityKeyPair;
use std::path::Path;
use tracing::info;

use crate::redact::Fingerprint;

/// Identifier plus long-term signing key (LTSK/LTPK) of this controller.
#[derive(Clone, Debug)]
pub struct ControllerIdentity {
    id: String,
    keypair: IdentityKeyPair,
}

impl ControllerIdentity {
    /// Generate a fresh identity whose identifier is derived from its key.
    pub fn generate() -> Self {
        Self::from_keypair(IdentityKeyPair::generate())
    }

    /// Wrap an existing key pair, deriving a UUID-shaped identifier from
    /// the first 16 bytes of its public key.
    pub fn from_keypair(keypair: IdentityKeyPair) -> Self {
        let pk = hex::encode_upper(&keypair.public_key()[..16]);
        let id = format!(
            "{}-{}-{}-{}-{}",
            &pk[0..8],
            &pk[8..12],
            &pk[12..16],
            &pk[16..20],
            &pk[20..32]
        );
        Self { id, keypair }
    }

    /// Wrap an existing key pair under a caller-chosen identifier.
    pub fn with_id(keypair: IdentityKeyPair, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            keypair,
        }
    }

    /// Identifier sent inside the finish request.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Long-term public key (LTPK).
    pub fn public_key(&self) -> [u8; 32] {
        self.keypair.public_key()
    }

    /// Sign with the long-term secret key.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.keypair.sign(message)
    }

    /// Load an identity file.
    ///
    /// Format: identifier on the first line, hex-encoded 32-byte Ed25519
    /// seed on the second.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut lines = contents.lines().map(str::trim);

        let id = lines
            .next()
            .filter(|id| !id.is_empty())
            .ok_or(ParseError::MissingField("identifier"))?
            .to_string();

        let seed_hex = lines.next().ok_or(ParseError::MissingField("seed"))?;
        let seed: [u8; 32] = hex::decode(seed_hex)
            .map_err(|e| ParseError::InvalidHex(e.to_string()))?
            .try_into()
            .map_err(|v: Vec<u8>| {
                ParseError::InvalidValue(format!("seed must be 32 bytes, got {}", v.len()))
            })?;

        Ok(Self {
            id,
            keypair: IdentityKeyPair::from_seed(&seed),
        })
    }

    /// Write the identity in the format [`load`](Self::load) reads.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = format!("{}\n{}\n", self.id, hex::encode(self.keypair.seed()));
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Load `path`, or generate and persist a new identity if it is absent.
    ///
    /// `new_id` names a newly generated identity; without it the identifier
    /// is derived from the key. It is ignored when `path` already exists.
    pub fn load_or_generate(path: &Path, new_id: Option<&str>) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }

        let identity = match new_id {
            Some(id) => Self::with_id(IdentityKeyPair::generate(), id),
            None => Self::generate(),
        };
        identity.save(path)?;
        info!(
            id = identity.id(),
            ltpk = %Fingerprint::new(&identity.public_key()),
            path = %path.display(),
            "created controller identity"
        );
        Ok(identity)
    }
}
