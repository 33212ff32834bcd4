//! Handshake policy knobs.

/// Configuration for a [`VerifyController`](crate::VerifyController).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyConfig {
    /// Require the identifier inside the accessory's proof to equal the
    /// handle its long-term key was looked up under.
    pub require_identifier_match: bool,
    /// Use strict Ed25519 verification (rejects non-canonical signatures
    /// and small-order public keys).
    pub strict_signatures: bool,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            require_identifier_match: false,
            strict_signatures: true,
        }
    }
}

impl VerifyConfig {
    /// Create config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the accessory to prove the identifier we expect.
    pub fn require_identifier_match(mut self, enabled: bool) -> Self {
        self.require_identifier_match = enabled;
        self
    }

    /// Toggle strict signature verification.
    pub fn strict_signatures(mut self, enabled: bool) -> Self {
        self.strict_signatures = enabled;
        self
    }
}
