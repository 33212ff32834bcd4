//! Transport seam between the controller and the network.

use hap_core::error::Result;
use async_trait::async_trait;

/// Carries pair-verify messages to an accessory.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    /// Deliver one encoded request and return the encoded response.
    async fn pair_verify(&mut self, request: &[u8]) -> Result<Vec<u8>>;
}
