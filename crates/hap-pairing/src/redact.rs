//! Log-safe renderings of key material.

use sha2::{Digest, Sha512};
use std::fmt;

/// Short SHA-512 fingerprint of a public value, for log lines.
///
/// Only ever wrap public keys; the digest prefix is not a secrecy boundary.
pub struct Fingerprint<'a>(&'a [u8]);

impl<'a> Fingerprint<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Fingerprint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digest = Sha512::digest(self.0);
        f.write_str(&hex::encode(&digest[..8]))
    }
}
