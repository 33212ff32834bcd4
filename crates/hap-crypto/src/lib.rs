//! # hap-crypto
//!
//! Cryptographic building blocks for HomeKit pair-verify.
//!
//! This crate provides:
//! - Curve25519 ECDH for ephemeral key agreement
//! - Ed25519 for long-term identity signatures
//! - ChaCha20-Poly1305 with label nonces for handshake payloads
//! - HKDF-SHA512 for session key derivation
//! - TLV8 message encoding
//!
//! All secret material is zeroized on drop.

pub mod chacha;
pub mod curve25519;
pub mod ed25519;
pub mod hkdf;
pub mod keys;
pub mod tlv;

pub use keys::{EncryptionKey, SessionKeys, SharedSecret};
pub use tlv::{Tlv8, TlvType};
