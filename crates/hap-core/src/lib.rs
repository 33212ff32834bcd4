//! # hap-core
//!
//! Error definitions shared across the pair-verify crates.
//!
//! This crate provides:
//! - The handshake failure taxonomy (`PairingError`)
//! - Accessory status codes (`PeerStatus`)
//! - Crypto and parse errors raised by the lower layers

pub mod error;

pub use error::{CryptoError, Error, PairingError, ParseError, PeerStatus, Result};
