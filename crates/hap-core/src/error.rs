//! Error types for the HomeKit pair-verify client.

use std::fmt;
use thiserror::Error;

/// Primary error type for all pair-verify operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pairing error: {0}")]
    Pairing(#[from] PairingError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Errors that abort a pair-verify handshake.
///
/// Every variant is terminal: the handshake that produced it cannot be
/// continued and a new attempt needs fresh ephemeral keys.
#[derive(Error, Debug)]
pub enum PairingError {
    /// A field or container is structurally wrong.
    #[error("Malformed message: {0}")]
    Format(String),

    /// Unexpected method, sequence number, or out-of-order call.
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// AEAD authentication or key agreement failed.
    #[error("Crypto failure: {0}")]
    Crypto(#[from] CryptoError),

    /// The peer's signature did not verify against its long-term key.
    #[error("Accessory authentication failed: {0}")]
    Authentication(String),

    /// The accessory answered with a non-zero status code.
    #[error("Pairing rejected by accessory: {}", status_of(.code))]
    PeerRejected { code: u8 },

    /// No long-term key is known for the accessory handle.
    #[error("No long-term public key stored for accessory {0}")]
    UnknownAccessory(String),
}

impl PairingError {
    /// Status reported by the accessory, if this is a rejection.
    pub fn peer_status(&self) -> Option<PeerStatus> {
        match self {
            Self::PeerRejected { code } => Some(PeerStatus::from(*code)),
            _ => None,
        }
    }
}

impl From<ParseError> for PairingError {
    fn from(err: ParseError) -> Self {
        Self::Format(err.to_string())
    }
}

fn status_of(code: &u8) -> PeerStatus {
    PeerStatus::from(*code)
}

/// Status codes carried in the TLV8 error field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerStatus {
    Unknown,
    Authentication,
    Backoff,
    MaxPeers,
    MaxTries,
    Unavailable,
    Busy,
    Other(u8),
}

impl PeerStatus {
    /// Raw wire value.
    pub fn code(self) -> u8 {
        match self {
            Self::Unknown => 0x01,
            Self::Authentication => 0x02,
            Self::Backoff => 0x03,
            Self::MaxPeers => 0x04,
            Self::MaxTries => 0x05,
            Self::Unavailable => 0x06,
            Self::Busy => 0x07,
            Self::Other(code) => code,
        }
    }
}

impl From<u8> for PeerStatus {
    fn from(code: u8) -> Self {
        match code {
            0x01 => Self::Unknown,
            0x02 => Self::Authentication,
            0x03 => Self::Backoff,
            0x04 => Self::MaxPeers,
            0x05 => Self::MaxTries,
            0x06 => Self::Unavailable,
            0x07 => Self::Busy,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for PeerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "Unknown",
            Self::Authentication => "Authentication",
            Self::Backoff => "Backoff (rate limited)",
            Self::MaxPeers => "MaxPeers",
            Self::MaxTries => "MaxTries",
            Self::Unavailable => "Unavailable",
            Self::Busy => "Busy",
            Self::Other(_) => "Unknown error code",
        };
        write!(f, "error 0x{:02x}: {}", self.code(), name)
    }
}

/// Cryptographic operation errors.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Key agreement failed: {0}")]
    KeyAgreement(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Authentication tag mismatch")]
    AuthTagMismatch,

    #[error("Signature verification failed")]
    SignatureInvalid,
}

/// Parsing errors for wire and storage formats.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid hex value: {0}")]
    InvalidHex(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Convenience Result type.
pub type Result<T> = std::result::Result<T, Error>;
