//! TLV8 encoding/decoding for HomeKit pairing messages.
//!
//! TLV8 format: [Type: 1 byte][Length: 1 byte][Value: 0-255 bytes]
//! Values longer than 255 bytes are fragmented across consecutive items
//! of the same type.

use hap_core::error::ParseError;

/// TLV type constants for HomeKit pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TlvType {
    Method = 0x00,
    Identifier = 0x01,
    Salt = 0x02,
    PublicKey = 0x03,
    Proof = 0x04,
    EncryptedData = 0x05,
    State = 0x06,
    Error = 0x07,
    RetryDelay = 0x08,
    Certificate = 0x09,
    Signature = 0x0A,
    Permissions = 0x0B,
    FragmentData = 0x0C,
    FragmentLast = 0x0D,
    Flags = 0x13,
    Separator = 0xFF,
}

/// TLV8 message with items kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tlv8 {
    items: Vec<(u8, Vec<u8>)>,
}

impl Tlv8 {
    /// Create empty TLV8 message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TLV8 from bytes.
    ///
    /// Consecutive items with the same type are joined into one value.
    /// A type that reappears after a different type is rejected.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let mut items: Vec<(u8, Vec<u8>)> = Vec::new();
        let mut i = 0;

        while i < data.len() {
            if i + 2 > data.len() {
                return Err(ParseError::InvalidFormat(
                    "TLV8: truncated header".to_string(),
                ));
            }

            let typ = data[i];
            let len = data[i + 1] as usize;
            i += 2;

            if i + len > data.len() {
                return Err(ParseError::InvalidFormat(format!(
                    "TLV8: truncated value (expected {} bytes, got {})",
                    len,
                    data.len() - i
                )));
            }

            let value = &data[i..i + len];
            i += len;

            // Fragment continuation
            if let Some((last, existing)) = items.last_mut() {
                if *last == typ {
                    existing.extend_from_slice(value);
                    continue;
                }
            }

            // A type reappearing after another type would shadow the first
            // value in `get`; HAP only allows repeats as adjacent fragments.
            if items.iter().any(|(t, _)| *t == typ) {
                return Err(ParseError::InvalidFormat(format!(
                    "TLV8: duplicate type 0x{:02x}",
                    typ
                )));
            }
            items.push((typ, value.to_vec()));
        }

        Ok(Self { items })
    }

    /// Encode to bytes.
    ///
    /// Values > 255 bytes are automatically fragmented.
    pub fn encode(&self) -> Vec<u8> {
        let mut result = Vec::new();

        for (typ, value) in &self.items {
            if value.is_empty() {
                result.push(*typ);
                result.push(0);
            } else {
                for chunk in value.chunks(255) {
                    result.push(*typ);
                    result.push(chunk.len() as u8);
                    result.extend_from_slice(chunk);
                }
            }
        }

        result
    }

    /// Get value for type.
    pub fn get(&self, typ: TlvType) -> Option<&[u8]> {
        self.items
            .iter()
            .find(|(t, _)| *t == typ as u8)
            .map(|(_, v)| v.as_slice())
    }

    /// Get a single-byte value. Longer or empty values yield an error.
    pub fn get_byte(&self, typ: TlvType) -> Result<Option<u8>, ParseError> {
        match self.get(typ) {
            None => Ok(None),
            Some([b]) => Ok(Some(*b)),
            Some(v) => Err(ParseError::InvalidValue(format!(
                "{:?}: expected 1 byte, got {}",
                typ,
                v.len()
            ))),
        }
    }

    /// Get a UTF-8 string value.
    pub fn get_str(&self, typ: TlvType) -> Result<Option<&str>, ParseError> {
        match self.get(typ) {
            None => Ok(None),
            Some(v) => std::str::from_utf8(v)
                .map(Some)
                .map_err(|_| ParseError::InvalidValue(format!("{:?}: not valid UTF-8", typ))),
        }
    }

    /// Set value for type, replacing any existing value in place.
    pub fn set(&mut self, typ: TlvType, value: impl Into<Vec<u8>>) {
        let value = value.into();
        match self.items.iter_mut().find(|(t, _)| *t == typ as u8) {
            Some((_, existing)) => *existing = value,
            None => self.items.push((typ as u8, value)),
        }
    }

    /// Set a single-byte value.
    pub fn set_byte(&mut self, typ: TlvType, value: u8) {
        self.set(typ, vec![value]);
    }

    /// Set a string value.
    pub fn set_str(&mut self, typ: TlvType, value: &str) {
        self.set(typ, value.as_bytes());
    }

    /// Check if type is present.
    pub fn contains(&self, typ: TlvType) -> bool {
        self.get(typ).is_some()
    }

    /// Get state value (sequence number).
    pub fn state(&self) -> Option<u8> {
        self.get(TlvType::State).and_then(|v| v.first().copied())
    }
}
