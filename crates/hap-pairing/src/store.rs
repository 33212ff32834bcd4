//! Lookup of accessory long-term public keys.
//!
//! Pair-verify only proves who the accessory is if we already hold the
//! LTPK it registered during pair-setup. Stores map an accessory handle
//! (normally its pairing identifier) to that key.

use hap_core::error::{ParseError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// An accessory's handle plus its long-term Ed25519 public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryKey {
    pub id: String,
    pub public_key: [u8; 32],
}

impl AccessoryKey {
    pub fn new(id: impl Into<String>, public_key: [u8; 32]) -> Self {
        Self {
            id: id.into(),
            public_key,
        }
    }
}

/// Source of accessory long-term public keys.
pub trait AccessoryKeyStore {
    /// Return the LTPK registered for `handle`, if any.
    fn public_key_for_accessory(&self, handle: &str) -> Option<[u8; 32]>;

    /// Resolve `handle` into an [`AccessoryKey`].
    fn accessory(&self, handle: &str) -> Option<AccessoryKey> {
        self.public_key_for_accessory(handle)
            .map(|public_key| AccessoryKey::new(handle, public_key))
    }
}

/// In-memory key store.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyStore {
    keys: HashMap<String, [u8; 32]>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the key for `handle`.
    pub fn insert(&mut self, handle: impl Into<String>, public_key: [u8; 32]) {
        self.keys.insert(handle.into(), public_key);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl AccessoryKeyStore for MemoryKeyStore {
    fn public_key_for_accessory(&self, handle: &str) -> Option<[u8; 32]> {
        self.keys.get(handle).copied()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct KeyFile {
    #[serde(default)]
    accessories: BTreeMap<String, String>,
}

/// JSON-backed key store.
///
/// ```json
/// { "accessories": { "AA:BB:CC:DD:EE:FF": "<64 hex chars>" } }
/// ```
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    path: PathBuf,
    keys: MemoryKeyStore,
}

impl FileKeyStore {
    /// Read the store at `path`. A missing file yields an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let keys = if path.exists() {
            Self::read(&path)?
        } else {
            MemoryKeyStore::new()
        };
        Ok(Self { path, keys })
    }

    fn read(path: &Path) -> Result<MemoryKeyStore> {
        let contents = std::fs::read_to_string(path)?;
        let file: KeyFile = serde_json::from_str(&contents)
            .map_err(|e| ParseError::InvalidFormat(format!("key store: {}", e)))?;

        let mut keys = MemoryKeyStore::new();
        for (handle, key_hex) in file.accessories {
            keys.insert(handle.clone(), decode_key(&handle, &key_hex)?);
        }
        Ok(keys)
    }

    /// Register (or replace) the key for `handle`. Call [`save`](Self::save)
    /// to persist.
    pub fn insert(&mut self, handle: impl Into<String>, public_key: [u8; 32]) {
        self.keys.insert(handle, public_key);
    }

    /// Write the store back to its file.
    pub fn save(&self) -> Result<()> {
        let file = KeyFile {
            accessories: self
                .keys
                .keys
                .iter()
                .map(|(handle, key)| (handle.clone(), hex::encode(key)))
                .collect(),
        };
        let contents = serde_json::to_string_pretty(&file)
            .map_err(|e| ParseError::InvalidFormat(format!("key store: {}", e)))?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl AccessoryKeyStore for FileKeyStore {
    fn public_key_for_accessory(&self, handle: &str) -> Option<[u8; 32]> {
        self.keys.public_key_for_accessory(handle)
    }
}

fn decode_key(handle: &str, key_hex: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(key_hex.trim())
        .map_err(|e| ParseError::InvalidHex(format!("{}: {}", handle, e)))?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| {
        ParseError::InvalidValue(format!("{}: public key must be 32 bytes, got {}", handle, len))
            .into()
    })
}
