//! In-process accessory used to drive the controller in tests.

use hap_core::error::{PairingError, ParseError, Result};
use hap_crypto::{
    chacha,
    curve25519::EcdhKeyPair,
    ed25519::{self, IdentityKeyPair},
    hkdf,
    tlv::{Tlv8, TlvType},
};

use crate::store::AccessoryKey;

/// Accessory half of pair-verify with knobs for misbehaving.
pub(crate) struct MockAccessory {
    id: String,
    identity: IdentityKeyPair,
    ephemeral: Option<EcdhKeyPair>,
    ephemeral_public: [u8; 32],
    controller_public: Option<[u8; 32]>,
    verify_key: Option<[u8; 32]>,
    /// Identifier the controller presented in its finish request.
    pub(crate) controller_id: Option<String>,
    /// When set, the finish request's signature is checked against it.
    pub(crate) controller_ltpk: Option<[u8; 32]>,
    /// Sign the proof with a different key.
    pub(crate) sign_with: Option<IdentityKeyPair>,
    /// Sign `controller_epk || id || accessory_epk` instead.
    pub(crate) sign_controller_order: bool,
    /// Flip this bit of the start-response tag.
    pub(crate) flip_tag_bit: Option<usize>,
    /// Identifier placed in the proof instead of the real one.
    pub(crate) claimed_id: Option<String>,
    /// Encrypt these bytes instead of the real proof.
    pub(crate) proof_override: Option<Vec<u8>>,
    pub(crate) start_status: Option<u8>,
    pub(crate) finish_status: Option<u8>,
}

impl MockAccessory {
    pub(crate) fn new(id: &str) -> Self {
        Self::with_keys(id, IdentityKeyPair::generate(), EcdhKeyPair::generate())
    }

    pub(crate) fn with_keys(id: &str, identity: IdentityKeyPair, ephemeral: EcdhKeyPair) -> Self {
        Self {
            id: id.to_string(),
            identity,
            ephemeral_public: ephemeral.public_key(),
            ephemeral: Some(ephemeral),
            controller_public: None,
            verify_key: None,
            controller_id: None,
            controller_ltpk: None,
            sign_with: None,
            sign_controller_order: false,
            flip_tag_bit: None,
            claimed_id: None,
            proof_override: None,
            start_status: None,
            finish_status: None,
        }
    }

    /// What a controller would have stored after pair-setup.
    pub(crate) fn accessory_key(&self) -> AccessoryKey {
        AccessoryKey::new(self.id.clone(), self.identity.public_key())
    }

    pub(crate) fn ephemeral_public(&self) -> [u8; 32] {
        self.ephemeral_public
    }

    pub(crate) fn verify_key(&self) -> Option<[u8; 32]> {
        self.verify_key
    }

    /// Answer one encoded request.
    pub(crate) fn respond(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        let request = Tlv8::parse(request)?;
        let response = match request.state() {
            Some(1) => self.start_response(&request)?,
            Some(3) => self.finish_response(&request)?,
            other => {
                return Err(
                    PairingError::Protocol(format!("accessory got sequence {:?}", other)).into(),
                )
            }
        };
        Ok(response.encode())
    }

    fn start_response(&mut self, request: &Tlv8) -> Result<Tlv8> {
        let controller_public: [u8; 32] = request
            .get(TlvType::PublicKey)
            .ok_or(ParseError::MissingField("public key"))?
            .try_into()
            .map_err(|_| ParseError::InvalidValue("public key length".to_string()))?;

        let mut response = Tlv8::new();
        response.set_byte(TlvType::State, 2);
        if let Some(code) = self.start_status {
            response.set_byte(TlvType::Error, code);
            return Ok(response);
        }

        let ephemeral = self
            .ephemeral
            .take()
            .ok_or_else(|| PairingError::Protocol("accessory ephemeral used".to_string()))?;
        let shared = ephemeral.diffie_hellman(&controller_public)?;
        let key = hkdf::derive_pair_verify_key(&shared)?;

        let id = self.claimed_id.clone().unwrap_or_else(|| self.id.clone());
        let (first, last) = if self.sign_controller_order {
            (controller_public, self.ephemeral_public)
        } else {
            (self.ephemeral_public, controller_public)
        };
        let mut material = first.to_vec();
        material.extend_from_slice(id.as_bytes());
        material.extend_from_slice(&last);
        let signature = self.sign_with.as_ref().unwrap_or(&self.identity).sign(&material);

        let proof = self.proof_override.clone().unwrap_or_else(|| {
            let mut inner = Tlv8::new();
            inner.set_str(TlvType::Identifier, &id);
            inner.set(TlvType::Signature, signature.to_vec());
            inner.encode()
        });

        let (mut sealed, mut tag) = chacha::seal(&key, b"PV-Msg02", &proof, &[])?;
        if let Some(bit) = self.flip_tag_bit {
            tag[bit / 8] ^= 1 << (bit % 8);
        }
        sealed.extend_from_slice(&tag);

        response.set(TlvType::PublicKey, self.ephemeral_public.to_vec());
        response.set(TlvType::EncryptedData, sealed);

        self.controller_public = Some(controller_public);
        self.verify_key = Some(key);
        Ok(response)
    }

    fn finish_response(&mut self, request: &Tlv8) -> Result<Tlv8> {
        let key = self
            .verify_key
            .ok_or_else(|| PairingError::Protocol("finish before start".to_string()))?;
        let controller_public = self
            .controller_public
            .ok_or_else(|| PairingError::Protocol("finish before start".to_string()))?;

        let payload = request
            .get(TlvType::EncryptedData)
            .ok_or(ParseError::MissingField("encrypted data"))?;
        let (ciphertext, tag) = chacha::split_tag(payload)
            .ok_or_else(|| ParseError::InvalidFormat("short encrypted data".to_string()))?;
        let inner = Tlv8::parse(&chacha::open(&key, b"PV-Msg03", ciphertext, &tag, &[])?)?;

        let id = inner
            .get_str(TlvType::Identifier)?
            .ok_or(ParseError::MissingField("identifier"))?
            .to_string();
        let signature: [u8; 64] = inner
            .get(TlvType::Signature)
            .ok_or(ParseError::MissingField("signature"))?
            .try_into()
            .map_err(|_| ParseError::InvalidValue("signature length".to_string()))?;

        let mut response = Tlv8::new();
        response.set_byte(TlvType::State, 4);

        if let Some(ltpk) = self.controller_ltpk {
            let mut material = controller_public.to_vec();
            material.extend_from_slice(id.as_bytes());
            material.extend_from_slice(&self.ephemeral_public);
            if ed25519::verify_strict(&ltpk, &material, &signature).is_err() {
                response.set_byte(TlvType::Error, 0x02);
                return Ok(response);
            }
        }

        self.controller_id = Some(id);
        if let Some(code) = self.finish_status {
            response.set_byte(TlvType::Error, code);
        }
        Ok(response)
    }
}
