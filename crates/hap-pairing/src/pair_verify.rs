//! Controller side of HomeKit pair-verify.
//!
//! Two round trips re-authenticate a previously paired accessory and agree
//! on fresh session keys:
//!
//! 1. Start: we send an ephemeral Curve25519 key; the accessory answers
//!    with its own ephemeral key and an encrypted, signed proof.
//! 2. Finish: we send our own encrypted, signed proof; the accessory
//!    answers with an optional status code.
//!
//! The controller is a sans-IO state machine. [`VerifyController::start_request`]
//! produces the first message and [`VerifyController::handle`] consumes each
//! response, returning the next message to send or the completed keys.
//! Any failure is terminal.

use hap_core::error::PairingError;
use hap_crypto::{
    chacha,
    curve25519::EcdhKeyPair,
    ed25519,
    tlv::{Tlv8, TlvType},
    SessionKeys,
};
use tracing::{debug, info, warn};

use crate::config::VerifyConfig;
use crate::identity::ControllerIdentity;
use crate::redact::Fingerprint;
use crate::session::VerifySession;
use crate::store::{AccessoryKey, AccessoryKeyStore};

/// The only method value pair-verify accepts.
pub const METHOD_PAIR_VERIFY: u8 = 0x00;

/// Nonce labels for the two encrypted sub-containers.
const PV_MSG02_NONCE: &[u8] = b"PV-Msg02";
const PV_MSG03_NONCE: &[u8] = b"PV-Msg03";

const SIGNATURE_LEN: usize = 64;

/// Sequence numbers carried in the state field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Sequence {
    StartRequest = 0x01,
    StartResponse = 0x02,
    FinishRequest = 0x03,
    FinishResponse = 0x04,
}

impl Sequence {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::StartRequest),
            0x02 => Some(Self::StartResponse),
            0x03 => Some(Self::FinishRequest),
            0x04 => Some(Self::FinishResponse),
            _ => None,
        }
    }
}

/// Observable handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyState {
    Init,
    AwaitingStartResponse,
    AwaitingFinishResponse,
    Complete,
    Aborted,
}

/// What to do after handling a response.
#[derive(Debug)]
pub enum VerifyStep {
    /// Send this message to the accessory and feed back its answer.
    Send(Tlv8),
    /// The accessory is verified and these keys are live.
    Complete(SessionKeys),
}

enum Stage {
    Init(VerifySession),
    AwaitingStartResponse(VerifySession),
    AwaitingFinishResponse(VerifySession),
    Complete,
    Aborted,
}

impl Stage {
    fn state(&self) -> VerifyState {
        match self {
            Self::Init(_) => VerifyState::Init,
            Self::AwaitingStartResponse(_) => VerifyState::AwaitingStartResponse,
            Self::AwaitingFinishResponse(_) => VerifyState::AwaitingFinishResponse,
            Self::Complete => VerifyState::Complete,
            Self::Aborted => VerifyState::Aborted,
        }
    }
}

/// Drives one pair-verify attempt against one accessory.
pub struct VerifyController {
    stage: Stage,
    identity: ControllerIdentity,
    accessory: AccessoryKey,
    config: VerifyConfig,
}

impl VerifyController {
    /// Create a controller with a fresh ephemeral key.
    pub fn new(identity: ControllerIdentity, accessory: AccessoryKey) -> Self {
        Self::with_ephemeral(identity, accessory, EcdhKeyPair::generate())
    }

    /// Create a controller for `handle`, resolving its long-term key from `store`.
    pub fn for_accessory<S: AccessoryKeyStore + ?Sized>(
        identity: ControllerIdentity,
        store: &S,
        handle: &str,
    ) -> Result<Self, PairingError> {
        let accessory = store
            .accessory(handle)
            .ok_or_else(|| PairingError::UnknownAccessory(handle.to_string()))?;
        Ok(Self::new(identity, accessory))
    }

    /// Create a controller around a caller-provided ephemeral key.
    pub fn with_ephemeral(
        identity: ControllerIdentity,
        accessory: AccessoryKey,
        ephemeral: EcdhKeyPair,
    ) -> Self {
        Self {
            stage: Stage::Init(VerifySession::with_ephemeral(ephemeral)),
            identity,
            accessory,
            config: VerifyConfig::default(),
        }
    }

    /// Replace the default configuration.
    pub fn with_config(mut self, config: VerifyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state(&self) -> VerifyState {
        self.stage.state()
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.stage, Stage::Complete)
    }

    /// The accessory this controller is verifying.
    pub fn accessory(&self) -> &AccessoryKey {
        &self.accessory
    }

    /// Build the start request. Valid only once, before any response.
    pub fn start_request(&mut self) -> Result<Tlv8, PairingError> {
        match std::mem::replace(&mut self.stage, Stage::Aborted) {
            Stage::Init(session) => {
                let mut request = Tlv8::new();
                request.set_byte(TlvType::Method, METHOD_PAIR_VERIFY);
                request.set_byte(TlvType::State, Sequence::StartRequest as u8);
                request.set(TlvType::PublicKey, session.public_key().to_vec());

                debug!(
                    accessory = %self.accessory.id,
                    ephemeral = %Fingerprint::new(&session.public_key()),
                    "sending pair-verify start request"
                );
                self.stage = Stage::AwaitingStartResponse(session);
                Ok(request)
            }
            Stage::Complete => {
                self.stage = Stage::Complete;
                Err(PairingError::Protocol(
                    "handshake already complete".to_string(),
                ))
            }
            _ => Err(PairingError::Protocol(
                "start request already sent".to_string(),
            )),
        }
    }

    /// Decode and handle one encoded response.
    pub fn handle_bytes(&mut self, data: &[u8]) -> Result<VerifyStep, PairingError> {
        match Tlv8::parse(data) {
            Ok(message) => self.handle(&message),
            Err(e) => {
                if !self.is_complete() {
                    self.stage = Stage::Aborted;
                }
                warn!(accessory = %self.accessory.id, error = %e, "pair-verify response undecodable");
                Err(e.into())
            }
        }
    }

    /// Handle one response from the accessory.
    pub fn handle(&mut self, message: &Tlv8) -> Result<VerifyStep, PairingError> {
        let stage = std::mem::replace(&mut self.stage, Stage::Aborted);
        match stage {
            Stage::Complete => {
                self.stage = Stage::Complete;
                return Err(PairingError::Protocol(
                    "handshake already complete".to_string(),
                ));
            }
            Stage::Aborted => {
                return Err(PairingError::Protocol("handshake aborted".to_string()));
            }
            _ => {}
        }

        match self.dispatch(stage, message) {
            Ok((next, step)) => {
                self.stage = next;
                Ok(step)
            }
            Err(e) => {
                warn!(accessory = %self.accessory.id, error = %e, "pair-verify aborted");
                Err(e)
            }
        }
    }

    fn dispatch(
        &self,
        stage: Stage,
        message: &Tlv8,
    ) -> Result<(Stage, VerifyStep), PairingError> {
        // The method may be omitted; when present it must be pair-verify.
        match message.get(TlvType::Method) {
            None | Some([METHOD_PAIR_VERIFY]) => {}
            Some(other) => {
                return Err(PairingError::Protocol(format!(
                    "unsupported method {:02x?}",
                    other
                )))
            }
        }

        let seq = message
            .get_byte(TlvType::State)?
            .ok_or_else(|| PairingError::Format("missing sequence number".to_string()))?;

        match (stage, Sequence::from_byte(seq)) {
            (Stage::AwaitingStartResponse(session), Some(Sequence::StartResponse)) => {
                self.handle_start_response(session, message)
            }
            (Stage::AwaitingFinishResponse(session), Some(Sequence::FinishResponse)) => {
                self.handle_finish_response(session, message)
            }
            (stage, _) => Err(PairingError::Protocol(format!(
                "unexpected sequence {} in state {:?}",
                seq,
                stage.state()
            ))),
        }
    }

    fn handle_start_response(
        &self,
        mut session: VerifySession,
        message: &Tlv8,
    ) -> Result<(Stage, VerifyStep), PairingError> {
        let peer_public = message.get(TlvType::PublicKey);
        if let Some(key) = peer_public.filter(|key| key.len() != 32) {
            return Err(PairingError::Format(format!(
                "accessory public key must be 32 bytes, got {}",
                key.len()
            )));
        }
        reject_on_status(message)?;

        let peer_public =
            peer_public.ok_or_else(|| PairingError::Format("missing public key".to_string()))?;
        let payload = message
            .get(TlvType::EncryptedData)
            .ok_or_else(|| PairingError::Format("missing encrypted data".to_string()))?;
        let (ciphertext, tag) = chacha::split_tag(payload).ok_or_else(|| {
            PairingError::Format(format!(
                "encrypted data too short for tag: {} bytes",
                payload.len()
            ))
        })?;

        session.agree(peer_public)?;
        session.derive_encryption_key()?;
        let own_public = session.public_key();
        let peer_public = session
            .peer_public_key()
            .ok_or_else(|| PairingError::Protocol("accessory key not agreed".to_string()))?;
        let key = session
            .encryption_key()
            .ok_or_else(|| PairingError::Protocol("encryption key not derived".to_string()))?;

        let plaintext = chacha::open(key.as_bytes(), PV_MSG02_NONCE, ciphertext, &tag, &[])?;
        let proof = Tlv8::parse(&plaintext)?;

        let identifier = proof
            .get_str(TlvType::Identifier)?
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PairingError::Format("missing accessory identifier".to_string()))?;
        let signature: [u8; SIGNATURE_LEN] = proof
            .get(TlvType::Signature)
            .ok_or_else(|| PairingError::Format("missing accessory signature".to_string()))?
            .try_into()
            .map_err(|_| PairingError::Format("accessory signature must be 64 bytes".to_string()))?;

        let material = signing_material(&peer_public, identifier.as_bytes(), &own_public);
        let verified = if self.config.strict_signatures {
            ed25519::verify_strict(&self.accessory.public_key, &material, &signature)
        } else {
            ed25519::verify(&self.accessory.public_key, &material, &signature)
        };
        verified.map_err(|_| {
            PairingError::Authentication(format!(
                "signature from {} does not verify under stored key {}",
                identifier,
                Fingerprint::new(&self.accessory.public_key)
            ))
        })?;

        if self.config.require_identifier_match && identifier != self.accessory.id {
            return Err(PairingError::Authentication(format!(
                "accessory proved identifier {}, expected {}",
                identifier, self.accessory.id
            )));
        }
        debug!(
            accessory = %identifier,
            ephemeral = %Fingerprint::new(&peer_public),
            "accessory proof verified"
        );

        let own_material = signing_material(&own_public, self.identity.id().as_bytes(), &peer_public);
        let mut own_proof = Tlv8::new();
        own_proof.set_str(TlvType::Identifier, self.identity.id());
        own_proof.set(TlvType::Signature, self.identity.sign(&own_material).to_vec());

        let (mut sealed, tag) =
            chacha::seal(key.as_bytes(), PV_MSG03_NONCE, &own_proof.encode(), &[])?;
        sealed.extend_from_slice(&tag);

        let mut request = Tlv8::new();
        request.set_byte(TlvType::Method, METHOD_PAIR_VERIFY);
        request.set_byte(TlvType::State, Sequence::FinishRequest as u8);
        request.set(TlvType::EncryptedData, sealed);

        Ok((Stage::AwaitingFinishResponse(session), VerifyStep::Send(request)))
    }

    fn handle_finish_response(
        &self,
        session: VerifySession,
        message: &Tlv8,
    ) -> Result<(Stage, VerifyStep), PairingError> {
        reject_on_status(message)?;

        let keys = session.into_session_keys()?;
        info!(accessory = %self.accessory.id, "pair-verify complete");
        Ok((Stage::Complete, VerifyStep::Complete(keys)))
    }
}

/// Fail with the accessory's status if it reported a non-zero one.
fn reject_on_status(message: &Tlv8) -> Result<(), PairingError> {
    match message.get_byte(TlvType::Error)? {
        Some(code) if code != 0 => Err(PairingError::PeerRejected { code }),
        _ => Ok(()),
    }
}

/// `signer_ephemeral || signer_id || peer_ephemeral`, the bytes each side signs.
pub fn signing_material(
    signer_ephemeral: &[u8; 32],
    signer_id: &[u8],
    peer_ephemeral: &[u8; 32],
) -> Vec<u8> {
    let mut material = Vec::with_capacity(64 + signer_id.len());
    material.extend_from_slice(signer_ephemeral);
    material.extend_from_slice(signer_id);
    material.extend_from_slice(peer_ephemeral);
    material
}
