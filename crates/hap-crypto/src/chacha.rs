//! ChaCha20-Poly1305 AEAD for pair-verify sub-TLVs.
//!
//! Pair-verify messages carry `ciphertext || tag` in a single TLV item and
//! use fixed ASCII nonce labels (`PV-Msg02`, `PV-Msg03`) instead of counters.

use chacha20poly1305::{
    aead::{AeadInPlace, KeyInit},
    ChaCha20Poly1305, Key, Nonce, Tag,
};
use hap_core::error::CryptoError;
use zeroize::Zeroize;

/// Length of the Poly1305 authentication tag.
pub const TAG_LEN: usize = 16;

/// Create a 12-byte nonce from a label (right-aligned, left-padded with zeros).
///
/// `PV-Msg02` becomes `\x00\x00\x00\x00PV-Msg02`.
pub fn nonce_from_label(label: &[u8]) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    let len = label.len().min(12);
    let start = 12 - len;
    nonce[start..].copy_from_slice(&label[..len]);
    nonce
}

/// Encrypt `plaintext`, returning the ciphertext and the detached tag.
pub fn seal(
    key: &[u8; 32],
    label: &[u8],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<(Vec<u8>, [u8; TAG_LEN]), CryptoError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let nonce = nonce_from_label(label);

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&nonce), aad, &mut buffer)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut tag_arr = [0u8; TAG_LEN];
    tag_arr.copy_from_slice(&tag);
    Ok((buffer, tag_arr))
}

/// Verify the tag and decrypt `ciphertext`.
///
/// On failure nothing decrypted is returned and the working buffer is wiped.
pub fn open(
    key: &[u8; 32],
    label: &[u8],
    ciphertext: &[u8],
    tag: &[u8; TAG_LEN],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let nonce = nonce_from_label(label);

    let mut buffer = ciphertext.to_vec();
    match cipher.decrypt_in_place_detached(
        Nonce::from_slice(&nonce),
        aad,
        &mut buffer,
        Tag::from_slice(tag),
    ) {
        Ok(()) => Ok(buffer),
        Err(_) => {
            buffer.zeroize();
            Err(CryptoError::AuthTagMismatch)
        }
    }
}

/// Split a wire payload into ciphertext and trailing tag.
///
/// Returns `None` if the payload is too short to hold a tag.
pub fn split_tag(payload: &[u8]) -> Option<(&[u8], [u8; TAG_LEN])> {
    let boundary = payload.len().checked_sub(TAG_LEN)?;
    let (ciphertext, tag) = payload.split_at(boundary);
    let mut tag_arr = [0u8; TAG_LEN];
    tag_arr.copy_from_slice(tag);
    Some((ciphertext, tag_arr))
}
