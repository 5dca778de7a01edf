//! AES-256-GCM authenticated encryption.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};

use crate::common::error::AibtcError;

/// Encrypt `plaintext` under `key` (32 B) and `iv` (12 B), returning
/// `(ciphertext, tag)` with the tag split out (16 B) so callers can store
/// it alongside `ciphertext` per the encrypted-blob data model.
pub fn aes_gcm_encrypt(key: &[u8; 32], iv: &[u8; 12], plaintext: &[u8]) -> (Vec<u8>, [u8; 16]) {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(iv);
    // aes-gcm appends the 16-byte tag to the ciphertext; split it back out
    // so storage matches the `{ciphertext, authTag}` data model fields.
    let mut out = cipher
        .encrypt(nonce, Payload { msg: plaintext, aad: &[] })
        .expect("AES-GCM encryption with a fixed-size key/nonce cannot fail");
    let tag_start = out.len() - 16;
    let tag: [u8; 16] = out[tag_start..].try_into().expect("tag is exactly 16 bytes");
    out.truncate(tag_start);
    (out, tag)
}

/// Decrypt `ciphertext` with the detached `tag`, failing with
/// `AibtcError::AuthFailed` on any tag mismatch (wrong password or tamper).
pub fn aes_gcm_decrypt(
    key: &[u8; 32],
    iv: &[u8; 12],
    ciphertext: &[u8],
    tag: &[u8; 16],
) -> Result<Vec<u8>, AibtcError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(iv);

    let mut combined = Vec::with_capacity(ciphertext.len() + 16);
    combined.extend_from_slice(ciphertext);
    combined.extend_from_slice(tag);

    cipher
        .decrypt(nonce, Payload { msg: &combined, aad: &[] })
        .map_err(|_| AibtcError::AuthFailed)
}

/// Generate a fresh random 12-byte IV.
pub fn random_iv() -> [u8; 12] {
    use rand::RngCore;
    let mut iv = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut iv);
    iv
}

/// Generate a fresh random 32-byte salt.
pub fn random_salt() -> [u8; 32] {
    use rand::RngCore;
    let mut salt = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_round_trips() {
        let key = [7u8; 32];
        let iv = random_iv();
        let plaintext = b"correct horse battery staple";

        let (ciphertext, tag) = aes_gcm_encrypt(&key, &iv, plaintext);
        let decrypted = aes_gcm_decrypt(&key, &iv, &ciphertext, &tag).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn tampered_tag_fails_auth() {
        let key = [7u8; 32];
        let iv = random_iv();
        let (ciphertext, mut tag) = aes_gcm_encrypt(&key, &iv, b"secret");
        tag[0] ^= 0xff;
        let err = aes_gcm_decrypt(&key, &iv, &ciphertext, &tag).unwrap_err();
        assert_eq!(err.error_code(), "AUTH_FAILED");
    }

    #[test]
    fn wrong_key_fails_auth() {
        let key = [7u8; 32];
        let iv = random_iv();
        let (ciphertext, tag) = aes_gcm_encrypt(&key, &iv, b"secret");
        let wrong_key = [8u8; 32];
        assert!(aes_gcm_decrypt(&wrong_key, &iv, &ciphertext, &tag).is_err());
    }

    #[test]
    fn fresh_iv_changes_ciphertext() {
        let key = [1u8; 32];
        let (c1, _) = aes_gcm_encrypt(&key, &random_iv(), b"same plaintext");
        let (c2, _) = aes_gcm_encrypt(&key, &random_iv(), b"same plaintext");
        assert_ne!(c1, c2);
    }
}
