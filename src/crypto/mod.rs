//! Cryptographic primitives.
//!
//! Everything above the filesystem vault is built on this module: AEAD,
//! KDFs, hashes, secp256k1 signing/recovery, and the text encodings used
//! for addresses.

pub mod aead;
pub mod encoding;
pub mod hashes;
pub mod kdf;
pub mod secp;

pub use aead::{aes_gcm_decrypt, aes_gcm_encrypt, random_iv, random_salt};
pub use encoding::{base58check_decode, base58check_encode, bech32_decode, bech32_encode, bech32m_encode, c32_decode, c32_encode};
pub use hashes::{double_sha256, hash160, keccak256, prefixed_message_hash, ripemd160, sha256, sha512, sha512_256};
pub use kdf::{pbkdf2_sha256, scrypt_derive, KdfParams};
pub use secp::{public_key_from_secret, recover, sign_recoverable, sign_schnorr, verify_schnorr, EcdsaSignature};

/// An encrypted blob, as stored for both keystore entries and credential
/// store entries. `kdf` records which KDF + parameters produced the key
/// that encrypted this blob, so future migrations can change defaults
/// without invalidating files already on disk.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EncryptedBlob {
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "base64_fixed_12")]
    pub iv: [u8; 12],
    #[serde(with = "base64_fixed_16")]
    pub auth_tag: [u8; 16],
    #[serde(with = "base64_fixed_32")]
    pub salt: [u8; 32],
    pub kdf: KdfParams,
    pub version: u8,
}

impl EncryptedBlob {
    /// Encrypt `plaintext` under a password, generating a fresh salt and
    /// IV and deriving the key with `kdf`.
    pub fn encrypt(plaintext: &[u8], password: &str, kdf: KdfParams) -> Result<Self, crate::common::error::AibtcError> {
        let salt = random_salt();
        let iv = random_iv();
        let key = kdf.derive(password.as_bytes(), &salt)?;
        let (ciphertext, auth_tag) = aes_gcm_encrypt(&key, &iv, plaintext);
        Ok(Self { ciphertext, iv, auth_tag, salt, kdf, version: 1 })
    }

    /// Decrypt with the given password, failing `AuthFailed` on a GCM tag
    /// mismatch (wrong password or on-disk tamper).
    pub fn decrypt(&self, password: &str) -> Result<Vec<u8>, crate::common::error::AibtcError> {
        let key = self.kdf.derive(password.as_bytes(), &self.salt)?;
        aes_gcm_decrypt(&key, &self.iv, &self.ciphertext, &self.auth_tag)
    }
}

macro_rules! base64_fixed_array {
    ($mod_name:ident, $len:expr) => {
        mod $mod_name {
            use base64::Engine;
            use serde::{Deserialize, Deserializer, Serialize, Serializer};

            pub fn serialize<S: Serializer>(bytes: &[u8; $len], s: S) -> Result<S::Ok, S::Error> {
                base64::engine::general_purpose::STANDARD.encode(bytes).serialize(s)
            }

            pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; $len], D::Error> {
                let s = String::deserialize(d)?;
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(s)
                    .map_err(serde::de::Error::custom)?;
                bytes.try_into().map_err(|_| serde::de::Error::custom(concat!("expected ", stringify!($len), " bytes")))
            }
        }
    };
}

base64_fixed_array!(base64_fixed_12, 12);
base64_fixed_array!(base64_fixed_16, 16);
base64_fixed_array!(base64_fixed_32, 32);

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        base64::engine::general_purpose::STANDARD.encode(bytes).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        base64::engine::general_purpose::STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}
