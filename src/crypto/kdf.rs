//! Key derivation functions.
//!
//! The credential store uses PBKDF2-SHA256; the keystore uses scrypt. This
//! split is intentional and preserved for on-disk compatibility — see
//! `KdfParams` in the data model.

use hmac::Hmac;
use pbkdf2::pbkdf2;
use scrypt::Params as ScryptParams;
use sha2::Sha256;

use crate::common::error::AibtcError;

pub const PBKDF2_DEFAULT_ITERATIONS: u32 = 100_000;
pub const SCRYPT_DEFAULT_N: u32 = 16_384;
pub const SCRYPT_DEFAULT_R: u32 = 8;
pub const SCRYPT_DEFAULT_P: u32 = 1;
pub const KDF_KEY_LEN: usize = 32;

/// KDF parameters stored alongside each encrypted blob, so future key
/// rotations can change the cost parameters without breaking old files.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "algorithm", rename_all = "lowercase")]
pub enum KdfParams {
    Pbkdf2 { iterations: u32, key_len: usize },
    Scrypt { n: u32, r: u32, p: u32, key_len: usize },
}

impl KdfParams {
    pub fn pbkdf2_default() -> Self {
        Self::Pbkdf2 { iterations: PBKDF2_DEFAULT_ITERATIONS, key_len: KDF_KEY_LEN }
    }

    pub fn scrypt_default() -> Self {
        Self::Scrypt {
            n: SCRYPT_DEFAULT_N,
            r: SCRYPT_DEFAULT_R,
            p: SCRYPT_DEFAULT_P,
            key_len: KDF_KEY_LEN,
        }
    }

    pub fn derive(&self, password: &[u8], salt: &[u8; 32]) -> Result<[u8; 32], AibtcError> {
        match self {
            KdfParams::Pbkdf2 { iterations, .. } => Ok(pbkdf2_sha256(password, salt, *iterations)),
            KdfParams::Scrypt { n, r, p, .. } => scrypt_derive(password, salt, *n, *r, *p),
        }
    }
}

pub fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2::<Hmac<Sha256>>(password, salt, iterations, &mut key)
        .expect("pbkdf2 with a 32-byte output cannot fail");
    key
}

pub fn scrypt_derive(password: &[u8], salt: &[u8], n: u32, r: u32, p: u32) -> Result<[u8; 32], AibtcError> {
    let log_n = (n as f64).log2();
    if log_n.fract() != 0.0 {
        return Err(AibtcError::config("scrypt N must be a power of two"));
    }
    let params = ScryptParams::new(log_n as u8, r, p, KDF_KEY_LEN)
        .map_err(|e| AibtcError::config(format!("invalid scrypt params: {e}")))?;

    let mut key = [0u8; 32];
    scrypt::scrypt(password, salt, &params, &mut key)
        .map_err(|e| AibtcError::internal(format!("scrypt derivation failed: {e}")))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pbkdf2_is_deterministic() {
        let salt = [1u8; 32];
        let a = pbkdf2_sha256(b"password123", &salt, 1_000);
        let b = pbkdf2_sha256(b"password123", &salt, 1_000);
        assert_eq!(a, b);
    }

    #[test]
    fn scrypt_is_deterministic() {
        let salt = [2u8; 32];
        let a = scrypt_derive(b"password123", &salt, 1024, 8, 1).unwrap();
        let b = scrypt_derive(b"password123", &salt, 1024, 8, 1).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_salts_produce_different_keys() {
        let a = pbkdf2_sha256(b"pw", &[1u8; 32], 1_000);
        let b = pbkdf2_sha256(b"pw", &[2u8; 32], 1_000);
        assert_ne!(a, b);
    }

    #[test]
    fn kdf_params_derive_dispatches_correctly() {
        let salt = [3u8; 32];
        let params = KdfParams::Pbkdf2 { iterations: 1_000, key_len: 32 };
        let direct = pbkdf2_sha256(b"pw", &salt, 1_000);
        assert_eq!(params.derive(b"pw", &salt).unwrap(), direct);
    }
}
