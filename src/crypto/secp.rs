//! secp256k1 ECDSA (with RFC 6979 deterministic nonces and compact
//! recovery) and BIP-340 Schnorr signatures.

use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Keypair, Message, PublicKey, Secp256k1, SecretKey, XOnlyPublicKey};

use crate::common::error::AibtcError;

/// `(r || s, recovery id)`. `secp256k1`'s recoverable-signature API already
/// normalizes to low-s, satisfying the canonical-signature requirement.
pub struct EcdsaSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub rec_id: i32,
}

impl EcdsaSignature {
    pub fn to_compact(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.r);
        out[32..].copy_from_slice(&self.s);
        out
    }
}

/// Deterministic ECDSA sign over a 32-byte message hash, low-s canonical,
/// with the recovery id needed to recover the public key later.
pub fn sign_recoverable(msg_hash: &[u8; 32], sk: &[u8; 32]) -> Result<EcdsaSignature, AibtcError> {
    let secp = Secp256k1::signing_only();
    let secret_key =
        SecretKey::from_slice(sk).map_err(|e| AibtcError::internal(format!("invalid secret key: {e}")))?;
    let message = Message::from_digest(*msg_hash);

    let sig: RecoverableSignature = secp.sign_ecdsa_recoverable(&message, &secret_key);
    let (rec_id, compact) = sig.serialize_compact();

    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&compact[..32]);
    s.copy_from_slice(&compact[32..]);

    Ok(EcdsaSignature { r, s, rec_id: rec_id.to_i32() })
}

/// Recover the signer's compressed public key from a message hash and
/// recoverable signature.
pub fn recover(msg_hash: &[u8; 32], sig: &EcdsaSignature) -> Result<PublicKey, AibtcError> {
    let secp = Secp256k1::verification_only();
    let message = Message::from_digest(*msg_hash);
    let rec_id = RecoveryId::from_i32(sig.rec_id).map_err(|e| AibtcError::validation(format!("bad recovery id: {e}")))?;
    let recoverable = RecoverableSignature::from_compact(&sig.to_compact(), rec_id)
        .map_err(|e| AibtcError::validation(format!("malformed signature: {e}")))?;

    secp.recover_ecdsa(&message, &recoverable)
        .map_err(|e| AibtcError::validation(format!("recovery failed: {e}")))
}

/// Derive the compressed public key for a secret key.
pub fn public_key_from_secret(sk: &[u8; 32]) -> Result<PublicKey, AibtcError> {
    let secp = Secp256k1::new();
    let secret_key =
        SecretKey::from_slice(sk).map_err(|e| AibtcError::internal(format!("invalid secret key: {e}")))?;
    Ok(PublicKey::from_secret_key(&secp, &secret_key))
}

/// BIP-340 Schnorr sign (taproot key-path). `aux_rand` should be 32 bytes
/// of fresh randomness, mixed into the nonce per BIP-340 to harden against
/// fault attacks; it is not a substitute for a secret nonce.
pub fn sign_schnorr(msg: &[u8; 32], sk: &[u8; 32], aux_rand: &[u8; 32]) -> Result<[u8; 64], AibtcError> {
    let secp = Secp256k1::new();
    let secret_key =
        SecretKey::from_slice(sk).map_err(|e| AibtcError::internal(format!("invalid secret key: {e}")))?;
    let keypair = Keypair::from_secret_key(&secp, &secret_key);
    let message = Message::from_digest(*msg);

    let sig = secp.sign_schnorr_with_aux_rand(&message, &keypair, aux_rand);
    Ok(*sig.as_ref())
}

/// BIP-340 Schnorr verify against an x-only public key.
pub fn verify_schnorr(msg: &[u8; 32], pubkey: &XOnlyPublicKey, sig: &[u8; 64]) -> bool {
    let secp = Secp256k1::new();
    let message = Message::from_digest(*msg);
    let Ok(signature) = secp256k1::schnorr::Signature::from_slice(sig) else {
        return false;
    };
    secp.verify_schnorr(&signature, &message, pubkey).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; 32] {
        let mut sk = [0u8; 32];
        sk[31] = 1;
        sk
    }

    #[test]
    fn sign_then_recover_returns_same_pubkey() {
        let sk = test_key();
        let msg = [42u8; 32];
        let sig = sign_recoverable(&msg, &sk).unwrap();
        let recovered = recover(&msg, &sig).unwrap();
        let expected = public_key_from_secret(&sk).unwrap();
        assert_eq!(recovered, expected);
    }

    #[test]
    fn sign_is_deterministic() {
        let sk = test_key();
        let msg = [7u8; 32];
        let sig1 = sign_recoverable(&msg, &sk).unwrap();
        let sig2 = sign_recoverable(&msg, &sk).unwrap();
        assert_eq!(sig1.to_compact(), sig2.to_compact());
        assert_eq!(sig1.rec_id, sig2.rec_id);
    }

    #[test]
    fn schnorr_sign_then_verify() {
        let sk = test_key();
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(&sk).unwrap();
        let keypair = Keypair::from_secret_key(&secp, &secret_key);
        let (xonly, _) = XOnlyPublicKey::from_keypair(&keypair);

        let msg = [9u8; 32];
        let aux = [0u8; 32];
        let sig = sign_schnorr(&msg, &sk, &aux).unwrap();
        assert!(verify_schnorr(&msg, &xonly, &sig));
    }

    #[test]
    fn schnorr_verify_fails_for_wrong_message() {
        let sk = test_key();
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(&sk).unwrap();
        let keypair = Keypair::from_secret_key(&secp, &secret_key);
        let (xonly, _) = XOnlyPublicKey::from_keypair(&keypair);

        let sig = sign_schnorr(&[9u8; 32], &sk, &[0u8; 32]).unwrap();
        assert!(!verify_schnorr(&[10u8; 32], &xonly, &sig));
    }
}
