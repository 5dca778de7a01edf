//! Stacks plain-text message signing: `sha256("\x17Stacks Signed
//! Message:\n" || varint(len) || message)`, RSV (65-byte) hex output.

use crate::common::error::AibtcError;
use crate::crypto::{c32_encode, hash160, prefixed_message_hash, public_key_from_secret, recover, sign_recoverable, EcdsaSignature};
use crate::env::Network;

const STACKS_MESSAGE_PREFIX: &[u8] = b"\x17Stacks Signed Message:\n";

fn message_hash(message: &str) -> [u8; 32] {
    prefixed_message_hash(STACKS_MESSAGE_PREFIX, message.as_bytes(), false)
}

/// Sign with the 32-byte Stacks private key (the first 32 bytes of the
/// 33-byte compressed-marker form), returning 65-byte RSV hex.
pub fn sign(message: &str, stx_private_key_33: &[u8; 33]) -> Result<String, AibtcError> {
    let sk: [u8; 32] = stx_private_key_33[..32].try_into().expect("first 32 bytes");
    let hash = message_hash(message);
    let sig = sign_recoverable(&hash, &sk)?;

    let mut rsv = [0u8; 65];
    rsv[..32].copy_from_slice(&sig.r);
    rsv[32..64].copy_from_slice(&sig.s);
    rsv[64] = sig.rec_id as u8;

    Ok(hex::encode(rsv))
}

pub struct VerifyResult {
    pub is_valid: bool,
    pub recovered_address: String,
}

/// Recover the signer's public key, derive its c32 address, and compare
/// to `expected_address`.
pub fn verify(message: &str, signature_rsv_hex: &str, expected_address: &str, network: Network) -> Result<VerifyResult, AibtcError> {
    let rsv = hex::decode(signature_rsv_hex).map_err(|e| AibtcError::validation(format!("invalid hex signature: {e}")))?;
    if rsv.len() != 65 {
        return Err(AibtcError::validation("Stacks RSV signature must be 65 bytes"));
    }

    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&rsv[..32]);
    s.copy_from_slice(&rsv[32..64]);
    let sig = EcdsaSignature { r, s, rec_id: rsv[64] as i32 };

    let hash = message_hash(message);
    let pubkey = recover(&hash, &sig)?;
    let hash160 = hash160(&pubkey.serialize());
    let recovered_address = c32_encode(network.stacks_version_byte(), &hash160);

    Ok(VerifyResult { is_valid: recovered_address == expected_address, recovered_address })
}

/// Derive the c32 address a private key would sign as, without signing
/// anything — used by verification callers that only have the key.
pub fn address_for_key(stx_private_key_33: &[u8; 33], network: Network) -> Result<String, AibtcError> {
    let sk: [u8; 32] = stx_private_key_33[..32].try_into().expect("first 32 bytes");
    let pubkey = public_key_from_secret(&sk)?;
    let hash = hash160(&pubkey.serialize());
    Ok(c32_encode(network.stacks_version_byte(), &hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::hd::derive_account;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn sign_then_verify_recovers_signer_address() {
        let account = derive_account(TEST_MNEMONIC, "", Network::Testnet).unwrap();
        let message = "hello stacks";
        let sig = sign(message, &account.stx_private_key).unwrap();

        let result = verify(message, &sig, &account.stx_address, Network::Testnet).unwrap();
        assert!(result.is_valid);
    }

    #[test]
    fn verify_fails_for_wrong_address() {
        let account = derive_account(TEST_MNEMONIC, "", Network::Testnet).unwrap();
        let sig = sign("msg", &account.stx_private_key).unwrap();

        let result = verify("msg", &sig, "ST000000000000000000002AMW42H", Network::Testnet).unwrap();
        assert!(!result.is_valid);
    }

    #[test]
    fn address_for_key_matches_derived_address() {
        let account = derive_account(TEST_MNEMONIC, "", Network::Testnet).unwrap();
        let address = address_for_key(&account.stx_private_key, Network::Testnet).unwrap();
        assert_eq!(address, account.stx_address);
    }
}
