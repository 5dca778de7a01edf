//! SIP-018 structured data signing: domain + message Clarity hashing,
//! RSV signing, and verification.

use std::collections::BTreeMap;

use crate::common::error::AibtcError;
use crate::crypto::{c32_encode, hash160, recover, sha256, sign_recoverable, EcdsaSignature};
use crate::env::Network;
use crate::signing::clarity_value::ClarityValue;

pub struct Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u32,
}

impl Domain {
    fn to_clarity(&self) -> ClarityValue {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), ClarityValue::StringAscii(self.name.clone()));
        fields.insert("version".to_string(), ClarityValue::StringAscii(self.version.clone()));
        fields.insert("chain-id".to_string(), ClarityValue::UInt(self.chain_id as u128));
        ClarityValue::Tuple(fields)
    }
}

/// The two hashes a caller needs: `hash_to_sign` is both what gets signed
/// off-chain and what Clarity's `secp256k1-recover?` consumes on-chain —
/// SIP-018 defines them as the same value.
pub struct StructuredDataHashes {
    pub domain_hash: [u8; 32],
    pub message_hash: [u8; 32],
    pub hash_to_sign: [u8; 32],
}

pub fn hash_structured_data(domain: &Domain, value: &ClarityValue) -> StructuredDataHashes {
    let domain_hash = sha256(&domain.to_clarity().encode());
    let message_hash = sha256(&value.encode());

    let mut buf = Vec::with_capacity(6 + 32 + 32);
    buf.extend_from_slice(b"SIP018");
    buf.extend_from_slice(&domain_hash);
    buf.extend_from_slice(&message_hash);
    let hash_to_sign = sha256(&buf);

    StructuredDataHashes { domain_hash, message_hash, hash_to_sign }
}

/// Sign a SIP-018 structured-data message with the Stacks private key.
/// Returns 65-byte RSV hex alongside the hashes used, since callers
/// typically want both the signature and `hash_to_sign` for on-chain
/// verification calls.
pub fn sign(domain: &Domain, value: &ClarityValue, stx_private_key_33: &[u8; 33]) -> Result<(String, StructuredDataHashes), AibtcError> {
    let hashes = hash_structured_data(domain, value);
    let sk: [u8; 32] = stx_private_key_33[..32].try_into().expect("first 32 bytes");
    let sig = sign_recoverable(&hashes.hash_to_sign, &sk)?;

    let mut rsv = [0u8; 65];
    rsv[..32].copy_from_slice(&sig.r);
    rsv[32..64].copy_from_slice(&sig.s);
    rsv[64] = sig.rec_id as u8;

    Ok((hex::encode(rsv), hashes))
}

pub struct VerifyResult {
    pub is_valid: bool,
    pub recovered_address: String,
}

pub fn verify(
    domain: &Domain,
    value: &ClarityValue,
    signature_rsv_hex: &str,
    expected_address: &str,
    network: Network,
) -> Result<VerifyResult, AibtcError> {
    let hashes = hash_structured_data(domain, value);
    let rsv = hex::decode(signature_rsv_hex).map_err(|e| AibtcError::validation(format!("invalid hex signature: {e}")))?;
    if rsv.len() != 65 {
        return Err(AibtcError::validation("SIP-018 RSV signature must be 65 bytes"));
    }

    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&rsv[..32]);
    s.copy_from_slice(&rsv[32..64]);
    let sig = EcdsaSignature { r, s, rec_id: rsv[64] as i32 };

    let pubkey = recover(&hashes.hash_to_sign, &sig)?;
    let hash = hash160(&pubkey.serialize());
    let recovered_address = c32_encode(network.stacks_version_byte(), &hash);

    Ok(VerifyResult { is_valid: recovered_address == expected_address, recovered_address })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::hd::derive_account;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn test_domain() -> Domain {
        Domain { name: "aibtc-core".to_string(), version: "1".to_string(), chain_id: 0x8000_0000 }
    }

    #[test]
    fn sign_then_verify_recovers_signer() {
        let account = derive_account(TEST_MNEMONIC, "", Network::Testnet).unwrap();
        let domain = test_domain();
        let value = ClarityValue::StringAscii("hello world".to_string());

        let (sig, hashes) = sign(&domain, &value, &account.stx_private_key).unwrap();
        let result = verify(&domain, &value, &sig, &account.stx_address, Network::Testnet).unwrap();
        assert!(result.is_valid);
        assert_eq!(hashes.hash_to_sign.len(), 32);
    }

    #[test]
    fn hash_to_sign_is_stable_across_runs() {
        let domain = test_domain();
        let value = ClarityValue::UInt(42);
        let a = hash_structured_data(&domain, &value);
        let b = hash_structured_data(&domain, &value);
        assert_eq!(a.hash_to_sign, b.hash_to_sign);
    }

    #[test]
    fn different_domain_changes_hash() {
        let value = ClarityValue::UInt(1);
        let d1 = Domain { name: "a".to_string(), version: "1".to_string(), chain_id: 1 };
        let d2 = Domain { name: "b".to_string(), version: "1".to_string(), chain_id: 1 };
        assert_ne!(hash_structured_data(&d1, &value).hash_to_sign, hash_structured_data(&d2, &value).hash_to_sign);
    }

    #[test]
    fn verify_fails_for_different_value() {
        let account = derive_account(TEST_MNEMONIC, "", Network::Testnet).unwrap();
        let domain = test_domain();
        let (sig, _) = sign(&domain, &ClarityValue::UInt(1), &account.stx_private_key).unwrap();

        let result = verify(&domain, &ClarityValue::UInt(2), &sig, &account.stx_address, Network::Testnet).unwrap();
        assert!(!result.is_valid);
    }
}
