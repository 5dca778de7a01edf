//! BIP-137 Bitcoin message signing, with the header byte encoding the
//! signer's address type so verification can recover a matching address.

use base64::Engine;
use bitcoin::{Address, CompressedPublicKey};

use crate::common::error::AibtcError;
use crate::crypto::{prefixed_message_hash, recover, sign_recoverable};
use crate::env::Network;

const BITCOIN_MESSAGE_PREFIX: &[u8] = b"\x18Bitcoin Signed Message:\n";

/// Address types the header byte can encode. Only native SegWit (P2WPKH)
/// is produced by this crate's wallets, but verification accepts any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    P2pkhCompressed,
    P2shP2wpkh,
    P2wpkh,
}

impl AddressKind {
    fn header_offset(self) -> u8 {
        match self {
            AddressKind::P2pkhCompressed => 4,
            AddressKind::P2shP2wpkh => 8,
            AddressKind::P2wpkh => 12,
        }
    }

    fn from_header_offset(offset: u8) -> Option<Self> {
        match offset {
            4 => Some(AddressKind::P2pkhCompressed),
            8 => Some(AddressKind::P2shP2wpkh),
            12 => Some(AddressKind::P2wpkh),
            _ => None,
        }
    }
}

fn message_hash(message: &str) -> [u8; 32] {
    prefixed_message_hash(BITCOIN_MESSAGE_PREFIX, message.as_bytes(), true)
}

/// Sign `message` with a P2WPKH (native SegWit) private key. Returns the
/// base64-encoded 65-byte `header || r || s` blob.
pub fn sign(message: &str, btc_private_key: &[u8; 32]) -> Result<String, AibtcError> {
    let hash = message_hash(message);
    let sig = sign_recoverable(&hash, btc_private_key)?;

    let mut blob = [0u8; 65];
    blob[0] = 27 + sig.rec_id as u8 + AddressKind::P2wpkh.header_offset();
    blob[1..33].copy_from_slice(&sig.r);
    blob[33..].copy_from_slice(&sig.s);

    Ok(base64::engine::general_purpose::STANDARD.encode(blob))
}

pub struct VerifyResult {
    pub is_fully_valid: bool,
    pub recovered_address: Option<String>,
}

/// Recover the signer's public key from `signature_b64`, derive its
/// address per the header's encoded address type, and compare against
/// `expected_address`.
pub fn verify(message: &str, signature_b64: &str, expected_address: &str, network: Network) -> Result<VerifyResult, AibtcError> {
    let blob = base64::engine::general_purpose::STANDARD
        .decode(signature_b64)
        .map_err(|e| AibtcError::validation(format!("invalid base64 signature: {e}")))?;
    if blob.len() != 65 {
        return Err(AibtcError::validation("BIP-137 signature must be 65 bytes"));
    }

    let header = blob[0];
    if !(27..=42).contains(&header) {
        return Err(AibtcError::validation("invalid BIP-137 header byte"));
    }
    let rec_id = ((header - 27) % 4) as i32;
    let offset = (header - 27) - rec_id as u8;
    let kind = AddressKind::from_header_offset(offset)
        .ok_or_else(|| AibtcError::validation("unsupported BIP-137 address-type header"))?;

    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&blob[1..33]);
    s.copy_from_slice(&blob[33..]);
    let sig = crate::crypto::EcdsaSignature { r, s, rec_id };

    let hash = message_hash(message);
    let pubkey = recover(&hash, &sig)?;

    let recovered_address = match kind {
        AddressKind::P2wpkh => {
            let compressed = CompressedPublicKey(pubkey);
            Address::p2wpkh(&compressed, network.as_bitcoin_network()).to_string()
        }
        AddressKind::P2pkhCompressed => {
            let compressed = CompressedPublicKey(pubkey);
            Address::p2pkh(compressed, network.as_bitcoin_network()).to_string()
        }
        AddressKind::P2shP2wpkh => {
            let compressed = CompressedPublicKey(pubkey);
            Address::p2shwpkh(&compressed, network.as_bitcoin_network()).to_string()
        }
    };

    Ok(VerifyResult { is_fully_valid: recovered_address == expected_address, recovered_address: Some(recovered_address) })
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
        let message = "Bitcoin will be the currency of AIs";
        let sig = sign(message, &account.btc_private_key).unwrap();

        let result = verify(message, &sig, &account.btc_address, Network::Testnet).unwrap();
        assert!(result.is_fully_valid);
    }

    #[test]
    fn verify_fails_for_wrong_expected_address() {
        let account = derive_account(TEST_MNEMONIC, "", Network::Testnet).unwrap();
        let message = "hello";
        let sig = sign(message, &account.btc_private_key).unwrap();

        let result = verify(message, &sig, "tb1qnotarealaddress000000000000000000000", Network::Testnet).unwrap();
        assert!(!result.is_fully_valid);
    }

    #[test]
    fn verify_fails_for_tampered_message() {
        let account = derive_account(TEST_MNEMONIC, "", Network::Testnet).unwrap();
        let sig = sign("original message", &account.btc_private_key).unwrap();

        let result = verify("tampered message", &sig, &account.btc_address, Network::Testnet).unwrap();
        assert!(!result.is_fully_valid);
    }

    #[test]
    fn rejects_malformed_base64() {
        assert!(verify("m", "not-base64!!", "tb1qaddr", Network::Testnet).is_err());
    }
}
