//! BIP-340 Schnorr signing over the taproot internal key, for arbitrary
//! messages (not transaction sighashes — see `bitcoin_tx::ordinal` for the
//! script-path witness used on reveal transactions).

use bitcoin::key::TapTweak;
use bitcoin::secp256k1::{Keypair, Secp256k1, XOnlyPublicKey};

use crate::common::error::AibtcError;
use crate::crypto::{random_iv, sign_schnorr, verify_schnorr};

/// Sign `msg` (already hashed to 32 bytes by the caller) with the
/// tweaked taproot key-path key derived from `internal_sk`. Applying the
/// BIP-341 tweak (even with no script-path merkle root) matches how a
/// taproot key-path spend is actually authorized on-chain.
pub fn sign(msg: &[u8; 32], taproot_internal_sk: &[u8; 32]) -> Result<[u8; 64], AibtcError> {
    let secp = Secp256k1::new();
    let secret_key = bitcoin::secp256k1::SecretKey::from_slice(taproot_internal_sk)
        .map_err(|e| AibtcError::internal(format!("invalid taproot secret key: {e}")))?;
    let keypair = Keypair::from_secret_key(&secp, &secret_key);
    let tweaked = keypair.tap_tweak(&secp, None);
    let tweaked_keypair: Keypair = tweaked.to_inner();

    let aux_rand = {
        // 12 bytes of IV-grade randomness is enough entropy source
        // material; pad to the 32 bytes BIP-340 aux_rand expects.
        let mut aux = [0u8; 32];
        aux[..12].copy_from_slice(&random_iv());
        aux
    };

    let tweaked_sk = tweaked_keypair.secret_bytes();
    sign_schnorr(msg, &tweaked_sk, &aux_rand)
}

/// Verify a signature against the tweaked taproot output key derived from
/// `internal_pubkey`.
pub fn verify(msg: &[u8; 32], taproot_internal_pubkey: &[u8; 32], sig: &[u8; 64]) -> Result<bool, AibtcError> {
    let secp = Secp256k1::new();
    let internal = XOnlyPublicKey::from_slice(taproot_internal_pubkey)
        .map_err(|e| AibtcError::validation(format!("invalid x-only pubkey: {e}")))?;
    let (output_key, _parity) = internal.tap_tweak(&secp, None);
    let output_xonly: XOnlyPublicKey = output_key.to_inner();

    Ok(verify_schnorr(msg, &output_xonly, sig))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::hd::derive_account;
    use crate::env::Network;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn sign_then_verify_round_trips() {
        let account = derive_account(TEST_MNEMONIC, "", Network::Testnet).unwrap();
        let msg = [5u8; 32];
        let sig = sign(&msg, &account.taproot_private_key).unwrap();
        assert!(verify(&msg, &account.taproot_internal_pubkey, &sig).unwrap());
    }

    #[test]
    fn verify_fails_for_wrong_message() {
        let account = derive_account(TEST_MNEMONIC, "", Network::Testnet).unwrap();
        let sig = sign(&[5u8; 32], &account.taproot_private_key).unwrap();
        assert!(!verify(&[6u8; 32], &account.taproot_internal_pubkey, &sig).unwrap());
    }
}
