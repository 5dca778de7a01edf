//! HD Wallet Derivation
//!
//! Pure function of `(mnemonic, passphrase, network) -> Account`. BIP-39
//! validates the mnemonic and derives the master seed; BIP-32 paths derive
//! the Stacks, Bitcoin SegWit, and Taproot key material.

use std::str::FromStr;

use bip39::Mnemonic;
use bitcoin::bip32::{DerivationPath, Xpriv};
use bitcoin::key::XOnlyPublicKey;
use bitcoin::secp256k1::Secp256k1;
use bitcoin::{Address, CompressedPublicKey, NetworkKind};

use crate::common::error::AibtcError;
use crate::crypto::{c32_encode, hash160};
use crate::env::Network;

/// A fully-derived Bitcoin/Stacks key set. Never serialized to hex/WIF by
/// callers outside the signing layer; the Session Manager is the only
/// place these bytes live in memory for longer than one call.
#[derive(Debug, Clone)]
pub struct Account {
    pub network: Network,

    pub stx_address: String,
    /// 32-byte secret key with a trailing `0x01` compressed-pubkey marker,
    /// as Stacks wallets conventionally store it.
    pub stx_private_key: [u8; 33],

    pub btc_address: String,
    pub btc_private_key: [u8; 32],
    pub btc_public_key: [u8; 33],

    pub taproot_address: String,
    /// Untweaked internal key; signers apply the BIP-341 tweak at sign
    /// time (see [`crate::signing::schnorr_sig`]).
    pub taproot_internal_pubkey: [u8; 32],
    pub taproot_private_key: [u8; 32],
}

const STACKS_PATH: &str = "m/44'/5757'/0'/0/0";

pub fn derive_account(mnemonic: &str, passphrase: &str, network: Network) -> Result<Account, AibtcError> {
    let mnemonic = Mnemonic::parse_normalized(mnemonic)
        .map_err(|e| AibtcError::InvalidMnemonic(e.to_string()))?;
    let seed = mnemonic.to_seed_normalized(passphrase);

    let secp = Secp256k1::new();
    let network_kind = match network {
        Network::Mainnet => NetworkKind::Main,
        Network::Testnet => NetworkKind::Test,
    };
    let master = Xpriv::new_master(network_kind, &seed)
        .map_err(|e| AibtcError::internal(format!("failed to derive master key: {e}")))?;

    let stx = derive_stacks(&secp, &master, network)?;
    let (btc_address, btc_private_key, btc_public_key) = derive_btc_segwit(&secp, &master, network)?;
    let (taproot_address, taproot_internal_pubkey, taproot_private_key) = derive_taproot(&secp, &master, network)?;

    Ok(Account {
        network,
        stx_address: stx.0,
        stx_private_key: stx.1,
        btc_address,
        btc_private_key,
        btc_public_key,
        taproot_address,
        taproot_internal_pubkey,
        taproot_private_key,
    })
}

fn derive_stacks(
    secp: &Secp256k1<bitcoin::secp256k1::All>,
    master: &Xpriv,
    network: Network,
) -> Result<(String, [u8; 33]), AibtcError> {
    let path = DerivationPath::from_str(STACKS_PATH)
        .map_err(|e| AibtcError::internal(format!("invalid stacks derivation path: {e}")))?;
    let child = master
        .derive_priv(secp, &path)
        .map_err(|e| AibtcError::internal(format!("stacks key derivation failed: {e}")))?;

    let secret_bytes = child.private_key.secret_bytes();
    let mut stx_private_key = [0u8; 33];
    stx_private_key[..32].copy_from_slice(&secret_bytes);
    stx_private_key[32] = 0x01;

    let public_key = bitcoin::secp256k1::PublicKey::from_secret_key(secp, &child.private_key);
    let hash = hash160(&public_key.serialize());
    let address = c32_encode(network.stacks_version_byte(), &hash);

    Ok((address, stx_private_key))
}

fn derive_btc_segwit(
    secp: &Secp256k1<bitcoin::secp256k1::All>,
    master: &Xpriv,
    network: Network,
) -> Result<(String, [u8; 32], [u8; 33]), AibtcError> {
    let path_str = format!("m/84'/{}'/0'/0/0", network.bip32_coin_type());
    let path = DerivationPath::from_str(&path_str)
        .map_err(|e| AibtcError::internal(format!("invalid btc derivation path: {e}")))?;
    let child = master
        .derive_priv(secp, &path)
        .map_err(|e| AibtcError::internal(format!("btc key derivation failed: {e}")))?;

    let public_key = bitcoin::secp256k1::PublicKey::from_secret_key(secp, &child.private_key);
    let compressed = CompressedPublicKey(public_key);
    let address = Address::p2wpkh(&compressed, network.as_bitcoin_network());

    Ok((address.to_string(), child.private_key.secret_bytes(), public_key.serialize()))
}

fn derive_taproot(
    secp: &Secp256k1<bitcoin::secp256k1::All>,
    master: &Xpriv,
    network: Network,
) -> Result<(String, [u8; 32], [u8; 32]), AibtcError> {
    let path_str = format!("m/86'/{}'/0'/0/0", network.bip32_coin_type());
    let path = DerivationPath::from_str(&path_str)
        .map_err(|e| AibtcError::internal(format!("invalid taproot derivation path: {e}")))?;
    let child = master
        .derive_priv(secp, &path)
        .map_err(|e| AibtcError::internal(format!("taproot key derivation failed: {e}")))?;

    let keypair = bitcoin::secp256k1::Keypair::from_secret_key(secp, &child.private_key);
    let (internal_key, _parity) = XOnlyPublicKey::from_keypair(&keypair);
    let address = Address::p2tr(secp, internal_key, None, network.as_bitcoin_network());

    Ok((address.to_string(), internal_key.serialize(), child.private_key.secret_bytes()))
}

/// Generate a fresh 24-word BIP-39 mnemonic (256 bits of entropy).
pub fn generate_mnemonic() -> Result<String, AibtcError> {
    let mnemonic = Mnemonic::generate(24).map_err(|e| AibtcError::internal(format!("mnemonic generation failed: {e}")))?;
    Ok(mnemonic.to_string())
}

/// Validate a mnemonic's word list and checksum without deriving keys.
pub fn validate_mnemonic(mnemonic: &str) -> Result<(), AibtcError> {
    Mnemonic::parse_normalized(mnemonic)
        .map(|_| ())
        .map_err(|e| AibtcError::InvalidMnemonic(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn derivation_is_deterministic() {
        let a = derive_account(TEST_MNEMONIC, "", Network::Testnet).unwrap();
        let b = derive_account(TEST_MNEMONIC, "", Network::Testnet).unwrap();
        assert_eq!(a.stx_address, b.stx_address);
        assert_eq!(a.btc_address, b.btc_address);
        assert_eq!(a.taproot_address, b.taproot_address);
    }

    #[test]
    fn testnet_addresses_have_expected_prefixes() {
        let account = derive_account(TEST_MNEMONIC, "", Network::Testnet).unwrap();
        assert!(account.stx_address.starts_with("ST"));
        assert!(account.btc_address.starts_with("tb1q"));
        assert!(account.taproot_address.starts_with("tb1p"));
    }

    #[test]
    fn mainnet_addresses_have_expected_prefixes() {
        let account = derive_account(TEST_MNEMONIC, "", Network::Mainnet).unwrap();
        assert!(account.stx_address.starts_with("SP"));
        assert!(account.btc_address.starts_with("bc1q"));
        assert!(account.taproot_address.starts_with("bc1p"));
    }

    #[test]
    fn invalid_mnemonic_is_rejected() {
        let err = derive_account("not a real mnemonic at all", "", Network::Testnet).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_MNEMONIC");
    }

    #[test]
    fn stx_private_key_has_compressed_marker() {
        let account = derive_account(TEST_MNEMONIC, "", Network::Testnet).unwrap();
        assert_eq!(account.stx_private_key[32], 0x01);
    }

    #[test]
    fn generated_mnemonic_has_24_words_and_validates() {
        let mnemonic = generate_mnemonic().unwrap();
        assert_eq!(mnemonic.split_whitespace().count(), 24);
        validate_mnemonic(&mnemonic).unwrap();
    }

    #[test]
    fn different_passphrases_yield_different_accounts() {
        let a = derive_account(TEST_MNEMONIC, "", Network::Testnet).unwrap();
        let b = derive_account(TEST_MNEMONIC, "extra-passphrase", Network::Testnet).unwrap();
        assert_ne!(a.stx_address, b.stx_address);
    }
}
