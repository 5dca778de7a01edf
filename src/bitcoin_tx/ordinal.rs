//! Ordinal commit + reveal transaction builder.
//!
//! The commit transaction is an ordinary P2WPKH spend whose sole
//! non-change output pays into a one-leaf taproot address. The reveal
//! transaction spends that output via the script path, carrying the
//! inscription envelope in its witness. Both transactions are fully
//! deterministic given `(contentType, body, feeRate, internalKey)`, and
//! the internal key itself is derived deterministically from the wallet's
//! taproot key plus the content hash, so a reveal can be rebuilt later
//! from nothing but `commitTxid`, `revealAmount`, `contentType`, and
//! `body`.

use std::str::FromStr;

use bitcoin::absolute::LockTime;
use bitcoin::opcodes::all::{OP_CHECKSIG, OP_ENDIF, OP_IF};
use bitcoin::opcodes::OP_FALSE;
use bitcoin::script::{Builder as ScriptBuilder, PushBytesBuf};
use bitcoin::secp256k1::{Keypair, Message, Secp256k1, SecretKey, XOnlyPublicKey};
use bitcoin::sighash::{Prevouts, SighashCache, TapSighashType};
use bitcoin::taproot::{ControlBlock, LeafVersion, Signature as TaprootSignature, TapLeafHash, TaprootBuilder, TaprootSpendInfo};
use bitcoin::transaction::Version;
use bitcoin::{Address, Amount, Network as BtcNetwork, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};

use crate::bitcoin_tx::builder::{select_utxos, Utxo, DUST_P2TR};
use crate::bitcoin_tx::errors::BitcoinTxError;
use crate::crypto::sha256;

/// Per-content envelope chunk limit (standardness relay limit for a single
/// script push).
const MAX_PUSH_BYTES: usize = 520;
const ENVELOPE_SAFETY_MARGIN_SATS: u64 = 1000;

/// Derive a fresh per-inscription taproot internal key from the wallet's
/// taproot private key and the content being inscribed. Deterministic:
/// the same content re-derives the same key, so a reveal transaction can
/// be rebuilt without persisting the one-time key anywhere.
pub fn derive_inscription_internal_key(
    wallet_taproot_sk: &[u8; 32],
    content_type: &str,
    body: &[u8],
) -> Result<(SecretKey, XOnlyPublicKey), BitcoinTxError> {
    let content_hash = {
        let mut buf = Vec::with_capacity(content_type.len() + body.len());
        buf.extend_from_slice(content_type.as_bytes());
        buf.extend_from_slice(body);
        sha256(&buf)
    };

    let mut material = Vec::with_capacity(64);
    material.extend_from_slice(wallet_taproot_sk);
    material.extend_from_slice(&content_hash);
    let derived = sha256(&material);

    let secp = Secp256k1::new();
    let sk = SecretKey::from_slice(&derived).map_err(|e| BitcoinTxError::SigningError(format!("key derivation failed: {e}")))?;
    let keypair = Keypair::from_secret_key(&secp, &sk);
    let (xonly, _parity) = keypair.x_only_public_key();
    Ok((sk, xonly))
}

/// Build the reveal script: `<pubkey> OP_CHECKSIG` followed by the
/// `OP_FALSE OP_IF "ord" ... OP_ENDIF` envelope carrying the inscription
/// content and optional tags.
pub fn build_reveal_script(internal_pubkey: &XOnlyPublicKey, content_type: &str, body: &[u8]) -> ScriptBuf {
    fn pb(data: &[u8]) -> PushBytesBuf {
        PushBytesBuf::try_from(data.to_vec()).expect("chunk within standardness push limit")
    }

    let mut builder = ScriptBuilder::new().push_x_only_key(internal_pubkey).push_opcode(OP_CHECKSIG);

    builder = builder.push_opcode(OP_FALSE).push_opcode(OP_IF).push_slice(pb(b"ord"));

    // content-type, tag 1
    builder = builder.push_int(1).push_slice(pb(content_type.as_bytes()));

    // body, tag 0, chunked to the standardness push limit
    builder = builder.push_int(0);
    for chunk in body.chunks(MAX_PUSH_BYTES) {
        builder = builder.push_slice(pb(chunk));
    }

    builder.push_opcode(OP_ENDIF).into_script()
}

pub struct TaprootLeaf {
    pub spend_info: TaprootSpendInfo,
    pub reveal_script: ScriptBuf,
    pub address: Address,
}

fn build_taproot_leaf(internal_pubkey: XOnlyPublicKey, reveal_script: ScriptBuf, network: BtcNetwork) -> Result<TaprootLeaf, BitcoinTxError> {
    let secp = Secp256k1::new();
    let builder = TaprootBuilder::new()
        .add_leaf(0, reveal_script.clone())
        .map_err(|e| BitcoinTxError::SigningError(format!("taproot leaf build failed: {e}")))?;
    let spend_info = builder
        .finalize(&secp, internal_pubkey)
        .map_err(|_| BitcoinTxError::SigningError("taproot finalize failed".to_string()))?;

    let address = Address::p2tr(&secp, internal_pubkey, spend_info.merkle_root(), network);
    Ok(TaprootLeaf { spend_info, reveal_script, address })
}

pub struct CommitResult {
    pub tx_hex: String,
    pub txid: String,
    pub fee: u64,
    pub vout: u32,
    pub reveal_input_amount: u64,
    pub internal_pubkey: [u8; 32],
}

pub struct RevealResult {
    pub tx_hex: String,
    pub txid: String,
    pub fee: u64,
    pub vsize: u64,
}

pub struct OrdinalBuilder {
    network: BtcNetwork,
}

impl OrdinalBuilder {
    pub fn new(network: BtcNetwork) -> Self {
        Self { network }
    }

    fn estimate_reveal_vsize(body_len: usize) -> u64 {
        // overhead + p2trInputBase + envelope witness (weight/4, rounded up) + p2trOutput
        let overhead = 11u64;
        let p2tr_input_base = 41u64;
        let envelope_weight = ((body_len as f64 / 4.0) * 1.25).ceil() as u64;
        let witness_overhead = 5u64;
        let p2tr_output = 43u64;
        overhead + p2tr_input_base + envelope_weight + witness_overhead + p2tr_output
    }

    /// Build the commit transaction: a P2WPKH spend whose sole non-change
    /// output pays `dust + revealFee + safety margin` into the one-leaf
    /// taproot address for `(contentType, body)`.
    #[allow(clippy::too_many_arguments)]
    pub fn build_commit(
        &self,
        utxos: &[Utxo],
        content_type: &str,
        body: &[u8],
        fee_rate_sat_vb: u64,
        change_address: &str,
        sender_private_key: &[u8; 32],
        sender_public_key: &[u8; 33],
        wallet_taproot_sk: &[u8; 32],
    ) -> Result<CommitResult, BitcoinTxError> {
        let (_internal_sk, internal_pubkey) = derive_inscription_internal_key(wallet_taproot_sk, content_type, body)?;
        let reveal_script = build_reveal_script(&internal_pubkey, content_type, body);
        let leaf = build_taproot_leaf(internal_pubkey, reveal_script, self.network)?;

        let reveal_fee = Self::estimate_reveal_vsize(body.len()) * fee_rate_sat_vb;
        let reveal_input_amount = DUST_P2TR + reveal_fee + ENVELOPE_SAFETY_MARGIN_SATS;

        let cardinal: Vec<Utxo> = utxos.iter().filter(|u| !u.is_ordinal).cloned().collect();
        if cardinal.is_empty() {
            return Err(BitcoinTxError::NoUtxos);
        }

        let (selected, fee, _vsize) = select_utxos(&cardinal, reveal_input_amount, fee_rate_sat_vb, 1)?;
        let total_input: u64 = selected.iter().map(|u| u.value_sats).sum();
        let change = total_input.saturating_sub(reveal_input_amount).saturating_sub(fee);

        let change_addr = Address::from_str(change_address)
            .map_err(|e| BitcoinTxError::InvalidAddress(e.to_string()))?
            .require_network(self.network)
            .map_err(|e| BitcoinTxError::InvalidAddress(e.to_string()))?;

        let inputs: Vec<TxIn> = selected
            .iter()
            .map(|u| -> Result<TxIn, BitcoinTxError> {
                let txid = Txid::from_str(&u.txid).map_err(|e| BitcoinTxError::InvalidAddress(e.to_string()))?;
                Ok(TxIn {
                    previous_output: OutPoint { txid, vout: u.vout },
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
                    witness: Witness::new(),
                })
            })
            .collect::<Result<_, _>>()?;

        let mut outputs = vec![TxOut { value: Amount::from_sat(reveal_input_amount), script_pubkey: leaf.address.script_pubkey() }];
        if change > crate::bitcoin_tx::builder::DUST_P2WPKH {
            outputs.push(TxOut { value: Amount::from_sat(change), script_pubkey: change_addr.script_pubkey() });
        }
        let reveal_vout = 0u32;

        let mut tx = Transaction { version: Version::TWO, lock_time: LockTime::ZERO, input: inputs, output: outputs };

        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(sender_private_key).map_err(|e| BitcoinTxError::SigningError(e.to_string()))?;
        let pubkey = bitcoin::PublicKey::from_slice(sender_public_key).map_err(|e| BitcoinTxError::SigningError(e.to_string()))?;
        let compressed = bitcoin::CompressedPublicKey::try_from(pubkey).map_err(|e| BitcoinTxError::SigningError(e.to_string()))?;
        let script_code = compressed.p2wpkh_script_code();
        let prevout_values: Vec<Amount> = selected.iter().map(|u| Amount::from_sat(u.value_sats)).collect();

        for i in 0..tx.input.len() {
            let sighash = {
                let mut cache = SighashCache::new(&tx);
                cache
                    .p2wpkh_signature_hash(i, &script_code, prevout_values[i], bitcoin::sighash::EcdsaSighashType::All)
                    .map_err(|e| BitcoinTxError::SigningError(e.to_string()))?
            };
            let msg = Message::from_digest(sighash.to_byte_array());
            let sig = secp.sign_ecdsa_low_r(&msg, &secret_key);
            let mut sig_bytes = sig.serialize_der().to_vec();
            sig_bytes.push(bitcoin::sighash::EcdsaSighashType::All as u8);
            tx.input[i].witness = Witness::from_slice(&[sig_bytes, compressed.to_bytes().to_vec()]);
        }

        let actual_fee = total_input - tx.output.iter().map(|o| o.value.to_sat()).sum::<u64>();

        Ok(CommitResult {
            tx_hex: hex::encode(bitcoin::consensus::encode::serialize(&tx)),
            txid: tx.compute_txid().to_string(),
            fee: actual_fee,
            vout: reveal_vout,
            reveal_input_amount,
            internal_pubkey: internal_pubkey.serialize(),
        })
    }

    /// Build and sign the reveal transaction spending `commit_txid:vout`
    /// via the taproot script path, paying `recipient_taproot`.
    pub fn build_reveal(
        &self,
        commit_txid: &str,
        vout: u32,
        commit_output_amount: u64,
        content_type: &str,
        body: &[u8],
        fee_rate_sat_vb: u64,
        recipient_taproot: &str,
        wallet_taproot_sk: &[u8; 32],
    ) -> Result<RevealResult, BitcoinTxError> {
        let (internal_sk, internal_pubkey) = derive_inscription_internal_key(wallet_taproot_sk, content_type, body)?;
        let reveal_script = build_reveal_script(&internal_pubkey, content_type, body);
        let leaf = build_taproot_leaf(internal_pubkey, reveal_script.clone(), self.network)?;

        let control_block: ControlBlock = leaf
            .spend_info
            .control_block(&(leaf.reveal_script.clone(), LeafVersion::TapScript))
            .ok_or_else(|| BitcoinTxError::SigningError("missing control block for reveal script".to_string()))?;

        let recipient = Address::from_str(recipient_taproot)
            .map_err(|e| BitcoinTxError::InvalidAddress(e.to_string()))?
            .require_network(self.network)
            .map_err(|e| BitcoinTxError::InvalidAddress(e.to_string()))?;

        let txid = Txid::from_str(commit_txid).map_err(|e| BitcoinTxError::InvalidAddress(e.to_string()))?;
        let mut tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint { txid, vout },
                script_sig: ScriptBuf::new(),
                sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
                witness: Witness::new(),
            }],
            output: vec![TxOut { value: Amount::from_sat(commit_output_amount), script_pubkey: recipient.script_pubkey() }],
        };

        let vsize_estimate = Self::estimate_reveal_vsize(body.len());
        let fee = vsize_estimate * fee_rate_sat_vb;
        let reveal_amount = commit_output_amount
            .checked_sub(fee)
            .ok_or_else(|| BitcoinTxError::InsufficientFunds { required: fee, available: commit_output_amount })?;
        if reveal_amount < DUST_P2TR {
            return Err(BitcoinTxError::DustOutput { amount: reveal_amount, threshold: DUST_P2TR });
        }
        tx.output[0].value = Amount::from_sat(reveal_amount);

        let prevouts = vec![TxOut { value: Amount::from_sat(commit_output_amount), script_pubkey: leaf.address.script_pubkey() }];
        let sighash = {
            let mut cache = SighashCache::new(&tx);
            cache
                .taproot_script_spend_signature_hash(0, &Prevouts::All(&prevouts), TapLeafHash::from_script(&reveal_script, LeafVersion::TapScript), TapSighashType::Default)
                .map_err(|e| BitcoinTxError::SigningError(e.to_string()))?
        };

        let secp = Secp256k1::new();
        let keypair = Keypair::from_secret_key(&secp, &internal_sk);
        let msg = Message::from_digest(sighash.to_byte_array());
        let schnorr_sig = secp.sign_schnorr(&msg, &keypair);
        let signature = TaprootSignature { signature: schnorr_sig, sighash_type: TapSighashType::Default };

        tx.input[0].witness = Witness::from_slice(&[signature.to_vec(), reveal_script.to_bytes(), control_block.serialize()]);

        Ok(RevealResult {
            tx_hex: hex::encode(bitcoin::consensus::encode::serialize(&tx)),
            txid: tx.compute_txid().to_string(),
            fee,
            vsize: tx.vsize() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Network;
    use crate::wallet::hd::derive_account;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn inscription_key_derivation_is_deterministic() {
        let account = derive_account(TEST_MNEMONIC, "", Network::Testnet).unwrap();
        let (_, k1) = derive_inscription_internal_key(&account.taproot_private_key, "text/plain", b"hello").unwrap();
        let (_, k2) = derive_inscription_internal_key(&account.taproot_private_key, "text/plain", b"hello").unwrap();
        assert_eq!(k1, k2);
    }

    #[test]
    fn different_content_yields_different_keys() {
        let account = derive_account(TEST_MNEMONIC, "", Network::Testnet).unwrap();
        let (_, k1) = derive_inscription_internal_key(&account.taproot_private_key, "text/plain", b"hello").unwrap();
        let (_, k2) = derive_inscription_internal_key(&account.taproot_private_key, "text/plain", b"world").unwrap();
        assert_ne!(k1, k2);
    }

    #[test]
    fn commit_then_reveal_round_trips() {
        let account = derive_account(TEST_MNEMONIC, "", Network::Testnet).unwrap();
        let builder = OrdinalBuilder::new(Network::Testnet.as_bitcoin_network());

        let utxos = vec![Utxo { txid: "4".repeat(64), vout: 0, value_sats: 100_000, is_ordinal: false }];
        let commit = builder
            .build_commit(
                &utxos,
                "text/plain;charset=utf-8",
                b"hello ordinal world",
                5,
                &account.btc_address,
                &account.btc_private_key,
                &account.btc_public_key,
                &account.taproot_private_key,
            )
            .unwrap();

        assert!(!commit.tx_hex.is_empty());

        let reveal = builder
            .build_reveal(
                &commit.txid,
                commit.vout,
                commit.reveal_input_amount,
                "text/plain;charset=utf-8",
                b"hello ordinal world",
                5,
                &account.taproot_address,
                &account.taproot_private_key,
            )
            .unwrap();

        assert!(!reveal.tx_hex.is_empty());
        assert_eq!(reveal.txid.len(), 64);
    }
}
