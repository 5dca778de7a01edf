//! P2WPKH Transaction Builder
//!
//! Selects UTXOs, builds a native-SegWit spend, and signs every input with
//! SIGHASH_ALL per BIP-143. Shares UTXO-selection and fee-estimation
//! infrastructure with the ordinal commit/reveal builder in
//! [`crate::bitcoin_tx::ordinal`].

use std::str::FromStr;

use bitcoin::absolute::LockTime;
use bitcoin::psbt::Psbt;
use bitcoin::secp256k1::{Message, Secp256k1, SecretKey};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{
    Address, Amount, CompressedPublicKey, Network as BtcNetwork, OutPoint, PublicKey, ScriptBuf,
    Sequence, Transaction, TxIn, TxOut, Txid, Witness,
};

use crate::bitcoin_tx::errors::BitcoinTxError;

/// A UTXO candidate for spending. `is_ordinal` marks it as holding an
/// inscription; the builder refuses to spend these unless the caller opts
/// in via [`OrdinalPolicy::IncludeOrdinals`].
#[derive(Debug, Clone)]
pub struct Utxo {
    pub txid: String,
    pub vout: u32,
    pub value_sats: u64,
    pub is_ordinal: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrdinalPolicy {
    CardinalOnly,
    IncludeOrdinals,
}

pub const DUST_P2WPKH: u64 = 546;
pub const DUST_P2TR: u64 = 330;

const TX_OVERHEAD_VBYTES: u64 = 11;
const P2WPKH_INPUT_VBYTES: u64 = 68;
const P2WPKH_OUTPUT_VBYTES: u64 = 31;

/// Estimate the vsize of a transaction with `n_inputs` P2WPKH inputs and
/// `n_outputs` P2WPKH-sized outputs.
pub fn estimate_p2wpkh_vsize(n_inputs: usize, n_outputs: usize) -> u64 {
    TX_OVERHEAD_VBYTES + (n_inputs as u64) * P2WPKH_INPUT_VBYTES + (n_outputs as u64) * P2WPKH_OUTPUT_VBYTES
}

/// Select UTXOs (descending value order) until the sum covers
/// `amount + fee_estimate(vsize)`, recomputing the fee as inputs are added
/// per the two-pass loop spec. `n_outputs` is the number of non-change
/// outputs the caller intends to create (the change output, if any, adds
/// one more and is accounted for by the caller after selection).
pub fn select_utxos(
    available: &[Utxo],
    amount_sats: u64,
    fee_rate_sat_vb: u64,
    n_outputs: usize,
) -> Result<(Vec<Utxo>, u64, u64), BitcoinTxError> {
    if available.is_empty() {
        return Err(BitcoinTxError::NoUtxos);
    }

    let mut sorted: Vec<Utxo> = available.to_vec();
    sorted.sort_by(|a, b| b.value_sats.cmp(&a.value_sats));

    let mut selected: Vec<Utxo> = Vec::new();
    let mut total: u64 = 0;

    for utxo in sorted {
        selected.push(utxo);
        total += selected.last().unwrap().value_sats;

        // Two-pass: assume a change output exists for the fee estimate,
        // which is conservative (slightly overestimates when change ends
        // up below dust and gets dropped).
        let vsize = estimate_p2wpkh_vsize(selected.len(), n_outputs + 1);
        let fee = vsize * fee_rate_sat_vb;

        if total >= amount_sats + fee {
            return Ok((selected, fee, vsize));
        }
    }

    let vsize = estimate_p2wpkh_vsize(selected.len(), n_outputs + 1);
    let fee = vsize * fee_rate_sat_vb;
    Err(BitcoinTxError::InsufficientFunds { required: amount_sats + fee, available: total })
}

pub struct SpendResult {
    pub tx_hex: String,
    pub txid: String,
    pub fee: u64,
    pub vsize: u64,
    pub change: u64,
}

pub struct P2wpkhBuilder {
    network: BtcNetwork,
}

impl P2wpkhBuilder {
    pub fn new(network: BtcNetwork) -> Self {
        Self { network }
    }

    fn parse_address(&self, address: &str) -> Result<Address, BitcoinTxError> {
        Address::from_str(address)
            .map_err(|e| BitcoinTxError::InvalidAddress(e.to_string()))?
            .require_network(self.network)
            .map_err(|e| BitcoinTxError::InvalidAddress(e.to_string()))
    }

    fn filter_cardinal(&self, utxos: &[Utxo], policy: OrdinalPolicy) -> Result<Vec<Utxo>, BitcoinTxError> {
        if policy == OrdinalPolicy::IncludeOrdinals {
            return Ok(utxos.to_vec());
        }
        for u in utxos {
            if u.is_ordinal {
                return Err(BitcoinTxError::OrdinalUtxoRefused { txid: u.txid.clone(), vout: u.vout });
            }
        }
        Ok(utxos.to_vec())
    }

    /// Build, sign, and serialize a P2WPKH spend. `btc_private_key` and
    /// `btc_public_key` belong to the sender, whose compressed pubkey
    /// script is used as the witness scriptCode for every input (the
    /// builder only spends UTXOs controlled by a single key).
    #[allow(clippy::too_many_arguments)]
    pub fn build_and_sign(
        &self,
        utxos: &[Utxo],
        recipient: &str,
        amount_sats: u64,
        fee_rate_sat_vb: u64,
        change_address: &str,
        btc_private_key: &[u8; 32],
        btc_public_key: &[u8; 33],
        policy: OrdinalPolicy,
    ) -> Result<SpendResult, BitcoinTxError> {
        let cardinal = self.filter_cardinal(utxos, policy)?;
        let recipient_addr = self.parse_address(recipient)?;
        let change_addr = self.parse_address(change_address)?;

        if amount_sats < DUST_P2WPKH {
            return Err(BitcoinTxError::DustOutput { amount: amount_sats, threshold: DUST_P2WPKH });
        }

        let (selected, fee, _estimated_vsize) = select_utxos(&cardinal, amount_sats, fee_rate_sat_vb, 1)?;
        let total_input: u64 = selected.iter().map(|u| u.value_sats).sum();
        let change = total_input.saturating_sub(amount_sats).saturating_sub(fee);

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

        let mut outputs = vec![TxOut { value: Amount::from_sat(amount_sats), script_pubkey: recipient_addr.script_pubkey() }];
        if change > DUST_P2WPKH {
            outputs.push(TxOut { value: Amount::from_sat(change), script_pubkey: change_addr.script_pubkey() });
        }

        let mut tx = Transaction { version: Version::TWO, lock_time: LockTime::ZERO, input: inputs, output: outputs };

        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(btc_private_key)
            .map_err(|e| BitcoinTxError::SigningError(format!("invalid private key: {e}")))?;
        let pubkey = PublicKey::from_slice(btc_public_key).map_err(|e| BitcoinTxError::SigningError(e.to_string()))?;
        let compressed = CompressedPublicKey::try_from(pubkey).map_err(|e| BitcoinTxError::SigningError(e.to_string()))?;
        let script_code = compressed.p2wpkh_script_code();

        let prevout_values: Vec<Amount> = selected.iter().map(|u| Amount::from_sat(u.value_sats)).collect();

        for i in 0..tx.input.len() {
            let sighash = {
                let mut cache = SighashCache::new(&tx);
                cache
                    .p2wpkh_signature_hash(i, &script_code, prevout_values[i], EcdsaSighashType::All)
                    .map_err(|e| BitcoinTxError::SigningError(e.to_string()))?
            };

            let msg = Message::from_digest(sighash.to_byte_array());
            let sig = secp.sign_ecdsa_low_r(&msg, &secret_key);

            let mut sig_bytes = sig.serialize_der().to_vec();
            sig_bytes.push(EcdsaSighashType::All as u8);

            tx.input[i].witness = Witness::from_slice(&[sig_bytes, compressed.to_bytes().to_vec()]);
        }

        let vsize = tx.vsize() as u64;
        let actual_fee = total_input - tx.output.iter().map(|o| o.value.to_sat()).sum::<u64>();

        Ok(SpendResult {
            tx_hex: hex::encode(bitcoin::consensus::encode::serialize(&tx)),
            txid: tx.compute_txid().to_string(),
            fee: actual_fee,
            vsize,
            change: if change > DUST_P2WPKH { change } else { 0 },
        })
    }

    /// Re-parse a signed spend's hex into a finalized PSBT for export to
    /// wallets or hardware signers that expect PSBT input rather than a
    /// raw tx blob. `Psbt::from_unsigned_tx` requires empty witnesses, so
    /// the signed witness data is stripped off and reattached as each
    /// input's `final_script_witness`.
    pub fn to_psbt(&self, tx_hex: &str) -> Result<Psbt, BitcoinTxError> {
        let bytes = hex::decode(tx_hex).map_err(|e| BitcoinTxError::SigningError(format!("invalid tx hex: {e}")))?;
        let signed: Transaction =
            bitcoin::consensus::encode::deserialize(&bytes).map_err(|e| BitcoinTxError::SigningError(e.to_string()))?;

        let witnesses: Vec<Witness> = signed.input.iter().map(|i| i.witness.clone()).collect();
        let mut unsigned = signed.clone();
        for input in unsigned.input.iter_mut() {
            input.witness = Witness::new();
        }

        let mut psbt = Psbt::from_unsigned_tx(unsigned).map_err(|e| BitcoinTxError::SigningError(e.to_string()))?;
        for (psbt_input, witness) in psbt.inputs.iter_mut().zip(witnesses) {
            psbt_input.final_script_witness = Some(witness);
        }
        Ok(psbt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Network;
    use crate::wallet::hd::derive_account;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn test_utxos(values: &[u64]) -> Vec<Utxo> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Utxo { txid: format!("{:064x}", i + 1), vout: 0, value_sats: *v, is_ordinal: false })
            .collect()
    }

    #[test]
    fn selects_fewest_utxos_covering_amount_and_fee() {
        let utxos = test_utxos(&[100_000, 50_000, 10_000]);
        let (selected, fee, _) = select_utxos(&utxos, 80_000, 5, 1).unwrap();
        assert_eq!(selected.len(), 1);
        assert!(fee > 0);
    }

    #[test]
    fn selection_fails_when_funds_insufficient() {
        let utxos = test_utxos(&[1_000]);
        let err = select_utxos(&utxos, 80_000, 5, 1).unwrap_err();
        assert!(matches!(err, BitcoinTxError::InsufficientFunds { .. }));
    }

    #[test]
    fn selection_fails_on_empty_utxo_set() {
        let err = select_utxos(&[], 1000, 5, 1).unwrap_err();
        assert!(matches!(err, BitcoinTxError::NoUtxos));
    }

    #[test]
    fn build_and_sign_produces_valid_witness_tx() {
        let account = derive_account(TEST_MNEMONIC, "", Network::Testnet).unwrap();
        let builder = P2wpkhBuilder::new(Network::Testnet.as_bitcoin_network());

        let utxos = vec![Utxo { txid: "1".repeat(64), vout: 0, value_sats: 100_000, is_ordinal: false }];
        let result = builder
            .build_and_sign(
                &utxos,
                "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx",
                50_000,
                5,
                &account.btc_address,
                &account.btc_private_key,
                &account.btc_public_key,
                OrdinalPolicy::CardinalOnly,
            )
            .unwrap();

        assert!(!result.tx_hex.is_empty());
        assert_eq!(result.txid.len(), 64);
        assert!(result.fee > 0);
    }

    #[test]
    fn refuses_ordinal_utxo_by_default() {
        let account = derive_account(TEST_MNEMONIC, "", Network::Testnet).unwrap();
        let builder = P2wpkhBuilder::new(Network::Testnet.as_bitcoin_network());
        let utxos = vec![Utxo { txid: "2".repeat(64), vout: 0, value_sats: 100_000, is_ordinal: true }];

        let err = builder
            .build_and_sign(
                &utxos,
                "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx",
                50_000,
                5,
                &account.btc_address,
                &account.btc_private_key,
                &account.btc_public_key,
                OrdinalPolicy::CardinalOnly,
            )
            .unwrap_err();
        assert!(matches!(err, BitcoinTxError::OrdinalUtxoRefused { .. }));
    }

    #[test]
    fn rejects_dust_amount() {
        let account = derive_account(TEST_MNEMONIC, "", Network::Testnet).unwrap();
        let builder = P2wpkhBuilder::new(Network::Testnet.as_bitcoin_network());
        let utxos = vec![Utxo { txid: "3".repeat(64), vout: 0, value_sats: 100_000, is_ordinal: false }];

        let err = builder
            .build_and_sign(
                &utxos,
                "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx",
                100,
                5,
                &account.btc_address,
                &account.btc_private_key,
                &account.btc_public_key,
                OrdinalPolicy::CardinalOnly,
            )
            .unwrap_err();
        assert!(matches!(err, BitcoinTxError::DustOutput { .. }));
    }

    #[test]
    fn to_psbt_round_trips_the_signed_witness() {
        let account = derive_account(TEST_MNEMONIC, "", Network::Testnet).unwrap();
        let builder = P2wpkhBuilder::new(Network::Testnet.as_bitcoin_network());
        let utxos = vec![Utxo { txid: "5".repeat(64), vout: 0, value_sats: 100_000, is_ordinal: false }];

        let result = builder
            .build_and_sign(
                &utxos,
                "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx",
                50_000,
                5,
                &account.btc_address,
                &account.btc_private_key,
                &account.btc_public_key,
                OrdinalPolicy::CardinalOnly,
            )
            .unwrap();

        let psbt = builder.to_psbt(&result.tx_hex).unwrap();
        assert_eq!(psbt.inputs.len(), 1);
        assert!(psbt.inputs[0].final_script_witness.is_some());
    }
}
