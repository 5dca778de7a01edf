//! Error type for the Bitcoin transaction builders.

#[derive(Debug, thiserror::Error)]
pub enum BitcoinTxError {
    #[error("insufficient funds: need {required} sats, have {available} sats")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("no UTXOs provided")]
    NoUtxos,

    #[error("output below dust threshold: {amount} sats (threshold {threshold})")]
    DustOutput { amount: u64, threshold: u64 },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("signing failed: {0}")]
    SigningError(String),

    #[error("refused to spend a UTXO flagged as holding an ordinal inscription: {txid}:{vout}")]
    OrdinalUtxoRefused { txid: String, vout: u32 },
}
