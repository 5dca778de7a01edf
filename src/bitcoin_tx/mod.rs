//! Bitcoin Transaction Builder
//!
//! Two builders sharing UTXO-selection and fee-estimation
//! infrastructure: a plain P2WPKH spend, and an ordinal commit/reveal
//! pair built on a one-leaf taproot script path.

pub mod builder;
pub mod errors;
pub mod ordinal;

pub use builder::{OrdinalPolicy, P2wpkhBuilder, SpendResult, Utxo, DUST_P2TR, DUST_P2WPKH};
pub use errors::BitcoinTxError;
pub use ordinal::{CommitResult, OrdinalBuilder, RevealResult};
