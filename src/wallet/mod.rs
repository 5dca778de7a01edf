//! Wallet & Session Manager
//!
//! HD key derivation, the on-disk keystore/wallet-index lifecycle, and the
//! process-wide unlocked-session singleton.

pub mod hd;
pub mod keystore;
pub mod session;

pub use hd::{derive_account, generate_mnemonic, validate_mnemonic, Account};
pub use keystore::{KeystoreManager, WalletRow};
pub use session::Session;
