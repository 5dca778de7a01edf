//! aibtc-core
//!
//! Local security and transaction-construction substrate for CLI "skills"
//! that let autonomous agents operate on Bitcoin L1 and Stacks L2:
//! encrypted secret storage, HD wallet derivation, session management
//! with auto-lock, signature services, Bitcoin and Stacks transaction
//! builders, chain gateways, the x402 micropayment client, and a
//! read-only ordinal envelope parser.
//!
//! Most of the actual CLI surface (the "skills") lives outside this
//! crate; this is the substrate they're built on.

pub mod common;
pub mod env;
pub mod config;
pub mod vault;
pub mod crypto;
pub mod credentials;
pub mod wallet;
pub mod signing;
pub mod bitcoin_tx;
pub mod stacks_tx;
pub mod fee;
pub mod gateway;
pub mod x402;
pub mod ordinal_parser;

pub use common::error::{AibtcError, Result};
pub use env::Network;

pub use wallet::{derive_account, generate_mnemonic, validate_mnemonic, Account, KeystoreManager, Session, WalletRow};
pub use vault::Vault;
pub use credentials::{CredentialRow, CredentialStore};
pub use config::AppConfig;

pub use bitcoin_tx::{BitcoinTxError, OrdinalPolicy, P2wpkhBuilder, SpendResult, Utxo as BitcoinUtxo, DUST_P2TR, DUST_P2WPKH};
pub use bitcoin_tx::{CommitResult, OrdinalBuilder, RevealResult};

pub use stacks_tx::{
    broadcast_signed, call_contract, deploy_contract, deserialize as deserialize_stacks_tx, transfer, BuiltTransaction,
    ContractCallArgs, DeployContractArgs, PostCondition, PostConditionMode,
};

pub use fee::{resolve_fee, TxType};

pub use gateway::{BitcoinGateway, HiroClient, MempoolSpaceClient, StacksGateway};

pub use x402::X402Client;

pub use ordinal_parser::{parse_envelopes_from_script, parse_envelopes_from_tx_hex, Envelope};
