//! Mempool & Chain Gateway
//!
//! Typed HTTP clients for the Bitcoin side (mempool.space-compatible) and
//! the Stacks side (Hiro-compatible), sharing one retry/backoff policy.
//! Both surfaces are exposed as `#[async_trait]` traits so callers (the
//! Fee Resolver, the x402 client, the tx builders) can depend on the
//! trait object and get a `mockall`-generated mock in tests instead of
//! talking to the network.

pub mod bitcoin_api;
pub mod errors;
pub mod http;
pub mod stacks_api;

pub use bitcoin_api::{BitcoinGateway, FeeEstimates, MempoolSpaceClient, Utxo, UtxoStatus};
pub use errors::GatewayError;
pub use stacks_api::{AccountBalances, AccountInfo, FeePriority, HiroClient, MempoolFees, ReadOnlyResult, StacksGateway, TransactionStatus, TxStatus};
