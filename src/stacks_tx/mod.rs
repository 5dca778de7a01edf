//! Stacks Transaction Builder
//!
//! Wire codec and signing for SIP-005 transactions (token transfer,
//! contract call, contract deploy), standard or sponsored, plus the
//! post-condition and Clarity-argument sub-codecs they depend on.

pub mod clarity_args;
pub mod postcond;
pub mod tx;

pub use clarity_args::{parse_args, parse_arg, ClarityArgInput, TypedArg};
pub use postcond::{encode_post_conditions, AssetInfo, Comparator, PostCondition, PostConditionMode, PostConditionPrincipal};
pub use tx::{broadcast_signed, call_contract, deploy_contract, deserialize, transfer, BuiltTransaction, ContractCallArgs, DeployContractArgs, StacksPayload, StacksTransaction};
