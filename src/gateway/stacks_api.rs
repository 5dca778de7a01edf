//! Stacks-side chain gateway: a Hiro-compatible HTTP client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::error::AibtcError;
use crate::env::Network;
use crate::gateway::http::HttpGateway;
use crate::signing::ClarityValue;

pub const MAINNET_URL: &str = "https://api.hiro.so";
pub const TESTNET_URL: &str = "https://api.testnet.hiro.so";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountInfo {
    pub balance: String,
    pub nonce: u64,
    pub locked: String,
    #[serde(default)]
    pub unlock_height: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountBalances {
    pub stx: Value,
    #[serde(default)]
    pub fungible_tokens: Value,
    #[serde(default)]
    pub non_fungible_tokens: Value,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct FeePriority {
    pub low_priority: u64,
    pub medium_priority: u64,
    pub high_priority: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MempoolFees {
    pub token_transfer: FeePriority,
    pub contract_call: FeePriority,
    pub smart_contract: FeePriority,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReadOnlyResult {
    pub okay: bool,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub cause: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Success,
    AbortByResponse,
    AbortByPostCondition,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransactionStatus {
    pub status: TxStatus,
    #[serde(default)]
    pub block_height: Option<u64>,
    #[serde(default)]
    pub tx_result: Option<Value>,
}

/// Typed client over the Stacks chain's HTTP surface.
#[async_trait]
pub trait StacksGateway: Send + Sync {
    async fn get_account_info(&self, address: &str) -> Result<AccountInfo, AibtcError>;
    async fn get_stx_balance(&self, address: &str) -> Result<u128, AibtcError>;
    async fn get_account_balances(&self, address: &str) -> Result<AccountBalances, AibtcError>;
    async fn get_account_transactions(&self, address: &str, limit: u32, offset: u32) -> Result<Value, AibtcError>;
    async fn get_mempool_fees(&self) -> Result<MempoolFees, AibtcError>;
    async fn get_block_by_height(&self, height: u64) -> Result<Value, AibtcError>;
    async fn get_block_by_hash(&self, hash: &str) -> Result<Value, AibtcError>;
    async fn get_contract_info(&self, contract_id: &str) -> Result<Value, AibtcError>;
    async fn get_contract_interface(&self, contract_id: &str) -> Result<Value, AibtcError>;
    async fn get_contract_events(&self, contract_id: &str, limit: u32, offset: u32) -> Result<Value, AibtcError>;
    async fn call_read_only(
        &self,
        contract_id: &str,
        function_name: &str,
        args: &[ClarityValue],
        sender_address: &str,
    ) -> Result<ReadOnlyResult, AibtcError>;
    async fn get_transaction_status(&self, txid: &str) -> Result<TransactionStatus, AibtcError>;
    async fn broadcast_raw_tx(&self, tx_hex: &str) -> Result<String, AibtcError>;
}

pub struct HiroClient {
    http: HttpGateway,
}

impl HiroClient {
    pub fn new(network: Network, api_key: Option<String>) -> Self {
        let base = match network {
            Network::Mainnet => MAINNET_URL,
            Network::Testnet => TESTNET_URL,
        };
        Self { http: HttpGateway::new(base, api_key) }
    }
}

#[derive(Serialize)]
struct ReadOnlyRequest {
    sender: String,
    arguments: Vec<String>,
}

#[async_trait]
impl StacksGateway for HiroClient {
    async fn get_account_info(&self, address: &str) -> Result<AccountInfo, AibtcError> {
        Ok(self.http.get_json(&format!("/v2/accounts/{address}?proof=0")).await?)
    }

    async fn get_stx_balance(&self, address: &str) -> Result<u128, AibtcError> {
        let balances: AccountBalances = self.get_account_balances(address).await?;
        let stx_balance = balances
            .stx
            .get("balance")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AibtcError::api("missing stx.balance in response", None))?;
        stx_balance.parse::<u128>().map_err(|e| AibtcError::api(format!("malformed balance: {e}"), None))
    }

    async fn get_account_balances(&self, address: &str) -> Result<AccountBalances, AibtcError> {
        Ok(self.http.get_json(&format!("/extended/v1/address/{address}/balances")).await?)
    }

    async fn get_account_transactions(&self, address: &str, limit: u32, offset: u32) -> Result<Value, AibtcError> {
        Ok(self
            .http
            .get_json(&format!("/extended/v1/address/{address}/transactions?limit={limit}&offset={offset}"))
            .await?)
    }

    async fn get_mempool_fees(&self) -> Result<MempoolFees, AibtcError> {
        Ok(self.http.get_json("/extended/v1/fees/transaction").await?)
    }

    async fn get_block_by_height(&self, height: u64) -> Result<Value, AibtcError> {
        Ok(self.http.get_json(&format!("/extended/v2/blocks/{height}")).await?)
    }

    async fn get_block_by_hash(&self, hash: &str) -> Result<Value, AibtcError> {
        Ok(self.http.get_json(&format!("/extended/v2/blocks/{hash}")).await?)
    }

    async fn get_contract_info(&self, contract_id: &str) -> Result<Value, AibtcError> {
        Ok(self.http.get_json(&format!("/extended/v1/contract/{contract_id}")).await?)
    }

    async fn get_contract_interface(&self, contract_id: &str) -> Result<Value, AibtcError> {
        let (address, name) = contract_id
            .split_once('.')
            .ok_or_else(|| AibtcError::validation(format!("invalid contract id '{contract_id}'")))?;
        Ok(self.http.get_json(&format!("/v2/contracts/interface/{address}/{name}")).await?)
    }

    async fn get_contract_events(&self, contract_id: &str, limit: u32, offset: u32) -> Result<Value, AibtcError> {
        Ok(self
            .http
            .get_json(&format!("/extended/v1/contract/{contract_id}/events?limit={limit}&offset={offset}"))
            .await?)
    }

    async fn call_read_only(
        &self,
        contract_id: &str,
        function_name: &str,
        args: &[ClarityValue],
        sender_address: &str,
    ) -> Result<ReadOnlyResult, AibtcError> {
        let (address, name) = contract_id
            .split_once('.')
            .ok_or_else(|| AibtcError::validation(format!("invalid contract id '{contract_id}'")))?;
        let body = ReadOnlyRequest {
            sender: sender_address.to_string(),
            arguments: args.iter().map(|a| format!("0x{}", hex::encode(a.encode()))).collect(),
        };
        Ok(self
            .http
            .post_json(&format!("/v2/contracts/call-read/{address}/{name}/{function_name}"), &body)
            .await?)
    }

    async fn get_transaction_status(&self, txid: &str) -> Result<TransactionStatus, AibtcError> {
        Ok(self.http.get_json(&format!("/extended/v1/tx/{txid}")).await?)
    }

    async fn broadcast_raw_tx(&self, tx_hex: &str) -> Result<String, AibtcError> {
        let bytes = hex::decode(tx_hex).map_err(|e| AibtcError::validation(format!("invalid tx hex: {e}")))?;
        let txid = self.http.post_bytes("/v2/transactions", bytes).await?;
        Ok(txid.trim_matches('"').to_string())
    }
}
