//! x402 Client
//!
//! The client side of the two-round HTTP micropayment challenge: send a
//! request, and if the server replies `402 Payment Required`, build and
//! embed a sponsored Stacks payment and retry. If the retry itself times
//! out or errors after payment was sent, recover by polling the chain for
//! the transaction the client already signed and transmitted.

use std::time::Duration;

use base64::Engine;
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::error::AibtcError;
use crate::env::Network;
use crate::gateway::StacksGateway;
use crate::stacks_tx::postcond::{Comparator, PostCondition, PostConditionMode, PostConditionPrincipal};
use crate::stacks_tx::{call_contract, deserialize, transfer, ContractCallArgs};
use crate::wallet::hd::Account;

const HEADER_PAYMENT_REQUIRED: &str = "payment-required";
const HEADER_PAYMENT_SIGNATURE: &str = "payment-signature";
const HEADER_PAYMENT_RESPONSE: &str = "payment-response";

const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
const DEFAULT_POLL_MAX_MS: u64 = 10_000;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const STX_ASSET: &str = "STX";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AcceptEntry {
    pub scheme: String,
    pub network: String,
    pub amount: String,
    pub asset: String,
    #[serde(rename = "payTo")]
    pub pay_to: String,
    #[serde(rename = "maxTimeoutSeconds")]
    pub max_timeout_seconds: u64,
    #[serde(default)]
    pub extra: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentRequiredV2 {
    #[serde(rename = "x402Version")]
    pub x402_version: u8,
    pub resource: Value,
    pub accepts: Vec<AcceptEntry>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentPayloadTx {
    pub transaction: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentPayloadV2 {
    #[serde(rename = "x402Version")]
    pub x402_version: u8,
    #[serde(default)]
    pub resource: Option<Value>,
    pub accepted: AcceptEntry,
    pub payload: PaymentPayloadTx,
    #[serde(default)]
    pub extensions: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SettlementResponseV2 {
    pub success: bool,
    #[serde(default)]
    pub transaction: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub payer: Option<String>,
    #[serde(default, rename = "errorReason")]
    pub error_reason: Option<String>,
}

pub struct SettledResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub settlement: Option<SettlementResponseV2>,
}

pub struct RecoveryResult {
    pub status: String,
    pub txid: String,
    pub explorer_url: String,
}

pub enum X402Outcome {
    /// The server never returned 402 — no payment was required.
    NoPaymentRequired(SettledResponse),
    /// Payment was made and the resend succeeded.
    Settled(SettledResponse),
    /// Payment was sent but the resend couldn't confirm it landed; the
    /// caller should consult the polled chain status.
    Recovered(RecoveryResult),
}

fn encode_header<T: Serialize>(value: &T) -> Result<String, AibtcError> {
    let json = serde_json::to_vec(value).map_err(|e| AibtcError::internal(format!("x402 header encode failed: {e}")))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(json))
}

fn decode_header<T: for<'de> Deserialize<'de>>(header_value: &str) -> Result<T, AibtcError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(header_value.trim())
        .map_err(|e| AibtcError::validation(format!("malformed x402 header: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| AibtcError::validation(format!("malformed x402 header payload: {e}")))
}

/// Pick the cheapest payable `accepts[]` entry, falling back to the first
/// entry when amounts can't be compared (the x402 spec only requires
/// picking the first; this is the stricter, cost-aware reading).
fn pick_accept(accepts: &[AcceptEntry]) -> Result<&AcceptEntry, AibtcError> {
    if accepts.is_empty() {
        return Err(AibtcError::validation("payment-required header carries no accepts[] entries"));
    }
    let cheapest = accepts
        .iter()
        .filter_map(|a| a.amount.parse::<u128>().ok().map(|amt| (amt, a)))
        .min_by_key(|(amt, _)| *amt)
        .map(|(_, a)| a);
    Ok(cheapest.unwrap_or(&accepts[0]))
}

fn explorer_url(network: Network, txid: &str) -> String {
    let chain = match network {
        Network::Mainnet => "mainnet",
        Network::Testnet => "testnet",
    };
    format!("https://explorer.hiro.so/txid/{txid}?chain={chain}")
}

pub struct X402Client<'a> {
    http: Client,
    gateway: &'a dyn StacksGateway,
    poll_interval_ms: u64,
    poll_max_ms: u64,
}

impl<'a> X402Client<'a> {
    pub fn new(gateway: &'a dyn StacksGateway) -> Self {
        Self {
            http: Client::builder().timeout(DEFAULT_REQUEST_TIMEOUT).build().expect("reqwest client builds"),
            gateway,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            poll_max_ms: DEFAULT_POLL_MAX_MS,
        }
    }

    pub fn with_poll_timing(mut self, poll_interval_ms: u64, poll_max_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self.poll_max_ms = poll_max_ms;
        self
    }

    /// Drive the full two-round protocol against `url`, paying from
    /// `account` if the server demands it.
    pub async fn call(&self, method: Method, url: &str, account: &Account) -> Result<X402Outcome, AibtcError> {
        let first = self
            .http
            .request(method.clone(), url)
            .send()
            .await
            .map_err(|e| AibtcError::api(e.to_string(), None))?;

        if first.status() != StatusCode::PAYMENT_REQUIRED {
            let status = first.status().as_u16();
            let body = first.bytes().await.map_err(|e| AibtcError::api(e.to_string(), None))?.to_vec();
            return Ok(X402Outcome::NoPaymentRequired(SettledResponse { status, body, settlement: None }));
        }

        let required_header = first
            .headers()
            .get(HEADER_PAYMENT_REQUIRED)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AibtcError::validation("402 response missing payment-required header"))?
            .to_string();
        let required: PaymentRequiredV2 = decode_header(&required_header)?;
        let accepted = pick_accept(&required.accepts)?.clone();

        let tx_hex = self.build_payment_tx(account, &accepted).await?;
        let payload = PaymentPayloadV2 {
            x402_version: 2,
            resource: Some(required.resource.clone()),
            accepted: accepted.clone(),
            payload: PaymentPayloadTx { transaction: format!("0x{tx_hex}") },
            extensions: None,
        };
        let signature_header = encode_header(&payload)?;

        let retry = self
            .http
            .request(method, url)
            .header(HEADER_PAYMENT_SIGNATURE, signature_header.clone())
            .send()
            .await;

        match retry {
            Ok(resp) if resp.status().is_success() => {
                let status = resp.status().as_u16();
                let settlement = resp
                    .headers()
                    .get(HEADER_PAYMENT_RESPONSE)
                    .and_then(|v| v.to_str().ok())
                    .map(decode_header::<SettlementResponseV2>)
                    .transpose()?;
                let body = resp.bytes().await.map_err(|e| AibtcError::api(e.to_string(), None))?.to_vec();
                Ok(X402Outcome::Settled(SettledResponse { status, body, settlement }))
            }
            _ => {
                // The payment header was already sent and the tx already
                // signed and broadcast server-side in all likelihood; don't
                // re-sign (that would reuse the nonce). Recover by polling.
                self.recover(account.network, &tx_hex).await.map(X402Outcome::Recovered)
            }
        }
    }

    async fn build_payment_tx(&self, account: &Account, accepted: &AcceptEntry) -> Result<String, AibtcError> {
        let amount: u128 = accepted
            .amount
            .parse()
            .map_err(|_| AibtcError::validation(format!("non-numeric accepts[].amount '{}'", accepted.amount)))?;
        let amount_u64: u64 = amount.try_into().map_err(|_| AibtcError::validation("accepts[].amount exceeds u64"))?;

        let account_info = self.gateway.get_account_info(&account.stx_address).await?;
        let nonce = account_info.nonce;

        if accepted.asset.eq_ignore_ascii_case(STX_ASSET) {
            let built = transfer(account, &accepted.pay_to, amount_u64, None, nonce, Some(0), true)?;
            return Ok(built.tx_hex);
        }

        // SIP-010 fungible token: `asset` is `<contractAddress>.<contractName>::<tokenName>`.
        let (contract_id, _token_name) = accepted
            .asset
            .split_once("::")
            .ok_or_else(|| AibtcError::validation(format!("malformed SIP-010 asset descriptor '{}'", accepted.asset)))?;
        let (contract_address, contract_name) = contract_id
            .split_once('.')
            .ok_or_else(|| AibtcError::validation(format!("malformed SIP-010 contract id '{contract_id}'")))?;

        let post_condition = PostCondition::Fungible {
            principal: PostConditionPrincipal::Origin,
            asset: crate::stacks_tx::AssetInfo {
                contract_address: contract_address.to_string(),
                contract_name: contract_name.to_string(),
                asset_name: _token_name.to_string(),
            },
            comparator: Comparator::Eq,
            amount: amount_u64,
        };

        let args = ContractCallArgs {
            contract_address: contract_address.to_string(),
            contract_name: contract_name.to_string(),
            function_name: "transfer".to_string(),
            function_args: vec![
                crate::stacks_tx::ClarityArgInput::Shorthand(format!("uint:{amount_u64}")),
                crate::stacks_tx::ClarityArgInput::Shorthand(format!("principal:{}", account.stx_address)),
                crate::stacks_tx::ClarityArgInput::Shorthand(format!("principal:{}", accepted.pay_to)),
                crate::stacks_tx::ClarityArgInput::Shorthand("optional-none".to_string()),
            ],
            post_condition_mode: PostConditionMode::Deny,
            post_conditions: vec![post_condition],
            fee: Some(0),
            sponsored: true,
        };
        let built = call_contract(account, nonce, args)?;
        Ok(built.tx_hex)
    }

    async fn recover(&self, network: Network, tx_hex: &str) -> Result<RecoveryResult, AibtcError> {
        let txid = deserialize(tx_hex)?.txid();
        let deadline = tokio::time::Instant::now() + Duration::from_millis(self.poll_max_ms);

        loop {
            match self.gateway.get_transaction_status(&txid).await {
                Ok(status) => {
                    let status_str = serde_json::to_string(&status.status)
                        .unwrap_or_default()
                        .trim_matches('"')
                        .to_string();
                    if status_str != "pending" || tokio::time::Instant::now() >= deadline {
                        return Ok(RecoveryResult { status: status_str, txid: txid.clone(), explorer_url: explorer_url(network, &txid) });
                    }
                }
                Err(_) if tokio::time::Instant::now() >= deadline => {
                    return Ok(RecoveryResult { status: "unknown".to_string(), txid: txid.clone(), explorer_url: explorer_url(network, &txid) });
                }
                Err(_) => {}
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(RecoveryResult { status: "pending".to_string(), txid, explorer_url: explorer_url(network, &txid) });
            }
            tokio::time::sleep(Duration::from_millis(self.poll_interval_ms)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_cheapest_accept_entry() {
        let accepts = vec![
            AcceptEntry {
                scheme: "exact".into(),
                network: "stacks".into(),
                amount: "5000".into(),
                asset: "STX".into(),
                pay_to: "ST1".into(),
                max_timeout_seconds: 60,
                extra: None,
            },
            AcceptEntry {
                scheme: "exact".into(),
                network: "stacks".into(),
                amount: "1000".into(),
                asset: "STX".into(),
                pay_to: "ST1".into(),
                max_timeout_seconds: 60,
                extra: None,
            },
        ];
        let chosen = pick_accept(&accepts).unwrap();
        assert_eq!(chosen.amount, "1000");
    }

    #[test]
    fn falls_back_to_first_when_amounts_unparseable() {
        let accepts = vec![AcceptEntry {
            scheme: "exact".into(),
            network: "stacks".into(),
            amount: "not-a-number".into(),
            asset: "STX".into(),
            pay_to: "ST1".into(),
            max_timeout_seconds: 60,
            extra: None,
        }];
        let chosen = pick_accept(&accepts).unwrap();
        assert_eq!(chosen.pay_to, "ST1");
    }

    #[test]
    fn rejects_empty_accepts() {
        assert!(pick_accept(&[]).is_err());
    }

    #[test]
    fn header_round_trips_through_base64_json() {
        let payload = PaymentPayloadV2 {
            x402_version: 2,
            resource: None,
            accepted: AcceptEntry {
                scheme: "exact".into(),
                network: "stacks".into(),
                amount: "1000".into(),
                asset: "STX".into(),
                pay_to: "ST1".into(),
                max_timeout_seconds: 60,
                extra: None,
            },
            payload: PaymentPayloadTx { transaction: "0xdead".into() },
            extensions: None,
        };
        let header = encode_header(&payload).unwrap();
        let decoded: PaymentPayloadV2 = decode_header(&header).unwrap();
        assert_eq!(decoded.payload.transaction, "0xdead");
        assert_eq!(decoded.x402_version, 2);
    }
}
