//! Fee Resolver
//!
//! Resolves a fee expression (`"low"`, `"medium"`, `"high"`, or a numeric
//! literal) to a concrete μSTX fee for a given transaction type. Presets
//! fetch live mempool fees; clamps guard every preset against a stale or
//! manipulated mempool quote. A missing fee expression resolves to `None`,
//! signaling the caller to auto-estimate at build time.

use tracing::warn;

use crate::common::error::AibtcError;
use crate::gateway::{FeePriority, StacksGateway};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxType {
    TokenTransfer,
    ContractCall,
    SmartContract,
    All,
}

impl TxType {
    fn clamp(self) -> (u64, u64) {
        match self {
            TxType::TokenTransfer => (180, 3_000),
            TxType::ContractCall => (3_000, 100_000),
            TxType::SmartContract => (10_000, 100_000),
            TxType::All => (180, 100_000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Preset {
    Low,
    Medium,
    High,
}

/// Parse `"low"|"medium"|"high"|<integer>` into a concrete μSTX fee.
/// Returns `None` when `fee_expr` is `None` (auto-estimate at build time).
pub async fn resolve_fee(
    fee_expr: Option<&str>,
    tx_type: TxType,
    gateway: &dyn StacksGateway,
) -> Result<Option<u64>, AibtcError> {
    let Some(expr) = fee_expr else { return Ok(None) };

    if let Ok(literal) = expr.parse::<u64>() {
        return Ok(Some(literal));
    }

    let preset = match expr {
        "low" => Preset::Low,
        "medium" => Preset::Medium,
        "high" => Preset::High,
        other => return Err(AibtcError::validation(format!("unrecognized fee expression '{other}'"))),
    };

    let (floor, ceiling) = tx_type.clamp();

    let raw_fee = match gateway.get_mempool_fees().await {
        Ok(fees) => {
            let priority = select_priority(&fees_for_type(&fees, tx_type), preset);
            priority
        }
        Err(e) => {
            warn!(error = %e, "mempool fee fetch failed, falling back to floor-based multiplier");
            match preset {
                Preset::Low => floor,
                Preset::Medium => floor * 2,
                Preset::High => floor * 3,
            }
        }
    };

    Ok(Some(raw_fee.clamp(floor, ceiling)))
}

fn fees_for_type(fees: &crate::gateway::MempoolFees, tx_type: TxType) -> FeePriority {
    match tx_type {
        TxType::TokenTransfer => fees.token_transfer.clone(),
        TxType::ContractCall => fees.contract_call.clone(),
        TxType::SmartContract => fees.smart_contract.clone(),
        // "all" has no dedicated mempool bucket; contract_call's range
        // spans the middle of the overall clamp, so it's the closest proxy.
        TxType::All => fees.contract_call.clone(),
    }
}

fn select_priority(priority: &FeePriority, preset: Preset) -> u64 {
    match preset {
        Preset::Low => priority.low_priority,
        Preset::Medium => priority.medium_priority,
        Preset::High => priority.high_priority,
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::Value;

    use super::*;
    use crate::gateway::{AccountBalances, AccountInfo, MempoolFees, ReadOnlyResult, TransactionStatus};
    use crate::signing::ClarityValue;

    struct FakeGateway {
        fees: Result<MempoolFees, ()>,
    }

    #[async_trait]
    impl StacksGateway for FakeGateway {
        async fn get_account_info(&self, _address: &str) -> Result<AccountInfo, AibtcError> {
            unimplemented!()
        }
        async fn get_stx_balance(&self, _address: &str) -> Result<u128, AibtcError> {
            unimplemented!()
        }
        async fn get_account_balances(&self, _address: &str) -> Result<AccountBalances, AibtcError> {
            unimplemented!()
        }
        async fn get_account_transactions(&self, _address: &str, _limit: u32, _offset: u32) -> Result<Value, AibtcError> {
            unimplemented!()
        }
        async fn get_mempool_fees(&self) -> Result<MempoolFees, AibtcError> {
            self.fees.clone().map_err(|_| AibtcError::api("mempool unreachable", None))
        }
        async fn get_block_by_height(&self, _height: u64) -> Result<Value, AibtcError> {
            unimplemented!()
        }
        async fn get_block_by_hash(&self, _hash: &str) -> Result<Value, AibtcError> {
            unimplemented!()
        }
        async fn get_contract_info(&self, _contract_id: &str) -> Result<Value, AibtcError> {
            unimplemented!()
        }
        async fn get_contract_interface(&self, _contract_id: &str) -> Result<Value, AibtcError> {
            unimplemented!()
        }
        async fn get_contract_events(&self, _contract_id: &str, _limit: u32, _offset: u32) -> Result<Value, AibtcError> {
            unimplemented!()
        }
        async fn call_read_only(&self, _contract_id: &str, _function_name: &str, _args: &[ClarityValue], _sender_address: &str) -> Result<ReadOnlyResult, AibtcError> {
            unimplemented!()
        }
        async fn get_transaction_status(&self, _txid: &str) -> Result<TransactionStatus, AibtcError> {
            unimplemented!()
        }
        async fn broadcast_raw_tx(&self, _tx_hex: &str) -> Result<String, AibtcError> {
            unimplemented!()
        }
    }

    fn sample_fees() -> MempoolFees {
        MempoolFees {
            token_transfer: FeePriority { low_priority: 200, medium_priority: 250, high_priority: 10_000 },
            contract_call: FeePriority { low_priority: 3_500, medium_priority: 4_000, high_priority: 200_000 },
            smart_contract: FeePriority { low_priority: 11_000, medium_priority: 12_000, high_priority: 12_000 },
        }
    }

    #[tokio::test]
    async fn numeric_literal_passes_through_unchanged() {
        let gw = FakeGateway { fees: Ok(sample_fees()) };
        let fee = resolve_fee(Some("5000"), TxType::ContractCall, &gw).await.unwrap();
        assert_eq!(fee, Some(5000));
    }

    #[tokio::test]
    async fn none_expression_resolves_to_none() {
        let gw = FakeGateway { fees: Ok(sample_fees()) };
        let fee = resolve_fee(None, TxType::TokenTransfer, &gw).await.unwrap();
        assert_eq!(fee, None);
    }

    #[tokio::test]
    async fn preset_is_clamped_to_ceiling() {
        let gw = FakeGateway { fees: Ok(sample_fees()) };
        // token_transfer high_priority quote (10_000) exceeds its ceiling (3_000).
        let fee = resolve_fee(Some("high"), TxType::TokenTransfer, &gw).await.unwrap();
        assert_eq!(fee, Some(3_000));
    }

    #[tokio::test]
    async fn preset_is_clamped_to_floor() {
        let gw = FakeGateway {
            fees: Ok(MempoolFees {
                token_transfer: FeePriority { low_priority: 1, medium_priority: 2, high_priority: 3 },
                contract_call: FeePriority { low_priority: 1, medium_priority: 2, high_priority: 3 },
                smart_contract: FeePriority { low_priority: 1, medium_priority: 2, high_priority: 3 },
            }),
        };
        let fee = resolve_fee(Some("low"), TxType::SmartContract, &gw).await.unwrap();
        assert_eq!(fee, Some(10_000));
    }

    #[tokio::test]
    async fn falls_back_to_floor_multiplier_on_fetch_failure() {
        let gw = FakeGateway { fees: Err(()) };
        let fee = resolve_fee(Some("medium"), TxType::ContractCall, &gw).await.unwrap();
        assert_eq!(fee, Some(6_000)); // floor(3000) * 2
    }

    #[tokio::test]
    async fn unrecognized_expression_is_rejected() {
        let gw = FakeGateway { fees: Ok(sample_fees()) };
        let err = resolve_fee(Some("urgent"), TxType::All, &gw).await.unwrap_err();
        assert!(matches!(err, AibtcError::Validation(_)));
    }
}
