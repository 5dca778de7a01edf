//! Bitcoin-side chain gateway: a mempool.space-compatible HTTP client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::common::error::AibtcError;
use crate::env::Network;
use crate::gateway::http::HttpGateway;

pub const MAINNET_URL: &str = "https://mempool.space/api";
pub const TESTNET_URL: &str = "https://mempool.space/testnet/api";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UtxoStatus {
    pub confirmed: bool,
    pub block_height: Option<u64>,
    pub block_time: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Utxo {
    pub txid: String,
    pub vout: u32,
    pub value: u64,
    pub status: UtxoStatus,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeeEstimates {
    #[serde(rename = "fastestFee")]
    pub fastest_fee: u64,
    #[serde(rename = "halfHourFee")]
    pub half_hour_fee: u64,
    #[serde(rename = "hourFee")]
    pub hour_fee: u64,
    #[serde(rename = "economyFee")]
    pub economy_fee: u64,
    #[serde(rename = "minimumFee")]
    pub minimum_fee: u64,
}

/// Typed client over the Bitcoin chain's HTTP surface. `#[async_trait]`
/// so it can be boxed as `dyn BitcoinGateway` and swapped for a mock in
/// tests via `mockall`.
#[async_trait]
pub trait BitcoinGateway: Send + Sync {
    async fn get_utxos(&self, address: &str) -> Result<Vec<Utxo>, AibtcError>;
    async fn get_fee_estimates(&self) -> Result<FeeEstimates, AibtcError>;
    async fn broadcast_raw_tx(&self, tx_hex: &str) -> Result<String, AibtcError>;
}

pub struct MempoolSpaceClient {
    http: HttpGateway,
}

impl MempoolSpaceClient {
    pub fn new(network: Network) -> Self {
        let base = match network {
            Network::Mainnet => MAINNET_URL,
            Network::Testnet => TESTNET_URL,
        };
        Self { http: HttpGateway::new(base, None) }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self { http: HttpGateway::new(base_url, None) }
    }
}

#[async_trait]
impl BitcoinGateway for MempoolSpaceClient {
    async fn get_utxos(&self, address: &str) -> Result<Vec<Utxo>, AibtcError> {
        Ok(self.http.get_json(&format!("/address/{address}/utxo")).await?)
    }

    async fn get_fee_estimates(&self) -> Result<FeeEstimates, AibtcError> {
        // mempool.space's /v1/fees/recommended already matches our shape.
        Ok(self.http.get_json("/v1/fees/recommended").await?)
    }

    async fn broadcast_raw_tx(&self, tx_hex: &str) -> Result<String, AibtcError> {
        Ok(self.http.post_text("/tx", tx_hex.to_string()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_estimates_deserialize_from_mempool_space_shape() {
        let json = r#"{"fastestFee":20,"halfHourFee":15,"hourFee":10,"economyFee":5,"minimumFee":1}"#;
        let fees: FeeEstimates = serde_json::from_str(json).unwrap();
        assert_eq!(fees.fastest_fee, 20);
        assert_eq!(fees.minimum_fee, 1);
    }

    #[test]
    fn client_picks_base_url_by_network() {
        let mainnet = MempoolSpaceClient::new(Network::Mainnet);
        assert_eq!(mainnet.http.base_url(), MAINNET_URL);
        let testnet = MempoolSpaceClient::new(Network::Testnet);
        assert_eq!(testnet.http.base_url(), TESTNET_URL);
    }
}
