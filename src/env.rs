//! Environment variable loading.
//!
//! The core reads exactly three environment variables, per the external
//! interfaces contract: `NETWORK`, `HIRO_API_KEY`, `CLIENT_MNEMONIC`. All
//! other configuration lives on disk in `config.json` (see [`crate::config`]).

use std::fmt;
use std::str::FromStr;

use crate::common::error::AibtcError;

/// Bitcoin/Stacks network selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    /// Stacks c32check address version byte.
    pub fn stacks_version_byte(self) -> u8 {
        match self {
            Network::Mainnet => 22,
            Network::Testnet => 26,
        }
    }

    /// Stacks transaction-wire chain id.
    pub fn stacks_chain_id(self) -> u32 {
        match self {
            Network::Mainnet => 0x0000_0001,
            Network::Testnet => 0x8000_0000,
        }
    }

    /// bech32/bech32m human-readable part for Bitcoin addresses.
    pub fn bech32_hrp(self) -> &'static str {
        match self {
            Network::Mainnet => "bc",
            Network::Testnet => "tb",
        }
    }

    /// `bitcoin` crate network enum for this network.
    pub fn as_bitcoin_network(self) -> bitcoin::Network {
        match self {
            Network::Mainnet => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
        }
    }

    /// BIP-44/84/86 coin type (`0` for mainnet, `1` for testnet, per SLIP-44).
    pub fn bip32_coin_type(self) -> u32 {
        match self {
            Network::Mainnet => 0,
            Network::Testnet => 1,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

impl FromStr for Network {
    type Err = AibtcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            other => Err(AibtcError::config(format!(
                "invalid NETWORK value '{other}', expected 'mainnet' or 'testnet'"
            ))),
        }
    }
}

impl Default for Network {
    fn default() -> Self {
        Network::Testnet
    }
}

/// Values sourced from the process environment, loaded once at startup.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub network: Network,
    pub hiro_api_key: Option<String>,
    /// When set, substitutes for an unlocked wallet in read-only operations.
    /// See [`crate::wallet::session::Session::from_env_mnemonic`].
    pub client_mnemonic: Option<String>,
}

impl EnvConfig {
    /// Load from the process environment, optionally applying a `.env` file
    /// found in the current directory first (does not override variables
    /// already set in the real environment).
    pub fn load() -> Result<Self, AibtcError> {
        let _ = dotenv::dotenv();

        let network = match std::env::var("NETWORK") {
            Ok(val) if !val.is_empty() => Network::from_str(&val)?,
            _ => Network::default(),
        };

        let hiro_api_key = std::env::var("HIRO_API_KEY").ok().filter(|s| !s.is_empty());
        let client_mnemonic = std::env::var("CLIENT_MNEMONIC").ok().filter(|s| !s.is_empty());

        Ok(Self { network, hiro_api_key, client_mnemonic })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_round_trips_through_str() {
        assert_eq!(Network::from_str("mainnet").unwrap(), Network::Mainnet);
        assert_eq!(Network::from_str("TESTNET").unwrap(), Network::Testnet);
        assert!(Network::from_str("regtest").is_err());
    }

    #[test]
    fn network_version_bytes_match_spec() {
        assert_eq!(Network::Mainnet.stacks_version_byte(), 22);
        assert_eq!(Network::Testnet.stacks_version_byte(), 26);
    }

    #[test]
    fn network_chain_ids_match_spec() {
        assert_eq!(Network::Mainnet.stacks_chain_id(), 0x0000_0001);
        assert_eq!(Network::Testnet.stacks_chain_id(), 0x8000_0000);
    }

    #[test]
    fn default_network_is_testnet() {
        assert_eq!(Network::default(), Network::Testnet);
    }
}
