//! On-disk application config (`config.json`).
//!
//! Tracks the active wallet pointer and the handful of settings that
//! persist across CLI invocations. Created on first use; mutated by
//! switch, unlock, timeout change, and API-key change.

use serde::{Deserialize, Serialize};

use crate::common::error::AibtcError;
use crate::vault::Vault;

const CONFIG_PATH: &str = "config.json";
const CONFIG_VERSION: u32 = 1;
const DEFAULT_AUTO_LOCK_MINUTES: u32 = 15;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub version: u32,
    pub active_wallet_id: Option<String>,
    pub auto_lock_timeout_minutes: u32,
    pub hiro_api_key: Option<String>,
    pub stacks_api_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            active_wallet_id: None,
            auto_lock_timeout_minutes: DEFAULT_AUTO_LOCK_MINUTES,
            hiro_api_key: None,
            stacks_api_url: None,
        }
    }
}

impl AppConfig {
    /// Load `config.json` from the vault, returning an unsaved default if
    /// it doesn't exist yet.
    pub fn load(vault: &Vault) -> Result<Self, AibtcError> {
        match vault.read(CONFIG_PATH)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| AibtcError::config(format!("malformed config.json: {e}"))),
            None => Ok(Self::default()),
        }
    }

    /// Persist this config atomically.
    pub fn save(&self, vault: &Vault) -> Result<(), AibtcError> {
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| AibtcError::config(format!("failed to serialize config: {e}")))?;
        vault.write_atomic(CONFIG_PATH, &bytes)
    }

    /// Validate the invariant that `active_wallet_id`, if set, names a
    /// wallet present in the index. Callers pass in the set of known ids
    /// since this type has no knowledge of the wallet index.
    pub fn validate_active_wallet(&self, known_ids: &[String]) -> Result<(), AibtcError> {
        if let Some(id) = &self.active_wallet_id {
            if !known_ids.iter().any(|k| k == id) {
                return Err(AibtcError::config(format!(
                    "active_wallet_id '{id}' does not match any wallet in the index"
                )));
            }
        }
        Ok(())
    }

    pub fn set_active_wallet(&mut self, wallet_id: Option<String>) {
        self.active_wallet_id = wallet_id;
    }

    pub fn set_auto_lock_timeout(&mut self, minutes: u32) {
        self.auto_lock_timeout_minutes = minutes;
    }

    pub fn set_hiro_api_key(&mut self, key: Option<String>) {
        self.hiro_api_key = key;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_vault() -> (tempfile::TempDir, Vault) {
        let dir = tempdir().unwrap();
        let vault = Vault::open_at(dir.path().join(".aibtc"), dir.path().join(".stx402")).unwrap();
        (dir, vault)
    }

    #[test]
    fn missing_config_loads_default() {
        let (_dir, vault) = test_vault();
        let cfg = AppConfig::load(&vault).unwrap();
        assert_eq!(cfg.version, CONFIG_VERSION);
        assert!(cfg.active_wallet_id.is_none());
        assert_eq!(cfg.auto_lock_timeout_minutes, DEFAULT_AUTO_LOCK_MINUTES);
    }

    #[test]
    fn save_then_load_round_trips() {
        let (_dir, vault) = test_vault();
        let mut cfg = AppConfig::default();
        cfg.set_active_wallet(Some("wallet-1".to_string()));
        cfg.set_auto_lock_timeout(0);
        cfg.save(&vault).unwrap();

        let reloaded = AppConfig::load(&vault).unwrap();
        assert_eq!(reloaded.active_wallet_id.as_deref(), Some("wallet-1"));
        assert_eq!(reloaded.auto_lock_timeout_minutes, 0);
    }

    #[test]
    fn validate_active_wallet_rejects_unknown_id() {
        let mut cfg = AppConfig::default();
        cfg.set_active_wallet(Some("ghost".to_string()));
        let err = cfg.validate_active_wallet(&["wallet-1".to_string()]).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn validate_active_wallet_accepts_none() {
        let cfg = AppConfig::default();
        assert!(cfg.validate_active_wallet(&[]).is_ok());
    }
}
