//! Keystore Manager
//!
//! Owns the wallet index (`wallets.json`) and one encrypted keystore file
//! per wallet (`wallets/<uuid>/keystore.json`). Exposes create, import,
//! export, delete, rotate, switch, list, and unlock (decrypt-only; the
//! Session Manager wraps the result with a TTL).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::error::AibtcError;
use crate::common::logging::log_wallet_event;
use crate::config::AppConfig;
use crate::crypto::{EncryptedBlob, KdfParams};
use crate::env::Network;
use crate::vault::Vault;
use crate::wallet::hd::{self, Account};
use crate::wallet::session;

const WALLETS_INDEX_PATH: &str = "wallets.json";
const EXPORT_CONFIRM_TOKEN: &str = "I_UNDERSTAND_THE_RISKS";
const DELETE_CONFIRM_TOKEN: &str = "DELETE";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRow {
    pub id: String,
    pub name: String,
    pub network: Network,
    pub stx_address: String,
    pub btc_address: String,
    pub taproot_address: String,
    pub sponsor_api_key: Option<String>,
    pub created_at: String,
    pub last_used: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeystoreFile {
    version: u32,
    encrypted: EncryptedBlob,
    address_index: u32,
}

pub struct KeystoreManager<'a> {
    vault: &'a Vault,
}

impl<'a> KeystoreManager<'a> {
    pub fn new(vault: &'a Vault) -> Self {
        Self { vault }
    }

    fn load_index(&self) -> Result<Vec<WalletRow>, AibtcError> {
        match self.vault.read(WALLETS_INDEX_PATH)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| AibtcError::config(format!("malformed wallets.json: {e}"))),
            None => Ok(Vec::new()),
        }
    }

    fn save_index(&self, index: &[WalletRow]) -> Result<(), AibtcError> {
        let bytes = serde_json::to_vec_pretty(index)
            .map_err(|e| AibtcError::config(format!("failed to serialize wallet index: {e}")))?;
        self.vault.write_atomic(WALLETS_INDEX_PATH, &bytes)
    }

    fn keystore_path(wallet_id: &str) -> String {
        format!("wallets/{wallet_id}/keystore.json")
    }

    fn backup_path(wallet_id: &str) -> String {
        format!("wallets/{wallet_id}/keystore.json.backup")
    }

    fn load_keystore(&self, wallet_id: &str) -> Result<KeystoreFile, AibtcError> {
        let bytes = self
            .vault
            .read(&Self::keystore_path(wallet_id))?
            .ok_or_else(|| AibtcError::WalletNotFound(wallet_id.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| AibtcError::config(format!("malformed keystore.json: {e}")))
    }

    pub fn list_wallets(&self) -> Result<Vec<WalletRow>, AibtcError> {
        let mut rows = self.load_index()?;
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rows)
    }

    /// Generate a 24-word mnemonic, derive addresses, and persist a new
    /// wallet. The mnemonic is returned exactly once.
    pub fn create_wallet(&self, name: &str, password: &str, network: Network) -> Result<(WalletRow, String), AibtcError> {
        let mnemonic = hd::generate_mnemonic()?;
        let result = self.write_new_wallet(name, &mnemonic, password, network);
        log_wallet_event("create_wallet", name, result.is_ok(), result.as_ref().err().map(|e| e.to_string()).as_deref());
        let row = result?;
        Ok((row, mnemonic))
    }

    /// Import an existing mnemonic, refusing duplicates (same derived
    /// Stacks address on the same network).
    pub fn import_wallet(&self, name: &str, mnemonic: &str, password: &str, network: Network) -> Result<WalletRow, AibtcError> {
        hd::validate_mnemonic(mnemonic)?;
        let account = hd::derive_account(mnemonic, "", network)?;

        let existing = self.load_index()?;
        if existing.iter().any(|w| w.stx_address == account.stx_address && w.network == network) {
            return Err(AibtcError::validation("a wallet for this mnemonic and network already exists"));
        }

        let result = self.write_new_wallet(name, mnemonic, password, network);
        log_wallet_event("import_wallet", name, result.is_ok(), result.as_ref().err().map(|e| e.to_string()).as_deref());
        result
    }

    fn write_new_wallet(&self, name: &str, mnemonic: &str, password: &str, network: Network) -> Result<WalletRow, AibtcError> {
        let account = hd::derive_account(mnemonic, "", network)?;
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        let encrypted = EncryptedBlob::encrypt(mnemonic.as_bytes(), password, KdfParams::scrypt_default())?;
        let keystore = KeystoreFile { version: 1, encrypted, address_index: 0 };
        let bytes = serde_json::to_vec_pretty(&keystore)
            .map_err(|e| AibtcError::config(format!("failed to serialize keystore: {e}")))?;
        self.vault.write_atomic(&Self::keystore_path(&id), &bytes)?;

        let row = WalletRow {
            id,
            name: name.to_string(),
            network,
            stx_address: account.stx_address,
            btc_address: account.btc_address,
            taproot_address: account.taproot_address,
            sponsor_api_key: None,
            created_at: now,
            last_used: None,
        };

        let mut index = self.load_index()?;
        index.push(row.clone());
        self.save_index(&index)?;

        Ok(row)
    }

    /// Decrypt the keystore for `wallet_id` and return the derived
    /// account. Updates `last_used` on success. Does not install a
    /// session — see [`crate::wallet::session`].
    pub fn unlock(&self, wallet_id: &str, password: &str) -> Result<Account, AibtcError> {
        let row = self.find_row(wallet_id)?;
        let keystore = self.load_keystore(wallet_id)?;
        let mnemonic_bytes = keystore.encrypted.decrypt(password)?;
        let mnemonic =
            String::from_utf8(mnemonic_bytes).map_err(|e| AibtcError::internal(format!("keystore mnemonic is not valid UTF-8: {e}")))?;

        let account = hd::derive_account(&mnemonic, "", row.network)?;

        let mut index = self.load_index()?;
        if let Some(entry) = index.iter_mut().find(|w| w.id == wallet_id) {
            entry.last_used = Some(chrono::Utc::now().to_rfc3339());
        }
        self.save_index(&index)?;

        log_wallet_event("unlock", wallet_id, true, None);
        Ok(account)
    }

    pub fn export_mnemonic(&self, wallet_id: &str, password: &str, confirm: &str) -> Result<String, AibtcError> {
        if confirm != EXPORT_CONFIRM_TOKEN {
            return Err(AibtcError::validation(format!("export requires confirm == \"{EXPORT_CONFIRM_TOKEN}\"")));
        }
        let keystore = self.load_keystore(wallet_id)?;
        let mnemonic_bytes = keystore.encrypted.decrypt(password)?;
        String::from_utf8(mnemonic_bytes).map_err(|e| AibtcError::internal(format!("keystore mnemonic is not valid UTF-8: {e}")))
    }

    pub fn delete_wallet(&self, wallet_id: &str, password: &str, confirm: &str) -> Result<(), AibtcError> {
        if confirm != DELETE_CONFIRM_TOKEN {
            return Err(AibtcError::validation(format!("delete requires confirm == \"{DELETE_CONFIRM_TOKEN}\"")));
        }
        // Decrypt first: proof of password before any mutation.
        let keystore = self.load_keystore(wallet_id)?;
        keystore.encrypted.decrypt(password)?;

        self.vault.remove_dir(&format!("wallets/{wallet_id}"))?;

        let mut index = self.load_index()?;
        index.retain(|w| w.id != wallet_id);
        self.save_index(&index)?;

        let mut config = AppConfig::load(self.vault)?;
        if config.active_wallet_id.as_deref() == Some(wallet_id) {
            config.set_active_wallet(None);
            config.save(self.vault)?;
        }

        log_wallet_event("delete_wallet", wallet_id, true, None);
        Ok(())
    }

    /// Backup-verify-rollback rotation: copy to `.backup`, write the new
    /// keystore, re-decrypt it to verify, then delete the backup. On
    /// verify failure, restore from backup and fail.
    pub fn rotate_password(&self, wallet_id: &str, old_password: &str, new_password: &str) -> Result<(), AibtcError> {
        let keystore_path = Self::keystore_path(wallet_id);
        let backup_path = Self::backup_path(wallet_id);

        let keystore = self.load_keystore(wallet_id)?;
        let mnemonic_bytes = keystore.encrypted.decrypt(old_password)?;

        self.vault.copy(&keystore_path, &backup_path)?;

        let new_blob = EncryptedBlob::encrypt(&mnemonic_bytes, new_password, KdfParams::scrypt_default())?;
        let new_keystore = KeystoreFile { version: 1, encrypted: new_blob, address_index: keystore.address_index };
        let bytes = serde_json::to_vec_pretty(&new_keystore)
            .map_err(|e| AibtcError::config(format!("failed to serialize keystore: {e}")))?;
        self.vault.write_atomic(&keystore_path, &bytes)?;

        match self.load_keystore(wallet_id).and_then(|k| k.encrypted.decrypt(new_password)) {
            Ok(_) => {
                self.vault.remove(&backup_path)?;
                log_wallet_event("rotate_password", wallet_id, true, None);
                Ok(())
            }
            Err(e) => {
                let _ = self.vault.rename(&backup_path, &keystore_path);
                log_wallet_event("rotate_password", wallet_id, false, Some(&e.to_string()));
                Err(e)
            }
        }
    }

    /// Change the active wallet pointer in `config.json` and lock any
    /// existing session — the caller must unlock the new wallet explicitly.
    pub fn switch_wallet(&self, wallet_id: &str) -> Result<WalletRow, AibtcError> {
        let row = self.find_row(wallet_id)?;

        let mut config = AppConfig::load(self.vault)?;
        config.set_active_wallet(Some(row.id.clone()));
        config.save(self.vault)?;

        session::lock();
        log_wallet_event("switch_wallet", wallet_id, true, None);
        Ok(row)
    }

    fn find_row(&self, wallet_id: &str) -> Result<WalletRow, AibtcError> {
        self.load_index()?
            .into_iter()
            .find(|w| w.id == wallet_id)
            .ok_or_else(|| AibtcError::WalletNotFound(wallet_id.to_string()))
    }
}
