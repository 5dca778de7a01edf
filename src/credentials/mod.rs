//! Credential Store
//!
//! Named secret CRUD over the filesystem vault. Each entry carries its own
//! salt and IV; the master password can't be proven correct without
//! decrypting at least one entry. Built on the crypto primitives and the
//! vault's atomic-write discipline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::common::error::AibtcError;
use crate::crypto::{EncryptedBlob, KdfParams};
use crate::vault::Vault;

const CREDENTIALS_PATH: &str = "credentials.json";
const MAX_VALUE_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CredentialEntry {
    id: String,
    label: Option<String>,
    category: Option<String>,
    #[serde(flatten)]
    blob: EncryptedBlob,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CredentialStoreFile {
    version: u32,
    credentials: BTreeMap<String, CredentialEntry>,
}

/// Metadata-only view of a credential row, returned by `list()` without
/// decrypting anything.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialRow {
    pub id: String,
    pub label: Option<String>,
    pub category: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct CredentialStore<'a> {
    vault: &'a Vault,
}

impl<'a> CredentialStore<'a> {
    pub fn new(vault: &'a Vault) -> Self {
        Self { vault }
    }

    fn load(&self) -> Result<CredentialStoreFile, AibtcError> {
        match self.vault.read(CREDENTIALS_PATH)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| AibtcError::config(format!("malformed credentials.json: {e}"))),
            None => Ok(CredentialStoreFile { version: 1, credentials: BTreeMap::new() }),
        }
    }

    fn save(&self, file: &CredentialStoreFile) -> Result<(), AibtcError> {
        let bytes = serde_json::to_vec_pretty(file)
            .map_err(|e| AibtcError::config(format!("failed to serialize credentials: {e}")))?;
        self.vault.write_atomic(CREDENTIALS_PATH, &bytes)
    }

    /// Normalize a raw id: lowercase, alphanumerics and hyphens only.
    pub fn normalize_id(raw: &str) -> Result<String, AibtcError> {
        let normalized: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();
        if normalized.is_empty() {
            return Err(AibtcError::validation("credential id must not be empty after normalization"));
        }
        Ok(normalized)
    }

    pub fn add(
        &self,
        id: &str,
        value: &str,
        password: &str,
        label: Option<String>,
        category: Option<String>,
    ) -> Result<(), AibtcError> {
        if value.len() > MAX_VALUE_BYTES {
            return Err(AibtcError::validation("credential value exceeds 64 KiB"));
        }
        let id = Self::normalize_id(id)?;
        let mut file = self.load()?;

        let now = chrono::Utc::now().to_rfc3339();
        let blob = EncryptedBlob::encrypt(value.as_bytes(), password, KdfParams::pbkdf2_default())?;

        let created_at = file.credentials.get(&id).map(|e| e.created_at.clone()).unwrap_or_else(|| now.clone());

        file.credentials.insert(
            id.clone(),
            CredentialEntry { id, label, category, blob, created_at, updated_at: now },
        );

        self.save(&file)
    }

    pub fn get(&self, id: &str, password: &str) -> Result<String, AibtcError> {
        let id = Self::normalize_id(id)?;
        let file = self.load()?;
        let entry = file
            .credentials
            .get(&id)
            .ok_or_else(|| AibtcError::WalletNotFound(format!("credential '{id}' not found")))?;

        let plaintext = entry.blob.decrypt(password)?;
        String::from_utf8(plaintext).map_err(|e| AibtcError::internal(format!("credential value is not valid UTF-8: {e}")))
    }

    pub fn list(&self) -> Result<Vec<CredentialRow>, AibtcError> {
        let file = self.load()?;
        let mut rows: Vec<CredentialRow> = file
            .credentials
            .values()
            .map(|e| CredentialRow {
                id: e.id.clone(),
                label: e.label.clone(),
                category: e.category.clone(),
                created_at: e.created_at.clone(),
                updated_at: e.updated_at.clone(),
            })
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rows)
    }

    pub fn delete(&self, id: &str, password: &str, confirm: &str) -> Result<(), AibtcError> {
        if confirm != "DELETE" {
            return Err(AibtcError::validation("delete requires confirm == \"DELETE\""));
        }
        let id = Self::normalize_id(id)?;
        let mut file = self.load()?;
        let entry = file
            .credentials
            .get(&id)
            .ok_or_else(|| AibtcError::WalletNotFound(format!("credential '{id}' not found")))?;

        // Decrypt first: proof of password before any mutation.
        entry.blob.decrypt(password)?;

        file.credentials.remove(&id);
        self.save(&file)
    }

    /// Atomically re-encrypt every entry under a new password. Nothing is
    /// written unless every entry decrypts successfully under `old`.
    pub fn rotate_password(&self, old: &str, new: &str) -> Result<(), AibtcError> {
        if new.len() < 8 {
            return Err(AibtcError::validation("new password must be at least 8 characters"));
        }
        let mut file = self.load()?;

        let mut decrypted: Vec<(String, Vec<u8>)> = Vec::with_capacity(file.credentials.len());
        for (id, entry) in file.credentials.iter() {
            let plaintext = entry.blob.decrypt(old)?;
            decrypted.push((id.clone(), plaintext));
        }

        for (id, plaintext) in decrypted {
            let entry = file.credentials.get_mut(&id).expect("id came from this same map");
            entry.blob = EncryptedBlob::encrypt(&plaintext, new, KdfParams::pbkdf2_default())?;
            entry.updated_at = chrono::Utc::now().to_rfc3339();
        }

        self.save(&file)
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
    fn add_then_get_round_trips() {
        let (_dir, vault) = test_vault();
        let store = CredentialStore::new(&vault);
        store.add("hiro-api-key", "sk_test_XYZ", "p@ss", Some("Hiro".into()), Some("api-key".into())).unwrap();
        assert_eq!(store.get("hiro-api-key", "p@ss").unwrap(), "sk_test_XYZ");
    }

    #[test]
    fn get_with_wrong_password_fails_auth() {
        let (_dir, vault) = test_vault();
        let store = CredentialStore::new(&vault);
        store.add("key", "value", "correct", None, None).unwrap();
        let err = store.get("key", "wrong").unwrap_err();
        assert_eq!(err.error_code(), "AUTH_FAILED");
    }

    #[test]
    fn get_missing_id_fails_not_found() {
        let (_dir, vault) = test_vault();
        let store = CredentialStore::new(&vault);
        let err = store.get("missing", "pw").unwrap_err();
        assert_eq!(err.error_code(), "WALLET_NOT_FOUND");
    }

    #[test]
    fn add_is_idempotent_and_preserves_created_at() {
        let (_dir, vault) = test_vault();
        let store = CredentialStore::new(&vault);
        store.add("id1", "v1", "pw", None, None).unwrap();
        let first = store.list().unwrap();
        let created_at = first[0].created_at.clone();

        store.add("id1", "v2", "pw", None, None).unwrap();
        let second = store.list().unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].created_at, created_at);
        assert_eq!(store.get("id1", "pw").unwrap(), "v2");
    }

    #[test]
    fn delete_requires_confirm_token() {
        let (_dir, vault) = test_vault();
        let store = CredentialStore::new(&vault);
        store.add("id1", "v1", "pw", None, None).unwrap();
        assert!(store.delete("id1", "pw", "NOPE").is_err());
        store.delete("id1", "pw", "DELETE").unwrap();
        assert!(store.get("id1", "pw").is_err());
    }

    #[test]
    fn rotate_password_reencrypts_all_entries() {
        let (_dir, vault) = test_vault();
        let store = CredentialStore::new(&vault);
        store.add("a", "va", "old", None, None).unwrap();
        store.add("b", "vb", "old", None, None).unwrap();

        store.rotate_password("old", "newpassword").unwrap();

        assert_eq!(store.get("a", "newpassword").unwrap(), "va");
        assert_eq!(store.get("b", "newpassword").unwrap(), "vb");
        assert!(store.get("a", "old").is_err());
    }

    #[test]
    fn rotate_password_aborts_on_wrong_old_password_without_writing() {
        let (_dir, vault) = test_vault();
        let store = CredentialStore::new(&vault);
        store.add("a", "va", "old", None, None).unwrap();

        assert!(store.rotate_password("wrong-old", "newpassword").is_err());
        // Original password still works: nothing was written.
        assert_eq!(store.get("a", "old").unwrap(), "va");
    }

    #[test]
    fn list_is_sorted_by_created_at() {
        let (_dir, vault) = test_vault();
        let store = CredentialStore::new(&vault);
        store.add("z", "1", "pw", None, None).unwrap();
        store.add("a", "2", "pw", None, None).unwrap();
        let rows = store.list().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].created_at <= rows[1].created_at);
    }
}
