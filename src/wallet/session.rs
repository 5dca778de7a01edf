//! Session Manager
//!
//! A process-wide singleton holding the unlocked account in memory. This
//! is the one genuinely process-global piece of state in the core — every
//! other component is plain dependency injection. Guarded by a mutex per
//! the concurrency model; expiry is checked lazily on every access so
//! there's no race between a background timer and a live call.

use std::sync::Mutex;

use once_cell::sync::Lazy;
use zeroize::Zeroizing;

use crate::common::error::AibtcError;
use crate::common::logging::log_security_event;
use crate::env::Network;
use crate::wallet::hd::Account;
use crate::wallet::keystore::KeystoreManager;

/// The unlocked account, held only in memory, with key material wrapped
/// so it's scrubbed on drop.
pub struct Session {
    pub wallet_id: String,
    pub network: Network,

    pub stx_address: String,
    pub stx_private_key: Zeroizing<[u8; 33]>,

    pub btc_address: String,
    pub btc_private_key: Zeroizing<[u8; 32]>,
    pub btc_public_key: [u8; 33],

    pub taproot_address: String,
    pub taproot_private_key: Zeroizing<[u8; 32]>,
    pub taproot_internal_pubkey: [u8; 32],

    expires_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Set when constructed from `CLIENT_MNEMONIC` rather than a real
    /// unlocked keystore; write paths must reject ephemeral sessions.
    pub ephemeral: bool,
}

impl Session {
    fn from_account(wallet_id: String, account: Account, ttl_minutes: u32, ephemeral: bool) -> Self {
        let expires_at = if ttl_minutes == 0 {
            None
        } else {
            Some(chrono::Utc::now() + chrono::Duration::minutes(ttl_minutes as i64))
        };

        Self {
            wallet_id,
            network: account.network,
            stx_address: account.stx_address,
            stx_private_key: Zeroizing::new(account.stx_private_key),
            btc_address: account.btc_address,
            btc_private_key: Zeroizing::new(account.btc_private_key),
            btc_public_key: account.btc_public_key,
            taproot_address: account.taproot_address,
            taproot_private_key: Zeroizing::new(account.taproot_private_key),
            taproot_internal_pubkey: account.taproot_internal_pubkey,
            expires_at,
            ephemeral,
        }
    }

    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => chrono::Utc::now() >= at,
            None => false,
        }
    }
}

static SESSION: Lazy<Mutex<Option<Session>>> = Lazy::new(|| Mutex::new(None));

/// Unlock `wallet_id` with `password` via the keystore, installing a new
/// in-memory session that replaces any existing one.
pub fn unlock_from_keystore(
    keystore: &KeystoreManager,
    wallet_id: &str,
    password: &str,
    ttl_minutes: u32,
) -> Result<(), AibtcError> {
    let account = keystore.unlock(wallet_id, password)?;
    let session = Session::from_account(wallet_id.to_string(), account, ttl_minutes, false);

    let mut guard = SESSION.lock().expect("session mutex poisoned");
    *guard = Some(session);
    log_security_event("unlock", true, serde_json::json!({ "wallet_id": wallet_id }), None);
    Ok(())
}

/// Build a read-only, non-expiring session directly from `CLIENT_MNEMONIC`
/// without touching the keystore. Write paths must still require a real
/// unlocked session — see [`Session::ephemeral`].
pub fn from_env_mnemonic(mnemonic: &str, network: Network) -> Result<(), AibtcError> {
    let account = crate::wallet::hd::derive_account(mnemonic, "", network)?;
    let session = Session::from_account("<env>".to_string(), account, 0, true);

    let mut guard = SESSION.lock().expect("session mutex poisoned");
    *guard = Some(session);
    Ok(())
}

pub fn is_unlocked() -> bool {
    let mut guard = SESSION.lock().expect("session mutex poisoned");
    expire_if_needed(&mut guard);
    guard.is_some()
}

/// Run `f` with a reference to the live session, locking lazily if it has
/// expired. Returns `WalletLocked` if there is no live session.
pub fn with_session<T>(f: impl FnOnce(&Session) -> Result<T, AibtcError>) -> Result<T, AibtcError> {
    let mut guard = SESSION.lock().expect("session mutex poisoned");
    expire_if_needed(&mut guard);
    match guard.as_ref() {
        Some(session) => f(session),
        None => Err(AibtcError::WalletLocked),
    }
}

fn expire_if_needed(guard: &mut Option<Session>) {
    if let Some(session) = guard.as_ref() {
        if session.is_expired() {
            *guard = None;
            log_security_event("auto_lock_expired", true, serde_json::json!({}), None);
        }
    }
}

/// Zeroize and drop the session (the `Zeroizing` wrappers scrub on drop).
pub fn lock() {
    let mut guard = SESSION.lock().expect("session mutex poisoned");
    let had_session = guard.is_some();
    *guard = None;
    if had_session {
        log_security_event("lock", true, serde_json::json!({}), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::Vault;
    use tempfile::tempdir;

    fn test_vault() -> (tempfile::TempDir, Vault) {
        let dir = tempdir().unwrap();
        let vault = Vault::open_at(dir.path().join(".aibtc"), dir.path().join(".stx402")).unwrap();
        (dir, vault)
    }

    // Session is process-global; serialize these tests by running them
    // sequentially through a single lock acquisition pattern is not
    // possible with #[test]'s default parallelism, so each test locks
    // explicitly at the start and end to avoid bleeding state.

    #[test]
    fn unlock_then_lock_round_trip() {
        let (_dir, vault) = test_vault();
        let mgr = KeystoreManager::new(&vault);
        let (row, _mnemonic) = mgr.create_wallet("main", "pw", Network::Testnet).unwrap();

        unlock_from_keystore(&mgr, &row.id, "pw", 15).unwrap();
        assert!(is_unlocked());

        with_session(|s| {
            assert_eq!(s.wallet_id, row.id);
            assert!(!s.ephemeral);
            Ok(())
        })
        .unwrap();

        lock();
        assert!(!is_unlocked());
    }

    #[test]
    fn with_session_fails_when_locked() {
        lock();
        let err = with_session(|_| Ok(())).unwrap_err();
        assert_eq!(err.error_code(), "WALLET_LOCKED");
    }

    #[test]
    fn ttl_zero_means_no_expiry() {
        let (_dir, vault) = test_vault();
        let mgr = KeystoreManager::new(&vault);
        let (row, _mnemonic) = mgr.create_wallet("main", "pw", Network::Testnet).unwrap();

        unlock_from_keystore(&mgr, &row.id, "pw", 0).unwrap();
        assert!(is_unlocked());
        lock();
    }

    #[test]
    fn env_mnemonic_session_is_ephemeral() {
        let mnemonic = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
        from_env_mnemonic(mnemonic, Network::Testnet).unwrap();
        with_session(|s| {
            assert!(s.ephemeral);
            Ok(())
        })
        .unwrap();
        lock();
    }
}
