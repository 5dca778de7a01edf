//! Filesystem Vault
//!
//! Durable, atomic, permission-restricted storage under `$HOME/.aibtc/`.
//! Every write goes through a temp-file-then-rename so a crash mid-write
//! never leaves a torn file behind. The vault does not provide
//! inter-process locking: concurrent processes may race on writes
//! (last-writer-wins), per the external-interfaces contract.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::common::error::AibtcError;
use crate::common::logging::{EventCategory, LogEvent, LogLevel};

const FILE_MODE: u32 = 0o600;
const DIR_MODE: u32 = 0o700;

/// Root of the vault on disk, with the legacy-directory migration already
/// applied by the time callers get one.
#[derive(Debug, Clone)]
pub struct Vault {
    root: PathBuf,
}

impl Vault {
    /// Open the vault rooted at `$HOME/.aibtc`, migrating `$HOME/.stx402`
    /// into it if the new directory doesn't exist yet.
    pub fn open() -> Result<Self, AibtcError> {
        let home = dirs_home()?;
        Self::open_at(home.join(".aibtc"), home.join(".stx402"))
    }

    /// Open a vault at an explicit root, with an explicit legacy path to
    /// migrate from. Exposed for tests so they don't touch the real home
    /// directory.
    pub fn open_at(root: PathBuf, legacy_root: PathBuf) -> Result<Self, AibtcError> {
        if !root.exists() && legacy_root.exists() {
            fs::rename(&legacy_root, &root).map_err(AibtcError::Io)?;
            tracing::info!(
                target: "aibtc::vault",
                "{}",
                LogEvent::new(LogLevel::Info, EventCategory::System, "migrated legacy vault directory")
                    .with_data(serde_json::json!({ "from": legacy_root.display().to_string(), "to": root.display().to_string() }))
                    .to_json()
            );
        }

        if !root.exists() {
            mkdir_secure(&root)?;
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Read a file relative to the vault root. Returns `Ok(None)` if it
    /// doesn't exist (callers treat this as "empty state").
    pub fn read(&self, relative: &str) -> Result<Option<Vec<u8>>, AibtcError> {
        let path = self.resolve(relative);
        tracing::debug!(target: "aibtc::vault", relative, "vault read");
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AibtcError::Io(e)),
        }
    }

    /// Atomically write `bytes` to `relative`, mode 0o600: write to a
    /// sibling temp file, then rename over the target.
    pub fn write_atomic(&self, relative: &str, bytes: &[u8]) -> Result<(), AibtcError> {
        let path = self.resolve(relative);
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                mkdir_secure(parent)?;
            }
        }

        let tmp_path = tmp_sibling(&path);
        fs::write(&tmp_path, bytes).map_err(AibtcError::Io)?;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(FILE_MODE)).map_err(AibtcError::Io)?;
        fs::rename(&tmp_path, &path).map_err(AibtcError::Io)?;

        tracing::debug!(target: "aibtc::vault", relative, bytes = bytes.len(), "vault write");
        Ok(())
    }

    /// Create a directory (and parents) under the vault root with mode
    /// 0o700.
    pub fn mkdir_secure(&self, relative: &str) -> Result<(), AibtcError> {
        mkdir_secure(&self.resolve(relative))
    }

    pub fn rename(&self, src: &str, dst: &str) -> Result<(), AibtcError> {
        fs::rename(self.resolve(src), self.resolve(dst)).map_err(AibtcError::Io)
    }

    pub fn remove(&self, relative: &str) -> Result<(), AibtcError> {
        let path = self.resolve(relative);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AibtcError::Io(e)),
        }
    }

    pub fn remove_dir(&self, relative: &str) -> Result<(), AibtcError> {
        let path = self.resolve(relative);
        match fs::remove_dir_all(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AibtcError::Io(e)),
        }
    }

    pub fn copy(&self, src: &str, dst: &str) -> Result<(), AibtcError> {
        let bytes = self
            .read(src)?
            .ok_or_else(|| AibtcError::config(format!("copy source missing: {src}")))?;
        self.write_atomic(dst, &bytes)
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.resolve(relative).exists()
    }
}

fn mkdir_secure(path: &Path) -> Result<(), AibtcError> {
    fs::create_dir_all(path).map_err(AibtcError::Io)?;
    fs::set_permissions(path, fs::Permissions::from_mode(DIR_MODE)).map_err(AibtcError::Io)?;
    Ok(())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("tmp");
    let unique = uuid::Uuid::new_v4();
    path.with_file_name(format!(".{file_name}.{unique}.tmp"))
}

fn dirs_home() -> Result<PathBuf, AibtcError> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| AibtcError::config("HOME environment variable is not set"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_vault() -> (tempfile::TempDir, Vault) {
        let dir = tempdir().unwrap();
        let root = dir.path().join(".aibtc");
        let legacy = dir.path().join(".stx402");
        let vault = Vault::open_at(root, legacy).unwrap();
        (dir, vault)
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_dir, vault) = test_vault();
        vault.write_atomic("config.json", b"{\"version\":1}").unwrap();
        let bytes = vault.read("config.json").unwrap().unwrap();
        assert_eq!(bytes, b"{\"version\":1}");
    }

    #[test]
    fn missing_read_returns_none() {
        let (_dir, vault) = test_vault();
        assert!(vault.read("nope.json").unwrap().is_none());
    }

    #[test]
    fn write_sets_file_mode_0600() {
        let (_dir, vault) = test_vault();
        vault.write_atomic("wallets.json", b"[]").unwrap();
        let meta = fs::metadata(vault.root().join("wallets.json")).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, FILE_MODE);
    }

    #[test]
    fn root_dir_has_mode_0700() {
        let (_dir, vault) = test_vault();
        let meta = fs::metadata(vault.root()).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, DIR_MODE);
    }

    #[test]
    fn nested_write_creates_parent_dir() {
        let (_dir, vault) = test_vault();
        vault
            .write_atomic("wallets/abc-123/keystore.json", b"{}")
            .unwrap();
        assert!(vault.exists("wallets/abc-123/keystore.json"));
    }

    #[test]
    fn legacy_directory_is_migrated_once() {
        let dir = tempdir().unwrap();
        let legacy = dir.path().join(".stx402");
        fs::create_dir_all(&legacy).unwrap();
        fs::write(legacy.join("wallets.json"), b"[]").unwrap();

        let root = dir.path().join(".aibtc");
        let vault = Vault::open_at(root.clone(), legacy.clone()).unwrap();
        assert!(!legacy.exists());
        assert!(vault.exists("wallets.json"));
    }

    #[test]
    fn copy_duplicates_content() {
        let (_dir, vault) = test_vault();
        vault.write_atomic("keystore.json", b"secret-bytes").unwrap();
        vault.copy("keystore.json", "keystore.json.backup").unwrap();
        assert_eq!(vault.read("keystore.json.backup").unwrap().unwrap(), b"secret-bytes");
    }
}
