//! Common Error Types for aibtc-core
//!
//! Provides unified error handling across all modules.

use thiserror::Error;

/// Root error type for the aibtc core.
#[derive(Debug, Error)]
pub enum AibtcError {
    /// Malformed on-disk file or contradictory input.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("wallet not found: {0}")]
    WalletNotFound(String),

    #[error("invalid password")]
    InvalidPassword,

    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("wallet is locked")]
    WalletLocked,

    #[error("insufficient {token_type} balance: have {balance}, need {required} (short {shortfall})")]
    InsufficientBalance {
        token_type: String,
        balance: u64,
        required: u64,
        shortfall: u64,
    },

    #[error("transaction error at {stage}{}", txid.as_ref().map(|t| format!(" (txid {t})")).unwrap_or_default())]
    Transaction { txid: Option<String>, stage: String },

    #[error("contract error{}: {cause}", contract_id.as_ref().map(|c| format!(" in {c}")).unwrap_or_default())]
    Contract { contract_id: Option<String>, cause: String },

    #[error("API error{}: {details}", status_code.map(|c| format!(" ({c})")).unwrap_or_default())]
    Api { status_code: Option<u16>, details: String },

    /// GCM tag mismatch during decrypt.
    #[error("authentication failed")]
    AuthFailed,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AibtcError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn transaction(stage: impl Into<String>, txid: Option<String>) -> Self {
        Self::Transaction { txid, stage: stage.into() }
    }

    pub fn contract(cause: impl Into<String>, contract_id: Option<String>) -> Self {
        Self::Contract { contract_id, cause: cause.into() }
    }

    pub fn api(details: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::Api { status_code, details: details.into() }
    }

    /// A short, closed error code suitable for machine consumption.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::WalletNotFound(_) => "WALLET_NOT_FOUND",
            Self::InvalidPassword => "INVALID_PASSWORD",
            Self::InvalidMnemonic(_) => "INVALID_MNEMONIC",
            Self::WalletLocked => "WALLET_LOCKED",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::Transaction { .. } => "TRANSACTION_ERROR",
            Self::Contract { .. } => "CONTRACT_ERROR",
            Self::Api { .. } => "API_ERROR",
            Self::AuthFailed => "AUTH_FAILED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// A short human-facing suggestion, rendered alongside the error.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::WalletLocked => "Unlock the wallet first",
            Self::InvalidPassword | Self::AuthFailed => "Check the password and try again",
            Self::InvalidMnemonic(_) => "Verify the 12/24-word mnemonic and its checksum",
            Self::WalletNotFound(_) => "Run list-wallets to see available wallet ids",
            Self::InsufficientBalance { .. } => "Fund the address or lower the amount",
            Self::Api { .. } => "The upstream API may be rate-limited or down; retry later",
            _ => "See error details",
        }
    }

    /// Redact sensitive values from a message before it reaches logs or users.
    ///
    /// Replaces the value following any `password|mnemonic|secret|privateKey`
    /// key-like token with `[REDACTED]`. Case-insensitive, tolerant of `_`/`-`
    /// separators (`private_key`, `private-key`).
    pub fn redact(message: &str) -> String {
        redact_sensitive(message)
    }

    /// Render as the structured JSON shape CLIs emit on exit code 1.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": Self::redact(&self.to_string()),
            "code": self.error_code(),
            "suggestion": self.suggestion(),
        })
    }
}

const SENSITIVE_KEYS: &[&str] = &["password", "mnemonic", "secret", "privatekey"];

fn redact_sensitive(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let lower = message.to_lowercase();
    let mut cursor = 0usize;
    while cursor < message.len() {
        let rest = &lower[cursor..];
        let hit = SENSITIVE_KEYS
            .iter()
            .filter_map(|k| rest.find(k).map(|i| (i, k.len())))
            .min_by_key(|(i, _)| *i);
        match hit {
            Some((offset, klen)) => {
                let key_start = cursor + offset;
                let key_end = key_start + klen;
                out.push_str(&message[cursor..key_end]);
                let mut i = key_end;
                let bytes = message.as_bytes();
                while i < bytes.len() && matches!(bytes[i], b':' | b'=' | b' ' | b'_' | b'-') {
                    out.push(bytes[i] as char);
                    i += 1;
                }
                let value_start = i;
                while i < bytes.len() && !matches!(bytes[i], b',' | b'\n' | b'}' | b')') {
                    i += 1;
                }
                if i > value_start {
                    out.push_str("[REDACTED]");
                }
                cursor = i;
            }
            None => {
                out.push_str(&message[cursor..]);
                break;
            }
        }
    }
    out
}

/// Result type alias using AibtcError.
pub type Result<T> = std::result::Result<T, AibtcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_creation() {
        let err = AibtcError::config("bad network value");
        assert!(err.to_string().contains("bad network value"));
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn redacts_sensitive_fields() {
        let msg = "failed to unlock: password=hunter2!! for wallet";
        let redacted = AibtcError::redact(msg);
        assert!(redacted.contains("[REDACTED]"));
        assert!(!redacted.contains("hunter2"));
    }

    #[test]
    fn redacts_mnemonic() {
        let msg = "mnemonic: board list obtain sugar hour";
        let redacted = AibtcError::redact(msg);
        assert!(redacted.contains("[REDACTED]"));
        assert!(!redacted.contains("board"));
    }

    #[test]
    fn suggestion_present_for_locked_wallet() {
        assert_eq!(AibtcError::WalletLocked.suggestion(), "Unlock the wallet first");
    }
}
