//! Structured Logging for aibtc-core
//!
//! Provides production-ready structured logging with:
//! - JSON output for log aggregation services (ELK, Datadog, etc.)
//! - Correlation IDs for request tracing
//! - Security event logging with automatic secret redaction
//!
//! # Usage
//!
//! ```rust
//! use aibtc_core::common::logging::{init_logging, LogLevel};
//!
//! init_logging(LogLevel::Info, true).unwrap(); // JSON mode for production
//! ```

use serde::Serialize;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use super::error::AibtcError;

/// Application log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

/// Event categories for structured logging.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Wallet lifecycle: create, import, unlock, lock, rotate.
    Wallet,
    /// Signature operations (BIP-137, SIP-018, Stacks, Schnorr).
    Signing,
    /// Bitcoin/Stacks transaction build, sign, broadcast.
    Transaction,
    /// Auth failures, password checks, lock-state changes.
    Security,
    /// Outbound HTTP calls to Hiro / mempool.space / x402 endpoints.
    Api,
    /// System lifecycle (startup, vault migration).
    System,
    /// Error events.
    Error,
}

/// Structured log event.
#[derive(Debug, Serialize)]
pub struct LogEvent {
    pub timestamp: String,
    pub level: String,
    pub category: EventCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl LogEvent {
    pub fn new(level: LogLevel, category: EventCategory, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: format!("{:?}", level).to_uppercase(),
            category,
            message: AibtcError::redact(&message.into()),
            correlation_id: None,
            data: None,
            duration_ms: None,
            error: None,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.error = Some(ErrorDetails {
            code: code.into(),
            message: AibtcError::redact(&message.into()),
        });
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| format!("{{\"error\": \"failed to serialize log\", \"message\": \"{}\"}}", self.message))
    }
}

/// Log a security-relevant event (unlock attempt, password rotation, etc).
pub fn log_security_event(event_type: &str, success: bool, details: serde_json::Value, correlation_id: Option<&str>) {
    let level = if success { LogLevel::Info } else { LogLevel::Warn };
    let mut event = LogEvent::new(level, EventCategory::Security, event_type)
        .with_data(serde_json::json!({ "success": success, "details": details }));
    if let Some(id) = correlation_id {
        event = event.with_correlation_id(id);
    }
    if success {
        tracing::info!(target: "aibtc::security", "{}", event.to_json());
    } else {
        tracing::warn!(target: "aibtc::security", "{}", event.to_json());
    }
}

/// Log a wallet lifecycle event (create, import, unlock, lock, rotate, delete).
pub fn log_wallet_event(event_type: &str, wallet_id: &str, success: bool, error: Option<&str>) {
    let level = if success { LogLevel::Info } else { LogLevel::Error };
    let mut event = LogEvent::new(level, EventCategory::Wallet, event_type)
        .with_correlation_id(wallet_id)
        .with_data(serde_json::json!({ "wallet_id": wallet_id, "success": success }));
    if let Some(err) = error {
        event = event.with_error("WALLET_ERROR", err);
    }
    if success {
        tracing::info!(target: "aibtc::wallet", "{}", event.to_json());
    } else {
        tracing::error!(target: "aibtc::wallet", "{}", event.to_json());
    }
}

/// Log a transaction build/sign/broadcast event.
pub fn log_transaction_event(event_type: &str, txid: Option<&str>, chain: &str, success: bool, error: Option<&str>) {
    let level = if success { LogLevel::Info } else { LogLevel::Error };
    let mut event = LogEvent::new(level, EventCategory::Transaction, event_type)
        .with_data(serde_json::json!({ "txid": txid, "chain": chain, "success": success }));
    if let Some(txid) = txid {
        event = event.with_correlation_id(txid);
    }
    if let Some(err) = error {
        event = event.with_error("TRANSACTION_ERROR", err);
    }
    if success {
        tracing::info!(target: "aibtc::transaction", "{}", event.to_json());
    } else {
        tracing::error!(target: "aibtc::transaction", "{}", event.to_json());
    }
}

/// Log an outbound API call.
pub fn log_api_call(method: &str, url: &str, status: Option<u16>, duration_ms: u64, correlation_id: &str) {
    let level = match status {
        Some(s) if s >= 500 => LogLevel::Error,
        Some(s) if s >= 400 => LogLevel::Warn,
        _ => LogLevel::Info,
    };
    let event = LogEvent::new(level, EventCategory::Api, format!("{method} {url} -> {status:?}"))
        .with_correlation_id(correlation_id)
        .with_duration(duration_ms)
        .with_data(serde_json::json!({ "method": method, "url": url, "status": status }));

    match level {
        LogLevel::Error => tracing::error!(target: "aibtc::api", "{}", event.to_json()),
        LogLevel::Warn => tracing::warn!(target: "aibtc::api", "{}", event.to_json()),
        _ => tracing::info!(target: "aibtc::api", "{}", event.to_json()),
    }
}

/// Initialize the global tracing subscriber.
///
/// `json_format = true` is meant for production (mainnet) use; pretty
/// printing is for local development.
pub fn init_logging(level: LogLevel, json_format: bool) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("aibtc_core={0},reqwest={0}", format!("{:?}", level).to_lowercase()))
    });

    let registry = tracing_subscriber::registry().with(filter);

    if json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    } else {
        registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    }

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize logging: {0}")]
    InitFailed(String),
}

/// Generate a unique correlation ID for request tracing.
pub fn generate_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_event_serializes_and_redacts() {
        let event = LogEvent::new(LogLevel::Info, EventCategory::Wallet, "unlock failed: password=hunter2")
            .with_correlation_id("wallet-123")
            .with_duration(42);

        let json = event.to_json();
        assert!(json.contains("wallet-123"));
        assert!(json.contains("42"));
        assert!(json.contains("[REDACTED]"));
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn log_level_parsing() {
        assert_eq!(LogLevel::from("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::from("INFO"), LogLevel::Info);
        assert_eq!(LogLevel::from("warning"), LogLevel::Warn);
        assert_eq!(LogLevel::from("unknown"), LogLevel::Info);
    }

    #[test]
    fn correlation_ids_are_unique() {
        let a = generate_correlation_id();
        let b = generate_correlation_id();
        assert_ne!(a, b);
    }
}
