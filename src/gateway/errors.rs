//! Error type shared by the Bitcoin and Stacks HTTP gateways.

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API returned {status_code}: {details}")]
    Api { status_code: u16, details: String },

    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl From<GatewayError> for crate::common::error::AibtcError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Api { status_code, details } => crate::common::error::AibtcError::api(details, Some(status_code)),
            GatewayError::Transport(err) => crate::common::error::AibtcError::api(err.to_string(), None),
            GatewayError::Parse(details) => crate::common::error::AibtcError::api(details, None),
        }
    }
}
