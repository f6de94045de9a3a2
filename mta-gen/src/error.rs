//! Error type for outbound integrations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GenError>;

#[derive(Debug, Error)]
pub enum GenError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    /// Upstream returned a well-formed draft that fails validation
    #[error("Invalid draft: {0}")]
    InvalidDraft(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for GenError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            GenError::Parse(e.to_string())
        } else {
            GenError::Network(e.to_string())
        }
    }
}
