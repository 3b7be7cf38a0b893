//! Error types for the gate-key client

use thiserror::Error;

/// Gate-key client error
#[derive(Debug, Error)]
pub enum GateKeyError {
    /// Missing or invalid identity, endpoints, or community context
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Required operation argument empty or out of range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed compact time string
    #[error("Format error: {0}")]
    Format(String),

    /// Server answered with a non-200 HTTP status
    #[error("Transport error {status}: {body}")]
    Transport { status: u16, body: String },

    /// HTTP request failed before a reply was received
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Reply-level status or info reported a failure
    #[error("Server error: {0}")]
    Server(String),

    /// Expected payload field missing from an otherwise successful reply
    #[error("Unexpected response: missing {0}")]
    UnexpectedResponse(String),

    /// Link public key invalid or plaintext not encryptable
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GateKeyError {
    /// True for failures of the HTTP exchange itself, with or without a status
    pub fn is_transport(&self) -> bool {
        matches!(self, GateKeyError::Transport { .. } | GateKeyError::Http(_))
    }
}

impl From<rsa::Error> for GateKeyError {
    fn from(e: rsa::Error) -> Self {
        GateKeyError::Encryption(e.to_string())
    }
}

/// Result type for gate-key operations
pub type Result<T> = std::result::Result<T, GateKeyError>;
