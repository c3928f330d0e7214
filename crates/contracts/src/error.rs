//! Layered error definitions
//!
//! Categorized by source: config / transport

use thiserror::Error;

/// Configuration and general error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Transport error surfaced by socket openers and sockets
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Connection refused or handshake failed
    #[error("failed to open '{url}': {message}")]
    OpenFailed { url: String, message: String },

    /// Transport closed while in use
    #[error("transport closed (code={code:?}): {reason}")]
    Closed { code: Option<u16>, reason: String },

    /// Socket-level error
    #[error("socket error: {message}")]
    Socket { message: String },
}

impl TransportError {
    /// Create open failure
    pub fn open_failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OpenFailed {
            url: url.into(),
            message: message.into(),
        }
    }
}
