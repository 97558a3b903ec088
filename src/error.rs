//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout sqlgate.
//! All errors are structured and map to specific error codes for JSON output.
//!
//! # Error Categories
//! - `Connectivity`: the backend could not be reached or refused the login
//! - `NoActiveConnection`: an execute/list call on a session that is not open
//! - `Execution`: the backend rejected the SQL text
//! - `MalformedConnectionString`: a connection string could not be parsed
//! - `MissingField` / `WrongType`: an inbound request failed validation
//! - `MalformedJson`: an inbound request line was not JSON at all
//! - `Config`: configuration or profile store errors

use thiserror::Error;

/// Main error type for gateway operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Backend unreachable, login failed, or the driver could not be configured
    #[error("{0}")]
    Connectivity(String),

    /// Execute/list attempted while the session is disconnected
    #[error("No open connection.")]
    NoActiveConnection,

    /// Backend rejected the SQL (syntax, permissions, runtime error)
    #[error("{0}")]
    Execution(String),

    /// Connection string parse failure
    #[error("Malformed connection string: {0}")]
    MalformedConnectionString(String),

    /// Required request field absent
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Request field present with the wrong JSON type
    #[error("Field '{field}' must be {expected}")]
    WrongType { field: String, expected: &'static str },

    /// Request line is not valid JSON
    #[error("Malformed request: {0}")]
    MalformedJson(String),

    /// Configuration error (file unreadable, invalid JSON, etc.)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Convert error to error code string for JSON output
    ///
    /// Error codes are stable and suitable for programmatic handling by clients.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Connectivity(_) => "CONNECTIVITY_ERROR",
            Self::NoActiveConnection => "NO_ACTIVE_CONNECTION",
            Self::Execution(_) => "EXECUTION_ERROR",
            Self::MalformedConnectionString(_) => "MALFORMED_CONNECTION_STRING",
            Self::MissingField(_) => "MISSING_FIELD",
            Self::WrongType { .. } => "WRONG_TYPE",
            Self::MalformedJson(_) => "MALFORMED_JSON",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Get human-readable error message
    ///
    /// Backend messages are passed through verbatim. Nothing here ever
    /// carries a password: connection strings are never formatted into errors.
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Create a connectivity error
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::Connectivity(message.into())
    }

    /// Create an execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Create a malformed connection string error
    pub fn malformed_connection_string(message: impl Into<String>) -> Self {
        Self::MalformedConnectionString(message.into())
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }

    /// Create a wrong type error
    pub fn wrong_type(field: impl Into<String>, expected: &'static str) -> Self {
        Self::WrongType { field: field.into(), expected }
    }

    /// Create a malformed JSON error
    pub fn malformed_json(message: impl Into<String>) -> Self {
        Self::MalformedJson(message.into())
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
