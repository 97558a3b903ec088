//! JSON Response Envelopes
//!
//! Every gateway operation answers with either a success or an error envelope.
//!
//! # Output Contract
//! - Success: `{"ok": true, ...payload fields}`
//!   - open: `{"ok": true, "connectionString": "<redacted>"}`
//!   - close / health: `{"ok": true}`
//!   - list: `{"ok": true, "items": [...]}`
//!   - query: `{"ok": true, "result": {"columns": [...], "rows": [[...]]}, "rowCount": n}`
//! - Error: `{"ok": false, "error": "<message>", "code": "<CODE>"}`
//!
//! Messages never carry secrets.

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};
use crate::normalize::TabularResult;

/// Success envelope; the payload's fields sit next to `ok`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessEnvelope<T> {
    /// Always true for success envelopes
    pub ok: bool,

    #[serde(flatten)]
    pub data: T,
}

impl<T> SuccessEnvelope<T> {
    pub fn new(data: T) -> Self {
        Self { ok: true, data }
    }
}

/// Error envelope for operation failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Always false for error envelopes
    pub ok: bool,

    /// Human-readable message (backend text passed through for execution errors)
    pub error: String,

    /// Stable error code (e.g. "EXECUTION_ERROR", "NO_ACTIVE_CONNECTION")
    pub code: String,
}

impl ErrorEnvelope {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self { ok: false, error: error.into(), code: code.into() }
    }

    /// Create error envelope from GatewayError
    pub fn from_error(err: &GatewayError) -> Self {
        Self::new(err.error_code(), err.message())
    }
}

/// Payload of a successful open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opened {
    /// Redacted form of the string now active for the session
    pub connection_string: String,
}

/// Payload-free acknowledgement (close, health)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledged {}

/// Payload of a catalog listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listed {
    pub items: Vec<String>,
}

/// Payload of a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Queried {
    pub result: TabularResult,
    pub row_count: usize,
}

impl From<TabularResult> for Queried {
    fn from(result: TabularResult) -> Self {
        let row_count = result.row_count();
        Self { result, row_count }
    }
}

/// Render an operation outcome as its envelope
pub fn envelope<T: Serialize>(outcome: Result<T>) -> serde_json::Result<serde_json::Value> {
    match outcome {
        Ok(data) => serde_json::to_value(SuccessEnvelope::new(data)),
        Err(err) => serde_json::to_value(ErrorEnvelope::from_error(&err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Cell;
    use serde_json::json;

    #[test]
    fn test_open_envelope_shape() {
        let value = envelope(Ok(Opened {
            connection_string: "Server=.;Password=***".to_string(),
        }))
        .unwrap();
        assert_eq!(value, json!({"ok": true, "connectionString": "Server=.;Password=***"}));
    }

    #[test]
    fn test_acknowledged_envelope_is_bare_ok() {
        let value = envelope(Ok(Acknowledged {})).unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[test]
    fn test_query_envelope_shape() {
        let result = TabularResult {
            columns: vec!["x".to_string()],
            rows: vec![vec![Cell::Integer(1)]],
        };
        let value = envelope(Ok(Queried::from(result))).unwrap();
        assert_eq!(
            value,
            json!({"ok": true, "result": {"columns": ["x"], "rows": [[1]]}, "rowCount": 1})
        );
    }

    #[test]
    fn test_error_envelope_from_gateway_error() {
        let value = envelope::<Listed>(Err(GatewayError::NoActiveConnection)).unwrap();
        assert_eq!(
            value,
            json!({"ok": false, "error": "No open connection.", "code": "NO_ACTIVE_CONNECTION"})
        );
    }

    #[test]
    fn test_error_envelope_ok_always_false() {
        let envelope = ErrorEnvelope::new("EXECUTION_ERROR", "Invalid object name 'nope'.");
        assert!(!envelope.ok);
    }
}
