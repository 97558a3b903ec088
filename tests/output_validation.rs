//! Output Validation Tests
//!
//! Validates the JSON envelopes clients see:
//! - Success envelopes carry `ok: true` plus the payload fields, nothing else
//! - Error envelopes carry exactly `ok`, `error`, `code`
//! - Cells serialize as bare JSON scalars
//!
//! Uses `insta` inline snapshots to detect unintended output changes.

use sqlgate::output::{Acknowledged, Listed, Opened, Queried};
use sqlgate::{Cell, ErrorEnvelope, GatewayError, SuccessEnvelope, TabularResult};

// ============================================================================
// Envelope Structure Tests
// ============================================================================

#[test]
fn test_error_envelope_structure() {
    let envelope = ErrorEnvelope::from_error(&GatewayError::execution("Incorrect syntax near 'FROM'."));
    let json_value = serde_json::to_value(&envelope).expect("Should serialize");

    let keys: Vec<&str> = json_value.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys.len(), 3, "Should have exactly 3 top-level fields");
    assert!(keys.contains(&"ok"));
    assert!(keys.contains(&"error"));
    assert!(keys.contains(&"code"));
    assert_eq!(json_value["ok"], false);
}

#[test]
fn test_every_error_code_is_screaming_snake_case() {
    let errors = [
        GatewayError::connectivity("x"),
        GatewayError::NoActiveConnection,
        GatewayError::execution("x"),
        GatewayError::malformed_connection_string("x"),
        GatewayError::missing_field("sql"),
        GatewayError::wrong_type("sql", "a string"),
        GatewayError::malformed_json("x"),
        GatewayError::config_error("x"),
    ];
    for err in errors {
        let code = ErrorEnvelope::from_error(&err).code;
        assert!(
            code.chars().all(|c| c.is_ascii_uppercase() || c == '_'),
            "unexpected code format: {code}"
        );
    }
}

#[test]
fn test_success_envelope_has_no_wrapper_object() {
    let json_value =
        serde_json::to_value(SuccessEnvelope::new(Listed { items: vec!["a".into()] })).unwrap();
    assert!(json_value.get("data").is_none());
    assert_eq!(json_value["items"][0], "a");
}

// ============================================================================
// Snapshot Tests (using insta)
// ============================================================================

#[test]
fn test_snapshot_open() {
    let envelope = SuccessEnvelope::new(Opened {
        connection_string: "Server=db01;Database=sales;User ID=app;Password=***".to_string(),
    });
    let json_str = serde_json::to_string(&envelope).unwrap();
    insta::assert_snapshot!(json_str, @r#"{"ok":true,"connectionString":"Server=db01;Database=sales;User ID=app;Password=***"}"#);
}

#[test]
fn test_snapshot_close() {
    let json_str = serde_json::to_string(&SuccessEnvelope::new(Acknowledged {})).unwrap();
    insta::assert_snapshot!(json_str, @r#"{"ok":true}"#);
}

#[test]
fn test_snapshot_query() {
    let result = TabularResult {
        columns: vec!["id".into(), "name".into(), "active".into(), "score".into(), "note".into()],
        rows: vec![
            vec![
                Cell::Integer(1),
                Cell::String("Ada".into()),
                Cell::Boolean(true),
                Cell::Float(9.5),
                Cell::Null,
            ],
            vec![
                Cell::Integer(2),
                Cell::String("Grace".into()),
                Cell::Boolean(false),
                Cell::Float(7.25),
                Cell::String("n/a".into()),
            ],
        ],
    };
    let json_str = serde_json::to_string(&SuccessEnvelope::new(Queried::from(result))).unwrap();
    insta::assert_snapshot!(json_str, @r#"{"ok":true,"result":{"columns":["id","name","active","score","note"],"rows":[[1,"Ada",true,9.5,null],[2,"Grace",false,7.25,"n/a"]]},"rowCount":2}"#);
}

#[test]
fn test_snapshot_error() {
    let json_str =
        serde_json::to_string(&ErrorEnvelope::from_error(&GatewayError::NoActiveConnection)).unwrap();
    insta::assert_snapshot!(json_str, @r#"{"ok":false,"error":"No open connection.","code":"NO_ACTIVE_CONNECTION"}"#);
}

#[test]
fn test_snapshot_validation_error() {
    let json_str =
        serde_json::to_string(&ErrorEnvelope::from_error(&GatewayError::wrong_type("sql", "a string")))
            .unwrap();
    insta::assert_snapshot!(json_str, @r#"{"ok":false,"error":"Field 'sql' must be a string","code":"WRONG_TYPE"}"#);
}
