//! Request Loop Tests
//!
//! Drives the line-delimited JSON loop with in-memory input and checks the
//! response lines: one per non-blank request, in order, JSON-only.

mod common;

use common::{select_one, string_column, FakeBackend};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use sqlgate::server::{handle_line, serve_lines};
use sqlgate::{CatalogKind, Gateway};

// ============================================================================
// Test Helpers
// ============================================================================

fn gateway() -> Gateway<FakeBackend> {
    Gateway::new(
        FakeBackend::new()
            .reachable(".")
            .respond("SELECT 1 AS x", select_one())
            .respond(CatalogKind::Tables.sql(), string_column("", &["dbo.orders"])),
    )
}

async fn run(gateway: &Gateway<FakeBackend>, input: &str) -> Vec<Value> {
    let mut output = Vec::new();
    serve_lines(gateway, input.as_bytes(), &mut output).await.unwrap();

    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).expect("every output line is JSON"))
        .collect()
}

// ============================================================================
// Full Sessions
// ============================================================================

#[tokio::test]
async fn test_open_query_list_close() {
    let input = r#"
{"op": "open", "profile": {"server": ".", "database": "master", "auth": {"kind": "windows"}}}
{"op": "query", "sql": "SELECT 1 AS x"}
{"op": "listTables"}
{"op": "close"}
{"op": "query", "sql": "SELECT 1 AS x"}
"#;
    let responses = run(&gateway(), input).await;

    assert_eq!(
        responses,
        vec![
            json!({
                "ok": true,
                "connectionString": "Server=.;Database=master;Integrated Security=True;Encrypt=False;TrustServerCertificate=True"
            }),
            json!({"ok": true, "result": {"columns": ["x"], "rows": [[1]]}, "rowCount": 1}),
            json!({"ok": true, "items": ["dbo.orders"]}),
            json!({"ok": true}),
            json!({"ok": false, "error": "No open connection.", "code": "NO_ACTIVE_CONNECTION"}),
        ]
    );
}

#[tokio::test]
async fn test_sessions_are_independent_on_the_wire() {
    let input = r#"
{"op": "open", "session": "a", "profile": {"server": "."}}
{"op": "query", "session": "a", "sql": "SELECT 1 AS x"}
{"op": "query", "session": "b", "sql": "SELECT 1 AS x"}
"#;
    let responses = run(&gateway(), input).await;

    assert_eq!(responses[1]["ok"], true);
    assert_eq!(responses[2]["code"], "NO_ACTIVE_CONNECTION");
}

#[tokio::test]
async fn test_failed_open_reports_connectivity() {
    let input = r#"{"op": "open", "profile": {"server": "unreachable", "auth": {"kind": "sql", "user": "sa", "password": "hunter2"}}}"#;
    let responses = run(&gateway(), input).await;

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["ok"], false);
    assert_eq!(responses[0]["code"], "CONNECTIVITY_ERROR");
    assert!(!responses[0].to_string().contains("hunter2"));
}

#[tokio::test]
async fn test_open_response_masks_password() {
    let gateway = Gateway::new(FakeBackend::new().reachable("db01"));
    let input = r#"{"op": "open", "profile": {"server": "db01", "database": "sales", "auth": {"kind": "sql", "user": "app", "password": "s3cret"}}}"#;
    let responses = run(&gateway, input).await;

    assert_eq!(
        responses[0],
        json!({
            "ok": true,
            "connectionString": "Server=db01;Database=sales;User ID=app;Password=***;Encrypt=False;TrustServerCertificate=True"
        })
    );
}

// ============================================================================
// Validation and Framing
// ============================================================================

#[tokio::test]
async fn test_invalid_requests_get_typed_errors() {
    let input = r#"
not json
{"op": "query"}
{"op": "query", "sql": ["SELECT 1"]}
{"sql": "SELECT 1"}
{"op": "health"}
"#;
    let responses = run(&gateway(), input).await;
    let codes: Vec<&str> = responses
        .iter()
        .map(|r| r.get("code").and_then(Value::as_str).unwrap_or("OK"))
        .collect();

    assert_eq!(codes, vec!["MALFORMED_JSON", "MISSING_FIELD", "WRONG_TYPE", "MISSING_FIELD", "OK"]);
}

#[tokio::test]
async fn test_invalid_request_never_reaches_backend() {
    let gateway = gateway();
    run(&gateway, r#"{"op": "query", "sql": 1}"#).await;
    assert!(gateway.executor().backend().calls().is_empty());
}

#[tokio::test]
async fn test_blank_lines_are_skipped() {
    let responses = run(&gateway(), "\n\n   \n{\"op\": \"health\"}\n\n").await;
    assert_eq!(responses, vec![json!({"ok": true})]);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let gateway = gateway();
    let response = handle_line(&gateway, r#"{"op": "health", "id": 7}"#).await.unwrap();
    assert_eq!(response, json!({"ok": true, "id": 7}));

    let response = handle_line(&gateway, r#"{"op": "query", "id": "q1"}"#).await.unwrap();
    assert_eq!(response["id"], "q1");
    assert_eq!(response["code"], "MISSING_FIELD");
}

#[tokio::test]
async fn test_empty_input_produces_no_output() {
    assert!(run(&gateway(), "").await.is_empty());
}
