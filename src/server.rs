//! Request Surface
//!
//! Line-delimited JSON over stdio: one request object per input line, one
//! envelope per output line, in order.
//!
//! # Request Shape
//! ```json
//! {"op": "open", "session": "s1", "profile": {"server": ".", "auth": {"kind": "windows"}}}
//! {"op": "query", "session": "s1", "sql": "SELECT 1 AS x"}
//! {"op": "listTables"}
//! {"op": "close", "session": "s1"}
//! {"op": "health"}
//! ```
//!
//! - `session` is optional and defaults to `"default"`
//! - an optional `id` (any JSON value) is echoed back on the response
//! - requests are validated into [`Request`] before anything runs; violations
//!   answer with `MISSING_FIELD` or `WRONG_TYPE`, unparseable lines with
//!   `MALFORMED_JSON`
//!
//! Logs go to stderr, never to the response stream.

use anyhow::Result;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::catalog::CatalogKind;
use crate::engine::SqlBackend;
use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::output::{envelope, Acknowledged, Listed, Opened, Queried};
use crate::profile::ConnectionProfile;
use crate::session::SessionId;

/// A validated request
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Health,
    Open { session: SessionId, profile: ConnectionProfile },
    Close { session: SessionId },
    List { session: SessionId, kind: CatalogKind },
    Query { session: SessionId, sql: String },
}

impl Request {
    /// Validate an already-decoded request object
    pub fn from_value(value: &Value) -> crate::error::Result<Self> {
        if !value.is_object() {
            return Err(GatewayError::malformed_json("request must be a JSON object"));
        }

        let op = required_str(value, "op")?;
        match op {
            "health" => Ok(Self::Health),
            "open" => {
                let profile = value.get("profile").ok_or_else(|| GatewayError::missing_field("profile"))?;
                if !profile.is_object() {
                    return Err(GatewayError::wrong_type("profile", "an object"));
                }
                let profile = serde_json::from_value(profile.clone())
                    .map_err(|_| GatewayError::wrong_type("profile", "a connection profile"))?;
                Ok(Self::Open { session: session(value)?, profile })
            }
            "close" => Ok(Self::Close { session: session(value)? }),
            "listDatabases" => Ok(Self::List { session: session(value)?, kind: CatalogKind::Databases }),
            "listTables" => Ok(Self::List { session: session(value)?, kind: CatalogKind::Tables }),
            "listViews" => Ok(Self::List { session: session(value)?, kind: CatalogKind::Views }),
            "query" => Ok(Self::Query {
                session: session(value)?,
                sql: required_str(value, "sql")?.to_string(),
            }),
            _ => Err(GatewayError::wrong_type(
                "op",
                "one of open, close, listDatabases, listTables, listViews, query, health",
            )),
        }
    }

    /// Wire name of the operation
    #[must_use]
    pub const fn op(&self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::Open { .. } => "open",
            Self::Close { .. } => "close",
            Self::List { kind: CatalogKind::Databases, .. } => "listDatabases",
            Self::List { kind: CatalogKind::Tables, .. } => "listTables",
            Self::List { kind: CatalogKind::Views, .. } => "listViews",
            Self::Query { .. } => "query",
        }
    }
}

/// Decode one request line into JSON
fn decode(line: &str) -> crate::error::Result<Value> {
    serde_json::from_str(line).map_err(|e| GatewayError::malformed_json(e.to_string()))
}

fn required_str<'a>(value: &'a Value, field: &str) -> crate::error::Result<&'a str> {
    match value.get(field) {
        None | Some(Value::Null) => Err(GatewayError::missing_field(field)),
        Some(v) => v.as_str().ok_or_else(|| GatewayError::wrong_type(field, "a string")),
    }
}

fn session(value: &Value) -> crate::error::Result<SessionId> {
    match value.get("session") {
        None | Some(Value::Null) => Ok(SessionId::default()),
        Some(Value::String(id)) if !id.is_empty() => Ok(SessionId::new(id.as_str())),
        Some(_) => Err(GatewayError::wrong_type("session", "a non-empty string")),
    }
}

/// Serve requests from stdin until EOF
pub async fn serve<B: SqlBackend>(gateway: &Gateway<B>) -> Result<()> {
    tracing::info!(engine = gateway.executor().backend().name(), "serving requests on stdio");
    serve_lines(gateway, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}

/// Serve requests from any line source to any sink
///
/// Blank lines are skipped. Each request is answered before the next is read.
pub async fn serve_lines<B, R, W>(gateway: &Gateway<B>, reader: R, mut writer: W) -> Result<()>
where
    B: SqlBackend,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = handle_line(gateway, &line).await?;
        let mut text = serde_json::to_string(&response)?;
        text.push('\n');
        writer.write_all(text.as_bytes()).await?;
        writer.flush().await?;
    }

    tracing::info!("input closed, stopping");
    Ok(())
}

/// Answer one raw request line
pub async fn handle_line<B: SqlBackend>(gateway: &Gateway<B>, line: &str) -> Result<Value> {
    let value = match decode(line) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable request line");
            return Ok(envelope::<Acknowledged>(Err(e))?);
        }
    };

    let mut response = match Request::from_value(&value) {
        Ok(request) => dispatch(gateway, request).await?,
        Err(e) => {
            tracing::warn!(code = e.error_code(), "rejected request");
            envelope::<Acknowledged>(Err(e))?
        }
    };

    if let (Some(id), Some(object)) = (value.get("id"), response.as_object_mut()) {
        object.insert("id".to_string(), id.clone());
    }
    Ok(response)
}

/// Run a validated request and render its envelope
pub async fn dispatch<B: SqlBackend>(gateway: &Gateway<B>, request: Request) -> Result<Value> {
    tracing::debug!(op = request.op(), "dispatching request");

    let value = match request {
        Request::Health => envelope(gateway.health().map(|()| Acknowledged {}))?,
        Request::Open { session, profile } => envelope(
            gateway
                .open(&session, &profile)
                .await
                .map(|connection_string| Opened { connection_string }),
        )?,
        Request::Close { session } => {
            gateway.close(&session).await;
            envelope(Ok(Acknowledged {}))?
        }
        Request::List { session, kind } => {
            envelope(gateway.list(&session, kind).await.map(|items| Listed { items }))?
        }
        Request::Query { session, sql } => {
            envelope(gateway.query(&session, &sql).await.map(Queried::from))?
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::AuthSpec;
    use pretty_assertions::assert_eq;

    fn parse(line: &str) -> crate::error::Result<Request> {
        decode(line).and_then(|value| Request::from_value(&value))
    }

    #[test]
    fn test_parse_query_defaults_session() {
        let request = parse(r#"{"op": "query", "sql": "SELECT 1"}"#).unwrap();
        assert_eq!(
            request,
            Request::Query { session: SessionId::default(), sql: "SELECT 1".to_string() }
        );
    }

    #[test]
    fn test_parse_open_profile() {
        let request = parse(
            r#"{"op": "open", "session": "s1", "profile": {"server": "db", "auth": {"kind": "sql", "user": "sa", "password": "pw"}}}"#,
        )
        .unwrap();

        match request {
            Request::Open { session, profile } => {
                assert_eq!(session.as_str(), "s1");
                assert_eq!(profile.auth, AuthSpec::sql_login("sa", "pw"));
            }
            other => panic!("expected open, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_list_ops() {
        for (op, kind) in [
            ("listDatabases", CatalogKind::Databases),
            ("listTables", CatalogKind::Tables),
            ("listViews", CatalogKind::Views),
        ] {
            let request = parse(&format!(r#"{{"op": "{op}"}}"#)).unwrap();
            assert_eq!(request, Request::List { session: SessionId::default(), kind });
            assert_eq!(request.op(), op);
        }
    }

    #[test]
    fn test_missing_sql() {
        let err = parse(r#"{"op": "query"}"#).unwrap_err();
        assert_eq!(err, GatewayError::missing_field("sql"));
    }

    #[test]
    fn test_wrong_type_sql() {
        let err = parse(r#"{"op": "query", "sql": 42}"#).unwrap_err();
        assert_eq!(err, GatewayError::wrong_type("sql", "a string"));
    }

    #[test]
    fn test_wrong_type_session() {
        let err = parse(r#"{"op": "close", "session": 7}"#).unwrap_err();
        assert_eq!(err.error_code(), "WRONG_TYPE");
    }

    #[test]
    fn test_missing_op_and_unknown_op() {
        assert_eq!(parse("{}").unwrap_err(), GatewayError::missing_field("op"));
        assert_eq!(parse(r#"{"op": "drop"}"#).unwrap_err().error_code(), "WRONG_TYPE");
    }

    #[test]
    fn test_open_profile_validation() {
        assert_eq!(
            parse(r#"{"op": "open"}"#).unwrap_err(),
            GatewayError::missing_field("profile")
        );
        assert_eq!(
            parse(r#"{"op": "open", "profile": "Server=."}"#).unwrap_err().error_code(),
            "WRONG_TYPE"
        );
        assert_eq!(
            parse(r#"{"op": "open", "profile": {"auth": {"kind": "kerberos"}}}"#)
                .unwrap_err()
                .error_code(),
            "WRONG_TYPE"
        );
    }

    #[test]
    fn test_malformed_json() {
        assert_eq!(parse("{nope").unwrap_err().error_code(), "MALFORMED_JSON");
        assert_eq!(parse("[1, 2]").unwrap_err().error_code(), "MALFORMED_JSON");
    }
}
