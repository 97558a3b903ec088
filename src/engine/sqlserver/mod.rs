//! SQL Server Backend
//!
//! Implements [`SqlBackend`] for Microsoft SQL Server over TDS using `tiberius`.
//!
//! # Implementation Notes
//! - One TCP connection per call, closed before returning (no pooling)
//! - Named instances (`host\instance`) are resolved through SQL Browser
//! - `.`, `(local)` and `localhost` all mean the local default instance
//! - Azure-style routing redirects are followed once during login
//! - Only the first result set of a batch is read
//! - Server error messages are surfaced verbatim

use std::time::Duration;

use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, FromSql, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::connection::ConnectionString;
use crate::engine::{RawColumn, RawResultSet, RawValue, SqlBackend};
use crate::error::{GatewayError, Result};

type MssqlClient = Client<Compat<TcpStream>>;

/// Default TDS port
const DEFAULT_PORT: u16 = 1433;

/// SQL Server backend
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerBackend;

impl SqlBackend for SqlServerBackend {
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    async fn probe(&self, connection: &ConnectionString) -> Result<()> {
        let client = connect(connection).await?;
        release(client).await;
        Ok(())
    }

    async fn execute(&self, connection: &ConnectionString, sql: &str) -> Result<RawResultSet> {
        let mut client = connect(connection).await?;
        let result = read_first_result(&mut client, sql).await;
        release(client).await;
        result
    }
}

/// Where to connect, parsed from the `Server` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerTarget {
    pub host: String,
    pub port: Option<u16>,
    pub instance: Option<String>,
}

impl ServerTarget {
    /// Parse `[tcp:]host[\instance][,port]`
    pub fn parse(server: &str) -> Result<Self> {
        let server = server.trim();
        let server = match server.get(..4) {
            Some(prefix) if prefix.eq_ignore_ascii_case("tcp:") => &server[4..],
            _ => server,
        };

        let (host_part, port) = match server.split_once(',') {
            Some((host, port)) => {
                let port = port.trim().parse::<u16>().map_err(|_| {
                    GatewayError::malformed_connection_string(format!(
                        "invalid port '{}' in Server",
                        port.trim()
                    ))
                })?;
                (host, Some(port))
            }
            None => (server, None),
        };

        let (host, instance) = match host_part.split_once('\\') {
            Some((host, instance)) if !instance.trim().is_empty() => {
                (host, Some(instance.trim().to_string()))
            }
            Some((host, _)) => (host, None),
            None => (host_part, None),
        };

        Ok(Self { host: resolve_local_host(host.trim()).to_string(), port, instance })
    }
}

fn resolve_local_host(host: &str) -> &str {
    if host.is_empty()
        || host == "."
        || host.eq_ignore_ascii_case("(local)")
        || host.eq_ignore_ascii_case("localhost")
    {
        "localhost"
    } else {
        host
    }
}

/// Translate a parsed connection string into a driver config
pub fn build_config(connection: &ConnectionString) -> Result<Config> {
    let target = ServerTarget::parse(connection.server().unwrap_or("."))?;

    let mut config = Config::new();
    config.host(&target.host);
    match (target.port, &target.instance) {
        (Some(port), _) => config.port(port),
        (None, Some(instance)) => config.instance_name(instance),
        (None, None) => config.port(DEFAULT_PORT),
    }

    if let Some(database) = connection.database().filter(|db| !db.trim().is_empty()) {
        config.database(database);
    }
    if let Some(app) = connection.application_name() {
        config.application_name(app);
    }

    config.authentication(auth_method(connection)?);

    config.encryption(if connection.encrypt()? {
        EncryptionLevel::Required
    } else {
        EncryptionLevel::Off
    });
    if connection.trust_server_certificate()? {
        config.trust_cert();
    }

    Ok(config)
}

fn auth_method(connection: &ConnectionString) -> Result<AuthMethod> {
    if connection.integrated_security()? {
        return integrated_auth();
    }
    Ok(AuthMethod::sql_server(
        connection.user().unwrap_or_default(),
        connection.password().unwrap_or_default(),
    ))
}

#[cfg(any(windows, all(unix, feature = "integrated-auth-gssapi")))]
fn integrated_auth() -> Result<AuthMethod> {
    Ok(AuthMethod::Integrated)
}

#[cfg(not(any(windows, all(unix, feature = "integrated-auth-gssapi"))))]
fn integrated_auth() -> Result<AuthMethod> {
    Err(GatewayError::connectivity(
        "Integrated authentication is not available in this build. \
         Use a SQL login or build with the 'integrated-auth-gssapi' feature.",
    ))
}

/// Open a client, honoring `Connect Timeout` when the string sets one
async fn connect(connection: &ConnectionString) -> Result<MssqlClient> {
    let config = build_config(connection)?;

    match connection.connect_timeout_secs()? {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), open_client(config))
            .await
            .map_err(|_| {
                GatewayError::connectivity(format!("Connection timed out after {secs} seconds"))
            })?,
        None => open_client(config).await,
    }
}

async fn open_client(mut config: Config) -> Result<MssqlClient> {
    let tcp = TcpStream::connect_named(&config).await.map_err(connectivity_error)?;
    tcp.set_nodelay(true).ok();

    match Client::connect(config.clone(), tcp.compat_write()).await {
        Ok(client) => Ok(client),
        Err(tiberius::error::Error::Routing { host, port }) => {
            tracing::debug!(%host, port, "following SQL Server routing redirect");
            config.host(&host);
            config.port(port);

            let tcp = TcpStream::connect(config.get_addr()).await.map_err(|e| {
                GatewayError::connectivity(format!("Failed to connect to {host}:{port} - {e}"))
            })?;
            tcp.set_nodelay(true).ok();

            Client::connect(config, tcp.compat_write()).await.map_err(connectivity_error)
        }
        Err(e) => Err(connectivity_error(e)),
    }
}

/// Close the connection; a failure here cannot change the caller's outcome
async fn release(client: MssqlClient) {
    if let Err(e) = client.close().await {
        tracing::debug!(error = %e, "closing SQL Server connection failed");
    }
}

async fn read_first_result(client: &mut MssqlClient, sql: &str) -> Result<RawResultSet> {
    let mut stream = client.simple_query(sql).await.map_err(execution_error)?;

    let columns: Vec<RawColumn> = stream
        .columns()
        .await
        .map_err(execution_error)?
        .map(|columns| {
            columns
                .iter()
                .map(|col| {
                    RawColumn::new(
                        col.name(),
                        format!("{:?}", col.column_type()).to_ascii_lowercase(),
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    let rows = stream.into_first_result().await.map_err(execution_error)?;
    let rows = rows.iter().map(convert_row).collect();

    Ok(RawResultSet { columns, rows })
}

fn backend_message(err: tiberius::error::Error) -> String {
    match err {
        tiberius::error::Error::Server(token) => token.message().to_string(),
        other => other.to_string(),
    }
}

fn connectivity_error(err: tiberius::error::Error) -> GatewayError {
    GatewayError::connectivity(backend_message(err))
}

fn execution_error(err: tiberius::error::Error) -> GatewayError {
    GatewayError::execution(backend_message(err))
}

fn convert_row(row: &tiberius::Row) -> Vec<RawValue> {
    row.cells()
        .map(|(column, data)| {
            convert_cell(&format!("{:?}", column.column_type()).to_ascii_lowercase(), data)
        })
        .collect()
}

/// Convert one TDS cell; a `None` payload is the backend NULL
fn convert_cell(type_name: &str, data: &ColumnData<'static>) -> RawValue {
    match data {
        ColumnData::Bit(v) => v.map_or(RawValue::Null, RawValue::Bit),
        ColumnData::U8(v) => v.map_or(RawValue::Null, RawValue::TinyInt),
        ColumnData::I16(v) => v.map_or(RawValue::Null, RawValue::SmallInt),
        ColumnData::I32(v) => v.map_or(RawValue::Null, RawValue::Int),
        ColumnData::I64(v) => v.map_or(RawValue::Null, RawValue::BigInt),
        ColumnData::F32(v) => v.map_or(RawValue::Null, RawValue::Real),
        ColumnData::F64(v) => v.map_or(RawValue::Null, RawValue::Float),
        ColumnData::Numeric(v) => v.map_or(RawValue::Null, |n| RawValue::Decimal {
            value: n.value(),
            scale: n.scale(),
        }),
        ColumnData::String(v) => {
            v.as_ref().map_or(RawValue::Null, |s| RawValue::NVarChar(s.to_string()))
        }
        ColumnData::Guid(v) => v.map_or(RawValue::Null, RawValue::UniqueIdentifier),
        ColumnData::Binary(v) => {
            v.as_ref().map_or(RawValue::Null, |b| RawValue::VarBinary(b.to_vec()))
        }
        ColumnData::Xml(v) => v.as_ref().map_or(RawValue::Null, |x| RawValue::Xml(x.to_string())),
        ColumnData::DateTime(_) => temporal(type_name, data, RawValue::DateTime),
        ColumnData::SmallDateTime(_) => temporal(type_name, data, RawValue::SmallDateTime),
        ColumnData::DateTime2(_) => temporal(type_name, data, RawValue::DateTime2),
        ColumnData::Date(_) => temporal(type_name, data, RawValue::Date),
        ColumnData::Time(_) => temporal(type_name, data, RawValue::Time),
        ColumnData::DateTimeOffset(_) => temporal(type_name, data, RawValue::DateTimeOffset),
        #[allow(unreachable_patterns)]
        other => unrecognized(type_name, other),
    }
}

fn temporal<'a, T: FromSql<'a>>(
    type_name: &str,
    data: &'a ColumnData<'static>,
    wrap: fn(T) -> RawValue,
) -> RawValue {
    match T::from_sql(data) {
        Ok(Some(value)) => wrap(value),
        Ok(None) => RawValue::Null,
        Err(_) => unrecognized(type_name, data),
    }
}

fn unrecognized(type_name: &str, data: &ColumnData<'static>) -> RawValue {
    RawValue::Unrecognized { type_name: type_name.to_string(), display: format!("{data:?}") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(cs: &str) -> ConnectionString {
        ConnectionString::parse(cs).unwrap()
    }

    #[test]
    fn test_server_target_local_aliases() {
        for server in [".", "(local)", "LOCALHOST", ""] {
            let target = ServerTarget::parse(server).unwrap();
            assert_eq!(target.host, "localhost", "server {server:?}");
            assert_eq!(target.port, None);
            assert_eq!(target.instance, None);
        }
    }

    #[test]
    fn test_server_target_port_and_instance() {
        let target = ServerTarget::parse("tcp:db01.example.com,14330").unwrap();
        assert_eq!(target.host, "db01.example.com");
        assert_eq!(target.port, Some(14330));

        let target = ServerTarget::parse(".\\SQLEXPRESS").unwrap();
        assert_eq!(target.host, "localhost");
        assert_eq!(target.instance.as_deref(), Some("SQLEXPRESS"));

        assert!(ServerTarget::parse("db01,notaport").is_err());
    }

    #[test]
    fn test_build_config_address() {
        let config = build_config(&parse("Server=.;User ID=sa;Password=x")).unwrap();
        assert_eq!(config.get_addr(), "localhost:1433");

        let config = build_config(&parse("Data Source=db01,1500;UID=sa;PWD=x")).unwrap();
        assert_eq!(config.get_addr(), "db01:1500");
    }

    #[test]
    fn test_build_config_rejects_bad_flags() {
        let err = build_config(&parse("Server=db;Encrypt=sometimes")).unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_CONNECTION_STRING");
    }

    #[test]
    #[cfg(all(unix, not(feature = "integrated-auth-gssapi")))]
    fn test_integrated_auth_unavailable_without_feature() {
        let err = build_config(&parse("Server=.;Integrated Security=True")).unwrap_err();
        assert_eq!(err.error_code(), "CONNECTIVITY_ERROR");
        assert!(err.message().contains("Integrated authentication"));
    }

    #[test]
    fn test_convert_cell_nulls() {
        assert_eq!(convert_cell("intn", &ColumnData::I32(None)), RawValue::Null);
        assert_eq!(convert_cell("nvarchar", &ColumnData::String(None)), RawValue::Null);
        assert_eq!(convert_cell("datetime2", &ColumnData::DateTime2(None)), RawValue::Null);
    }

    #[test]
    fn test_convert_cell_scalars() {
        assert_eq!(convert_cell("bitn", &ColumnData::Bit(Some(true))), RawValue::Bit(true));
        assert_eq!(
            convert_cell("intn", &ColumnData::I64(Some(i64::MAX))),
            RawValue::BigInt(i64::MAX)
        );
        assert_eq!(
            convert_cell("nvarchar", &ColumnData::String(Some("héllo".into()))),
            RawValue::NVarChar("héllo".to_string())
        );
    }

    // Live-server tests. Run with:
    // SQLGATE_TEST_CONNECTION="Server=...;User ID=...;Password=..." cargo test -- --ignored

    fn live_connection() -> ConnectionString {
        let cs = std::env::var("SQLGATE_TEST_CONNECTION")
            .expect("SQLGATE_TEST_CONNECTION must be set for live tests");
        ConnectionString::parse(&cs).unwrap()
    }

    #[tokio::test]
    #[ignore] // Requires running SQL Server instance
    async fn test_live_probe() {
        SqlServerBackend.probe(&live_connection()).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires running SQL Server instance
    async fn test_live_select_one() {
        let result = SqlServerBackend.execute(&live_connection(), "SELECT 1 AS x").await.unwrap();
        assert_eq!(result.columns.len(), 1);
        assert_eq!(result.columns[0].name, "x");
        assert_eq!(result.rows, vec![vec![RawValue::Int(1)]]);
    }

    #[tokio::test]
    #[ignore] // Requires running SQL Server instance
    async fn test_live_syntax_error_is_execution_error() {
        let err = SqlServerBackend.execute(&live_connection(), "SELEC 1").await.unwrap_err();
        assert_eq!(err.error_code(), "EXECUTION_ERROR");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connectivity_error() {
        let cs = parse("Server=127.0.0.1,1;User ID=sa;Password=x;Connect Timeout=5");
        let err = SqlServerBackend.probe(&cs).await.unwrap_err();
        assert_eq!(err.error_code(), "CONNECTIVITY_ERROR");
    }
}
