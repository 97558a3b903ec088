//! Shared test backend
//!
//! `FakeBackend` stands in for SQL Server: probes succeed only for servers
//! marked reachable, and each SQL text can be scripted with a result set or an
//! error. Every call is recorded with the exact connection string it received.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use sqlgate::{ConnectionString, GatewayError, RawColumn, RawResultSet, RawValue, Result, SqlBackend};

/// One recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Probe { connection: String },
    Execute { connection: String, sql: String },
}

#[derive(Default)]
pub struct FakeBackend {
    reachable: Vec<String>,
    responses: HashMap<String, Result<RawResultSet>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let probes against `server` succeed
    pub fn reachable(mut self, server: &str) -> Self {
        self.reachable.push(server.to_string());
        self
    }

    /// Answer `sql` with `result`
    pub fn respond(mut self, sql: &str, result: RawResultSet) -> Self {
        self.responses.insert(sql.to_string(), Ok(result));
        self
    }

    /// Answer `sql` with `error`
    pub fn fail(mut self, sql: &str, error: GatewayError) -> Self {
        self.responses.insert(sql.to_string(), Err(error));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Connection strings handed to `execute`, in order
    pub fn executed_connections(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Execute { connection, .. } => Some(connection),
                Call::Probe { .. } => None,
            })
            .collect()
    }

    /// SQL texts handed to `execute`, in order
    pub fn executed_sql(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Execute { sql, .. } => Some(sql),
                Call::Probe { .. } => None,
            })
            .collect()
    }
}

impl SqlBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn probe(&self, connection: &ConnectionString) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Probe { connection: connection.to_string() });

        let server = connection.server().unwrap_or_default();
        if self.reachable.iter().any(|s| s == server) {
            Ok(())
        } else {
            Err(GatewayError::connectivity(format!(
                "A network-related error occurred while establishing a connection to '{server}'"
            )))
        }
    }

    async fn execute(&self, connection: &ConnectionString, sql: &str) -> Result<RawResultSet> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Execute { connection: connection.to_string(), sql: sql.to_string() });

        self.responses.get(sql).cloned().unwrap_or_else(|| Ok(RawResultSet::default()))
    }
}

/// Single-column result set of strings
pub fn string_column(name: &str, values: &[&str]) -> RawResultSet {
    RawResultSet {
        columns: vec![RawColumn::new(name, "nvarchar")],
        rows: values.iter().map(|v| vec![RawValue::NVarChar((*v).to_string())]).collect(),
    }
}

/// `SELECT 1 AS x`
pub fn select_one() -> RawResultSet {
    RawResultSet { columns: vec![RawColumn::new("x", "int")], rows: vec![vec![RawValue::Int(1)]] }
}
