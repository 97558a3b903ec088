//! Query Execution
//!
//! Thin, logged layer over a [`SqlBackend`]. The executor never holds a
//! connection: `probe` and `execute` each open one through the backend and the
//! backend releases it before returning.

use std::time::Instant;

use crate::connection::ConnectionString;
use crate::engine::{RawResultSet, SqlBackend};
use crate::error::{GatewayError, Result};
use crate::session::SessionState;

/// Runs probes and SQL through a backend
#[derive(Debug, Clone, Default)]
pub struct QueryExecutor<B> {
    backend: B,
}

impl<B: SqlBackend> QueryExecutor<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Check that `connection` reaches a server and logs in
    pub async fn probe(&self, connection: &ConnectionString) -> Result<()> {
        let started = Instant::now();
        let result = self.backend.probe(connection).await;
        tracing::debug!(
            engine = self.backend.name(),
            server = connection.server().unwrap_or_default(),
            ok = result.is_ok(),
            elapsed_ms = elapsed_ms(started),
            "probe finished"
        );
        result
    }

    /// Run `sql` verbatim on the connection captured in `state`
    ///
    /// `state` is a snapshot; the registry is not consulted again, so a
    /// concurrent close cannot affect a call already under way.
    ///
    /// # Errors
    /// - `NoActiveConnection` when `state` is disconnected
    /// - `Connectivity` when the connection cannot be opened
    /// - `Execution` when the server rejects the SQL
    pub async fn execute(&self, state: &SessionState, sql: &str) -> Result<RawResultSet> {
        let connection = state.connection().ok_or(GatewayError::NoActiveConnection)?;

        let started = Instant::now();
        let result = self.backend.execute(connection, sql).await;
        match &result {
            Ok(raw) => tracing::debug!(
                engine = self.backend.name(),
                sql_len = sql.len(),
                columns = raw.columns.len(),
                rows = raw.rows.len(),
                elapsed_ms = elapsed_ms(started),
                "query finished"
            ),
            Err(e) => tracing::debug!(
                engine = self.backend.name(),
                sql_len = sql.len(),
                code = e.error_code(),
                elapsed_ms = elapsed_ms(started),
                "query failed"
            ),
        }
        result
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
