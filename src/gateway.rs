//! Gateway Operations
//!
//! The logical operations exposed to clients: open, close, list, query and
//! health. Each returns a [`Result`]; the request surface turns those into
//! envelopes.
//!
//! # Secrets
//! The session keeps the unredacted string used to connect. Only its redacted
//! form ever leaves the gateway.

use crate::catalog::{self, CatalogKind};
use crate::connection::{self, ConnectionString};
use crate::engine::SqlBackend;
use crate::error::{GatewayError, Result};
use crate::executor::QueryExecutor;
use crate::normalize::{normalize, NormalizeOptions, TabularResult};
use crate::profile::ConnectionProfile;
use crate::session::{SessionId, SessionRegistry};

/// Session-scoped SQL gateway over one backend
#[derive(Debug)]
pub struct Gateway<B> {
    executor: QueryExecutor<B>,
    sessions: SessionRegistry,
    options: NormalizeOptions,
}

impl<B: SqlBackend> Gateway<B> {
    pub fn new(backend: B) -> Self {
        Self::with_options(backend, NormalizeOptions::default())
    }

    pub fn with_options(backend: B, options: NormalizeOptions) -> Self {
        Self { executor: QueryExecutor::new(backend), sessions: SessionRegistry::new(), options }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn executor(&self) -> &QueryExecutor<B> {
        &self.executor
    }

    /// Connect `session` using `profile`
    ///
    /// Builds the connection string, probes it, and only on success makes it
    /// the session's active string (replacing any previous one). Returns the
    /// redacted string.
    ///
    /// # Errors
    /// `Connectivity` when the string cannot be parsed or the probe fails; the
    /// session is left exactly as it was.
    pub async fn open(&self, session: &SessionId, profile: &ConnectionProfile) -> Result<String> {
        let built = connection::build(profile);
        let parsed = ConnectionString::parse(&built).map_err(as_connectivity)?;

        self.executor.probe(&parsed).await.map_err(as_connectivity)?;

        let redacted = parsed.redacted().to_string();
        tracing::info!(
            session = %session,
            server = parsed.server().unwrap_or_default(),
            database = parsed.database().unwrap_or_default(),
            raw = profile.raw_override().is_some(),
            "connection opened"
        );
        self.sessions.open(session, parsed).await;
        Ok(redacted)
    }

    /// Disconnect `session`; always succeeds
    pub async fn close(&self, session: &SessionId) {
        if self.sessions.close(session).await {
            tracing::info!(session = %session, "connection closed");
        }
    }

    /// Run a catalog listing on the session's active connection
    pub async fn list(&self, session: &SessionId, kind: CatalogKind) -> Result<Vec<String>> {
        let state = self.sessions.current(session).await;
        catalog::list(&self.executor, &state, kind).await
    }

    pub async fn list_databases(&self, session: &SessionId) -> Result<Vec<String>> {
        self.list(session, CatalogKind::Databases).await
    }

    pub async fn list_tables(&self, session: &SessionId) -> Result<Vec<String>> {
        self.list(session, CatalogKind::Tables).await
    }

    pub async fn list_views(&self, session: &SessionId) -> Result<Vec<String>> {
        self.list(session, CatalogKind::Views).await
    }

    /// Run arbitrary SQL on the session's active connection
    pub async fn query(&self, session: &SessionId, sql: &str) -> Result<TabularResult> {
        let state = self.sessions.current(session).await;
        let raw = self.executor.execute(&state, sql).await?;
        Ok(normalize(raw, self.options))
    }

    /// Liveness only; does not touch the database
    pub fn health(&self) -> Result<()> {
        Ok(())
    }
}

/// Anything that stops a connection from being established is a connectivity failure
fn as_connectivity(err: GatewayError) -> GatewayError {
    match err {
        GatewayError::MalformedConnectionString(message) => {
            GatewayError::connectivity(format!("Malformed connection string: {message}"))
        }
        other => other,
    }
}
