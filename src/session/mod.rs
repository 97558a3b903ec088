//! Session State
//!
//! Each logical session owns one slot: either `Disconnected` or
//! `Connected(connection string)`. Slots live in a [`SessionRegistry`] keyed by
//! [`SessionId`]; an id that was never opened (or has been closed) reads as
//! `Disconnected`.
//!
//! # Concurrency
//! The registry is guarded by an async `RwLock`. Readers take a snapshot via
//! [`SessionRegistry::current`] and release the lock before any database I/O,
//! so a concurrent `open`/`close` never tears a string mid-read. Only `open`
//! and `close` write.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::connection::ConnectionString;

/// Session id used when a request does not name one
pub const DEFAULT_SESSION: &str = "default";

/// Opaque identifier of a logical session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a caller-supplied id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self(DEFAULT_SESSION.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Point-in-time view of one session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    /// Holds the unredacted string used to connect
    Connected(Arc<ConnectionString>),
}

impl SessionState {
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    /// The connection string, if connected
    #[must_use]
    pub fn connection(&self) -> Option<&ConnectionString> {
        match self {
            Self::Connected(cs) => Some(cs),
            Self::Disconnected => None,
        }
    }
}

/// All sessions known to one gateway
#[derive(Debug, Default)]
pub struct SessionRegistry {
    slots: RwLock<HashMap<SessionId, Arc<ConnectionString>>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `connection` as the session's active string, replacing any previous one
    ///
    /// Callers must only do this after a successful probe.
    pub async fn open(&self, id: &SessionId, connection: ConnectionString) {
        let replaced = self.slots.write().await.insert(id.clone(), Arc::new(connection));
        tracing::debug!(session = %id, replaced = replaced.is_some(), "session connected");
    }

    /// Forget the session's string; a no-op when already disconnected
    ///
    /// Returns whether the session was connected.
    pub async fn close(&self, id: &SessionId) -> bool {
        let was_connected = self.slots.write().await.remove(id).is_some();
        tracing::debug!(session = %id, was_connected, "session closed");
        was_connected
    }

    /// Snapshot of the session's state
    pub async fn current(&self, id: &SessionId) -> SessionState {
        self.slots
            .read()
            .await
            .get(id)
            .map_or(SessionState::Disconnected, |cs| SessionState::Connected(Arc::clone(cs)))
    }

    /// Number of connected sessions
    pub async fn connected_count(&self) -> usize {
        self.slots.read().await.len()
    }
}
