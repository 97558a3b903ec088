//! sqlgate - Session-Scoped SQL Server Gateway
//!
//! sqlgate lets a client submit arbitrary SQL text against a SQL Server database
//! and get back a normalized, JSON-safe table. It owns the connection lifecycle
//! around that: building connection strings from profiles, redacting their
//! secrets, probing before a session is marked open, and listing catalog
//! metadata.
//!
//! # Core Principles
//! - One short-lived database connection per call, nothing pooled
//! - A session only becomes connected after a successful probe
//! - Passwords never leave the process: responses and logs see redacted strings
//! - Every cell is a string, integer, float, boolean or null
//!
//! # Module Organization
//! - [`error`] - Error types and codes
//! - [`profile`] - Connection profiles
//! - [`connection`] - Connection string build/parse/redact
//! - [`session`] - Per-session connection state
//! - [`engine`] - Backend trait, raw result types and the SQL Server backend
//! - [`executor`] - Probe/execute through a backend
//! - [`normalize`] - Raw cells to wire-safe cells
//! - [`catalog`] - Database/table/view listings
//! - [`gateway`] - The client-facing operations
//! - [`output`] - JSON response envelopes
//! - [`server`] - Line-delimited JSON request loop
//! - [`config`] - Gateway config and the persisted profile

pub mod catalog;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod normalize;
pub mod output;
pub mod profile;
pub mod server;
pub mod session;

// Re-export commonly used types for convenience
pub use catalog::CatalogKind;
pub use config::{GatewayConfig, ProfileStore};
pub use connection::{build, redact, ConnectionString};
pub use engine::{RawColumn, RawResultSet, RawValue, SqlBackend};
pub use error::{GatewayError, Result};
pub use gateway::Gateway;
pub use normalize::{Cell, NormalizeOptions, TabularResult};
pub use output::{ErrorEnvelope, SuccessEnvelope};
pub use profile::{AuthSpec, ConnectionProfile};
pub use server::Request;
pub use session::{SessionId, SessionRegistry, SessionState};

#[cfg(feature = "sqlserver")]
pub use engine::sqlserver::SqlServerBackend;
