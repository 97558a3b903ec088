//! Connection Profiles
//!
//! A profile is the structured description of how to reach a SQL Server
//! instance. It is built by the caller for each connect attempt and never
//! mutated afterwards.
//!
//! If `connection_string` is non-empty (after trimming) it is used verbatim to
//! connect; the structured fields stay authoritative for display and for
//! regenerating a string when raw mode is off.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Profile name used when none is supplied
pub const DEFAULT_PROFILE_NAME: &str = "Local SQL Server";

/// Server name meaning "the local default instance"
pub const LOCAL_SERVER: &str = ".";

/// Database used when the profile does not name one
pub const DEFAULT_DATABASE: &str = "master";

/// Structured connection profile
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    /// Display name
    #[serde(default)]
    pub name: String,

    /// Server (`host`, `host\instance`, `host,port`); blank means the local default instance
    #[serde(default)]
    pub server: String,

    /// Initial database; absent or blank means `master`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Authentication mode
    #[serde(default)]
    pub auth: AuthSpec,

    /// Encrypt the whole session (default false)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypt: Option<bool>,

    /// Skip server certificate validation (default true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_server_certificate: Option<bool>,

    /// Raw connection string override; empty means "build from the fields above"
    #[serde(default)]
    pub connection_string: String,
}

impl ConnectionProfile {
    /// Windows/integrated profile for a server and database
    #[must_use]
    pub fn windows(server: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            database: Some(database.into()),
            ..Self::default()
        }
    }

    /// SQL login profile for a server and database
    #[must_use]
    pub fn sql_login(
        server: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            database: Some(database.into()),
            auth: AuthSpec::sql_login(user, password),
            ..Self::default()
        }
    }

    /// Profile that connects with a raw connection string
    #[must_use]
    pub fn raw(connection_string: impl Into<String>) -> Self {
        Self { connection_string: connection_string.into(), ..Self::default() }
    }

    /// The raw override, if one is set (trimmed, non-empty)
    #[must_use]
    pub fn raw_override(&self) -> Option<&str> {
        let raw = self.connection_string.trim();
        (!raw.is_empty()).then_some(raw)
    }

    /// Server name with blanks and local aliases folded to `.`
    #[must_use]
    pub fn effective_server(&self) -> &str {
        normalize_server(&self.server)
    }

    /// Database name, `master` when absent or blank
    #[must_use]
    pub fn effective_database(&self) -> &str {
        match self.database.as_deref().map(str::trim) {
            Some(db) if !db.is_empty() => db,
            _ => DEFAULT_DATABASE,
        }
    }

    /// Encryption flag, false when absent
    #[must_use]
    pub fn effective_encrypt(&self) -> bool {
        self.encrypt.unwrap_or(false)
    }

    /// Certificate trust flag, true when absent
    #[must_use]
    pub fn effective_trust_server_certificate(&self) -> bool {
        self.trust_server_certificate.unwrap_or(true)
    }

    /// Copy safe to display: passwords masked, raw string redacted
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut shown = self.clone();
        if let AuthSpec::SqlLogin { password, .. } = &mut shown.auth {
            if !password.is_empty() {
                *password = crate::connection::MASK.to_string();
            }
        }
        shown.connection_string = crate::connection::redact(&self.connection_string);
        shown
    }
}

impl Default for ConnectionProfile {
    /// Local default instance, `master`, Windows authentication, no encryption,
    /// certificate trusted.
    fn default() -> Self {
        Self {
            name: DEFAULT_PROFILE_NAME.to_string(),
            server: LOCAL_SERVER.to_string(),
            database: Some(DEFAULT_DATABASE.to_string()),
            auth: AuthSpec::Windows,
            encrypt: Some(false),
            trust_server_certificate: Some(true),
            connection_string: String::new(),
        }
    }
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("name", &self.name)
            .field("server", &self.server)
            .field("database", &self.database)
            .field("auth", &self.auth)
            .field("encrypt", &self.encrypt)
            .field("trust_server_certificate", &self.trust_server_certificate)
            .field("connection_string", &crate::connection::redact(&self.connection_string))
            .finish()
    }
}

/// Fold blank input and `localhost` / `(local)` into `.`
#[must_use]
pub fn normalize_server(raw: &str) -> &str {
    let server = raw.trim();
    if server.is_empty()
        || server == LOCAL_SERVER
        || server.eq_ignore_ascii_case("localhost")
        || server.eq_ignore_ascii_case("(local)")
    {
        LOCAL_SERVER
    } else {
        server
    }
}

/// Authentication mode, tagged by `kind` on the wire
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AuthSpec {
    /// Integrated (trusted) authentication, no credentials
    #[default]
    Windows,

    /// SQL Server login
    #[serde(rename = "sql")]
    SqlLogin {
        #[serde(default)]
        user: String,
        /// WARNING: Sensitive data, never log or echo
        #[serde(default)]
        password: String,
    },
}

impl AuthSpec {
    /// Create a SQL login
    pub fn sql_login(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self::SqlLogin { user: user.into(), password: password.into() }
    }

    /// Wire tag of this mode
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::SqlLogin { .. } => "sql",
        }
    }
}

// Hand-written so the password never reaches a log line.
impl fmt::Debug for AuthSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windows => f.write_str("Windows"),
            Self::SqlLogin { user, .. } => f
                .debug_struct("SqlLogin")
                .field("user", user)
                .field("password", &"***")
                .finish(),
        }
    }
}
