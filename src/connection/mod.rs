//! Connection String Codec
//!
//! Builds SQL Server connection strings from [`ConnectionProfile`]s, parses them
//! back into ordered key/value pairs, and redacts secrets for display.
//!
//! # Grammar
//! ADO.NET style: `key=value` segments separated by `;`.
//! - Keys are trimmed and compared case-insensitively; synonyms are accepted
//!   (`Server` / `Data Source`, `Password` / `PWD`, ...).
//! - Unquoted values run to the next `;` and are trimmed.
//! - Values may be quoted with `"` or `'` (a doubled quote escapes itself) or
//!   wrapped in ODBC braces `{...}` (`}}` escapes `}`).
//! - Empty segments (`;;`) are ignored. For repeated keys the last one wins.
//!
//! Serialization is canonical: `key=value` joined with `;`, no trailing `;`,
//! and values are double-quoted only when they would not survive a re-parse
//! otherwise. `parse(serialize(x)) == x` for every parsed `x`, which is what
//! makes [`redact`] idempotent.

use std::fmt;
use std::str::FromStr;

use crate::error::{GatewayError, Result};
use crate::profile::{AuthSpec, ConnectionProfile};

/// Replacement value for secrets
pub const MASK: &str = "***";

/// Canonical key names emitted by [`build`] and the synonyms accepted on parse
pub mod keys {
    pub const SERVER: &str = "Server";
    pub const DATABASE: &str = "Database";
    pub const USER_ID: &str = "User ID";
    pub const PASSWORD: &str = "Password";
    pub const INTEGRATED_SECURITY: &str = "Integrated Security";
    pub const ENCRYPT: &str = "Encrypt";
    pub const TRUST_SERVER_CERTIFICATE: &str = "TrustServerCertificate";

    pub(crate) const SERVER_SYNONYMS: &[&str] =
        &["server", "data source", "address", "addr", "network address"];
    pub(crate) const DATABASE_SYNONYMS: &[&str] = &["database", "initial catalog"];
    pub(crate) const USER_SYNONYMS: &[&str] = &["user id", "uid", "user", "username"];
    pub(crate) const PASSWORD_SYNONYMS: &[&str] = &["password", "pwd"];
    pub(crate) const INTEGRATED_SYNONYMS: &[&str] =
        &["integrated security", "trusted_connection"];
    pub(crate) const ENCRYPT_SYNONYMS: &[&str] = &["encrypt"];
    pub(crate) const TRUST_SYNONYMS: &[&str] =
        &["trustservercertificate", "trust server certificate"];
    pub(crate) const APPLICATION_NAME_SYNONYMS: &[&str] = &["application name", "app"];
    pub(crate) const CONNECT_TIMEOUT_SYNONYMS: &[&str] =
        &["connect timeout", "connection timeout", "timeout"];
}

/// Build a driver connection string from a profile
///
/// A non-blank raw override is returned verbatim (trimmed). Otherwise the
/// string is assembled from the structured fields:
/// `Server`, `Database`, either `Integrated Security=True` or
/// `User ID`/`Password`, then `Encrypt` and `TrustServerCertificate`.
///
/// Pure transform, never fails.
#[must_use]
pub fn build(profile: &ConnectionProfile) -> String {
    if let Some(raw) = profile.raw_override() {
        return raw.to_string();
    }

    let mut cs = ConnectionString::default();
    cs.push(keys::SERVER, profile.effective_server());
    cs.push(keys::DATABASE, profile.effective_database());

    match &profile.auth {
        AuthSpec::Windows => cs.push(keys::INTEGRATED_SECURITY, "True"),
        AuthSpec::SqlLogin { user, password } => {
            cs.push(keys::USER_ID, user);
            cs.push(keys::PASSWORD, password);
        }
    }

    cs.push(keys::ENCRYPT, bool_text(profile.effective_encrypt()));
    cs.push(keys::TRUST_SERVER_CERTIFICATE, bool_text(profile.effective_trust_server_certificate()));

    cs.to_string()
}

/// Mask every non-empty password in a connection string
///
/// Idempotent. Input that cannot be parsed is returned unchanged.
#[must_use]
pub fn redact(connection_string: &str) -> String {
    match ConnectionString::parse(connection_string) {
        Ok(parsed) => parsed.redacted().to_string(),
        Err(_) => connection_string.to_string(),
    }
}

const fn bool_text(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// Parsed connection string: ordered `(key, value)` pairs
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionString {
    entries: Vec<(String, String)>,
}

impl ConnectionString {
    /// Parse a connection string
    ///
    /// # Errors
    /// `MalformedConnectionString` for a segment without `=`, an empty key, an
    /// unterminated quote or brace, or text trailing a quoted value. Messages
    /// name the 1-based segment position, never segment text.
    pub fn parse(input: &str) -> Result<Self> {
        let mut entries = Vec::new();
        let mut rest = input;
        let mut segment = 0;

        loop {
            rest = rest.trim_start_matches(|c: char| c == ';' || c.is_whitespace());
            if rest.is_empty() {
                break;
            }
            segment += 1;

            let segment_end = rest.find(';').unwrap_or(rest.len());
            let eq = rest[..segment_end].find('=').ok_or_else(|| {
                GatewayError::malformed_connection_string(format!("segment {segment} has no '='"))
            })?;

            let key = rest[..eq].trim();
            if key.is_empty() {
                return Err(GatewayError::malformed_connection_string(format!(
                    "segment {segment} has an empty key"
                )));
            }

            let (value, remaining) = parse_value(&rest[eq + 1..], segment)?;
            entries.push((key.to_string(), value));
            rest = remaining;
        }

        Ok(Self { entries })
    }

    /// Append a pair
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// All pairs in order
    #[must_use]
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Whether no pairs were parsed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Value for the first matching synonym, last occurrence winning
    #[must_use]
    pub fn get(&self, synonyms: &[&str]) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(key, _)| synonyms.iter().any(|s| key.eq_ignore_ascii_case(s)))
            .map(|(_, value)| value.as_str())
    }

    /// Copy with every non-empty password replaced by [`MASK`]
    #[must_use]
    pub fn redacted(&self) -> Self {
        let entries = self
            .entries
            .iter()
            .map(|(key, value)| {
                if is_password_key(key) && !value.is_empty() {
                    (key.clone(), MASK.to_string())
                } else {
                    (key.clone(), value.clone())
                }
            })
            .collect();
        Self { entries }
    }

    /// `Server` / `Data Source`
    #[must_use]
    pub fn server(&self) -> Option<&str> {
        self.get(keys::SERVER_SYNONYMS)
    }

    /// `Database` / `Initial Catalog`
    #[must_use]
    pub fn database(&self) -> Option<&str> {
        self.get(keys::DATABASE_SYNONYMS)
    }

    /// `User ID` / `UID`
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.get(keys::USER_SYNONYMS)
    }

    /// `Password` / `PWD`
    ///
    /// WARNING: Sensitive data, only for handing to the driver
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.get(keys::PASSWORD_SYNONYMS)
    }

    /// `Application Name`
    #[must_use]
    pub fn application_name(&self) -> Option<&str> {
        self.get(keys::APPLICATION_NAME_SYNONYMS)
    }

    /// `Integrated Security` / `Trusted_Connection` (`SSPI` counts as true)
    pub fn integrated_security(&self) -> Result<bool> {
        match self.get(keys::INTEGRATED_SYNONYMS) {
            Some(value) if value.eq_ignore_ascii_case("sspi") => Ok(true),
            Some(value) => parse_bool(keys::INTEGRATED_SECURITY, value),
            None => Ok(false),
        }
    }

    /// `Encrypt`, false when absent (`Strict`/`Mandatory` count as true, `Optional` as false)
    pub fn encrypt(&self) -> Result<bool> {
        match self.get(keys::ENCRYPT_SYNONYMS) {
            Some(value)
                if value.eq_ignore_ascii_case("strict")
                    || value.eq_ignore_ascii_case("mandatory") =>
            {
                Ok(true)
            }
            Some(value) if value.eq_ignore_ascii_case("optional") => Ok(false),
            Some(value) => parse_bool(keys::ENCRYPT, value),
            None => Ok(false),
        }
    }

    /// `TrustServerCertificate`, false when absent
    pub fn trust_server_certificate(&self) -> Result<bool> {
        self.get(keys::TRUST_SYNONYMS)
            .map_or(Ok(false), |value| parse_bool(keys::TRUST_SERVER_CERTIFICATE, value))
    }

    /// `Connect Timeout` in seconds, if set
    pub fn connect_timeout_secs(&self) -> Result<Option<u64>> {
        self.get(keys::CONNECT_TIMEOUT_SYNONYMS)
            .map(|value| {
                value.trim().parse::<u64>().map_err(|_| {
                    GatewayError::malformed_connection_string(format!(
                        "Connect Timeout must be a whole number of seconds, got '{value}'"
                    ))
                })
            })
            .transpose()
    }
}

impl FromStr for ConnectionString {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (key, value)) in self.entries.iter().enumerate() {
            if idx > 0 {
                f.write_str(";")?;
            }
            write!(f, "{key}=")?;
            if needs_quoting(value) {
                write!(f, "\"{}\"", value.replace('"', "\"\""))?;
            } else {
                f.write_str(value)?;
            }
        }
        Ok(())
    }
}

// Debug goes through the redacted form so a stray `{:?}` never leaks a password.
impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConnectionString").field(&self.redacted().to_string()).finish()
    }
}

fn is_password_key(key: &str) -> bool {
    keys::PASSWORD_SYNONYMS.iter().any(|s| key.eq_ignore_ascii_case(s))
}

fn needs_quoting(value: &str) -> bool {
    value.contains(';')
        || value.starts_with(['"', '\'', '{'])
        || value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace)
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => Err(GatewayError::malformed_connection_string(format!(
            "{key} must be a boolean, got '{other}'"
        ))),
    }
}

/// Parse one value; returns it and the input after the terminating `;` (or end)
fn parse_value<'a>(input: &'a str, segment: usize) -> Result<(String, &'a str)> {
    let trimmed = input.trim_start();

    let (close, mut chars) = match trimmed.chars().next() {
        Some(q @ ('"' | '\'')) => (q, trimmed[1..].char_indices()),
        Some('{') => ('}', trimmed[1..].char_indices()),
        _ => {
            let end = input.find(';').unwrap_or(input.len());
            return Ok((input[..end].trim().to_string(), &input[end..]));
        }
    };

    let body = &trimmed[1..];
    let mut value = String::new();
    while let Some((idx, c)) = chars.next() {
        if c != close {
            value.push(c);
            continue;
        }
        if body[idx + c.len_utf8()..].starts_with(close) {
            value.push(close);
            chars.next();
            continue;
        }

        let after = body[idx + c.len_utf8()..].trim_start();
        if !after.is_empty() && !after.starts_with(';') {
            return Err(GatewayError::malformed_connection_string(format!(
                "unexpected text after quoted value in segment {segment}"
            )));
        }
        return Ok((value, after));
    }

    Err(GatewayError::malformed_connection_string(format!(
        "unterminated quoted value in segment {segment}"
    )))
}
