//! SQL Backend Trait and Raw Result Types
//!
//! The database engine is an opaque capability: hand it a connection string and
//! SQL text, get back raw columns and rows, or an error. Everything above this
//! module is engine-agnostic.
//!
//! # Stateless Design
//! Backends hold no live connections. Each call opens a connection, uses it,
//! and releases it before returning, on success and on every error path.
//!
//! # Raw values
//! [`RawValue`] mirrors the backend's own type system one variant per wire
//! type. Mapping those onto the canonical cell shape is the normalizer's job,
//! keyed by [`RawValue::type_id`].

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use std::future::Future;
use uuid::Uuid;

use crate::connection::ConnectionString;
use crate::error::Result;

#[cfg(feature = "sqlserver")]
pub mod sqlserver;

/// Column metadata as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawColumn {
    /// Column name (may be empty for unnamed expressions, may repeat)
    pub name: String,

    /// Backend type identifier (e.g. `int`, `nvarchar`)
    pub type_name: String,
}

impl RawColumn {
    /// Create column metadata
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self { name: name.into(), type_name: type_name.into() }
    }
}

/// One backend-typed cell
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// The backend's absent-value sentinel
    Null,
    Bit(bool),
    TinyInt(u8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Real(f32),
    Float(f64),
    /// Exact decimal: `value * 10^-scale`
    Decimal { value: i128, scale: u8 },
    NVarChar(String),
    VarBinary(Vec<u8>),
    UniqueIdentifier(Uuid),
    Xml(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    SmallDateTime(NaiveDateTime),
    DateTime2(NaiveDateTime),
    /// Keeps the stored offset, not just the instant
    DateTimeOffset(DateTime<FixedOffset>),
    /// A value the backend adapter has no dedicated variant for
    Unrecognized { type_name: String, display: String },
}

impl RawValue {
    /// Backend type identifier used to pick a conversion
    #[must_use]
    pub fn type_id(&self) -> &str {
        match self {
            Self::Null => "null",
            Self::Bit(_) => "bit",
            Self::TinyInt(_) => "tinyint",
            Self::SmallInt(_) => "smallint",
            Self::Int(_) => "int",
            Self::BigInt(_) => "bigint",
            Self::Real(_) => "real",
            Self::Float(_) => "float",
            Self::Decimal { .. } => "decimal",
            Self::NVarChar(_) => "nvarchar",
            Self::VarBinary(_) => "varbinary",
            Self::UniqueIdentifier(_) => "uniqueidentifier",
            Self::Xml(_) => "xml",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::DateTime(_) => "datetime",
            Self::SmallDateTime(_) => "smalldatetime",
            Self::DateTime2(_) => "datetime2",
            Self::DateTimeOffset(_) => "datetimeoffset",
            Self::Unrecognized { type_name, .. } => type_name,
        }
    }
}

/// Columns plus rows of the first result set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResultSet {
    pub columns: Vec<RawColumn>,
    pub rows: Vec<Vec<RawValue>>,
}

/// SQL backend trait
///
/// Implementations must release the connection on every exit path and must
/// not retry or impose their own timeouts beyond the driver's.
pub trait SqlBackend: Send + Sync {
    /// Short engine name for envelopes and logs
    fn name(&self) -> &'static str;

    /// Open and immediately release a connection
    ///
    /// Fails with `Connectivity` when the server is unreachable or the login
    /// is rejected.
    fn probe(
        &self,
        connection: &ConnectionString,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Open a connection, run `sql` verbatim, read the first result set, release
    ///
    /// Connection/login failures are `Connectivity`; anything the server says
    /// about the SQL itself is `Execution`.
    fn execute(
        &self,
        connection: &ConnectionString,
        sql: &str,
    ) -> impl Future<Output = Result<RawResultSet>> + Send;
}
