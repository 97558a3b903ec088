//! Catalog Listing
//!
//! Lists databases, tables and views by running fixed catalog queries through
//! the regular execute/normalize pipeline and projecting the first column to
//! strings.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engine::SqlBackend;
use crate::error::Result;
use crate::executor::QueryExecutor;
use crate::normalize::{normalize, NormalizeOptions, TabularResult};
use crate::session::SessionState;

/// What to list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    /// User databases (system databases excluded), ordered by name
    Databases,
    /// `schema.table` for every table in the current database
    Tables,
    /// `schema.view` for every view in the current database
    Views,
}

impl CatalogKind {
    pub const ALL: [Self; 3] = [Self::Databases, Self::Tables, Self::Views];

    /// The canned catalog query
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Databases => "SELECT name FROM sys.databases WHERE database_id > 4 ORDER BY name;",
            Self::Tables => {
                "SELECT s.name + '.' + t.name FROM sys.tables t JOIN sys.schemas s ON t.schema_id = s.schema_id;"
            }
            Self::Views => {
                "SELECT s.name + '.' + v.name FROM sys.views v JOIN sys.schemas s ON v.schema_id = s.schema_id;"
            }
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Databases => "databases",
            Self::Tables => "tables",
            Self::Views => "views",
        }
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run the catalog query for `kind` on the session snapshot
///
/// Errors from the executor are forwarded unchanged.
pub async fn list<B: SqlBackend>(
    executor: &QueryExecutor<B>,
    state: &SessionState,
    kind: CatalogKind,
) -> Result<Vec<String>> {
    let raw = executor.execute(state, kind.sql()).await?;
    let items = first_column(&normalize(raw, NormalizeOptions::default()));
    tracing::debug!(%kind, count = items.len(), "catalog listed");
    Ok(items)
}

/// String-coerced first column, skipping nulls
#[must_use]
pub fn first_column(result: &TabularResult) -> Vec<String> {
    result.rows.iter().filter_map(|row| row.first().and_then(|cell| cell.to_text())).collect()
}
