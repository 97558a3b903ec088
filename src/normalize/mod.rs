//! Result Normalization
//!
//! Turns backend-typed result sets into [`TabularResult`]s whose cells are one
//! of string, integer, float, boolean or null, safe to put on the wire as JSON.
//!
//! # Conversion table
//! Each backend type identifier maps to one [`Conversion`]:
//!
//! | type ids | conversion | cell |
//! |---|---|---|
//! | `bit` | Boolean | boolean |
//! | `tinyint` `smallint` `int` `bigint` | Integer | integer |
//! | `real` `float` | Float | float (non-finite as string) |
//! | `decimal` | Decimal | integer when scale 0 and in range, else exact string |
//! | `nvarchar` `xml` `uniqueidentifier` | Text | string |
//! | `varbinary` | Binary | base64 string |
//! | `date` `time` `datetime` `smalldatetime` `datetime2` `datetimeoffset` | Temporal | ISO-8601 string |
//!
//! Identifiers not in the table are stringified. Backend NULL is always `null`.
//!
//! # Large integers
//! `i64` survives JSON untouched, but JavaScript numbers lose precision beyond
//! 2^53 - 1. With [`NormalizeOptions::large_integers_as_strings`] set, integers
//! outside that range are rendered as strings instead.

use base64::Engine as _;
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::engine::{RawResultSet, RawValue};

/// Largest integer a JavaScript number holds exactly
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

/// One normalized cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Cell {
    /// String coercion; `None` for null
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Boolean(b) => Some(b.to_string()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::String(s) => Some(s.clone()),
        }
    }
}

/// Normalized first result set
///
/// Every row holds exactly `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabularResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl TabularResult {
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Knobs for the conversion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Render integers outside ±(2^53 - 1) as strings
    pub large_integers_as_strings: bool,
}

/// How a backend type becomes a [`Cell`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Boolean,
    Integer,
    Float,
    Decimal,
    Text,
    Binary,
    Temporal,
    Stringify,
}

const CONVERSIONS: &[(&str, Conversion)] = &[
    ("bit", Conversion::Boolean),
    ("tinyint", Conversion::Integer),
    ("smallint", Conversion::Integer),
    ("int", Conversion::Integer),
    ("bigint", Conversion::Integer),
    ("real", Conversion::Float),
    ("float", Conversion::Float),
    ("decimal", Conversion::Decimal),
    ("nvarchar", Conversion::Text),
    ("xml", Conversion::Text),
    ("uniqueidentifier", Conversion::Text),
    ("varbinary", Conversion::Binary),
    ("date", Conversion::Temporal),
    ("time", Conversion::Temporal),
    ("datetime", Conversion::Temporal),
    ("smalldatetime", Conversion::Temporal),
    ("datetime2", Conversion::Temporal),
    ("datetimeoffset", Conversion::Temporal),
];

/// Look up the conversion for a backend type identifier
#[must_use]
pub fn conversion_for(type_id: &str) -> Conversion {
    CONVERSIONS
        .iter()
        .find(|(id, _)| *id == type_id)
        .map_or(Conversion::Stringify, |(_, conversion)| *conversion)
}

/// Normalize a raw result set
///
/// Short rows are padded with `null`, long rows truncated, so every row
/// matches the column count.
#[must_use]
pub fn normalize(raw: RawResultSet, options: NormalizeOptions) -> TabularResult {
    let width = raw.columns.len();
    let columns = raw.columns.into_iter().map(|col| col.name).collect();

    let rows = raw
        .rows
        .into_iter()
        .map(|row| {
            let mut cells: Vec<Cell> =
                row.iter().take(width).map(|value| convert_cell(value, options)).collect();
            cells.resize(width, Cell::Null);
            cells
        })
        .collect();

    TabularResult { columns, rows }
}

/// Convert one backend value
#[must_use]
pub fn convert_cell(value: &RawValue, options: NormalizeOptions) -> Cell {
    if matches!(value, RawValue::Null) {
        return Cell::Null;
    }

    match (conversion_for(value.type_id()), value) {
        (Conversion::Boolean, RawValue::Bit(b)) => Cell::Boolean(*b),
        (Conversion::Integer, RawValue::TinyInt(v)) => integer(i64::from(*v), options),
        (Conversion::Integer, RawValue::SmallInt(v)) => integer(i64::from(*v), options),
        (Conversion::Integer, RawValue::Int(v)) => integer(i64::from(*v), options),
        (Conversion::Integer, RawValue::BigInt(v)) => integer(*v, options),
        (Conversion::Float, RawValue::Real(v)) => float(widen_f32(*v)),
        (Conversion::Float, RawValue::Float(v)) => float(*v),
        (Conversion::Decimal, RawValue::Decimal { value, scale }) => {
            match (*scale, i64::try_from(*value)) {
                (0, Ok(v)) => integer(v, options),
                _ => Cell::String(decimal_string(*value, *scale)),
            }
        }
        (Conversion::Binary, RawValue::VarBinary(bytes)) => {
            Cell::String(base64::engine::general_purpose::STANDARD.encode(bytes))
        }
        _ => Cell::String(stringify(value)),
    }
}

fn integer(value: i64, options: NormalizeOptions) -> Cell {
    if options.large_integers_as_strings && !(-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&value)
    {
        Cell::String(value.to_string())
    } else {
        Cell::Integer(value)
    }
}

fn float(value: f64) -> Cell {
    if value.is_finite() {
        Cell::Float(value)
    } else {
        Cell::String(value.to_string())
    }
}

// `f64::from(0.1f32)` is 0.10000000149011612; go through the shortest decimal instead.
fn widen_f32(value: f32) -> f64 {
    value.to_string().parse().unwrap_or_else(|_| f64::from(value))
}

/// Exact decimal text for `value * 10^-scale`
fn decimal_string(value: i128, scale: u8) -> String {
    if scale == 0 {
        return value.to_string();
    }

    let scale = usize::from(scale);
    let digits = value.unsigned_abs().to_string();
    let digits = if digits.len() <= scale {
        format!("{}{digits}", "0".repeat(scale + 1 - digits.len()))
    } else {
        digits
    };
    let (whole, fraction) = digits.split_at(digits.len() - scale);
    let sign = if value < 0 { "-" } else { "" };
    format!("{sign}{whole}.{fraction}")
}

/// Display form of any backend value
fn stringify(value: &RawValue) -> String {
    match value {
        RawValue::Null => String::new(),
        RawValue::Bit(b) => b.to_string(),
        RawValue::TinyInt(v) => v.to_string(),
        RawValue::SmallInt(v) => v.to_string(),
        RawValue::Int(v) => v.to_string(),
        RawValue::BigInt(v) => v.to_string(),
        RawValue::Real(v) => v.to_string(),
        RawValue::Float(v) => v.to_string(),
        RawValue::Decimal { value, scale } => decimal_string(*value, *scale),
        RawValue::NVarChar(s) | RawValue::Xml(s) => s.clone(),
        RawValue::VarBinary(bytes) => base64::engine::general_purpose::STANDARD.encode(bytes),
        RawValue::UniqueIdentifier(id) => id.to_string(),
        RawValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        RawValue::Time(t) => t.format("%H:%M:%S%.f").to_string(),
        RawValue::DateTime(dt) | RawValue::SmallDateTime(dt) | RawValue::DateTime2(dt) => {
            dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
        }
        RawValue::DateTimeOffset(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, false),
        RawValue::Unrecognized { display, .. } => display.clone(),
    }
}
