//! Per-column semantic type inference over raw cell text.
//!
//! Rules are checked top-down and the first one satisfied by every non-missing value wins:
//! integer, numeric, timestamp, boolean, then varchar. A column with no values at all
//! satisfies the first rule vacuously and comes out as `integer`.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Number, Value};

use crate::catalog::record::{ColumnSpec, ColumnType};
use crate::catalog::table::{is_missing, Table};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y", "%d.%m.%Y"];

const TRUE_LITERALS: &[&str] = &["true", "t", "yes", "y"];
const FALSE_LITERALS: &[&str] = &["false", "f", "no", "n"];

pub fn infer_columns(table: &Table) -> Vec<ColumnSpec> {
    table
        .headers
        .iter()
        .enumerate()
        .map(|(index, name)| ColumnSpec::new(name.clone(), infer_cell_type(table.column(index))))
        .collect()
}

pub fn infer_cell_type<'a, I>(values: I) -> ColumnType
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let present: Vec<&str> = values
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|value| !is_missing(value))
        .collect();

    if present.iter().all(|v| is_integer(v)) {
        ColumnType::Integer
    } else if present.iter().all(|v| is_numeric(v)) {
        ColumnType::Numeric
    } else if present.iter().all(|v| is_timestamp(v)) {
        ColumnType::Timestamp
    } else if present.iter().all(|v| parse_bool(v).is_some()) {
        ColumnType::Boolean
    } else {
        ColumnType::Varchar
    }
}

pub fn is_integer(value: &str) -> bool {
    value.parse::<i64>().is_ok()
}

pub fn is_numeric(value: &str) -> bool {
    value.parse::<f64>().is_ok_and(f64::is_finite)
}

pub fn is_timestamp(value: &str) -> bool {
    DateTime::parse_from_rfc3339(value).is_ok()
        || DATETIME_FORMATS
            .iter()
            .any(|format| NaiveDateTime::parse_from_str(value, format).is_ok())
        || DATE_FORMATS
            .iter()
            .any(|format| NaiveDate::parse_from_str(value, format).is_ok())
}

pub fn parse_bool(value: &str) -> Option<bool> {
    let lowered = value.to_ascii_lowercase();
    if TRUE_LITERALS.contains(&lowered.as_str()) {
        Some(true)
    } else if FALSE_LITERALS.contains(&lowered.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// JSON value for a cell of a column already inferred as `column_type`.
pub fn typed_value(cell: Option<&str>, column_type: ColumnType) -> Value {
    let Some(raw) = cell.map(str::trim).filter(|v| !is_missing(v)) else {
        return Value::Null;
    };
    match column_type {
        ColumnType::Integer => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        ColumnType::Numeric => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        ColumnType::Boolean => parse_bool(raw)
            .map(Value::Bool)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        _ => Value::String(raw.to_string()),
    }
}
