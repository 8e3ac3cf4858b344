//! Download representations of a record: pretty JSON, CSV of the sample, flattened object.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::catalog::record::{DataSample, MetadataRecord};
use crate::error::{CatalogError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Flat,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Flat => "flat",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Json | Self::Flat => "application/json",
            Self::Csv => "text/csv; charset=utf-8",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "flat" | "flattened" => Ok(Self::Flat),
            other => Err(format!("unknown export format '{other}' (expected json, csv or flat)")),
        }
    }
}

pub fn export_record(record: &MetadataRecord, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => serde_json::to_string_pretty(record)
            .map_err(|err| CatalogError::parse("json export", err)),
        ExportFormat::Flat => serde_json::to_string_pretty(&flatten_record(record))
            .map_err(|err| CatalogError::parse("flat export", err)),
        ExportFormat::Csv => sample_csv(record),
    }
}

/// Dotted keys in serialization order; list indices become path segments.
pub fn flatten_record(record: &MetadataRecord) -> Map<String, Value> {
    let mut out = Map::new();
    match serde_json::to_value(record) {
        Ok(value) => flatten_value(&value, "", &mut out),
        Err(_) => {
            out.insert("table_name".to_string(), Value::from(record.table_name.clone()));
        }
    }
    out
}

pub fn flatten_value(value: &Value, prefix: &str, out: &mut Map<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_value(child, &join_key(prefix, key), out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (index, child) in items.iter().enumerate() {
                flatten_value(child, &join_key(prefix, &index.to_string()), out);
            }
        }
        leaf => {
            out.insert(prefix.to_string(), leaf.clone());
        }
    }
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Sample rows as CSV with the union of keys in first-seen order. Records without a row
/// sample export the flattened record as a single row.
fn sample_csv(record: &MetadataRecord) -> Result<String> {
    let rows: Vec<Map<String, Value>> = match &record.data_sample {
        Some(DataSample::Rows(rows)) if !rows.is_empty() => rows.clone(),
        _ => vec![flatten_record(record)],
    };

    let mut headers: Vec<&str> = Vec::new();
    for row in &rows {
        for key in row.keys() {
            if !headers.contains(&key.as_str()) {
                headers.push(key);
            }
        }
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(&headers)
        .map_err(|err| CatalogError::parse("csv export", err))?;
    for row in &rows {
        let cells: Vec<String> = headers
            .iter()
            .map(|key| row.get(*key).map(cell_text).unwrap_or_default())
            .collect();
        writer
            .write_record(&cells)
            .map_err(|err| CatalogError::parse("csv export", err))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| CatalogError::parse("csv export", err))?;
    String::from_utf8(bytes).map_err(|err| CatalogError::parse("csv export", err))
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
