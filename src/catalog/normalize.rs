//! Turn detected content plus the user's draft into a canonical `MetadataRecord`.
//! Required fields are not checked here; the store rejects empty `table_name`/`producer`.

use std::fs;
use std::path::Path;

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::catalog::detect::{detect, FormatTag};
use crate::catalog::infer::{infer_columns, typed_value};
use crate::catalog::record::{
    ColumnSpec, DataSample, MetadataRecord, RecordDraft, TIMESTAMP_FORMAT,
};
use crate::catalog::table::{parse_delimited, read_spreadsheet, sniff_delimiter, Table};
use crate::error::{CatalogError, Result};

const SUBMISSION: &str = "submitted content";

pub fn normalize(raw_content: &str, format: FormatTag, draft: &RecordDraft) -> Result<MetadataRecord> {
    normalize_at(raw_content, format, draft, Local::now().naive_local())
}

/// `normalize` with an explicit clock; `last_updated` is always overwritten with `now`.
pub fn normalize_at(
    raw_content: &str,
    format: FormatTag,
    draft: &RecordDraft,
    now: NaiveDateTime,
) -> Result<MetadataRecord> {
    let mut record = record_from_content(raw_content, format)?;
    apply_draft(&mut record, draft);
    stamp(&mut record, now);
    Ok(record)
}

fn record_from_content(raw_content: &str, format: FormatTag) -> Result<MetadataRecord> {
    match format {
        FormatTag::Json => record_from_json(raw_content),
        FormatTag::Csv | FormatTag::Tsv => {
            parse_table(raw_content, format).map(|table| record_from_table(&table))
        }
        FormatTag::Text => Ok(record_from_text(raw_content)),
    }
}

/// CSV uses the sniffed separator (comma when sniffing is inconclusive), TSV always tabs.
fn parse_table(raw_content: &str, format: FormatTag) -> Result<Table> {
    let trimmed = raw_content.trim();
    let delimiter = match format {
        FormatTag::Tsv => b'\t',
        _ => sniff_delimiter(trimmed).unwrap_or(b','),
    };
    parse_delimited(trimmed, delimiter)
}

/// Manual entry: no pasted content, only the form fields.
pub fn normalize_manual(draft: &RecordDraft) -> MetadataRecord {
    normalize_manual_at(draft, Local::now().naive_local())
}

pub fn normalize_manual_at(draft: &RecordDraft, now: NaiveDateTime) -> MetadataRecord {
    let mut record = MetadataRecord::default();
    apply_draft(&mut record, draft);
    stamp(&mut record, now);
    record
}

fn stamp(record: &mut MetadataRecord, now: NaiveDateTime) {
    record.last_updated = now.format(TIMESTAMP_FORMAT).to_string();
}

/// Only a syntax error fails; any parsed value becomes a record.
fn record_from_json(raw_content: &str) -> Result<MetadataRecord> {
    let value: Value = serde_json::from_str(raw_content.trim())
        .map_err(|err| CatalogError::parse(SUBMISSION, err))?;
    Ok(match value {
        Value::Object(map) => MetadataRecord::from_map(map),
        other => MetadataRecord {
            data_sample: DataSample::from_value(other),
            ..MetadataRecord::default()
        },
    })
}

/// Columns from inference, rows as mappings with values typed by their column.
fn record_from_table(table: &Table) -> MetadataRecord {
    let columns = infer_columns(table);
    let rows = table
        .rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .enumerate()
                .map(|(index, column)| {
                    let cell = row.get(index).and_then(|cell| cell.as_deref());
                    (column.name.clone(), typed_value(cell, column.column_type))
                })
                .collect::<Map<String, Value>>()
        })
        .collect();
    MetadataRecord {
        columns,
        data_sample: Some(DataSample::Rows(rows)),
        ..MetadataRecord::default()
    }
}

fn record_from_text(raw_content: &str) -> MetadataRecord {
    let lines: Vec<Value> = raw_content
        .trim()
        .lines()
        .map(|line| Value::String(line.to_string()))
        .collect();
    MetadataRecord {
        data_sample: Some(DataSample::Single(single_entry("content", Value::Array(lines)))),
        ..MetadataRecord::default()
    }
}

fn single_entry(key: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    map
}

/// User-entered fields win over anything carried by the content.
fn apply_draft(record: &mut MetadataRecord, draft: &RecordDraft) {
    overwrite_if_given(&mut record.table_name, &draft.table_name);
    overwrite_if_given(&mut record.producer, &draft.producer);
    overwrite_if_given(&mut record.title, &draft.title);
    overwrite_if_given(&mut record.description, &draft.description);
    if record.title.trim().is_empty() {
        record.title = record.table_name.clone();
    }

    for field in &draft.custom_fields {
        record
            .custom_fields
            .insert(field.name.clone(), field.value.clone());
    }
    merge_columns(&mut record.columns, &draft.columns);
    record.drop_shadowed_extra();
}

fn overwrite_if_given(target: &mut String, given: &str) {
    let given = given.trim();
    if !given.is_empty() {
        *target = given.to_string();
    }
}

/// Draft columns override the type (and non-empty description) of same-named columns;
/// unknown names are appended.
fn merge_columns(columns: &mut Vec<ColumnSpec>, overrides: &[ColumnSpec]) {
    for spec in overrides {
        match columns.iter_mut().find(|c| c.name == spec.name) {
            Some(existing) => {
                existing.column_type = spec.column_type;
                if !spec.description.trim().is_empty() {
                    existing.description = spec.description.clone();
                }
            }
            None => columns.push(spec.clone()),
        }
    }
}

/// Content of an uploaded file, ready for normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Upload {
    Text { content: String, format: FormatTag },
    Table(Table),
}

/// Pick the format from the extension; `.txt` goes through the detector.
pub fn load_upload(path: &Path) -> Result<Upload> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let format = match extension.as_str() {
        "xlsx" | "xlsm" | "xls" | "ods" => return read_spreadsheet(path).map(Upload::Table),
        "json" => Some(FormatTag::Json),
        "csv" => Some(FormatTag::Csv),
        "tsv" => Some(FormatTag::Tsv),
        "txt" => None,
        other => {
            return Err(CatalogError::parse(
                path.display().to_string(),
                format!("unsupported file type '{other}'"),
            ))
        }
    };

    let content = fs::read_to_string(path).map_err(|err| CatalogError::io(path, err))?;
    let format = format.unwrap_or_else(|| detect(&content));
    Ok(Upload::Text { content, format })
}

pub fn normalize_upload(upload: &Upload, draft: &RecordDraft) -> Result<MetadataRecord> {
    normalize_upload_at(upload, draft, Local::now().naive_local())
}

pub fn normalize_upload_at(
    upload: &Upload,
    draft: &RecordDraft,
    now: NaiveDateTime,
) -> Result<MetadataRecord> {
    match upload {
        Upload::Text { content, format } => normalize_at(content, *format, draft, now),
        Upload::Table(table) => {
            let mut record = record_from_table(table);
            apply_draft(&mut record, draft);
            stamp(&mut record, now);
            Ok(record)
        }
    }
}

/// Detection plus inferred columns, for previews before saving.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inspection {
    pub format: FormatTag,
    pub columns: Vec<ColumnSpec>,
    pub row_count: usize,
}

pub fn inspect(content: &str) -> Result<Inspection> {
    let format = detect(content);
    Ok(match format {
        FormatTag::Csv | FormatTag::Tsv => {
            let table = parse_table(content, format)?;
            Inspection {
                format,
                columns: infer_columns(&table),
                row_count: table.rows.len(),
            }
        }
        FormatTag::Json | FormatTag::Text => {
            let record = record_from_content(content, format)?;
            Inspection {
                format,
                row_count: record.sample_len(),
                columns: record.columns,
            }
        }
    })
}
