//! Writes records to `<root>/<producer>/<table_name>.json` plus a flattened `.txt` sibling.
//!
//! Saving the same `(producer, table_name)` twice overwrites the first file. Version-control
//! sync runs after the write and its failure is reported, never rolled back.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::catalog::export::flatten_record;
use crate::catalog::index::parse_record_json;
use crate::catalog::record::MetadataRecord;
use crate::catalog::sync::{sync_from_config, NoSync, VersionSync};
use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveOutcome {
    /// The record as written: trimmed key, directory-safe producer, capped sample.
    pub record: MetadataRecord,
    pub json_path: PathBuf,
    pub text_path: PathBuf,
    /// A previous record with the same key was overwritten.
    pub replaced: bool,
    pub sync_warning: Option<String>,
}

pub struct CatalogStore {
    root: PathBuf,
    sample_cap: usize,
    sync: Box<dyn VersionSync>,
}

impl CatalogStore {
    pub fn new(root: impl Into<PathBuf>, sample_cap: usize) -> Self {
        CatalogStore {
            root: root.into(),
            sample_cap,
            sync: Box::new(NoSync),
        }
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(&config.storage_root, config.sample_cap).with_sync(sync_from_config(&config.sync))
    }

    pub fn with_sync(mut self, sync: Box<dyn VersionSync>) -> Self {
        self.sync = sync;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn record_path(&self, producer: &str, table_name: &str) -> PathBuf {
        self.root
            .join(sanitize_dir_name(producer))
            .join(format!("{}.json", sanitize_file_name(table_name)))
    }

    /// Validate, cap the sample, write both files, then sync.
    pub fn save(&self, record: &MetadataRecord) -> Result<SaveOutcome> {
        validate_required(record)?;

        let mut record = record.clone();
        record.table_name = record.table_name.trim().to_string();
        record.producer = sanitize_dir_name(&record.producer);
        record.truncate_sample(self.sample_cap);

        let json_path = self.record_path(&record.producer, &record.table_name);
        let text_path = json_path.with_extension("txt");
        if let Some(dir) = json_path.parent() {
            fs::create_dir_all(dir).map_err(|err| CatalogError::io(dir, err))?;
        }
        let replaced = json_path.exists();

        let body = serde_json::to_string_pretty(&record)
            .map_err(|err| CatalogError::parse(json_path.display().to_string(), err))?;
        fs::write(&json_path, body).map_err(|err| CatalogError::io(&json_path, err))?;
        fs::write(&text_path, render_text(&record))
            .map_err(|err| CatalogError::io(&text_path, err))?;
        info!(path = %json_path.display(), replaced, "record saved");

        let changed: Vec<PathBuf> = [&json_path, &text_path]
            .into_iter()
            .map(|p| p.strip_prefix(&self.root).unwrap_or(p.as_path()).to_path_buf())
            .collect();
        let message = format!("Update metadata {}/{}", record.producer, record.table_name);
        let sync_warning = match self.sync.sync(&self.root, &changed, &message) {
            Ok(()) => None,
            Err(err) => {
                warn!(sync = self.sync.name(), error = %err, "record saved locally but sync failed");
                Some(err.to_string())
            }
        };

        Ok(SaveOutcome {
            record,
            json_path,
            text_path,
            replaced,
            sync_warning,
        })
    }

    pub fn load_record(&self, producer: &str, table_name: &str) -> Result<MetadataRecord> {
        let path = self.record_path(producer, table_name);
        if !path.is_file() {
            return Err(CatalogError::NotFound {
                producer: producer.to_string(),
                table_name: table_name.to_string(),
            });
        }
        let raw = fs::read_to_string(&path).map_err(|err| CatalogError::io(&path, err))?;
        parse_record_json(&raw, &path.display().to_string())
    }
}

/// Rejects empty `table_name` or `producer` before anything touches the disk.
pub fn validate_required(record: &MetadataRecord) -> Result<()> {
    if record.table_name.trim().is_empty() {
        return Err(CatalogError::MissingRequiredField {
            field: "table_name",
        });
    }
    if record.producer.trim().is_empty() {
        return Err(CatalogError::MissingRequiredField { field: "producer" });
    }
    Ok(())
}

/// Keep letters, digits, `_`, `-` and `.`; everything else becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Producer directories keep their display name otherwise. Separators, control characters
/// and a leading `.` (the index skips dot directories) become `_`.
pub fn sanitize_dir_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .enumerate()
        .map(|(index, c)| {
            if matches!(c, '/' | '\\') || c.is_control() || (index == 0 && c == '.') {
                '_'
            } else {
                c
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Human-readable `key: value` lines over the flattened record. Not read back.
pub fn render_text(record: &MetadataRecord) -> String {
    let mut out = String::new();
    for (key, value) in flatten_record(record) {
        let value = match value {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        };
        out.push_str(&key);
        out.push_str(": ");
        out.push_str(&value);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("emplois salariés/2016", "emplois_salariés_2016")]
    #[case("t1.v2-final", "t1.v2-final")]
    #[case("..", "_")]
    #[case("   ", "_")]
    fn file_names_are_sanitized(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(sanitize_file_name(raw), expected);
    }

    #[test]
    fn producer_directories_keep_display_names() {
        assert_eq!(sanitize_dir_name("Citepa (GES)"), "Citepa (GES)");
        assert_eq!(sanitize_dir_name("../etc"), "_._etc");
        assert_eq!(sanitize_dir_name(".."), "_.");
        assert_eq!(sanitize_dir_name(".NET Foundation"), "_NET Foundation");
        assert_eq!(sanitize_dir_name("A/B"), "A_B");
    }

    #[rstest]
    #[case(".NET Foundation", "_NET Foundation")]
    #[case("A/B", "A_B")]
    #[case("Météo France", "Météo France")]
    fn saved_producer_matches_its_directory(#[case] producer: &str, #[case] stored: &str) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = CatalogStore::new(dir.path(), 5);
        let record = MetadataRecord {
            table_name: "t1".to_string(),
            producer: producer.to_string(),
            ..MetadataRecord::default()
        };
        let outcome = store.save(&record).expect("save");
        assert_eq!(outcome.record.producer, stored);
        assert_eq!(outcome.json_path, dir.path().join(stored).join("t1.json"));

        let index = crate::catalog::index::build_index(dir.path());
        let entry = crate::catalog::query::find_entry(&index.entries, stored, "t1")
            .expect("saved record should be indexed");
        assert_eq!(entry.record.producer, entry.producer);
    }

    #[test]
    fn missing_required_fields_are_rejected_before_writing() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = CatalogStore::new(dir.path(), 5);
        let record = MetadataRecord {
            table_name: "t1".to_string(),
            ..MetadataRecord::default()
        };
        let err = store.save(&record).expect_err("producer missing");
        assert_eq!(err.kind(), "missing_required_field");
        assert_eq!(
            fs::read_dir(dir.path()).expect("read dir").count(),
            0,
            "nothing should be written"
        );
    }

    #[test]
    fn text_rendering_lists_flattened_fields() {
        let mut record = MetadataRecord {
            table_name: "t1".to_string(),
            producer: "Acme".to_string(),
            ..MetadataRecord::default()
        };
        record
            .custom_fields
            .insert("licence".to_string(), "etalab".to_string());
        let text = render_text(&record);
        assert!(text.starts_with("table_name: t1\nproducer: Acme\n"));
        assert!(text.contains("custom_fields.licence: etalab\n"));
    }
}
