//! Walk a storage root and build the in-memory catalog.
//!
//! Every `*.json` file under the root is a candidate. A file that cannot be read or parsed
//! becomes an [`IndexWarning`] and the walk continues. The walk is sorted by file name so
//! two builds over an unchanged tree return identical, identically ordered entries.
//! When nothing usable is found, the demonstration set is returned instead.

use std::fmt;
use std::fs;
use std::path::{Component, Path};

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::catalog::demo::demo_entries;
use crate::catalog::record::{
    CatalogEntry, MetadataRecord, SourceLocation, OTHER_PRODUCER, TIMESTAMP_FORMAT,
};
use crate::catalog::remote;
use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};

pub const METADATA_EXTENSION: &str = "json";

/// Block written by the earlier tool next to the dataset content.
const LEGACY_METADATA_KEY: &str = "_metadata";

/// Which source the entries of a [`CatalogIndex`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexSource {
    Local,
    Remote,
    Demo,
}

impl IndexSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::Demo => "demo",
        }
    }
}

impl fmt::Display for IndexSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A per-file or per-source failure that did not stop the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexWarning {
    pub kind: &'static str,
    pub location: String,
    pub message: String,
}

impl IndexWarning {
    pub fn from_error(location: impl Into<String>, err: &CatalogError) -> Self {
        IndexWarning {
            kind: err.kind(),
            location: location.into(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for IndexWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.location, self.message)
    }
}

/// Result of scanning one source.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub entries: Vec<CatalogEntry>,
    pub warnings: Vec<IndexWarning>,
    /// Files that looked like metadata records, parsed or not.
    pub candidates: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogIndex {
    pub entries: Vec<CatalogEntry>,
    pub warnings: Vec<IndexWarning>,
    pub source: IndexSource,
}

impl CatalogIndex {
    fn demo(warnings: Vec<IndexWarning>) -> Self {
        CatalogIndex {
            entries: demo_entries(),
            warnings,
            source: IndexSource::Demo,
        }
    }
}

/// Scan the root without any fallback. Errors only when the root is not a directory.
pub fn scan_storage(root: &Path) -> Result<ScanReport> {
    if !root.is_dir() {
        return Err(CatalogError::StorageUnavailable {
            root: root.to_path_buf(),
        });
    }

    let mut report = ScanReport::default();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden_dir(entry));

    for item in walker {
        let entry = match item {
            Ok(entry) => entry,
            Err(err) => {
                let location = err
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| root.display().to_string());
                warn!(path = %location, error = %err, "skipping unreadable directory entry");
                report.warnings.push(IndexWarning {
                    kind: "io",
                    location,
                    message: err.to_string(),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() || !has_metadata_extension(entry.path()) {
            continue;
        }

        report.candidates += 1;
        match load_entry(root, entry.path()) {
            Ok(catalog_entry) => {
                debug!(path = %entry.path().display(), producer = %catalog_entry.producer, "indexed record");
                report.entries.push(catalog_entry);
            }
            Err(err) => {
                warn!(path = %entry.path().display(), error = %err, "skipping metadata file");
                report
                    .warnings
                    .push(IndexWarning::from_error(entry.path().display().to_string(), &err));
            }
        }
    }

    Ok(report)
}

/// Local catalog, or the demonstration set when the root is missing or holds no records.
pub fn build_index(root: &Path) -> CatalogIndex {
    match scan_storage(root) {
        Ok(report) if !report.entries.is_empty() => {
            info!(root = %root.display(), entries = report.entries.len(), skipped = report.warnings.len(), "catalog index built");
            CatalogIndex {
                entries: report.entries,
                warnings: report.warnings,
                source: IndexSource::Local,
            }
        }
        Ok(report) => {
            info!(root = %root.display(), "no records under storage root, using demonstration data");
            CatalogIndex::demo(report.warnings)
        }
        Err(err) => {
            info!(root = %root.display(), "storage root unavailable, using demonstration data");
            let warning = IndexWarning::from_error(root.display().to_string(), &err);
            CatalogIndex::demo(vec![warning])
        }
    }
}

/// Local storage first, then the remote mirror when configured, then the demonstration set.
pub fn load_catalog(config: &CatalogConfig) -> CatalogIndex {
    let mut warnings = Vec::new();
    match scan_storage(&config.storage_root) {
        Ok(report) => {
            if !report.entries.is_empty() {
                info!(entries = report.entries.len(), "catalog loaded from local storage");
                return CatalogIndex {
                    entries: report.entries,
                    warnings: report.warnings,
                    source: IndexSource::Local,
                };
            }
            warnings.extend(report.warnings);
        }
        Err(err) => warnings.push(IndexWarning::from_error(
            config.storage_root.display().to_string(),
            &err,
        )),
    }

    if let Some(remote_config) = &config.remote {
        let report = remote::fetch_remote(remote_config);
        warnings.extend(report.warnings);
        if !report.entries.is_empty() {
            info!(entries = report.entries.len(), "catalog loaded from remote mirror");
            return CatalogIndex {
                entries: report.entries,
                warnings,
                source: IndexSource::Remote,
            };
        }
    }

    info!("no local or remote records, using demonstration data");
    CatalogIndex::demo(warnings)
}

/// Dot directories such as `.git`; dot files are still candidates.
fn is_hidden_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

fn has_metadata_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(METADATA_EXTENSION))
}

fn load_entry(root: &Path, path: &Path) -> Result<CatalogEntry> {
    let raw = fs::read_to_string(path).map_err(|err| CatalogError::io(path, err))?;
    let mut record = parse_record_json(&raw, &path.display().to_string())?;
    let producer = producer_from_path(root, path);
    fill_identity(&mut record, &producer, path);

    let modified = fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .map(|time| DateTime::<Local>::from(time).format(TIMESTAMP_FORMAT).to_string());

    Ok(CatalogEntry {
        record,
        producer,
        location: SourceLocation::File(path.to_path_buf()),
        modified,
    })
}

/// Parse one stored record, accepting both the canonical shape and the legacy
/// `_metadata` layout.
pub fn parse_record_json(raw: &str, source_name: &str) -> Result<MetadataRecord> {
    let value: Value =
        serde_json::from_str(raw).map_err(|err| CatalogError::parse(source_name, err))?;
    let Value::Object(map) = value else {
        return Err(CatalogError::parse(
            source_name,
            "top-level value is not an object",
        ));
    };

    let mut legacy = None;
    let mut fields = Map::new();
    for (key, value) in map {
        if key == LEGACY_METADATA_KEY {
            legacy = Some(value);
        } else {
            fields.insert(key, value);
        }
    }
    let legacy = match legacy {
        Some(Value::Object(legacy)) => Some(legacy),
        Some(_) => {
            return Err(CatalogError::parse(
                source_name,
                "'_metadata' is not an object",
            ))
        }
        None => None,
    };

    let mut record = MetadataRecord::from_map(fields);
    if let Some(legacy) = legacy {
        apply_legacy_metadata(&mut record, &legacy);
    }
    Ok(record)
}

fn apply_legacy_metadata(record: &mut MetadataRecord, legacy: &Map<String, Value>) {
    let fields = [
        ("name", &mut record.table_name),
        ("category", &mut record.producer),
        ("last_modified", &mut record.last_updated),
    ];
    for (key, target) in fields {
        if !target.trim().is_empty() {
            continue;
        }
        if let Some(value) = legacy.get(key).and_then(Value::as_str) {
            *target = value.to_string();
        }
    }
}

/// First path segment below the root, or `Other` for files directly under it.
pub fn producer_from_path(root: &Path, path: &Path) -> String {
    let Ok(relative) = path.strip_prefix(root) else {
        return OTHER_PRODUCER.to_string();
    };
    let mut components = relative.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(first)), Some(_)) => first.to_string_lossy().into_owned(),
        _ => OTHER_PRODUCER.to_string(),
    }
}

/// Missing `table_name` comes from the file stem, missing `producer` from the location.
pub(crate) fn fill_identity(record: &mut MetadataRecord, producer: &str, path: &Path) {
    if record.table_name.trim().is_empty() {
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            record.table_name = stem.to_string();
        }
    }
    if record.producer.trim().is_empty() {
        record.producer = producer.to_string();
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn producer_is_the_first_segment_below_root() {
        let root = PathBuf::from("/data/SGBD/Metadata");
        assert_eq!(
            producer_from_path(&root, &root.join("INSEE").join("emplois.json")),
            "INSEE"
        );
        assert_eq!(
            producer_from_path(&root, &root.join("INSEE").join("2016").join("emplois.json")),
            "INSEE"
        );
        assert_eq!(producer_from_path(&root, &root.join("loose.json")), OTHER_PRODUCER);
    }

    #[test]
    fn legacy_layout_maps_metadata_block() {
        let raw = r#"{"content":["a","b"],"_metadata":{"name":"notes","category":"Finance","last_modified":"2024-02-01 10:00:00"}}"#;
        let record = parse_record_json(raw, "Finance/notes.json").expect("legacy record");
        assert_eq!(record.table_name, "notes");
        assert_eq!(record.producer, "Finance");
        assert_eq!(record.last_updated, "2024-02-01 10:00:00");
        assert_eq!(record.extra["content"], serde_json::json!(["a", "b"]));
        assert!(!record.extra.contains_key(LEGACY_METADATA_KEY));
    }

    #[test]
    fn foreign_reserved_key_shapes_still_parse() {
        let raw = r#"{"columns":["id","nom"],"data_sample":[1,2],"custom_fields":"licence ouverte","_metadata":{"name":"clients","category":"Clients"}}"#;
        let record = parse_record_json(raw, "Clients/c.json").expect("record should parse");
        assert_eq!(record.table_name, "clients");
        assert!(record.columns.is_empty());
        assert_eq!(record.extra["columns"], serde_json::json!(["id", "nom"]));
        assert_eq!(record.sample_len(), 2);
        assert!(record.custom_fields.is_empty());
        assert_eq!(record.extra["custom_fields"], "licence ouverte");
    }

    #[test]
    fn non_object_documents_are_parse_failures() {
        let err = parse_record_json("[1,2]", "list.json").expect_err("list is not a record");
        assert_eq!(err.kind(), "parse_failure");
    }

    #[test]
    fn identity_is_filled_from_location() {
        let mut record = MetadataRecord::default();
        fill_identity(&mut record, "Acme", Path::new("/root/Acme/t9.json"));
        assert_eq!(record.table_name, "t9");
        assert_eq!(record.producer, "Acme");
    }

    #[test]
    fn missing_root_yields_demonstration_set() {
        let index = build_index(Path::new("/definitely/not/a/metacat/root"));
        assert_eq!(index.source, IndexSource::Demo);
        assert_eq!(index.entries.len(), crate::catalog::demo::DEMO_ENTRY_COUNT);
        assert_eq!(index.warnings[0].kind, "storage_unavailable");
    }
}
