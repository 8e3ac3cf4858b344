//! Canonical metadata record, its column specs, and the in-memory catalog entry.
//! One record is stored per dataset at `<root>/<producer>/<table_name>.json`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Producer assigned to records sitting directly under the storage root.
pub const OTHER_PRODUCER: &str = "Other";

/// `last_updated` and entry modification times use this local-time layout.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Top-level keys with a dedicated field; everything else lands in `extra`.
pub const RESERVED_FIELDS: &[&str] = &[
    "table_name",
    "producer",
    "title",
    "description",
    "last_updated",
    "columns",
    "data_sample",
    "custom_fields",
];

/// Closed set of column types. Unknown names read back as `Varchar`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ColumnType {
    Integer,
    Numeric,
    Boolean,
    Date,
    Timestamp,
    #[default]
    Varchar,
    Geometry,
}

impl ColumnType {
    pub const ALL: [ColumnType; 7] = [
        Self::Integer,
        Self::Numeric,
        Self::Boolean,
        Self::Date,
        Self::Timestamp,
        Self::Varchar,
        Self::Geometry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Numeric => "numeric",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
            Self::Varchar => "varchar",
            Self::Geometry => "geometry",
        }
    }

    /// Accepts the canonical names plus common SQL spellings; anything else is `Varchar`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "integer" | "int" | "int4" | "int8" | "bigint" | "smallint" => Self::Integer,
            "numeric" | "decimal" | "float" | "double" | "real" | "number" => Self::Numeric,
            "boolean" | "bool" => Self::Boolean,
            "date" => Self::Date,
            "timestamp" | "datetime" | "timestamptz" => Self::Timestamp,
            "geometry" | "geom" | "geography" => Self::Geometry,
            _ => Self::Varchar,
        }
    }
}

impl From<String> for ColumnType {
    fn from(value: String) -> Self {
        Self::parse_lenient(&value)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        ColumnSpec {
            name: name.into(),
            column_type,
            description: String::new(),
        }
    }
}

/// Bounded preview of the dataset: a list of rows, or one mapping (e.g. `{"content": [...]}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataSample {
    Rows(Vec<Map<String, Value>>),
    Single(Map<String, Value>),
}

impl DataSample {
    pub fn len(&self) -> usize {
        match self {
            Self::Rows(rows) => rows.len(),
            Self::Single(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lenient conversion: non-object list items become `{"value": item}`, a scalar becomes
    /// a single `{"value": scalar}` mapping, and null is no sample.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Array(items) => Some(Self::Rows(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::Object(map) => map,
                        other => single_value(other),
                    })
                    .collect(),
            )),
            Value::Object(map) => Some(Self::Single(map)),
            scalar => Some(Self::Single(single_value(scalar))),
        }
    }

    /// Only row lists are truncated; a single mapping is already one preview item.
    pub fn truncate(&mut self, cap: usize) {
        if let Self::Rows(rows) = self {
            rows.truncate(cap);
        }
    }
}

/// Reserved keys are read leniently: a `columns` that is not a list of column objects, or a
/// `custom_fields` that is not a mapping, is kept verbatim in `extra` under its own key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetadataRecord {
    pub table_name: String,
    pub producer: String,
    pub title: String,
    pub description: String,
    pub last_updated: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_sample: Option<DataSample>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_fields: BTreeMap<String, String>,
    /// Unrecognized top-level keys, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl<'de> Deserialize<'de> for MetadataRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Map::<String, Value>::deserialize(deserializer).map(Self::from_map)
    }
}

impl MetadataRecord {
    /// Build a record from any JSON object. Never fails; see the type docs for how
    /// malformed reserved keys are kept.
    pub fn from_map(map: Map<String, Value>) -> Self {
        let mut record = MetadataRecord::default();
        for (key, value) in map {
            match key.as_str() {
                "table_name" => record.table_name = value_text(value),
                "producer" => record.producer = value_text(value),
                "title" => record.title = value_text(value),
                "description" => record.description = value_text(value),
                "last_updated" => record.last_updated = value_text(value),
                "columns" => match value {
                    Value::Null => {}
                    Value::Array(_) => match serde_json::from_value::<Vec<ColumnSpec>>(value.clone()) {
                        Ok(columns) => record.columns = columns,
                        Err(_) => {
                            record.extra.insert(key, value);
                        }
                    },
                    other => {
                        record.extra.insert(key, other);
                    }
                },
                "data_sample" => record.data_sample = DataSample::from_value(value),
                "custom_fields" => match value {
                    Value::Null => {}
                    Value::Object(fields) => {
                        record.custom_fields = fields
                            .into_iter()
                            .map(|(name, value)| (name, value_text(value)))
                            .collect();
                    }
                    other => {
                        record.extra.insert(key, other);
                    }
                },
                _ => {
                    record.extra.insert(key, value);
                }
            }
        }
        record
    }

    /// Typed `columns`/`custom_fields` replace a raw value kept under the same key.
    pub fn drop_shadowed_extra(&mut self) {
        let has_columns = !self.columns.is_empty();
        let has_fields = !self.custom_fields.is_empty();
        self.extra.retain(|key, _| {
            !((has_columns && key == "columns") || (has_fields && key == "custom_fields"))
        });
    }

    /// Title for display; falls back to `table_name` when no title was given.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.table_name
        } else {
            &self.title
        }
    }

    pub fn sample_len(&self) -> usize {
        self.data_sample.as_ref().map_or(0, DataSample::len)
    }

    pub fn truncate_sample(&mut self, cap: usize) {
        if let Some(sample) = self.data_sample.as_mut() {
            sample.truncate(cap);
        }
    }
}

/// Where a catalog entry was loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceLocation {
    File(PathBuf),
    Remote(String),
    Demo,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => f.write_str(url),
            Self::Demo => f.write_str("demo"),
        }
    }
}

/// A record plus derived, never-persisted fields. Built by the index, filtered by queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub record: MetadataRecord,
    pub producer: String,
    pub location: SourceLocation,
    /// Source file modification time, when the source has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

impl CatalogEntry {
    pub fn table_name(&self) -> &str {
        &self.record.table_name
    }

    pub fn display_title(&self) -> &str {
        self.record.display_title()
    }

    pub fn last_modified(&self) -> Option<&str> {
        if self.record.last_updated.trim().is_empty() {
            self.modified.as_deref()
        } else {
            Some(&self.record.last_updated)
        }
    }

    pub fn summary(&self) -> EntrySummary {
        EntrySummary {
            table_name: self.record.table_name.clone(),
            producer: self.producer.clone(),
            title: self.display_title().to_string(),
            last_modified: self.last_modified().map(str::to_string),
            location: self.location.to_string(),
        }
    }
}

/// Listing row for result tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySummary {
    pub table_name: String,
    pub producer: String,
    pub title: String,
    pub last_modified: Option<String>,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("field name must not be empty")]
    EmptyName,
    #[error("field '{0}' already exists")]
    Duplicate(String),
    #[error("'{0}' is a built-in field")]
    Reserved(String),
}

/// Form state owned by the presentation layer and handed whole to the normalizer on submit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDraft {
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub producer: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
}

impl RecordDraft {
    pub fn new(producer: impl Into<String>, table_name: impl Into<String>) -> Self {
        RecordDraft {
            producer: producer.into(),
            table_name: table_name.into(),
            ..RecordDraft::default()
        }
    }

    pub fn add_custom_field(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), DraftError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DraftError::EmptyName);
        }
        if RESERVED_FIELDS.contains(&name.as_str()) {
            return Err(DraftError::Reserved(name));
        }
        if self.custom_fields.iter().any(|f| f.name == name) {
            return Err(DraftError::Duplicate(name));
        }
        self.custom_fields.push(CustomField {
            name,
            value: value.into(),
        });
        Ok(())
    }

    pub fn remove_custom_field(&mut self, name: &str) -> bool {
        let before = self.custom_fields.len();
        self.custom_fields.retain(|f| f.name != name);
        self.custom_fields.len() != before
    }

    pub fn add_column(&mut self, column: ColumnSpec) -> Result<(), DraftError> {
        let name = column.name.trim().to_string();
        if name.is_empty() {
            return Err(DraftError::EmptyName);
        }
        if self.columns.iter().any(|c| c.name == name) {
            return Err(DraftError::Duplicate(name));
        }
        self.columns.push(ColumnSpec { name, ..column });
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> bool {
        let before = self.columns.len();
        self.columns.retain(|c| c.name != name);
        self.columns.len() != before
    }
}

/// Strings stored by hand-edited files are sometimes null or numbers.
fn value_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .map(value_text)
        .unwrap_or_default())
}

fn single_value(value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("value".to_string(), value);
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_column_type_reads_as_varchar() {
        let spec: ColumnSpec =
            serde_json::from_str(r#"{"name":"geom","type":"POLYGON"}"#).expect("column spec");
        assert_eq!(spec.column_type, ColumnType::Varchar);

        let spec: ColumnSpec =
            serde_json::from_str(r#"{"name":"n","type":"BIGINT"}"#).expect("column spec");
        assert_eq!(spec.column_type, ColumnType::Integer);
        assert_eq!(
            serde_json::to_value(&spec).expect("serialize")["type"],
            "integer"
        );
    }

    #[test]
    fn unrecognized_keys_are_preserved_in_order() {
        let raw = r#"{"table_name":"t1","zeta":1,"alpha":{"x":true},"title":null}"#;
        let record: MetadataRecord = serde_json::from_str(raw).expect("record");
        assert_eq!(record.title, "");
        assert_eq!(record.display_title(), "t1");
        let keys: Vec<&str> = record.extra.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);

        let back = serde_json::to_value(&record).expect("serialize");
        assert_eq!(back["alpha"]["x"], true);
    }

    #[test]
    fn data_sample_accepts_rows_or_single_mapping() {
        let rows: DataSample = serde_json::from_str(r#"[{"a":1},{"a":2}]"#).expect("rows");
        assert_eq!(rows.len(), 2);
        let single: DataSample =
            serde_json::from_str(r#"{"content":["x","y"]}"#).expect("single");
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn custom_field_values_are_stringified() {
        let raw = r#"{"custom_fields":{"licence":"etalab","year":2021,"note":null}}"#;
        let record: MetadataRecord = serde_json::from_str(raw).expect("record");
        assert_eq!(record.custom_fields["year"], "2021");
        assert_eq!(record.custom_fields["note"], "");
    }

    #[test]
    fn draft_rejects_empty_duplicate_and_reserved_names() {
        let mut draft = RecordDraft::new("Acme", "t1");
        assert_eq!(draft.add_custom_field("  ", "x"), Err(DraftError::EmptyName));
        assert!(draft.add_custom_field("licence", "etalab").is_ok());
        assert_eq!(
            draft.add_custom_field("licence", "other"),
            Err(DraftError::Duplicate("licence".to_string()))
        );
        assert_eq!(
            draft.add_custom_field("title", "x"),
            Err(DraftError::Reserved("title".to_string()))
        );
        assert!(draft.remove_custom_field("licence"));
        assert!(!draft.remove_custom_field("licence"));
    }

    #[test]
    fn draft_round_trips_through_json() {
        let mut draft = RecordDraft::new("Acme", "t1");
        draft
            .add_column(ColumnSpec::new("id", ColumnType::Integer))
            .expect("column");
        let raw = serde_json::to_string(&draft).expect("serialize");
        let back: RecordDraft = serde_json::from_str(&raw).expect("deserialize");
        assert_eq!(back, draft);
    }

    #[test]
    fn malformed_reserved_keys_are_kept_verbatim() {
        let raw = r#"{"columns":["id","nom"],"custom_fields":"none","data":[[1,"a"]]}"#;
        let record: MetadataRecord = serde_json::from_str(raw).expect("record");
        assert!(record.columns.is_empty());
        assert!(record.custom_fields.is_empty());
        assert_eq!(record.extra["columns"], serde_json::json!(["id", "nom"]));
        assert_eq!(record.extra["custom_fields"], "none");

        let back = serde_json::to_string(&record).expect("serialize");
        let reread: MetadataRecord = serde_json::from_str(&back).expect("reread");
        assert_eq!(reread, record);
    }

    #[test]
    fn scalar_samples_are_wrapped() {
        let record: MetadataRecord =
            serde_json::from_str(r#"{"data_sample":[1,{"a":2}]}"#).expect("record");
        let Some(DataSample::Rows(rows)) = &record.data_sample else {
            panic!("expected rows");
        };
        assert_eq!(rows[0]["value"], 1);
        assert_eq!(rows[1]["a"], 2);

        let record: MetadataRecord =
            serde_json::from_str(r#"{"data_sample":"plain"}"#).expect("record");
        assert_eq!(record.sample_len(), 1);
    }

    #[test]
    fn typed_columns_replace_a_raw_value() {
        let mut record: MetadataRecord =
            serde_json::from_str(r#"{"columns":"id;nom","k":1}"#).expect("record");
        record.columns.push(ColumnSpec::new("id", ColumnType::Integer));
        record.drop_shadowed_extra();
        assert!(!record.extra.contains_key("columns"));
        assert_eq!(record.extra["k"], 1);
    }
}
