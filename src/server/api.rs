//! JSON payload builders behind each route. Every call rebuilds the index from scratch.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::detect::{detect, FormatTag};
use crate::catalog::export::{export_record, ExportFormat};
use crate::catalog::index::{load_catalog, IndexWarning};
use crate::catalog::normalize::{inspect, normalize, normalize_manual};
use crate::catalog::query::{find_entry, producer_choices, search, ALL_PRODUCERS};
use crate::catalog::record::{CatalogEntry, EntrySummary, MetadataRecord, RecordDraft};
use crate::catalog::store::CatalogStore;
use crate::config::CatalogConfig;
use crate::error::CatalogError;

/// Decoded query string pairs; a repeated key keeps its last value.
pub type QueryParams = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    BadGateway(String),
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::NotFound(_) => 404,
            Self::BadGateway(_) => 502,
            Self::Internal(_) => 500,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(msg)
            | Self::NotFound(msg)
            | Self::BadGateway(msg)
            | Self::Internal(msg) => msg,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        let message = err.to_string();
        match err {
            CatalogError::ParseFailure { .. } | CatalogError::MissingRequiredField { .. } => {
                Self::BadRequest(message)
            }
            CatalogError::NotFound { .. } => Self::NotFound(message),
            CatalogError::RemoteFetchFailure { .. } => Self::BadGateway(message),
            CatalogError::StorageUnavailable { .. }
            | CatalogError::SyncFailure { .. }
            | CatalogError::Io { .. } => Self::Internal(message),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

fn to_pretty<T: Serialize>(payload: &T) -> Result<String, ApiError> {
    Ok(serde_json::to_string_pretty(payload)?)
}

#[derive(Debug, Serialize)]
struct HealthResponse<'a> {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    storage_root: String,
    sync: bool,
    remote: Option<&'a str>,
}

pub fn health_payload(config: &CatalogConfig) -> Result<String, ApiError> {
    to_pretty(&HealthResponse {
        status: "ok",
        service: "metacat",
        version: env!("CARGO_PKG_VERSION"),
        storage_root: config.storage_root.display().to_string(),
        sync: config.sync.enabled,
        remote: config.remote.as_ref().map(|r| r.repo.as_str()),
    })
}

#[derive(Debug, Serialize)]
struct EntriesResponse {
    source: &'static str,
    keyword: String,
    producer: String,
    total: usize,
    count: usize,
    entries: Vec<EntrySummary>,
    warnings: Vec<IndexWarning>,
}

/// `GET /api/entries?keyword=&producer=`
pub fn entries_payload(config: &CatalogConfig, query: &QueryParams) -> Result<String, ApiError> {
    let keyword = query
        .get("keyword")
        .map(|k| k.trim().to_string())
        .unwrap_or_default();
    let producer = query
        .get("producer")
        .filter(|p| !p.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| ALL_PRODUCERS.to_string());

    let index = load_catalog(config);
    let entries: Vec<EntrySummary> = search(&index.entries, &keyword, &producer)
        .into_iter()
        .map(|entry| entry.summary())
        .collect();
    to_pretty(&EntriesResponse {
        source: index.source.as_str(),
        keyword,
        producer,
        total: index.entries.len(),
        count: entries.len(),
        entries,
        warnings: index.warnings,
    })
}

pub fn producers_payload(config: &CatalogConfig) -> Result<String, ApiError> {
    let index = load_catalog(config);
    to_pretty(&serde_json::json!({
        "source": index.source.as_str(),
        "producers": producer_choices(&index.entries),
    }))
}

#[derive(Debug, Serialize)]
struct RecordResponse<'a> {
    producer: &'a str,
    table_name: &'a str,
    location: String,
    last_modified: Option<&'a str>,
    record: &'a MetadataRecord,
}

fn lookup_entry(
    config: &CatalogConfig,
    producer: &str,
    table_name: &str,
) -> Result<CatalogEntry, ApiError> {
    let index = load_catalog(config);
    find_entry(&index.entries, producer, table_name)
        .cloned()
        .ok_or_else(|| {
            ApiError::from(CatalogError::NotFound {
                producer: producer.to_string(),
                table_name: table_name.to_string(),
            })
        })
}

/// `GET /api/records/:producer/:table_name`
pub fn record_payload(
    config: &CatalogConfig,
    producer: &str,
    table_name: &str,
) -> Result<String, ApiError> {
    let entry = lookup_entry(config, producer, table_name)?;
    to_pretty(&RecordResponse {
        producer: &entry.producer,
        table_name: entry.table_name(),
        location: entry.location.to_string(),
        last_modified: entry.last_modified(),
        record: &entry.record,
    })
}

/// `GET /api/records/:producer/:table_name/export?format=` (default `json`).
pub fn export_payload(
    config: &CatalogConfig,
    producer: &str,
    table_name: &str,
    query: &QueryParams,
) -> Result<(ExportFormat, String), ApiError> {
    let format = match query.get("format") {
        Some(raw) => raw.parse::<ExportFormat>().map_err(ApiError::BadRequest)?,
        None => ExportFormat::Json,
    };
    let entry = lookup_entry(config, producer, table_name)?;
    Ok((format, export_record(&entry.record, format)?))
}

#[derive(Debug, Deserialize)]
pub struct ContentRequest {
    pub content: String,
}

fn parse_content_request(body: &str) -> Result<ContentRequest, ApiError> {
    serde_json::from_str(body)
        .map_err(|err| ApiError::BadRequest(format!("Invalid request body: {err}")))
}

/// `POST /api/detect` with `{"content": "..."}`.
pub fn detect_payload(body: &str) -> Result<String, ApiError> {
    let request = parse_content_request(body)?;
    to_pretty(&serde_json::json!({ "format": detect(&request.content) }))
}

/// `POST /api/infer` with `{"content": "..."}`.
pub fn infer_payload(body: &str) -> Result<String, ApiError> {
    let request = parse_content_request(body)?;
    to_pretty(&inspect(&request.content)?)
}

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    #[serde(flatten)]
    pub draft: RecordDraft,
    /// Pasted content; manual entry when absent or blank.
    #[serde(default)]
    pub content: Option<String>,
    /// Overrides detection.
    #[serde(default)]
    pub format: Option<FormatTag>,
}

#[derive(Debug, Serialize)]
struct SaveResponse<'a> {
    status: &'static str,
    path: String,
    replaced: bool,
    sync_warning: Option<&'a str>,
    record: &'a MetadataRecord,
}

/// `POST /api/records`: normalize the draft (plus content) and write it.
pub fn save_payload(config: &CatalogConfig, body: &str) -> Result<String, ApiError> {
    let request: SaveRequest = serde_json::from_str(body)
        .map_err(|err| ApiError::BadRequest(format!("Invalid request body: {err}")))?;

    let record = match request.content.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(content) => {
            let format = request.format.unwrap_or_else(|| detect(content));
            normalize(content, format, &request.draft)?
        }
        None => normalize_manual(&request.draft),
    };

    let store = CatalogStore::from_config(config);
    let outcome = store.save(&record)?;
    to_pretty(&SaveResponse {
        status: "saved",
        path: outcome.json_path.display().to_string(),
        replaced: outcome.replaced,
        sync_warning: outcome.sync_warning.as_deref(),
        record: &outcome.record,
    })
}
