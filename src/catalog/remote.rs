//! Read-only remote mirror: list a hosted repository tree and download each JSON record.
//!
//! Plain blocking requests, no timeout or retry. Any failure becomes a warning and the
//! affected source (or file) contributes no entries.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::catalog::index::{fill_identity, parse_record_json, IndexWarning, ScanReport};
use crate::catalog::record::{CatalogEntry, SourceLocation, OTHER_PRODUCER};
use crate::config::RemoteConfig;
use crate::error::{CatalogError, Result};

pub fn tree_url(config: &RemoteConfig) -> String {
    format!(
        "{}/repos/{}/{}/git/trees/{}?recursive=1",
        config.api_base.trim_end_matches('/'),
        config.owner,
        config.repo,
        config.branch
    )
}

pub fn raw_url(config: &RemoteConfig, path: &str) -> String {
    format!(
        "{}/{}/{}/{}/{}",
        config.raw_base.trim_end_matches('/'),
        config.owner,
        config.repo,
        config.branch,
        path.trim_start_matches('/')
    )
}

/// Blob paths under `base_path` ending in `.json`, sorted.
pub fn mirror_candidates(listing: &Value, base_path: &str) -> Vec<String> {
    let prefix = format!("{}/", base_path.trim_matches('/'));
    let mut paths: Vec<String> = listing
        .get("tree")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|item| item.get("type").and_then(Value::as_str) == Some("blob"))
        .filter_map(|item| item.get("path").and_then(Value::as_str))
        .filter(|path| path.starts_with(&prefix) && path.to_ascii_lowercase().ends_with(".json"))
        .map(str::to_string)
        .collect();
    paths.sort();
    paths
}

/// Same rule as local storage: first segment below the base path, else `Other`.
pub fn producer_from_remote_path(base_path: &str, path: &str) -> String {
    let prefix = format!("{}/", base_path.trim_matches('/'));
    let relative = path.strip_prefix(&prefix).unwrap_or(path);
    match relative.split_once('/') {
        Some((first, _)) if !first.is_empty() => first.to_string(),
        _ => OTHER_PRODUCER.to_string(),
    }
}

pub fn entry_from_blob(config: &RemoteConfig, path: &str, raw: &str) -> Result<CatalogEntry> {
    let url = raw_url(config, path);
    let mut record = parse_record_json(raw, &url)?;
    let producer = producer_from_remote_path(&config.path, path);
    fill_identity(&mut record, &producer, Path::new(path));
    Ok(CatalogEntry {
        record,
        producer,
        location: SourceLocation::Remote(url),
        modified: None,
    })
}

pub fn fetch_remote(config: &RemoteConfig) -> ScanReport {
    let mut report = ScanReport::default();
    let agent = ureq::AgentBuilder::new().build();
    let token = config
        .token_env
        .as_deref()
        .and_then(|name| std::env::var(name).ok())
        .filter(|t| !t.trim().is_empty());

    let listing_url = tree_url(config);
    let listing = match get_text(&agent, &listing_url, token.as_deref()).and_then(|body| {
        serde_json::from_str::<Value>(&body).map_err(|err| CatalogError::RemoteFetchFailure {
            url: listing_url.clone(),
            message: err.to_string(),
        })
    }) {
        Ok(listing) => listing,
        Err(err) => {
            warn!(url = %listing_url, error = %err, "remote mirror listing failed");
            report
                .warnings
                .push(IndexWarning::from_error(listing_url.clone(), &err));
            return report;
        }
    };

    for path in mirror_candidates(&listing, &config.path) {
        report.candidates += 1;
        let url = raw_url(config, &path);
        let entry = get_text(&agent, &url, token.as_deref())
            .and_then(|raw| entry_from_blob(config, &path, &raw));
        match entry {
            Ok(entry) => {
                debug!(url = %url, "fetched remote record");
                report.entries.push(entry);
            }
            Err(err) => {
                warn!(url = %url, error = %err, "skipping remote record");
                report.warnings.push(IndexWarning::from_error(url, &err));
            }
        }
    }
    report
}

fn get_text(agent: &ureq::Agent, url: &str, token: Option<&str>) -> Result<String> {
    let mut request = agent.get(url).set("Accept", "application/json");
    if let Some(token) = token {
        request = request.set("Authorization", &format!("Bearer {token}"));
    }
    match request.call() {
        Ok(resp) => resp
            .into_string()
            .map_err(|err| CatalogError::RemoteFetchFailure {
                url: url.to_string(),
                message: err.to_string(),
            }),
        Err(ureq::Error::Status(code, resp)) => {
            let text = resp.into_string().unwrap_or_default();
            Err(CatalogError::RemoteFetchFailure {
                url: url.to_string(),
                message: format!("status {code}: {}", text.trim()),
            })
        }
        Err(err) => Err(CatalogError::RemoteFetchFailure {
            url: url.to_string(),
            message: err.to_string(),
        }),
    }
}
