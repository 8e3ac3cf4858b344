//! Error kinds surfaced by the catalog core.
//! Nothing here is fatal: every operation catches these at its boundary and reports them.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// Malformed JSON/CSV in one file or one submission.
    #[error("failed to parse {source_name}: {message}")]
    ParseFailure {
        source_name: String,
        message: String,
    },

    #[error("missing required field '{field}'")]
    MissingRequiredField { field: &'static str },

    #[error("storage root not found: {}", root.display())]
    StorageUnavailable { root: PathBuf },

    /// Version-control sync failed after the local write succeeded.
    #[error("sync failed: {message}")]
    SyncFailure { message: String },

    #[error("remote fetch failed for {url}: {message}")]
    RemoteFetchFailure { url: String, message: String },

    #[error("no record '{table_name}' for producer '{producer}'")]
    NotFound {
        producer: String,
        table_name: String,
    },

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CatalogError {
    pub fn parse(source_name: impl Into<String>, message: impl ToString) -> Self {
        Self::ParseFailure {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short machine-readable kind, used in warnings and API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ParseFailure { .. } => "parse_failure",
            Self::MissingRequiredField { .. } => "missing_required_field",
            Self::StorageUnavailable { .. } => "storage_unavailable",
            Self::SyncFailure { .. } => "sync_failure",
            Self::RemoteFetchFailure { .. } => "remote_fetch_failure",
            Self::NotFound { .. } => "not_found",
            Self::Io { .. } => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failing_location() {
        let err = CatalogError::parse("Acme/t1.json", "expected value at line 1");
        assert_eq!(
            err.to_string(),
            "failed to parse Acme/t1.json: expected value at line 1"
        );
        assert_eq!(err.kind(), "parse_failure");

        let err = CatalogError::MissingRequiredField { field: "producer" };
        assert_eq!(err.to_string(), "missing required field 'producer'");
    }
}
