//! Layered configuration: defaults, then a YAML file, then `METACAT_*` environment overrides.
//! A missing or malformed file falls back to defaults; configuration never fails startup.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_STORAGE_ROOT: &str = "SGBD/Metadata";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_SAMPLE_CAP: usize = 5;
pub const DEFAULT_CONFIG_PATH: &str = "metacat.yaml";

pub const CONFIG_PATH_ENV: &str = "METACAT_CONFIG";
pub const ROOT_ENV: &str = "METACAT_ROOT";
pub const BIND_ENV: &str = "METACAT_BIND";
pub const SAMPLE_CAP_ENV: &str = "METACAT_SAMPLE_CAP";
pub const SYNC_ENV: &str = "METACAT_SYNC";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub storage_root: PathBuf,
    pub bind_addr: String,
    pub sample_cap: usize,
    /// Directory served at `/` by the HTTP server.
    pub static_dir: Option<PathBuf>,
    pub sync: SyncConfig,
    pub remote: Option<RemoteConfig>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        CatalogConfig {
            storage_root: PathBuf::from(DEFAULT_STORAGE_ROOT),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            sample_cap: DEFAULT_SAMPLE_CAP,
            static_dir: None,
            sync: SyncConfig::default(),
            remote: None,
        }
    }
}

/// Best-effort git commit (and optional push) after each save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub enabled: bool,
    pub remote: String,
    /// Branch to push; the current branch when unset.
    pub branch: Option<String>,
    pub push: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            enabled: false,
            remote: "origin".to_string(),
            branch: None,
            push: true,
        }
    }
}

/// Read-only mirror of the storage layout in a hosted git repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    /// Repository path that plays the role of the storage root.
    pub path: String,
    pub api_base: String,
    pub raw_base: String,
    /// Environment variable holding an API token, if any.
    pub token_env: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            owner: String::new(),
            repo: String::new(),
            branch: "main".to_string(),
            path: DEFAULT_STORAGE_ROOT.to_string(),
            api_base: "https://api.github.com".to_string(),
            raw_base: "https://raw.githubusercontent.com".to_string(),
            token_env: None,
        }
    }
}

impl CatalogConfig {
    /// Full load from the process environment and working directory.
    pub fn load() -> Self {
        let path = env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut config = Self::from_file(&path);
        config.apply_env_overrides(|key| env::var(key).ok());
        config
    }

    /// Defaults when the file is absent or cannot be parsed.
    pub fn from_file(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "unable to read config, using defaults");
                return Self::default();
            }
        };
        match Self::from_yaml_str(&raw) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "malformed config, using defaults");
                Self::default()
            }
        }
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Apply `METACAT_*` overrides through `lookup` so tests need not touch the process env.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup(ROOT_ENV).filter(|v| !v.trim().is_empty()) {
            self.storage_root = PathBuf::from(root);
        }
        if let Some(bind) = lookup(BIND_ENV).filter(|v| !v.trim().is_empty()) {
            self.bind_addr = bind;
        }
        if let Some(raw) = lookup(SAMPLE_CAP_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(cap) => self.sample_cap = cap,
                Err(_) => warn!(value = %raw, "ignoring invalid {SAMPLE_CAP_ENV}"),
            }
        }
        if let Some(raw) = lookup(SYNC_ENV) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "git" | "on" | "true" | "1" => self.sync.enabled = true,
                "off" | "none" | "false" | "0" => self.sync.enabled = false,
                other => warn!(value = %other, "ignoring unknown {SYNC_ENV}"),
            }
        }
    }
}
