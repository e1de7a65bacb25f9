//! Configuration file handling
//!
//! The configuration is a TOML file describing the storage backend, retry
//! behaviour, backup defaults, and a list of named backups. Each backup
//! inherits any setting it leaves unset from `[defaults]`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pattern::MatchMode;
use crate::store::ListQuery;

/// Environment variable pointing at the configuration file
pub const CONFIG_ENV: &str = "BMU_CONFIG";

/// System-wide configuration location, tried last
pub const SYSTEM_CONFIG_PATH: &str = "/etc/bmu/config.toml";

const S3_MANDATORY: [&str; 4] = ["endpoint", "region", "access_key", "secret_key"];

/// Storage backend kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreType {
    #[default]
    S3,
    Local,
}

impl std::fmt::Display for StoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreType::S3 => write!(f, "s3"),
            StoreType::Local => write!(f, "local"),
        }
    }
}

/// Backend connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    #[serde(rename = "type")]
    pub store_type: StoreType,

    /// S3 endpoint URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,

    #[serde(skip_serializing)]
    pub secret_key: Option<String>,

    /// Bucket lookup style: auto, path, or dns
    pub bucket_lookup: String,

    /// Root directory of a local store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::S3,
            endpoint: None,
            region: None,
            access_key: None,
            secret_key: None,
            bucket_lookup: "auto".to_string(),
            root: None,
        }
    }
}

/// Retry settings applied by backend adapters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10_000,
        }
    }
}

/// Per-backup settings; also used for `[defaults]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pseudo_folder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_directory: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_container: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename_suffix: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_mode: Option<MatchMode>,
}

impl BackupSettings {
    /// Fill every unset field from `defaults`
    fn or(&self, defaults: &BackupSettings) -> BackupSettings {
        BackupSettings {
            container: self.container.clone().or_else(|| defaults.container.clone()),
            pseudo_folder: self
                .pseudo_folder
                .clone()
                .or_else(|| defaults.pseudo_folder.clone()),
            output_directory: self
                .output_directory
                .clone()
                .or_else(|| defaults.output_directory.clone()),
            create_container: self.create_container.or(defaults.create_container),
            filename: self.filename.clone().or_else(|| defaults.filename.clone()),
            filename_prefix: self
                .filename_prefix
                .clone()
                .or_else(|| defaults.filename_prefix.clone()),
            filename_suffix: self
                .filename_suffix
                .clone()
                .or_else(|| defaults.filename_suffix.clone()),
            item_type: self.item_type.clone().or_else(|| defaults.item_type.clone()),
            match_mode: self.match_mode.or(defaults.match_mode),
        }
    }
}

/// A named backup entry as written in the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupConfig {
    pub name: String,

    #[serde(flatten)]
    pub settings: BackupSettings,
}

/// A backup entry with defaults applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBackup {
    pub name: String,
    pub item_type: Option<String>,
    pub container: String,
    pub pseudo_folder: Option<String>,
    pub output_directory: Option<PathBuf>,
    pub create_container: bool,
    pub filename: Option<String>,
    pub filename_prefix: Option<String>,
    pub filename_suffix: Option<String>,
    pub match_mode: MatchMode,
}

impl ResolvedBackup {
    /// Query listing this backup's archives
    pub fn list_query(&self) -> ListQuery {
        ListQuery {
            item: self.name.clone(),
            item_type: self.item_type.clone().unwrap_or_default(),
            container: self.container.clone(),
            filename: self.filename.clone(),
            pseudo_folder: self.pseudo_folder.clone(),
            filename_prefix: self.filename_prefix.clone(),
            filename_suffix: self.filename_suffix.clone(),
            match_mode: self.match_mode,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub retry: RetryConfig,
    pub defaults: BackupSettings,
    pub backups: Vec<BackupConfig>,
}

impl Config {
    /// Locate, parse, complete from the environment, and validate the configuration
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = Self::locate(explicit)?;
        tracing::debug!(path = %path.display(), "Loading configuration");

        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;
        let mut config = Self::from_toml(&content)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Per-user configuration location
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("bmu").join("config.toml"))
    }

    /// Find the configuration file
    ///
    /// An explicit path or `BMU_CONFIG` must point at an existing file. Without
    /// either, the per-user location and then the system location are tried.
    pub fn locate(explicit: Option<&Path>) -> Result<PathBuf> {
        let mut fallbacks: Vec<PathBuf> = Self::user_config_path().into_iter().collect();
        fallbacks.push(PathBuf::from(SYSTEM_CONFIG_PATH));
        locate_in(
            explicit,
            std::env::var_os(CONFIG_ENV).map(PathBuf::from),
            &fallbacks,
        )
    }

    /// Fill missing credentials from the environment
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let fill = |field: &mut Option<String>, var: &str| {
            if field.as_deref().is_none_or(str::is_empty) {
                if let Some(value) = lookup(var).filter(|v| !v.is_empty()) {
                    *field = Some(value);
                }
            }
        };

        fill(&mut self.store.endpoint, "AWS_ENDPOINT_URL");
        fill(&mut self.store.region, "AWS_REGION");
        fill(&mut self.store.access_key, "AWS_ACCESS_KEY_ID");
        fill(&mut self.store.secret_key, "AWS_SECRET_ACCESS_KEY");
    }

    /// Check that every mandatory parameter is present and consistent
    pub fn validate(&self) -> Result<()> {
        match self.store.store_type {
            StoreType::S3 => self.validate_s3()?,
            StoreType::Local => {
                if self.store.root.is_none() {
                    return Err(Error::Config(
                        "store.root must be set for a local store".to_string(),
                    ));
                }
            }
        }

        if self.retry.max_attempts == 0 {
            return Err(Error::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.backups.is_empty() {
            return Err(Error::Config("Backups has no backup configured".to_string()));
        }

        let mut seen = HashSet::new();
        for backup in &self.backups {
            if backup.name.trim().is_empty() {
                return Err(Error::Config("A backup has an empty name".to_string()));
            }
            if !seen.insert(backup.name.as_str()) {
                return Err(Error::Config(format!(
                    "Backup '{}' is defined more than once",
                    backup.name
                )));
            }
        }

        let missing_container = self.backups.iter().any(|b| {
            b.settings
                .or(&self.defaults)
                .container
                .is_none_or(|c| c.is_empty())
        });
        if missing_container {
            return Err(Error::Config(
                "container has not been specified for every backup and no default has been set"
                    .to_string(),
            ));
        }

        Ok(())
    }

    fn validate_s3(&self) -> Result<()> {
        let store = &self.store;
        let values = [
            &store.endpoint,
            &store.region,
            &store.access_key,
            &store.secret_key,
        ];
        if values.iter().any(|v| v.as_deref().is_none_or(str::is_empty)) {
            return Err(Error::Config(format!(
                "One of the following parameters is not configured: {}",
                S3_MANDATORY.join(", ")
            )));
        }

        if let Some(endpoint) = &store.endpoint {
            url::Url::parse(endpoint)
                .map_err(|e| Error::Config(format!("Invalid endpoint URL '{endpoint}': {e}")))?;
        }

        if !matches!(store.bucket_lookup.as_str(), "auto" | "path" | "dns") {
            return Err(Error::Config(format!(
                "bucket_lookup must be 'auto', 'path' or 'dns', got '{}'",
                store.bucket_lookup
            )));
        }

        Ok(())
    }

    /// Every backup with defaults applied, in file order
    pub fn expand(&self) -> Vec<ResolvedBackup> {
        self.backups.iter().map(|b| self.resolve(b)).collect()
    }

    /// A single backup with defaults applied
    pub fn backup(&self, name: &str) -> Option<ResolvedBackup> {
        self.backups
            .iter()
            .find(|b| b.name == name)
            .map(|b| self.resolve(b))
    }

    fn resolve(&self, backup: &BackupConfig) -> ResolvedBackup {
        let s = backup.settings.or(&self.defaults);
        ResolvedBackup {
            name: backup.name.clone(),
            item_type: s.item_type,
            container: s.container.unwrap_or_default(),
            pseudo_folder: s.pseudo_folder,
            output_directory: s.output_directory,
            create_container: s.create_container.unwrap_or(true),
            filename: s.filename,
            filename_prefix: s.filename_prefix,
            filename_suffix: s.filename_suffix,
            match_mode: s.match_mode.unwrap_or_default(),
        }
    }
}

fn locate_in(
    explicit: Option<&Path>,
    from_env: Option<PathBuf>,
    fallbacks: &[PathBuf],
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return existing(path.to_path_buf());
    }
    if let Some(path) = from_env {
        return existing(path);
    }
    if let Some(path) = fallbacks.iter().find(|p| p.is_file()) {
        return Ok(path.clone());
    }

    let tried = fallbacks
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Err(Error::Config(format!(
        "File {tried} does not exist (you could specify an alternate location using --config or {CONFIG_ENV})"
    )))
}

fn existing(path: PathBuf) -> Result<PathBuf> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(Error::Config(format!(
            "File {} does not exist",
            path.display()
        )))
    }
}
