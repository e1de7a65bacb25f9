//! Command implementations
//!
//! Each command loads the configuration, opens the configured backend, and
//! runs one backup store operation.

pub mod completions;
pub mod get;
pub mod list;
pub mod rm;
pub mod upload;

use std::path::Path;
use std::sync::Arc;

use bmu_core::{BackupStore, Config, LocalStore, ObjectStore, ResolvedBackup, StoreType};
use bmu_s3::S3Client;
use clap::Subcommand;

use crate::exit_code::ExitCode;
use crate::output::Formatter;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a backup archive
    Upload(upload::UploadArgs),

    /// Fetch a backup archive to local disk
    Get(get::GetArgs),

    /// Delete a backup archive
    Rm(rm::RmArgs),

    /// List backup archives
    List(list::ListArgs),

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Build the backend described by the configuration
pub async fn open_backend(config: &Config) -> bmu_core::Result<Arc<dyn ObjectStore>> {
    match config.store.store_type {
        StoreType::Local => {
            let root = config.store.root.as_deref().ok_or_else(|| {
                bmu_core::Error::Config("store.root must be set for a local store".to_string())
            })?;
            Ok(Arc::new(LocalStore::init(root)?))
        }
        StoreType::S3 => Ok(Arc::new(
            S3Client::new(&config.store, config.retry.clone()).await?,
        )),
    }
}

/// Load the configuration and open a backup store over its backend
pub async fn open_store(
    config_path: Option<&Path>,
    formatter: &Formatter,
) -> Result<(Config, BackupStore), ExitCode> {
    let config = match Config::load(config_path) {
        Ok(c) => c,
        Err(e) => {
            formatter.error(&format!("Failed to load configuration: {e}"));
            return Err(ExitCode::GeneralError);
        }
    };

    let backend = match open_backend(&config).await {
        Ok(b) => b,
        Err(e) => {
            formatter.error(&format!(
                "Failed to open {} store: {e}",
                config.store.store_type
            ));
            return Err(ExitCode::from_error(&e));
        }
    };

    Ok((config, BackupStore::new(backend)))
}

/// Look up a configured backup by name
pub fn resolve_backup(config: &Config, name: Option<&str>) -> Result<Option<ResolvedBackup>, String> {
    match name {
        None => Ok(None),
        Some(name) => config
            .backup(name)
            .map(Some)
            .ok_or_else(|| format!("Backup '{name}' is not configured")),
    }
}

/// Pick the container: explicit flag, then the backup entry, then `[defaults]`
pub fn resolve_container(
    explicit: Option<&str>,
    backup: Option<&ResolvedBackup>,
    config: &Config,
) -> Result<String, String> {
    explicit
        .map(str::to_string)
        .or_else(|| backup.map(|b| b.container.clone()))
        .or_else(|| config.defaults.container.clone())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| "No container given (use --container or --backup)".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::from_toml(
            r#"
[store]
type = "local"
root = "/srv/backups"

[defaults]
container = "default-container"

[[backups]]
name = "db"
container = "pg"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_backup() {
        let config = config();
        assert!(resolve_backup(&config, None).unwrap().is_none());
        assert_eq!(resolve_backup(&config, Some("db")).unwrap().unwrap().container, "pg");
        assert!(resolve_backup(&config, Some("nope")).is_err());
    }

    #[test]
    fn test_resolve_container_precedence() {
        let config = config();
        let backup = config.backup("db");

        assert_eq!(
            resolve_container(Some("flag"), backup.as_ref(), &config).unwrap(),
            "flag"
        );
        assert_eq!(
            resolve_container(None, backup.as_ref(), &config).unwrap(),
            "pg"
        );
        assert_eq!(
            resolve_container(None, None, &config).unwrap(),
            "default-container"
        );
        assert!(resolve_container(None, None, &Config::default()).is_err());
    }

    #[tokio::test]
    async fn test_open_local_backend() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config();
        config.store.root = Some(dir.path().join("store"));

        let backend = open_backend(&config).await.unwrap();
        assert!(!backend.container_exists("pg").await.unwrap());
        assert!(dir.path().join("store").is_dir());
    }
}
