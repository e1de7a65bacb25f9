//! Backup store facade
//!
//! [`BackupStore`] implements the four backup operations (upload, get, delete,
//! list) on top of an injected [`ObjectStore`]. Every call re-reads remote
//! state; nothing is cached between operations.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};
use crate::pattern::{MatchMode, NamePattern, build_pattern, normalize_folder};
use crate::traits::{ByteStream, Lookup, ObjectStore};

/// What `upload` does when the target container does not exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContainerPolicy {
    /// Create the container before uploading
    #[default]
    Create,
    /// Upload anyway and let the backend report the missing container
    ProceedWithoutCreating,
}

impl From<bool> for ContainerPolicy {
    fn from(create: bool) -> Self {
        if create {
            ContainerPolicy::Create
        } else {
            ContainerPolicy::ProceedWithoutCreating
        }
    }
}

/// One backup found by `list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Caller label for what was backed up
    pub item: String,
    /// Caller label for the kind of backup
    #[serde(rename = "type")]
    pub item_type: String,
    /// Matched part of the object name
    pub filename: String,
    #[serde(rename = "last-modified")]
    pub last_modified: Option<Timestamp>,
}

/// Criteria for `list`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub item: String,
    pub item_type: String,
    pub container: String,
    pub filename: Option<String>,
    pub pseudo_folder: Option<String>,
    pub filename_prefix: Option<String>,
    pub filename_suffix: Option<String>,
    pub match_mode: MatchMode,
}

impl ListQuery {
    pub fn new(
        item: impl Into<String>,
        item_type: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        Self {
            item: item.into(),
            item_type: item_type.into(),
            container: container.into(),
            ..Default::default()
        }
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn pseudo_folder(mut self, folder: impl Into<String>) -> Self {
        self.pseudo_folder = Some(folder.into());
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.filename_prefix = Some(prefix.into());
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.filename_suffix = Some(suffix.into());
        self
    }

    pub fn match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }

    /// The pattern string this query searches with
    pub fn pattern(&self) -> String {
        build_pattern(
            self.filename.as_deref(),
            self.pseudo_folder.as_deref(),
            self.filename_prefix.as_deref(),
            self.filename_suffix.as_deref(),
        )
    }
}

/// Remote object name for an uploaded file
pub fn remote_name(file_path: &Path, pseudo_folder: Option<&str>) -> Result<String> {
    let base = file_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidPath(format!("{} has no file name", file_path.display())))?;

    Ok(match normalize_folder(pseudo_folder) {
        Some(folder) => format!("{folder}/{base}"),
        None => base.to_string(),
    })
}

/// Local path an object is fetched to, refusing names that leave `output_directory`
pub fn local_destination(output_directory: &Path, filename: &str) -> Result<PathBuf> {
    let relative = Path::new(filename);
    let mut has_normal = false;
    for component in relative.components() {
        match component {
            Component::Normal(_) => has_normal = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::InvalidPath(format!(
                    "{filename} would be written outside of {}",
                    output_directory.display()
                )));
            }
        }
    }
    if !has_normal {
        return Err(Error::InvalidPath(format!("'{filename}' is not a file name")));
    }
    Ok(output_directory.join(relative))
}

/// Backup operations over an object storage backend
#[derive(Clone)]
pub struct BackupStore {
    backend: Arc<dyn ObjectStore>,
}

impl BackupStore {
    pub fn new(backend: Arc<dyn ObjectStore>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &dyn ObjectStore {
        self.backend.as_ref()
    }

    /// Upload `file_path` into `container`, optionally under `pseudo_folder`
    ///
    /// Returns the remote object name. An existing object with that name is
    /// replaced.
    pub async fn upload(
        &self,
        container: &str,
        file_path: &Path,
        pseudo_folder: Option<&str>,
        policy: ContainerPolicy,
    ) -> Result<String> {
        if let Lookup::NotFound = self.backend.container_metadata(container).await? {
            match policy {
                ContainerPolicy::Create => self.create_container(container).await?,
                ContainerPolicy::ProceedWithoutCreating => {
                    tracing::debug!(
                        backend = self.backend.backend_name(),
                        container,
                        "Container missing, uploading without creating it"
                    );
                }
            }
        }

        let name = remote_name(file_path, pseudo_folder)?;
        tracing::debug!(
            backend = self.backend.backend_name(),
            container,
            name = %name,
            source = %file_path.display(),
            "Uploading object"
        );
        self.backend.upload_object(container, &name, file_path).await?;
        tracing::info!(
            backend = self.backend.backend_name(),
            container,
            name = %name,
            "Uploaded backup"
        );

        Ok(name)
    }

    async fn create_container(&self, container: &str) -> Result<()> {
        match self.backend.create_container(container).await {
            Ok(()) => {
                tracing::info!(
                    backend = self.backend.backend_name(),
                    container,
                    "Created container"
                );
                Ok(())
            }
            // another writer created it between our check and our create
            Err(Error::Conflict(msg)) => {
                tracing::warn!(container, error = %msg, "Container already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch `filename` from `container` into `output_directory`
    ///
    /// Missing parent directories are created. Content is written to a
    /// temporary file beside the destination and renamed into place, so the
    /// destination never holds a partial download. Returns the destination.
    pub async fn get(
        &self,
        container: &str,
        filename: &str,
        output_directory: &Path,
    ) -> Result<PathBuf> {
        if let Lookup::NotFound = self.backend.container_metadata(container).await? {
            return Err(Error::Store(format!(
                "{container}: container not found in store"
            )));
        }
        if let Lookup::NotFound = self.backend.object_metadata(container, filename).await? {
            return Err(Error::Store(format!("{filename}: file not found in store")));
        }

        let destination = local_destination(output_directory, filename)?;
        let parent = destination
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| output_directory.to_path_buf());
        tokio::fs::create_dir_all(&parent).await?;

        let stream = self.backend.download_object(container, filename).await?;
        let written = write_atomically(stream, &parent, &destination).await?;
        tracing::info!(
            backend = self.backend.backend_name(),
            container,
            filename,
            bytes = written,
            destination = %destination.display(),
            "Fetched backup"
        );

        Ok(destination)
    }

    /// Delete `filename` from `container`
    pub async fn delete(&self, container: &str, filename: &str) -> Result<()> {
        match self.backend.delete_object(container, filename).await {
            Ok(()) => {
                tracing::info!(
                    backend = self.backend.backend_name(),
                    container,
                    filename,
                    "Deleted backup"
                );
                Ok(())
            }
            Err(Error::NotFound(_)) => Err(Error::Store(format!("error deleting {filename}"))),
            Err(e) => Err(e),
        }
    }

    /// List backups in a container whose names match the query
    ///
    /// Records come back in the backend's enumeration order.
    pub async fn list(&self, query: &ListQuery) -> Result<Vec<BackupRecord>> {
        let pattern = NamePattern::compile(&query.pattern(), query.match_mode)?;
        tracing::debug!(
            backend = self.backend.backend_name(),
            container = %query.container,
            pattern = pattern.as_str(),
            mode = ?pattern.mode(),
            "Listing backups"
        );

        let objects = self.backend.list_objects(&query.container).await?;
        let records = objects
            .into_iter()
            .filter_map(|object| {
                pattern.find(&object.name).map(|span| BackupRecord {
                    item: query.item.clone(),
                    item_type: query.item_type.clone(),
                    filename: span.to_string(),
                    last_modified: object.last_modified,
                })
            })
            .collect();

        Ok(records)
    }
}

/// Mode of files written by `get`
#[cfg(unix)]
const RESTORED_FILE_MODE: u32 = 0o644;

/// Drain `stream` into a temporary file in `dir`, then rename it to `destination`
async fn write_atomically(mut stream: ByteStream, dir: &Path, destination: &Path) -> Result<u64> {
    // removed on drop unless persisted
    let temp = tempfile::Builder::new()
        .prefix(".bmu-")
        .suffix(".part")
        .tempfile_in(dir)?
        .into_temp_path();

    let mut file = tokio::fs::File::create(&temp).await?;
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    // tempfile creates 0600; restored archives get the usual file mode
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(RESTORED_FILE_MODE);
        tokio::fs::set_permissions(&temp, permissions).await?;
    }

    temp.persist(destination).map_err(|e| Error::Io(e.error))?;
    Ok(written)
}
