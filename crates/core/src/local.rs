//! Local filesystem backend
//!
//! Stores containers as directories below a root and objects as files named by
//! their `/`-separated object name. Useful for single-host setups and for
//! exercising the backup store without a network service.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use jiff::Timestamp;
use tokio::io::AsyncReadExt;

use crate::error::{Error, Result};
use crate::traits::{ByteStream, ContainerInfo, Lookup, ObjectInfo, ObjectStore};

const CHUNK_SIZE: usize = 64 * 1024;

/// Object store backed by a local directory tree
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Create the root directory if needed and open the store
    pub fn init(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container_path(&self, container: &str) -> Result<PathBuf> {
        if !is_plain_segment(container) {
            return Err(Error::InvalidPath(format!(
                "invalid container name: '{container}'"
            )));
        }
        Ok(self.root.join(container))
    }

    fn object_path(&self, container: &str, name: &str) -> Result<PathBuf> {
        let mut path = self.container_path(container)?;
        if name.is_empty() || !name.split('/').all(is_plain_segment) {
            return Err(Error::InvalidPath(format!("invalid object name: '{name}'")));
        }
        path.extend(name.split('/'));
        Ok(path)
    }

    async fn require_container(&self, container: &str) -> Result<PathBuf> {
        let path = self.container_path(container)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(path),
            Ok(_) => Err(Error::NotFound(format!("Container not found: {container}"))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(Error::NotFound(format!("Container not found: {container}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove directories emptied by a delete, stopping at the container
    async fn prune_empty_parents(&self, container_dir: &Path, object: &Path) {
        let mut current = object.parent();
        while let Some(dir) = current {
            if dir == container_dir || !dir.starts_with(container_dir) {
                break;
            }
            if tokio::fs::remove_dir(dir).await.is_err() {
                break;
            }
            current = dir.parent();
        }
    }
}

fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\'])
}

fn modified(meta: &std::fs::Metadata) -> Option<Timestamp> {
    meta.modified()
        .ok()
        .and_then(|t| Timestamp::try_from(t).ok())
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn container_metadata(&self, container: &str) -> Result<Lookup<ContainerInfo>> {
        let path = self.container_path(container)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(Lookup::Found(ContainerInfo::new(container))),
            Ok(_) => Ok(Lookup::NotFound),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Lookup::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn object_metadata(&self, container: &str, name: &str) -> Result<Lookup<ObjectInfo>> {
        let path = self.object_path(container, name)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {
                let mut info = ObjectInfo::new(name).with_size(meta.len() as i64);
                info.last_modified = modified(&meta);
                Ok(Lookup::Found(info))
            }
            Ok(_) => Ok(Lookup::NotFound),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Lookup::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_container(&self, container: &str) -> Result<()> {
        let path = self.container_path(container)?;
        tokio::fs::create_dir_all(&self.root).await?;
        match tokio::fs::create_dir(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(Error::Conflict(format!(
                "Container already exists: {container}"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_object(&self, container: &str, name: &str) -> Result<()> {
        let container_dir = self.require_container(container).await?;
        let path = self.object_path(container, name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                self.prune_empty_parents(&container_dir, &path).await;
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(Error::NotFound(format!("{container}/{name}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn upload_object(&self, container: &str, name: &str, source: &Path) -> Result<()> {
        self.require_container(container).await?;
        let path = self.object_path(container, name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(source, &path).await?;
        Ok(())
    }

    async fn download_object(&self, container: &str, name: &str) -> Result<ByteStream> {
        let path = self.object_path(container, name)?;
        let file = match tokio::fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("{container}/{name}")));
            }
            Err(e) => return Err(e.into()),
        };

        let stream = futures::stream::try_unfold(file, |mut file| async move {
            let mut buf = vec![0u8; CHUNK_SIZE];
            let next: Result<Option<(Bytes, tokio::fs::File)>> = match file.read(&mut buf).await {
                Ok(0) => Ok(None),
                Ok(n) => {
                    buf.truncate(n);
                    Ok(Some((Bytes::from(buf), file)))
                }
                Err(e) => Err(e.into()),
            };
            next
        });

        Ok(Box::pin(stream))
    }

    async fn list_objects(&self, container: &str) -> Result<Vec<ObjectInfo>> {
        let container_dir = self.require_container(container).await?;

        let mut objects = Vec::new();
        let mut pending = vec![container_dir.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let meta = entry.metadata().await?;
                let path = entry.path();
                if meta.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&container_dir) else {
                    continue;
                };
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                let mut info = ObjectInfo::new(name).with_size(meta.len() as i64);
                info.last_modified = modified(&meta);
                objects.push(info);
            }
        }

        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }
}
