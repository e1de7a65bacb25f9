//! Backend adapter contract
//!
//! The backup store talks to object storage only through [`ObjectStore`].
//! Implementations translate their backend's "does not exist" responses into
//! [`Lookup::NotFound`] for metadata calls and [`Error::NotFound`] for
//! delete/download, and must drain any pagination before returning listings.
//!
//! [`Error::NotFound`]: crate::Error::NotFound

use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Streamed object content, delivered chunk by chunk
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Outcome of an existence-checking metadata call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(v) => Some(v),
            Lookup::NotFound => None,
        }
    }
}

/// Container (bucket) metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub name: String,
}

impl ContainerInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Metadata for a single remote object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Full object name within its container, `/`-separated
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,
}

impl ObjectInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_modified: None,
            size_bytes: None,
        }
    }

    pub fn with_last_modified(mut self, ts: Timestamp) -> Self {
        self.last_modified = Some(ts);
        self
    }

    pub fn with_size(mut self, size: i64) -> Self {
        self.size_bytes = Some(size);
        self
    }
}

/// Object storage backend used by the backup store
///
/// Calls are independent; implementations hold no state that the store
/// relies on between them.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend identifier for log output (e.g. "s3", "local")
    fn backend_name(&self) -> &'static str;

    /// Fetch container metadata
    async fn container_metadata(&self, container: &str) -> Result<Lookup<ContainerInfo>>;

    /// Fetch object metadata
    async fn object_metadata(&self, container: &str, name: &str) -> Result<Lookup<ObjectInfo>>;

    /// Create a container. A pre-existing container yields `Error::Conflict`.
    async fn create_container(&self, container: &str) -> Result<()>;

    /// Delete an object. An absent object yields `Error::NotFound`.
    async fn delete_object(&self, container: &str, name: &str) -> Result<()>;

    /// Upload a local file, replacing any object of the same name
    async fn upload_object(&self, container: &str, name: &str, source: &Path) -> Result<()>;

    /// Stream an object's content. An absent object yields `Error::NotFound`.
    async fn download_object(&self, container: &str, name: &str) -> Result<ByteStream>;

    /// Enumerate every object in a container
    async fn list_objects(&self, container: &str) -> Result<Vec<ObjectInfo>>;

    /// Check whether a container exists
    async fn container_exists(&self, container: &str) -> Result<bool> {
        Ok(self.container_metadata(container).await?.is_found())
    }
}
