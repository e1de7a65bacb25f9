//! bmu-core: Core library for the bmu backup store
//!
//! This crate provides the backend-independent parts of bmu:
//! - The `ObjectStore` trait that storage adapters implement
//! - Name pattern construction for backup discovery
//! - The `BackupStore` facade (upload, get, delete, list)
//! - Configuration loading and validation
//! - Retry helpers for adapters
//! - A local filesystem backend
//!
//! Nothing here depends on a specific object storage SDK; the S3 adapter
//! lives in `bmu-s3`.

pub mod config;
pub mod error;
pub mod local;
pub mod pattern;
pub mod retry;
pub mod store;
pub mod traits;

pub use config::{
    BackupConfig, BackupSettings, Config, ResolvedBackup, RetryConfig, StoreConfig, StoreType,
};
pub use error::{Error, Result};
pub use local::LocalStore;
pub use pattern::{MatchMode, NamePattern, build_pattern};
pub use retry::{is_retryable_error, retry_with_backoff};
pub use store::{BackupRecord, BackupStore, ContainerPolicy, ListQuery};
pub use traits::{ByteStream, ContainerInfo, Lookup, ObjectInfo, ObjectStore};
