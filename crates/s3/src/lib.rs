//! bmu-s3: S3 adapter for bmu
//!
//! Implements the `ObjectStore` trait from bmu-core on top of aws-sdk-s3, so
//! the backup store can run against AWS S3, RustFS, MinIO, or any other
//! S3-compatible service.

mod client;

pub use client::S3Client;
