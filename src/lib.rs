//! s3courier - signed uploads, downloads and deletes against S3-compatible object storage

pub mod cli;
pub mod config;
pub mod s3;

pub use config::StorageSettings;
pub use s3::{ObjectStorageClient, StorageError, StorageInfo};
