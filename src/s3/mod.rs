//! Signed object storage module
//!
//! This module provides:
//! - AWS Signature Version 4 signing and presigned retrieval URLs
//! - Async upload/get/delete/download operations against one bucket
//! - The injectable HTTP transport seam and the stored-object record type

pub mod client;
pub mod signer;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use client::{ObjectStorageClient, Result, StorageError};
pub use signer::{SignatureResult, SignerV4, SigningError};
pub use transport::{HttpTransport, Transport, TransportError, WireResponse};
pub use types::StorageInfo;
