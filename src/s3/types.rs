//! Storage record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference record for an object held in the bucket.
///
/// Produced by a successful upload, or rebuilt from persisted fields to
/// address a later get or delete. A value, not a live handle: it owns no
/// network resources and never changes after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageInfo {
    /// Canonical unsigned location: `{endpoint}/{bucket}/{file_name}`
    pub original_path: String,

    /// Time-limited presigned retrieval URL
    pub path: String,

    /// Object key within the bucket
    pub file_name: String,

    /// Content tag reported by the store on write, quote-stripped;
    /// sent back as an if-match precondition on reads
    pub etag: String,

    /// Instant this record was constructed (client clock, not server)
    pub created_date: DateTime<Utc>,

    /// Origin tag copied from the settings at upload time
    pub sender: String,
}

impl StorageInfo {
    pub fn new(
        original_path: String,
        path: String,
        file_name: String,
        etag: String,
        sender: String,
    ) -> Self {
        Self {
            original_path,
            path,
            file_name,
            etag,
            created_date: Utc::now(),
            sender,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_date_is_construction_instant() {
        let before = Utc::now();
        let info = StorageInfo::new(
            "https://s3.example.com/bucket/a.csv".to_string(),
            "https://s3.example.com/bucket/a.csv?X-Amz-Signature=abc".to_string(),
            "a.csv".to_string(),
            "etag123".to_string(),
            "reports@example.net".to_string(),
        );
        let after = Utc::now();

        assert!(info.created_date >= before && info.created_date <= after);
        assert_eq!(info.file_name, "a.csv");
        assert_ne!(info.path, info.original_path);
    }
}
