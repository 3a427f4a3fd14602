//! Recording metadata persistence
//!
//! The relay core only derives archive metadata; durable storage lives
//! behind the [`ArchiveSink`] collaborator. The sole guarantee the core
//! relies on is that a successful write becomes visible to subsequent reads.

pub mod finalizer;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub use finalizer::{ArchiveFinalizer, SessionRecording};

/// Persisted metadata describing one completed recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveRecord {
    /// Display label
    pub title: String,
    /// Public path under which the file is served
    pub file_path: String,
    /// Recording length in seconds
    pub duration_secs: u64,
    /// File size in bytes
    pub file_size: u64,
    /// When the record was created
    pub created_at: DateTime<Utc>,
}

/// Storage collaborator for archive records
#[async_trait]
pub trait ArchiveSink: Send + Sync {
    /// Persist a record
    async fn create_archive(&self, record: ArchiveRecord) -> std::io::Result<()>;

    /// All persisted records, newest first
    async fn list_archives(&self) -> std::io::Result<Vec<ArchiveRecord>>;
}

/// In-memory sink for tests and the demo server
#[derive(Default)]
pub struct MemoryArchiveSink {
    records: Mutex<Vec<ArchiveRecord>>,
}

impl MemoryArchiveSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl ArchiveSink for MemoryArchiveSink {
    async fn create_archive(&self, record: ArchiveRecord) -> std::io::Result<()> {
        self.records.lock().push(record);
        Ok(())
    }

    async fn list_archives(&self) -> std::io::Result<Vec<ArchiveRecord>> {
        let mut records = self.records.lock().clone();
        records.reverse();
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_roundtrip() {
        let sink = MemoryArchiveSink::new();
        assert!(sink.list_archives().await.unwrap().is_empty());

        for i in 0..2u64 {
            sink.create_archive(ArchiveRecord {
                title: format!("Live stream {i}"),
                file_path: format!("/archive/a{i}.mp4"),
                duration_secs: 60 * i,
                file_size: 1024 * i,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        }

        let records = sink.list_archives().await.unwrap();
        assert_eq!(records.len(), 2);
        // Newest first
        assert_eq!(records[0].file_path, "/archive/a1.mp4");
    }
}
