//! Archive finalization
//!
//! Runs strictly after the transcoder process has exited: confirms the
//! recording file exists on disk, derives its metadata and hands the record
//! to the storage collaborator. Every failure here is logged and dropped;
//! finalization never blocks or retries inside the teardown path.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use super::{ArchiveRecord, ArchiveSink};

/// What the finalizer needs to know about a finished session
#[derive(Debug, Clone)]
pub struct SessionRecording {
    /// Stream identity the session ran under
    pub stream_key: String,
    /// Where the transcoder was told to write the archive file
    pub archive_path: PathBuf,
    /// Public path the record should reference
    pub web_path: String,
    /// When the ingest session started
    pub started_at: Instant,
}

/// Turns transcoder exit outcomes into archive records
#[derive(Clone)]
pub struct ArchiveFinalizer {
    sink: Arc<dyn ArchiveSink>,
}

impl ArchiveFinalizer {
    pub fn new(sink: Arc<dyn ArchiveSink>) -> Self {
        Self { sink }
    }

    /// Derive and persist the archive record for a finished session
    ///
    /// The exit status is recorded for observability but does not gate the
    /// record: the teardown kill races the transcoder's own end-of-input
    /// shutdown, so file existence is the reliable signal that a recording
    /// was produced.
    pub async fn finalize(&self, recording: &SessionRecording, exit: std::io::Result<ExitStatus>) {
        match exit {
            Ok(status) => tracing::info!(
                stream = %recording.stream_key,
                status = ?status.code(),
                "Transcoder finished"
            ),
            Err(e) => tracing::warn!(
                stream = %recording.stream_key,
                error = %e,
                "Transcoder exit could not be observed"
            ),
        }

        let file_size = match tokio::fs::metadata(&recording.archive_path).await {
            Ok(meta) => meta.len(),
            Err(_) => {
                tracing::warn!(
                    stream = %recording.stream_key,
                    path = %recording.archive_path.display(),
                    "Archive file missing, no record created"
                );
                return;
            }
        };

        let now = Utc::now();
        let record = ArchiveRecord {
            title: format!("Live stream {}", now.format("%Y-%m-%d %H:%M")),
            file_path: recording.web_path.clone(),
            duration_secs: recording.started_at.elapsed().as_secs(),
            file_size,
            created_at: now,
        };

        tracing::info!(
            stream = %recording.stream_key,
            path = %record.file_path,
            size = file_size,
            duration_secs = record.duration_secs,
            "Archive recorded"
        );

        if let Err(e) = self.sink.create_archive(record).await {
            tracing::error!(
                stream = %recording.stream_key,
                error = %e,
                "Failed to persist archive record"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::process::ExitStatusExt;

    use crate::archive::MemoryArchiveSink;

    use super::*;

    fn recording(path: PathBuf) -> SessionRecording {
        SessionRecording {
            stream_key: "abc123".into(),
            archive_path: path,
            web_path: "/archive/archive_abc123_1.mp4".into(),
            started_at: Instant::now(),
        }
    }

    #[tokio::test]
    async fn test_finalize_existing_file_creates_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive_abc123_1.mp4");
        tokio::fs::write(&path, vec![0u8; 2048]).await.unwrap();

        let sink = MemoryArchiveSink::new();
        let finalizer = ArchiveFinalizer::new(sink.clone());
        finalizer
            .finalize(&recording(path), Ok(ExitStatus::from_raw(0)))
            .await;

        let records = sink.list_archives().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_size, 2048);
        assert_eq!(records[0].file_path, "/archive/archive_abc123_1.mp4");
    }

    #[tokio::test]
    async fn test_finalize_missing_file_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never-written.mp4");

        let sink = MemoryArchiveSink::new();
        let finalizer = ArchiveFinalizer::new(sink.clone());
        finalizer
            .finalize(&recording(path), Ok(ExitStatus::from_raw(1)))
            .await;

        assert!(sink.list_archives().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_finalize_records_despite_nonzero_exit() {
        // A killed transcoder still leaves a playable file behind
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive_abc123_2.mp4");
        tokio::fs::write(&path, vec![0u8; 64]).await.unwrap();

        let sink = MemoryArchiveSink::new();
        let finalizer = ArchiveFinalizer::new(sink.clone());
        finalizer
            .finalize(&recording(path), Ok(ExitStatus::from_raw(9)))
            .await;

        assert_eq!(sink.list_archives().await.unwrap().len(), 1);
    }
}
