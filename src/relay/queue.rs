//! Per-session broadcast queue
//!
//! Single-writer/multi-reader relay of media packets built on
//! `tokio::sync::broadcast`. Each reader owns an independent cursor; a reader
//! that falls further behind than the channel capacity skips forward to the
//! oldest retained packet rather than stalling the writer.
//!
//! A queue instance serves exactly one ingest session. Closing it wakes all
//! readers with end-of-stream and rejects further writes; the instance is
//! then discarded and a fresh queue is installed for the next session.

use parking_lot::RwLock;
use rml_rtmp::sessions::StreamMetadata;
use tokio::sync::broadcast;

use crate::error::{Error, Result};

use super::packet::MediaPacket;

/// Codec/header metadata written once at session start
///
/// New viewers need this before any data packet: the `onMetaData` fields and
/// the AVC/AAC decoder-configuration records the publisher sent up front.
#[derive(Debug, Clone)]
pub struct StreamHeader {
    /// Publisher's `onMetaData` contents, if it sent any
    pub metadata: Option<StreamMetadata>,
    /// Cached video decoder-configuration packet
    pub video_config: Option<MediaPacket>,
    /// Cached audio decoder-configuration packet
    pub audio_config: Option<MediaPacket>,
}

struct Shared {
    /// `None` once the queue is closed
    tx: Option<broadcast::Sender<MediaPacket>>,
    metadata: Option<StreamMetadata>,
    video_config: Option<MediaPacket>,
    audio_config: Option<MediaPacket>,
}

/// Single-producer, multi-consumer packet relay for one session
pub struct BroadcastQueue {
    shared: RwLock<Shared>,
}

impl BroadcastQueue {
    /// Create an open queue with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            shared: RwLock::new(Shared {
                tx: Some(tx),
                metadata: None,
                video_config: None,
                audio_config: None,
            }),
        }
    }

    /// Record the session's stream metadata
    ///
    /// Called once per session, before any packets; visible to every cursor
    /// attached afterwards.
    pub fn write_header(&self, metadata: StreamMetadata) {
        self.shared.write().metadata = Some(metadata);
    }

    /// Current header, if the session has produced one yet
    pub fn header(&self) -> Option<StreamHeader> {
        let shared = self.shared.read();
        if shared.metadata.is_none()
            && shared.video_config.is_none()
            && shared.audio_config.is_none()
        {
            return None;
        }
        Some(StreamHeader {
            metadata: shared.metadata.clone(),
            video_config: shared.video_config.clone(),
            audio_config: shared.audio_config.clone(),
        })
    }

    /// Append a packet
    ///
    /// Never blocks on slow readers. Decoder-configuration packets are also
    /// cached into the header so late joiners can initialize decoders.
    pub fn write(&self, packet: MediaPacket) -> Result<()> {
        let mut shared = self.shared.write();

        if packet.is_video_config() {
            shared.video_config = Some(packet.clone());
        } else if packet.is_audio_config() {
            shared.audio_config = Some(packet.clone());
        }

        match shared.tx.as_ref() {
            // send() only fails when no cursor is attached; a stream with no
            // viewers is not an error
            Some(tx) => {
                let _ = tx.send(packet);
                Ok(())
            }
            None => Err(Error::QueueClosed),
        }
    }

    /// Attach a read cursor positioned at the most recent packet
    ///
    /// Cursors attached to an already-closed queue yield end-of-stream
    /// immediately.
    pub fn cursor(&self) -> Cursor {
        let shared = self.shared.read();
        Cursor {
            rx: shared.tx.as_ref().map(|tx| tx.subscribe()),
            skipped: 0,
        }
    }

    /// Close the queue, waking all outstanding and future reads with
    /// end-of-stream
    ///
    /// Idempotent, and safe to call from a different task than the writer.
    pub fn close(&self) {
        self.shared.write().tx.take();
    }

    /// Whether the queue has been closed
    pub fn is_closed(&self) -> bool {
        self.shared.read().tx.is_none()
    }

    /// Number of currently attached cursors
    pub fn reader_count(&self) -> usize {
        self.shared
            .read()
            .tx
            .as_ref()
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

/// Independent read position on a [`BroadcastQueue`]
pub struct Cursor {
    rx: Option<broadcast::Receiver<MediaPacket>>,
    skipped: u64,
}

impl Cursor {
    /// Next packet in write order, or `None` at end-of-stream
    ///
    /// A cursor that lagged past the channel capacity resumes at the oldest
    /// retained packet and records how many were skipped.
    pub async fn next(&mut self) -> Option<MediaPacket> {
        let rx = self.rx.as_mut()?;

        loop {
            match rx.recv().await {
                Ok(packet) => return Some(packet),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.skipped += n;
                    tracing::debug!(skipped = n, "Slow reader skipped forward");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.rx = None;
                    return None;
                }
            }
        }
    }

    /// Total packets skipped due to lag
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}
