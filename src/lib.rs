//! streamcast: live stream ingest, relay and recording
//!
//! One publisher pushes a stream over RTMP; any number of viewers pull it
//! back with minimal latency over HTTP-FLV (or RTMP), while an external
//! transcoder produces an adaptive HLS set and a recorded archive file.
//! The RTMP wire protocol is handled by `rml_rtmp`; this crate supplies the
//! orchestration around it:
//!
//! - per-identity ingest sessions supervising the transcoder subprocess
//! - a single-writer/multi-reader broadcast queue with latest-position cursors
//! - the HTTP gateway for playback, viewer heartbeats and statistics
//! - archive record finalization through a pluggable storage collaborator
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use streamcast::{MemoryArchiveSink, RelayConfig, RelayServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = RelayServer::new(RelayConfig::default(), MemoryArchiveSink::new());
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod gateway;
pub mod media;
pub mod relay;
pub mod server;
pub mod session;
pub mod stats;
pub mod transcode;

// Re-export main types for convenience
pub use archive::{ArchiveRecord, ArchiveSink, MemoryArchiveSink};
pub use config::{RelayConfig, StreamKeyPolicy};
pub use error::{Error, Result};
pub use relay::{BroadcastQueue, MediaPacket, RelayHub};
pub use server::RelayServer;
pub use session::{generate_stream_key, IngestSupervisor};
pub use stats::ViewerStats;
pub use transcode::{Rendition, TranscodeSpec};
