//! Server configuration

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::transcode::Rendition;

/// Policy for mapping an inbound publish path to a stream identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamKeyPolicy {
    /// Use the stream key from the publish request as-is
    Verbatim,
    /// Map every inbound publish to one fixed identity, regardless of the
    /// key the encoder sends
    Canonical(String),
}

impl StreamKeyPolicy {
    /// Resolve the effective stream identity for a publish request
    pub fn resolve(&self, requested: &str) -> String {
        match self {
            StreamKeyPolicy::Verbatim => requested.to_string(),
            StreamKeyPolicy::Canonical(key) => key.clone(),
        }
    }
}

/// Relay server configuration options
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address the RTMP ingest listener binds to
    pub rtmp_addr: SocketAddr,

    /// Address the HTTP gateway (playback, heartbeat, stats) binds to
    pub http_addr: SocketAddr,

    /// Root directory for segmented (HLS) output, one subdirectory per
    /// stream identity
    pub hls_root: PathBuf,

    /// Directory for completed recording files
    pub archive_root: PathBuf,

    /// Public path prefix under which archive files are served
    pub archive_web_prefix: String,

    /// Transcoder binary to invoke
    pub ffmpeg_bin: String,

    /// How inbound publish paths map to stream identities
    pub key_policy: StreamKeyPolicy,

    /// Rendition ladder for the adaptive output set
    pub renditions: Vec<Rendition>,

    /// Segment duration in seconds
    pub segment_seconds: u32,

    /// Number of segments retained per rendition playlist
    pub segment_window: u32,

    /// Capacity of the per-session broadcast channel; a reader that falls
    /// further behind than this skips forward to the oldest retained packet
    pub broadcast_capacity: usize,

    /// Heartbeats older than this are considered stale. Must exceed the
    /// client heartbeat interval with margin for jitter.
    pub heartbeat_window: Duration,

    /// Multiplier applied to the raw viewer count to compensate for
    /// shared-address undercounting. Approximate by nature; zero stays zero.
    pub viewer_multiplier: u32,

    /// Number of samples retained in the viewer history buffer
    pub history_capacity: usize,

    /// Maximum concurrent RTMP connections (0 = unlimited)
    pub max_connections: usize,

    /// Enable TCP_NODELAY on accepted connections
    pub tcp_nodelay: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            rtmp_addr: "0.0.0.0:1935".parse().unwrap(),
            http_addr: "0.0.0.0:8081".parse().unwrap(),
            hls_root: PathBuf::from("/var/www/hls"),
            archive_root: PathBuf::from("/var/www/archive"),
            archive_web_prefix: "/archive".to_string(),
            ffmpeg_bin: "ffmpeg".to_string(),
            key_policy: StreamKeyPolicy::Verbatim,
            renditions: Rendition::default_ladder(),
            segment_seconds: 2,
            segment_window: 6,
            broadcast_capacity: 512,
            heartbeat_window: Duration::from_secs(15),
            viewer_multiplier: 10,
            history_capacity: 20,
            max_connections: 0, // Unlimited
            tcp_nodelay: true,  // Important for low latency
        }
    }
}

impl RelayConfig {
    /// Set the RTMP bind address
    pub fn rtmp_bind(mut self, addr: SocketAddr) -> Self {
        self.rtmp_addr = addr;
        self
    }

    /// Set the HTTP bind address
    pub fn http_bind(mut self, addr: SocketAddr) -> Self {
        self.http_addr = addr;
        self
    }

    /// Set the segmented-output root directory
    pub fn hls_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.hls_root = root.into();
        self
    }

    /// Set the archive output directory
    pub fn archive_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.archive_root = root.into();
        self
    }

    /// Set the transcoder binary
    pub fn ffmpeg_bin(mut self, bin: impl Into<String>) -> Self {
        self.ffmpeg_bin = bin.into();
        self
    }

    /// Set the stream-key mapping policy
    pub fn key_policy(mut self, policy: StreamKeyPolicy) -> Self {
        self.key_policy = policy;
        self
    }

    /// Set the rendition ladder
    pub fn renditions(mut self, renditions: Vec<Rendition>) -> Self {
        self.renditions = renditions;
        self
    }

    /// Set the heartbeat freshness window
    pub fn heartbeat_window(mut self, window: Duration) -> Self {
        self.heartbeat_window = window;
        self
    }

    /// Set the viewer-count multiplier
    pub fn viewer_multiplier(mut self, multiplier: u32) -> Self {
        self.viewer_multiplier = multiplier;
        self
    }

    /// Set maximum concurrent RTMP connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Segmented-output directory for a stream identity
    pub fn hls_dir_for(&self, stream_key: &str) -> PathBuf {
        self.hls_root.join(stream_key)
    }

    /// Archive file path for a session that started at `unix_ts`
    pub fn archive_path_for(&self, stream_key: &str, unix_ts: i64) -> PathBuf {
        self.archive_root
            .join(format!("archive_{}_{}.mp4", stream_key, unix_ts))
    }

    /// Public web path corresponding to an archive file
    pub fn archive_web_path(&self, archive_path: &Path) -> String {
        let name = archive_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}/{}", self.archive_web_prefix.trim_end_matches('/'), name)
    }

    /// URL the transcoder uses to pull the live stream back from this server
    pub fn local_pull_url(&self, app: &str, stream_key: &str) -> String {
        format!(
            "rtmp://127.0.0.1:{}/{}/{}",
            self.rtmp_addr.port(),
            app,
            stream_key
        )
    }
}
