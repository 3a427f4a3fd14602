//! Crate-level error and result types

use thiserror::Error;

/// Error type for server and session operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (socket, filesystem)
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// RTMP handshake did not complete
    ///
    /// `rml_rtmp` errors don't travel well across task boundaries, so they
    /// are captured as rendered strings at the call site.
    #[error("rtmp handshake failed: {0}")]
    Handshake(String),

    /// RTMP session protocol error
    #[error("rtmp session error: {0}")]
    Session(String),

    /// The broadcast queue for the current session was closed
    #[error("broadcast queue closed")]
    QueueClosed,

    /// Peer closed the connection
    #[error("connection closed by peer")]
    ConnectionClosed,
}

/// Convenience result alias
pub type Result<T> = std::result::Result<T, Error>;
