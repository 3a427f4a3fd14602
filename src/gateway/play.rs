//! HTTP-FLV live relay
//!
//! Serves each viewer an open-ended FLV stream muxed from a fresh broadcast
//! cursor. The response body is length-less, so hyper frames it chunked. A
//! bounded channel decouples relay pacing from the viewer's socket: when the
//! viewer cannot keep up, the pump blocks and the cursor skips forward.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::media::{encode_tag, FLV_FILE_HEADER};
use crate::relay::{BroadcastQueue, Cursor};

use super::GatewayState;

const FLV_CHANNEL_CAPACITY: usize = 64;

/// `GET /live/:stream`: relay the identity's current session as FLV
pub async fn serve_flv(
    Path(stream): Path<String>,
    State(state): State<GatewayState>,
) -> Result<Response, StatusCode> {
    let key = state.policy.resolve(strip_flv_suffix(&stream));

    let Some(queue) = state.hub.current(&key) else {
        tracing::debug!(stream = %key, "No current session for play request");
        return Err(StatusCode::NOT_FOUND);
    };

    tracing::info!(stream = %key, "FLV viewer attached");

    let cursor = queue.cursor();
    let (tx, rx) = mpsc::channel::<std::io::Result<Bytes>>(FLV_CHANNEL_CAPACITY);
    tokio::spawn(pump(queue, cursor, tx));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/x-flv")
        .header(header::CACHE_CONTROL, "no-cache, no-store")
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Copy cursor packets into the response channel until either side ends
///
/// Ends when the viewer disconnects (the channel closes under us) or the
/// session's queue closes (cursor end-of-stream); dropping the sender
/// terminates the chunked body cleanly.
async fn pump(
    queue: Arc<BroadcastQueue>,
    mut cursor: Cursor,
    tx: mpsc::Sender<std::io::Result<Bytes>>,
) {
    if tx
        .send(Ok(Bytes::from_static(&FLV_FILE_HEADER)))
        .await
        .is_err()
    {
        return;
    }

    let mut sent_configs = false;
    while let Some(packet) = cursor.next().await {
        // Decoder configs come from the session header; they may not exist
        // yet if the viewer attached before the session produced them
        if !sent_configs {
            if let Some(header) = queue.header() {
                for config in [header.video_config, header.audio_config]
                    .into_iter()
                    .flatten()
                {
                    if tx.send(Ok(encode_tag(&config))).await.is_err() {
                        return;
                    }
                }
                sent_configs = true;
            }
        }

        if tx.send(Ok(encode_tag(&packet))).await.is_err() {
            tracing::debug!("FLV viewer disconnected");
            return;
        }
    }

    tracing::debug!(skipped = cursor.skipped(), "FLV relay reached end of stream");
}

fn strip_flv_suffix(stream: &str) -> &str {
    stream.strip_suffix(".flv").unwrap_or(stream)
}

#[cfg(test)]
mod tests {
    use rml_rtmp::sessions::StreamMetadata;

    use crate::relay::MediaPacket;

    use super::*;

    #[test]
    fn test_strip_flv_suffix() {
        assert_eq!(strip_flv_suffix("abc123.flv"), "abc123");
        assert_eq!(strip_flv_suffix("abc123"), "abc123");
        assert_eq!(strip_flv_suffix("weird.flv.flv"), "weird.flv");
    }

    #[tokio::test]
    async fn test_pump_emits_header_configs_then_packets() {
        let queue = Arc::new(BroadcastQueue::new(16));
        queue.write_header(StreamMetadata::new());
        queue
            .write(MediaPacket::video(0, Bytes::from_static(&[0x17, 0x00])))
            .unwrap();

        let cursor = queue.cursor();
        queue
            .write(MediaPacket::video(40, Bytes::from_static(&[0x27, 0x01])))
            .unwrap();
        queue.close();

        let (tx, mut rx) = mpsc::channel(16);
        pump(queue, cursor, tx).await;

        let file_header = rx.recv().await.unwrap().unwrap();
        assert_eq!(&file_header[..3], b"FLV");

        // Cached video config precedes the live packet
        let config_tag = rx.recv().await.unwrap().unwrap();
        assert_eq!(config_tag[0], 9);
        assert_eq!(&config_tag[11..13], &[0x17, 0x00]);

        let data_tag = rx.recv().await.unwrap().unwrap();
        assert_eq!(&data_tag[11..13], &[0x27, 0x01]);

        // Queue close ends the body
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_pump_ends_when_viewer_goes_away() {
        let queue = Arc::new(BroadcastQueue::new(16));
        let cursor = queue.cursor();

        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        // Must return promptly instead of blocking on a dead channel
        pump(queue, cursor, tx).await;
    }
}
