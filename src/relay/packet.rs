//! Media packet type relayed between publisher and viewers
//!
//! Designed to be cheap to clone: the payload is reference-counted `Bytes`,
//! so fanning a packet out to N viewers shares one allocation.

use bytes::Bytes;

use crate::media;

/// Kind of media payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Audio,
    Video,
}

/// One relayed media packet
#[derive(Debug, Clone)]
pub struct MediaPacket {
    /// Payload kind
    pub kind: PacketKind,
    /// Timestamp in milliseconds, as sent by the publisher
    pub timestamp: u32,
    /// Raw FLV tag body (zero-copy via reference counting)
    pub data: Bytes,
}

impl MediaPacket {
    /// Create a video packet
    pub fn video(timestamp: u32, data: Bytes) -> Self {
        Self {
            kind: PacketKind::Video,
            timestamp,
            data,
        }
    }

    /// Create an audio packet
    pub fn audio(timestamp: u32, data: Bytes) -> Self {
        Self {
            kind: PacketKind::Audio,
            timestamp,
            data,
        }
    }

    /// Whether this is a video keyframe
    pub fn is_keyframe(&self) -> bool {
        self.kind == PacketKind::Video && media::is_video_keyframe(&self.data)
    }

    /// Whether this is a video decoder-configuration record
    pub fn is_video_config(&self) -> bool {
        self.kind == PacketKind::Video && media::is_avc_sequence_header(&self.data)
    }

    /// Whether this is an audio decoder-configuration record
    pub fn is_audio_config(&self) -> bool {
        self.kind == PacketKind::Audio && media::is_aac_sequence_header(&self.data)
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_packet() {
        let packet = MediaPacket::video(1000, Bytes::from_static(&[0x17, 0x01]));
        assert_eq!(packet.kind, PacketKind::Video);
        assert_eq!(packet.timestamp, 1000);
        assert!(packet.is_keyframe());
        assert!(!packet.is_video_config());
        assert_eq!(packet.len(), 2);
    }

    #[test]
    fn test_config_detection() {
        let video_config = MediaPacket::video(0, Bytes::from_static(&[0x17, 0x00]));
        assert!(video_config.is_video_config());

        let audio_config = MediaPacket::audio(0, Bytes::from_static(&[0xAF, 0x00]));
        assert!(audio_config.is_audio_config());
        assert!(!audio_config.is_keyframe());

        let audio_frame = MediaPacket::audio(40, Bytes::from_static(&[0xAF, 0x01]));
        assert!(!audio_frame.is_audio_config());
    }
}
