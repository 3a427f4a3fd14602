//! FLV payload classification
//!
//! RTMP audio/video messages are FLV tag bodies without the tag header, so
//! the first byte(s) of a payload identify frame type, codec and whether the
//! payload is a decoder-configuration record (sequence header).
//!
//! RTMP Video Data:
//! ```text
//! +----------+----------+
//! | FrameType| CodecID  | CodecData...
//! | (4 bits) | (4 bits) |
//! +----------+----------+
//! ```
//!
//! RTMP Audio Data:
//! ```text
//! +-----------+---------+----------+----------+
//! |SoundFormat|SoundRate|SoundSize |SoundType | AudioData...
//! | (4 bits)  | (2 bits)| (1 bit)  | (1 bit)  |
//! +-----------+---------+----------+----------+
//! ```

/// Video frame type (upper 4 bits of the first payload byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoFrameType {
    /// Keyframe (for AVC, a seekable frame)
    Keyframe = 1,
    /// Inter frame
    InterFrame = 2,
    /// Disposable inter frame (H.263 only)
    DisposableInterFrame = 3,
    /// Generated keyframe (reserved for server use)
    GeneratedKeyframe = 4,
    /// Video info/command frame
    VideoInfoFrame = 5,
}

impl VideoFrameType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match (b >> 4) & 0x0F {
            1 => Some(VideoFrameType::Keyframe),
            2 => Some(VideoFrameType::InterFrame),
            3 => Some(VideoFrameType::DisposableInterFrame),
            4 => Some(VideoFrameType::GeneratedKeyframe),
            5 => Some(VideoFrameType::VideoInfoFrame),
            _ => None,
        }
    }

    pub fn is_keyframe(&self) -> bool {
        matches!(
            self,
            VideoFrameType::Keyframe | VideoFrameType::GeneratedKeyframe
        )
    }
}

/// Video codec ID (lower 4 bits of the first payload byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    SorensonH263 = 2,
    ScreenVideo = 3,
    Vp6 = 4,
    Vp6Alpha = 5,
    ScreenVideoV2 = 6,
    /// AVC (H.264)
    Avc = 7,
    /// HEVC (H.265) - enhanced RTMP extension
    Hevc = 12,
    /// AV1 - enhanced RTMP extension
    Av1 = 13,
}

impl VideoCodec {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b & 0x0F {
            2 => Some(VideoCodec::SorensonH263),
            3 => Some(VideoCodec::ScreenVideo),
            4 => Some(VideoCodec::Vp6),
            5 => Some(VideoCodec::Vp6Alpha),
            6 => Some(VideoCodec::ScreenVideoV2),
            7 => Some(VideoCodec::Avc),
            12 => Some(VideoCodec::Hevc),
            13 => Some(VideoCodec::Av1),
            _ => None,
        }
    }
}

/// Audio format (upper 4 bits of the first payload byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    LinearPcmPlatform = 0,
    Adpcm = 1,
    Mp3 = 2,
    LinearPcmLe = 3,
    Nellymoser16kMono = 4,
    Nellymoser8kMono = 5,
    Nellymoser = 6,
    G711ALaw = 7,
    G711MuLaw = 8,
    Aac = 10,
    Speex = 11,
    Mp38k = 14,
    DeviceSpecific = 15,
}

impl AudioFormat {
    pub fn from_byte(b: u8) -> Option<Self> {
        match (b >> 4) & 0x0F {
            0 => Some(AudioFormat::LinearPcmPlatform),
            1 => Some(AudioFormat::Adpcm),
            2 => Some(AudioFormat::Mp3),
            3 => Some(AudioFormat::LinearPcmLe),
            4 => Some(AudioFormat::Nellymoser16kMono),
            5 => Some(AudioFormat::Nellymoser8kMono),
            6 => Some(AudioFormat::Nellymoser),
            7 => Some(AudioFormat::G711ALaw),
            8 => Some(AudioFormat::G711MuLaw),
            10 => Some(AudioFormat::Aac),
            11 => Some(AudioFormat::Speex),
            14 => Some(AudioFormat::Mp38k),
            15 => Some(AudioFormat::DeviceSpecific),
            _ => None,
        }
    }
}

/// Check whether a video payload is a keyframe
pub fn is_video_keyframe(data: &[u8]) -> bool {
    data.first()
        .and_then(|b| VideoFrameType::from_byte(*b))
        .map(|ft| ft.is_keyframe())
        .unwrap_or(false)
}

/// Check whether a video payload is an AVC decoder-configuration record
pub fn is_avc_sequence_header(data: &[u8]) -> bool {
    data.len() >= 2 && VideoCodec::from_byte(data[0]) == Some(VideoCodec::Avc) && data[1] == 0
}

/// Check whether an audio payload is an AAC audio-specific-config record
pub fn is_aac_sequence_header(data: &[u8]) -> bool {
    data.len() >= 2 && AudioFormat::from_byte(data[0]) == Some(AudioFormat::Aac) && data[1] == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_frame_type() {
        // Keyframe + AVC
        assert_eq!(
            VideoFrameType::from_byte(0x17),
            Some(VideoFrameType::Keyframe)
        );
        assert_eq!(VideoCodec::from_byte(0x17), Some(VideoCodec::Avc));

        // Inter frame + AVC
        assert_eq!(
            VideoFrameType::from_byte(0x27),
            Some(VideoFrameType::InterFrame)
        );
        assert_eq!(VideoFrameType::from_byte(0x00), None);
        assert_eq!(VideoFrameType::from_byte(0x60), None);
    }

    #[test]
    fn test_video_frame_type_is_keyframe() {
        assert!(VideoFrameType::Keyframe.is_keyframe());
        assert!(VideoFrameType::GeneratedKeyframe.is_keyframe());
        assert!(!VideoFrameType::InterFrame.is_keyframe());
        assert!(!VideoFrameType::VideoInfoFrame.is_keyframe());
    }

    #[test]
    fn test_is_video_keyframe() {
        assert!(is_video_keyframe(&[0x17, 0x01]));
        assert!(!is_video_keyframe(&[0x27, 0x01]));
        assert!(!is_video_keyframe(&[]));
    }

    #[test]
    fn test_avc_sequence_header() {
        assert!(is_avc_sequence_header(&[0x17, 0x00, 0x00, 0x00, 0x00]));
        // AVC but a NALU, not a config record
        assert!(!is_avc_sequence_header(&[0x17, 0x01, 0x00, 0x00, 0x00]));
        // HEVC config record is not an AVC one
        assert!(!is_avc_sequence_header(&[0x1C, 0x00]));
        // Too short
        assert!(!is_avc_sequence_header(&[0x17]));
    }

    #[test]
    fn test_aac_sequence_header() {
        assert!(is_aac_sequence_header(&[0xAF, 0x00, 0x12, 0x10]));
        // Raw AAC frame
        assert!(!is_aac_sequence_header(&[0xAF, 0x01, 0x21, 0x00]));
        // MP3 never has one
        assert!(!is_aac_sequence_header(&[0x2F, 0x00]));
        assert!(!is_aac_sequence_header(&[0xAF]));
    }

    #[test]
    fn test_audio_format_decoding() {
        assert_eq!(AudioFormat::from_byte(0xAF), Some(AudioFormat::Aac));
        assert_eq!(AudioFormat::from_byte(0x2F), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::from_byte(0x90), None); // 9 is not defined
    }

    #[test]
    fn test_video_codec_decoding() {
        assert_eq!(VideoCodec::from_byte(0x17), Some(VideoCodec::Avc));
        assert_eq!(VideoCodec::from_byte(0x1C), Some(VideoCodec::Hevc));
        assert_eq!(VideoCodec::from_byte(0x1D), Some(VideoCodec::Av1));
        assert_eq!(VideoCodec::from_byte(0x10), None);
    }
}
