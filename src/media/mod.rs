//! Media payload helpers
//!
//! Classification of RTMP/FLV audio and video payloads, plus the FLV muxer
//! used by the HTTP relay. Codec bitstreams themselves are never parsed
//! beyond the leading classification bytes.

pub mod flv;
pub mod mux;

pub use flv::{is_aac_sequence_header, is_avc_sequence_header, is_video_keyframe};
pub use flv::{AudioFormat, VideoCodec, VideoFrameType};
pub use mux::{encode_tag, FLV_FILE_HEADER};
