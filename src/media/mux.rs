//! FLV byte-stream muxing for the HTTP relay
//!
//! FLV file layout: a 9-byte file header, a zero `PreviousTagSize`, then a
//! sequence of tags each followed by its own `PreviousTagSize`:
//!
//! ```text
//! +--------+-------------+-------------+-------------+---------+-------------+
//! | Type(1)| DataSize(3) | TS(3) Ext(1)| StreamID(3) | Data(N) | PrevSize(4) |
//! +--------+-------------+-------------+-------------+---------+-------------+
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::relay::{MediaPacket, PacketKind};

/// FLV signature, version 1, audio+video present, 9-byte header,
/// followed by PreviousTagSize0 = 0
pub const FLV_FILE_HEADER: [u8; 13] = [
    b'F', b'L', b'V', 0x01, 0x05, 0x00, 0x00, 0x00, 0x09, 0x00, 0x00, 0x00, 0x00,
];

const TAG_HEADER_LEN: usize = 11;

const TAG_TYPE_AUDIO: u8 = 8;
const TAG_TYPE_VIDEO: u8 = 9;

/// Encode one media packet as an FLV tag plus its PreviousTagSize trailer
pub fn encode_tag(packet: &MediaPacket) -> Bytes {
    let tag_type = match packet.kind {
        PacketKind::Audio => TAG_TYPE_AUDIO,
        PacketKind::Video => TAG_TYPE_VIDEO,
    };

    let data_size = packet.data.len();
    let mut out = BytesMut::with_capacity(TAG_HEADER_LEN + data_size + 4);

    out.put_u8(tag_type);
    // DataSize, u24
    out.put_u8(((data_size >> 16) & 0xFF) as u8);
    out.put_u8(((data_size >> 8) & 0xFF) as u8);
    out.put_u8((data_size & 0xFF) as u8);
    // Timestamp, u24 low bits + u8 extension for the high byte
    let ts = packet.timestamp;
    out.put_u8(((ts >> 16) & 0xFF) as u8);
    out.put_u8(((ts >> 8) & 0xFF) as u8);
    out.put_u8((ts & 0xFF) as u8);
    out.put_u8(((ts >> 24) & 0xFF) as u8);
    // StreamID, always 0
    out.put_u8(0);
    out.put_u8(0);
    out.put_u8(0);

    out.put_slice(&packet.data);

    out.put_u32((TAG_HEADER_LEN + data_size) as u32);

    out.freeze()
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn test_file_header_layout() {
        assert_eq!(&FLV_FILE_HEADER[..3], b"FLV");
        assert_eq!(FLV_FILE_HEADER[3], 1); // version
        assert_eq!(FLV_FILE_HEADER[4], 0x05); // audio + video
        assert_eq!(FLV_FILE_HEADER[8], 9); // data offset
        assert_eq!(&FLV_FILE_HEADER[9..], &[0, 0, 0, 0]); // PreviousTagSize0
    }

    #[test]
    fn test_encode_video_tag() {
        let packet = MediaPacket::video(0x0102, Bytes::from_static(&[0x17, 0x01, 0xAA]));
        let tag = encode_tag(&packet);

        assert_eq!(tag[0], 9); // video tag type
        assert_eq!(&tag[1..4], &[0, 0, 3]); // data size
        assert_eq!(&tag[4..8], &[0x00, 0x01, 0x02, 0x00]); // ts + extension
        assert_eq!(&tag[8..11], &[0, 0, 0]); // stream id
        assert_eq!(&tag[11..14], &[0x17, 0x01, 0xAA]);
        assert_eq!(&tag[14..], &[0, 0, 0, 14]); // prev tag size = 11 + 3
        assert_eq!(tag.len(), 11 + 3 + 4);
    }

    #[test]
    fn test_encode_audio_tag() {
        let packet = MediaPacket::audio(0, Bytes::from_static(&[0xAF, 0x01]));
        let tag = encode_tag(&packet);

        assert_eq!(tag[0], 8); // audio tag type
        assert_eq!(&tag[1..4], &[0, 0, 2]);
        assert_eq!(&tag[4..8], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_extended_timestamp() {
        // Timestamps past 24 bits spill into the extension byte
        let packet = MediaPacket::video(0x0100_0000, Bytes::from_static(&[0x27]));
        let tag = encode_tag(&packet);

        assert_eq!(&tag[4..7], &[0, 0, 0]); // low 24 bits
        assert_eq!(tag[7], 0x01); // extension byte
    }
}
