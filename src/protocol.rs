//! UDP wire format for the Ultimate 64 video and audio streams
//!
//! Both streams use fixed-size little-endian datagrams, one per row segment
//! (video) or sample block (audio):
//!
//! ```text
//! Video (780 bytes)
//! ┌────────┬──────────┬─────────┬───────────────┬─────────┬─────┬──────────┬──────────────┐
//! │ seq:u16│ frame:u16│ line:u16│ pixels/line:u16│ lines:u8│bpp:u8│ enc:u16 │ payload[768] │
//! └────────┴──────────┴─────────┴───────────────┴─────────┴─────┴──────────┴──────────────┘
//!
//! Audio (1538 bytes)
//! ┌────────┬───────────────────────────┐
//! │ seq:u16│ samples: 768 × i16 LE     │
//! └────────┴───────────────────────────┘
//! ```
//!
//! Bit 15 of `line` marks the packet that completes the current frame; bits
//! 0-14 are the destination row. In 4-bit packed mode each payload byte holds
//! two palette indices, low nibble left, high nibble right.
//!
//! Decoding is length-checked: a datagram that is not exactly the expected
//! size is rejected with `MalformedPacket` rather than read out of bounds.
//! Packet views borrow the receive buffer and are valid for one decode call.

use crate::error::{Error, Result};

/// Video payload bytes per packet
pub const VIDEO_PAYLOAD_SIZE: usize = 768;
/// Video packet header bytes
pub const VIDEO_HEADER_SIZE: usize = 12;
/// Total video datagram size
pub const VIDEO_PACKET_SIZE: usize = VIDEO_HEADER_SIZE + VIDEO_PAYLOAD_SIZE;

/// Signed 16-bit samples per audio packet (192 stereo frames × 4 halves)
pub const AUDIO_SAMPLES_PER_PACKET: usize = 768;
/// Total audio datagram size
pub const AUDIO_PACKET_SIZE: usize = 2 + AUDIO_SAMPLES_PER_PACKET * 2;

/// Stream frame dimensions
pub const FRAME_WIDTH: usize = 384;
pub const FRAME_HEIGHT: usize = 272;

/// Audio stream parameters (for the external sink)
pub const AUDIO_FREQUENCY: u32 = 48000;
pub const AUDIO_CHANNELS: u8 = 2;

/// Mask for the destination row in the `line` field
const LINE_ROW_MASK: u16 = 0x7fff;
/// Frame-boundary marker bit in the `line` field
const LINE_FRAME_END: u16 = 0x8000;

#[inline]
fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

/// One received video packet, borrowing the datagram buffer
#[derive(Debug)]
pub struct VideoPacket<'a> {
    pub seq: u16,
    pub frame: u16,
    line: u16,
    pub pixels_in_line: u16,
    pub lines_in_packet: u8,
    pub bits_per_pixel: u8,
    pub encoding: u16,
    pub payload: &'a [u8],
}

impl<'a> VideoPacket<'a> {
    /// Decode a video datagram, validating the buffer size first
    pub fn decode(datagram: &'a [u8]) -> Result<Self> {
        if datagram.len() != VIDEO_PACKET_SIZE {
            return Err(Error::MalformedPacket(format!(
                "video datagram is {} bytes, expected {}",
                datagram.len(),
                VIDEO_PACKET_SIZE
            )));
        }

        Ok(Self {
            seq: read_u16(datagram, 0),
            frame: read_u16(datagram, 2),
            line: read_u16(datagram, 4),
            pixels_in_line: read_u16(datagram, 6),
            lines_in_packet: datagram[8],
            bits_per_pixel: datagram[9],
            encoding: read_u16(datagram, 10),
            payload: &datagram[VIDEO_HEADER_SIZE..],
        })
    }

    /// Destination row of this packet's first line
    #[inline]
    pub fn row(&self) -> usize {
        (self.line & LINE_ROW_MASK) as usize
    }

    /// True when this packet completes the currently displayed frame
    #[inline]
    pub fn is_frame_end(&self) -> bool {
        self.line & LINE_FRAME_END != 0
    }
}

/// One received audio packet, borrowing the datagram buffer
#[derive(Debug)]
pub struct AudioPacket<'a> {
    pub seq: u16,
    sample_bytes: &'a [u8],
}

impl<'a> AudioPacket<'a> {
    /// Decode an audio datagram, validating the buffer size first
    pub fn decode(datagram: &'a [u8]) -> Result<Self> {
        if datagram.len() != AUDIO_PACKET_SIZE {
            return Err(Error::MalformedPacket(format!(
                "audio datagram is {} bytes, expected {}",
                datagram.len(),
                AUDIO_PACKET_SIZE
            )));
        }

        Ok(Self {
            seq: read_u16(datagram, 0),
            sample_bytes: &datagram[2..],
        })
    }

    /// Interleaved stereo samples, decoded from little-endian
    pub fn samples(&self) -> [i16; AUDIO_SAMPLES_PER_PACKET] {
        let mut samples = [0i16; AUDIO_SAMPLES_PER_PACKET];
        for (i, sample) in samples.iter_mut().enumerate() {
            *sample = i16::from_le_bytes([self.sample_bytes[i * 2], self.sample_bytes[i * 2 + 1]]);
        }
        samples
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a valid video datagram with the given header fields
    pub(crate) fn video_datagram(seq: u16, line: u16, pixels: u16, lines: u8) -> Vec<u8> {
        let mut buf = vec![0u8; VIDEO_PACKET_SIZE];
        buf[0..2].copy_from_slice(&seq.to_le_bytes());
        buf[2..4].copy_from_slice(&1u16.to_le_bytes()); // frame
        buf[4..6].copy_from_slice(&line.to_le_bytes());
        buf[6..8].copy_from_slice(&pixels.to_le_bytes());
        buf[8] = lines;
        buf[9] = 4; // bpp
        buf[10..12].copy_from_slice(&0u16.to_le_bytes());
        buf
    }

    #[test]
    fn test_video_decode_fields() {
        let mut buf = video_datagram(0x1234, 0x0010, 384, 4);
        buf[12] = 0xab;
        let pkt = VideoPacket::decode(&buf).unwrap();
        assert_eq!(pkt.seq, 0x1234);
        assert_eq!(pkt.frame, 1);
        assert_eq!(pkt.row(), 0x10);
        assert!(!pkt.is_frame_end());
        assert_eq!(pkt.pixels_in_line, 384);
        assert_eq!(pkt.lines_in_packet, 4);
        assert_eq!(pkt.bits_per_pixel, 4);
        assert_eq!(pkt.payload.len(), VIDEO_PAYLOAD_SIZE);
        assert_eq!(pkt.payload[0], 0xab);
    }

    #[test]
    fn test_video_frame_end_bit() {
        let buf = video_datagram(1, 0x8000 | 268, 384, 4);
        let pkt = VideoPacket::decode(&buf).unwrap();
        assert!(pkt.is_frame_end());
        assert_eq!(pkt.row(), 268);
    }

    #[test]
    fn test_video_rejects_wrong_size() {
        assert!(matches!(
            VideoPacket::decode(&[0u8; VIDEO_PACKET_SIZE - 1]),
            Err(Error::MalformedPacket(_))
        ));
        assert!(VideoPacket::decode(&[0u8; VIDEO_PACKET_SIZE + 1]).is_err());
        assert!(VideoPacket::decode(&[]).is_err());
    }

    #[test]
    fn test_audio_decode() {
        let mut buf = vec![0u8; AUDIO_PACKET_SIZE];
        buf[0..2].copy_from_slice(&7u16.to_le_bytes());
        buf[2..4].copy_from_slice(&(-32768i16).to_le_bytes());
        buf[4..6].copy_from_slice(&32767i16.to_le_bytes());
        let pkt = AudioPacket::decode(&buf).unwrap();
        assert_eq!(pkt.seq, 7);
        let samples = pkt.samples();
        assert_eq!(samples[0], -32768);
        assert_eq!(samples[1], 32767);
        assert_eq!(samples[2], 0);
    }

    #[test]
    fn test_audio_rejects_wrong_size() {
        assert!(matches!(
            AudioPacket::decode(&[0u8; AUDIO_PACKET_SIZE - 2]),
            Err(Error::MalformedPacket(_))
        ));
        assert!(AudioPacket::decode(&[0u8; VIDEO_PACKET_SIZE]).is_err());
    }
}
