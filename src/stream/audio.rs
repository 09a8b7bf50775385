//! Audio packet hand-off to the external playback sink
//!
//! The audio format is rigid (fixed packet size, fixed sample rate), so the
//! decoder validates nothing beyond the datagram length and performs the same
//! wraparound sequence check as the video path, independently thresholded.
//!
//! Samples are forwarded only once both the video and audio byte counters are
//! non-zero. Feeding audio before the video path has started would put the
//! playback queue ahead of the first visible frame and desynchronize
//! perceived timing. Packet loss is silent: no buffering, no interpolation.

use crate::error::Result;
use crate::framebuffer::AudioSink;
use crate::protocol::AudioPacket;
use crate::stream::session::StreamSession;

/// Decoder/hand-off stage for the audio stream
pub struct AudioStreamBuffer {
    diagnostics: bool,
}

impl AudioStreamBuffer {
    pub fn new(diagnostics: bool) -> Self {
        Self { diagnostics }
    }

    /// Account for one audio packet and forward its samples to the sink
    pub fn decode(
        &self,
        packet: &AudioPacket,
        session: &mut StreamSession,
        sink: &mut dyn AudioSink,
    ) -> Result<()> {
        if let Some(gap) = session.record_audio_packet(packet.seq) {
            if self.diagnostics {
                log::warn!(
                    "UDP audio packet missed or out of order, last received: {} current {}",
                    gap.last,
                    gap.current
                );
            }
        }

        if session.both_streams_started() {
            sink.queue(&packet.samples())?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{AUDIO_PACKET_SIZE, AUDIO_SAMPLES_PER_PACKET};

    struct CollectingSink {
        samples: Vec<i16>,
        calls: usize,
    }

    impl CollectingSink {
        fn new() -> Self {
            Self {
                samples: Vec::new(),
                calls: 0,
            }
        }
    }

    impl AudioSink for CollectingSink {
        fn queue(&mut self, samples: &[i16]) -> Result<()> {
            self.samples.extend_from_slice(samples);
            self.calls += 1;
            Ok(())
        }
    }

    fn audio_datagram(seq: u16, first_sample: i16) -> Vec<u8> {
        let mut buf = vec![0u8; AUDIO_PACKET_SIZE];
        buf[0..2].copy_from_slice(&seq.to_le_bytes());
        buf[2..4].copy_from_slice(&first_sample.to_le_bytes());
        buf
    }

    #[test]
    fn test_audio_held_back_until_video_starts() {
        let buffer = AudioStreamBuffer::new(false);
        let mut session = StreamSession::new();
        let mut sink = CollectingSink::new();

        let buf = audio_datagram(1, 100);
        let packet = AudioPacket::decode(&buf).unwrap();
        buffer.decode(&packet, &mut session, &mut sink).unwrap();

        // No video yet: counted but not forwarded
        assert_eq!(sink.calls, 0);
        assert_eq!(session.audio_bytes, AUDIO_PACKET_SIZE as u64);
    }

    #[test]
    fn test_audio_forwarded_once_both_streams_live() {
        let buffer = AudioStreamBuffer::new(false);
        let mut session = StreamSession::new();
        let mut sink = CollectingSink::new();
        session.video_bytes = 780;

        let buf = audio_datagram(1, -12345);
        let packet = AudioPacket::decode(&buf).unwrap();
        buffer.decode(&packet, &mut session, &mut sink).unwrap();

        assert_eq!(sink.calls, 1);
        assert_eq!(sink.samples.len(), AUDIO_SAMPLES_PER_PACKET);
        assert_eq!(sink.samples[0], -12345);
    }

    #[test]
    fn test_loss_is_silent() {
        let buffer = AudioStreamBuffer::new(true);
        let mut session = StreamSession::new();
        let mut sink = CollectingSink::new();
        session.video_bytes = 780;

        for seq in [1u16, 2, 9] {
            let buf = audio_datagram(seq, 0);
            let packet = AudioPacket::decode(&buf).unwrap();
            buffer.decode(&packet, &mut session, &mut sink).unwrap();
        }

        // Three packets forwarded as-is, nothing interpolated for the gap
        assert_eq!(sink.calls, 3);
        assert_eq!(sink.samples.len(), AUDIO_SAMPLES_PER_PACKET * 3);
    }
}
